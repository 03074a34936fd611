//! Shared setup for API integration tests
//!
//! Tests need a PostgreSQL database in `DATABASE_URL`; without it
//! [`TestContext::new`] returns `None` and the test returns early.
//! Rate limiting is disabled.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use habitrack_api::{
    app::{build_router, AppState},
    config::Config,
};
use habitrack_shared::{
    auth::jwt::issue_token_pair,
    db::migrations::run_migrations,
    service::users::{register, Registration},
};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "Str0ng!Passw0rd";

pub struct TestContext {
    pub db: PgPool,
    pub app: Router,
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

impl TestContext {
    pub async fn new() -> Option<Self> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping");
            return None;
        };

        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some(database_url.clone()),
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            _ => None,
        })
        .expect("test config");

        let db = PgPool::connect(&config.database.url)
            .await
            .expect("connect to test database");
        run_migrations(&db).await.expect("run migrations");

        let suffix = Uuid::new_v4().simple().to_string();
        let username = format!("api_{}", &suffix[..12]);
        let user = register(
            &db,
            Registration {
                email: format!("{}@example.com", username),
                username: username.clone(),
                password: PASSWORD.to_string(),
                first_name: Some("Api".to_string()),
                last_name: None,
            },
        )
        .await
        .expect("register test user");

        let token = issue_token_pair(user.id, JWT_SECRET)
            .expect("issue tokens")
            .access_token;

        let app = build_router(AppState::new(db.clone(), config, None));

        Some(TestContext {
            db,
            app,
            user_id: user.id,
            username,
            token,
        })
    }

    /// Sends an authenticated request and returns status and JSON body
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.app, method, uri, Some(&self.token), body).await
    }
}

/// Sends a request; `Value::Null` stands for an empty response body
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}
