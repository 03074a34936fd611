/// End-to-end tests of the HTTP surface
///
/// Run with: DATABASE_URL=postgresql://... cargo test -p habitrack-api --test api_flow_tests

mod common;

use axum::http::{header, Method, StatusCode};
use common::{send, TestContext};
use serde_json::{json, Value};

async fn system_tag_id(ctx: &TestContext, name: &str) -> String {
    let (status, tags) = ctx.send(Method::GET, "/v1/tags", None).await;
    assert_eq!(status, StatusCode::OK);

    tags.as_array()
        .unwrap()
        .iter()
        .find(|tag| tag["name"] == name && tag["created_by"].is_null())
        .map(|tag| tag["id"].as_str().unwrap().to_string())
        .unwrap()
}

fn tag_ids(habit: &Value) -> Vec<String> {
    habit["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_is_public() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, body) = send(&ctx.app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rate_limiting"], false);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let Some(ctx) = TestContext::new().await else { return };

    let request = axum::http::Request::builder()
        .uri("/v1/habits")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.app.clone(), request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let (status, _) = send(&ctx.app, Method::GET, "/v1/tags", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_refresh() {
    let Some(ctx) = TestContext::new().await else { return };
    let username = format!("flow_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);

    let (status, body) = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "email": format!("{}@Example.com", username),
            "username": username,
            "password": common::PASSWORD
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], format!("{}@example.com", username));
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(body["token_type"], "Bearer");

    let (status, login) = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "username": username, "password": common::PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let refresh_token = login["refresh_token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "username": username, "password": "Wr0ng!password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, refreshed) = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let access = refreshed["access_token"].as_str().unwrap();
    let (status, me) = send(&ctx.app, Method::GET, "/v1/users/me", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], username);

    // A refresh token is not an access token
    let (status, _) = send(&ctx.app, Method::GET, "/v1/users/me", Some(&refresh_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_habit_lifecycle_with_tags_and_entries() {
    let Some(ctx) = TestContext::new().await else { return };
    let health = system_tag_id(&ctx, "health").await;

    let (status, habit) = ctx
        .send(
            Method::POST,
            "/v1/habits",
            Some(json!({
                "name": "Drink water",
                "frequency": "daily",
                "target_count": 1,
                "tag_ids": [health]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tag_ids(&habit), vec![health.clone()]);
    let id = habit["id"].as_str().unwrap().to_string();

    // Omitting tag_ids keeps the tags
    let (status, renamed) = ctx
        .send(
            Method::PATCH,
            &format!("/v1/habits/{}", id),
            Some(json!({ "name": "Drink more water" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Drink more water");
    assert_eq!(tag_ids(&renamed), vec![health.clone()]);

    let (status, cleared) = ctx
        .send(
            Method::PATCH,
            &format!("/v1/habits/{}", id),
            Some(json!({ "tag_ids": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(tag_ids(&cleared).is_empty());

    let (status, first) = ctx
        .send(Method::POST, &format!("/v1/habits/{}/complete", id), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, second) = ctx
        .send(
            Method::POST,
            &format!("/v1/habits/{}/complete", id),
            Some(json!({ "note": "second glass" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(first["id"], second["id"]);
    assert_eq!(second["note"], "second glass");

    let (status, page) = ctx
        .send(Method::GET, &format!("/v1/habits/{}/entries?limit=1", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["entries"].as_array().unwrap().len(), 1);

    let (status, history) = ctx
        .send(Method::GET, &format!("/v1/habits/{}/tag-history", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0]["deleted_at"].is_null());
}

#[tokio::test]
async fn test_inactive_habit_completion_is_conflict() {
    let Some(ctx) = TestContext::new().await else { return };

    let (_, habit) = ctx
        .send(
            Method::POST,
            "/v1/habits",
            Some(json!({ "name": "Paused", "frequency": "monthly", "is_active": false })),
        )
        .await;
    let id = habit["id"].as_str().unwrap();

    let (status, body) = ctx
        .send(Method::POST, &format!("/v1/habits/{}/complete", id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "inactive");

    let (_, page) = ctx
        .send(Method::GET, &format!("/v1/habits/{}/entries", id), None)
        .await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_double_delete_reports_already_deleted() {
    let Some(ctx) = TestContext::new().await else { return };

    let (_, habit) = ctx
        .send(
            Method::POST,
            "/v1/habits",
            Some(json!({ "name": "Stretch", "frequency": "daily" })),
        )
        .await;
    let uri = format!("/v1/habits/{}", habit["id"].as_str().unwrap());

    let (status, _) = ctx.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = ctx.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_deleted");

    let (status, _) = ctx.send(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_system_tag_writes_are_forbidden() {
    let Some(ctx) = TestContext::new().await else { return };
    let fitness = system_tag_id(&ctx, "fitness").await;
    let uri = format!("/v1/tags/{}", fitness);

    let (status, body) = ctx
        .send(Method::PATCH, &uri, Some(json!({ "name": "gym" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = ctx.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_validation_errors_are_unprocessable() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, body) = ctx
        .send(
            Method::POST,
            "/v1/habits",
            Some(json!({ "name": "Read", "frequency": "daily", "target_count": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");
    assert_eq!(body["details"][0]["field"], "target_count");

    let (status, body) = ctx
        .send(
            Method::POST,
            "/v1/tags",
            Some(json!({ "name": "bad", "color": "blue" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn test_deleted_account_token_is_rejected() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, _) = ctx.send(Method::DELETE, "/v1/users/me", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.send(Method::GET, "/v1/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
