/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use habitrack_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config, None));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::rate_limit::RateLimiter, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use habitrack_shared::auth::middleware::{jwt_auth_middleware, AuthError};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// `None` when `REDIS_URL` is unset
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, rate_limiter: Option<RateLimiter>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            rate_limiter,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /health                          public
/// /v1/auth/{register,login,refresh} public
/// /v1/users/me                     authenticated + rate limited
/// /v1/habits[/:id[/complete|/entries|/tag-history]]
/// /v1/tags[/:id]
/// ```
///
/// Authentication runs before rate limiting, so buckets are keyed by the
/// authenticated user.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(routes::users::get_me)
                .patch(routes::users::update_me)
                .delete(routes::users::delete_me),
        )
        .route(
            "/habits",
            get(routes::habits::list_habits).post(routes::habits::create_habit),
        )
        .route(
            "/habits/:id",
            get(routes::habits::get_habit)
                .patch(routes::habits::update_habit)
                .delete(routes::habits::delete_habit),
        )
        .route("/habits/:id/complete", post(routes::habits::complete_habit))
        .route("/habits/:id/entries", get(routes::habits::list_entries))
        .route("/habits/:id/tag-history", get(routes::habits::tag_history))
        .route(
            "/tags",
            get(routes::tags::list_tags).post(routes::tags::create_tag),
        )
        .route(
            "/tags/:id",
            get(routes::tags::get_tag)
                .patch(routes::tags::update_tag)
                .delete(routes::tags::delete_tag),
        )
        .layer(from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::rate_limit_layer,
        ))
        .layer(from_fn_with_state(state.clone(), require_actor));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    let cors = cors_layer(&state.config.api.cors_origins);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Empty origin list means any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Resolves the bearer token into an `Actor` request extension
async fn require_actor(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    jwt_auth_middleware(state.db.clone(), state.config.jwt.secret.clone(), req, next).await
}
