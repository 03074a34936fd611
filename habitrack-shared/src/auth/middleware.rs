/// Bearer authentication for axum
///
/// [`jwt_auth_middleware`] validates `Authorization: Bearer <token>`, checks
/// that the token's user still has a live account, and inserts the
/// resulting [`Actor`] into the request extensions. Handlers take it with
/// `Extension<Actor>`.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use habitrack_shared::auth::middleware::jwt_auth_middleware;
/// use habitrack_shared::policy::Actor;
/// use sqlx::PgPool;
///
/// async fn whoami(Extension(actor): Extension<Actor>) -> String {
///     actor.user_id.to_string()
/// }
///
/// fn router(pool: PgPool, secret: String) -> Router {
///     Router::new()
///         .route("/whoami", get(whoami))
///         .layer(middleware::from_fn(move |req, next| {
///             jwt_auth_middleware(pool.clone(), secret.clone(), req, next)
///         }))
/// }
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error};

use super::jwt::{validate_access_token, JwtError};
use crate::models::user::User;
use crate::policy::Actor;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingCredentials,

    #[error("Malformed authorization header")]
    InvalidFormat,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    Expired,

    /// Token is valid but its account is gone or deleted
    #[error("Account no longer exists")]
    UnknownAccount,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::Expired,
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingCredentials
            | AuthError::InvalidFormat
            | AuthError::InvalidToken(_)
            | AuthError::Expired
            | AuthError::UnknownAccount => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AuthError::Database(e) => {
                error!(error = %e, "Database error during authentication");
                (StatusCode::SERVICE_UNAVAILABLE, "transient")
            }
        };

        let message = match &self {
            AuthError::Database(_) => "Authentication is temporarily unavailable".to_string(),
            other => other.to_string(),
        };

        let mut response = (status, Json(json!({ "error": code, "message": message }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Extracts the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidFormat)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::InvalidFormat);
    }

    Ok(token.trim())
}

/// Resolves request headers to an [`Actor`] with a live account
pub async fn authenticate(pool: &PgPool, secret: &str, headers: &HeaderMap) -> Result<Actor, AuthError> {
    let token = bearer_token(headers)?;
    let claims = validate_access_token(token, secret)?;

    if User::find_by_id(pool, claims.sub).await?.is_none() {
        debug!(user_id = %claims.sub, "Token for unknown or deleted account");
        return Err(AuthError::UnknownAccount);
    }

    Ok(Actor::new(claims.sub))
}

pub async fn jwt_auth_middleware(
    pool: PgPool,
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let actor = authenticate(&pool, &secret, req.headers()).await?;
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}
