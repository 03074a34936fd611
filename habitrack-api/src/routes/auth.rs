/// Authentication endpoints
///
/// - `POST /v1/auth/register` - create an account, returns the user and tokens
/// - `POST /v1/auth/login` - email or username plus password, returns tokens
/// - `POST /v1/auth/refresh` - exchange a refresh token for an access token
///
/// Access tokens live one hour, refresh tokens fourteen days.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use habitrack_shared::{
    auth::jwt::{self, Claims, TokenPair, TokenType},
    models::user::User,
    policy::Actor,
    service::users::{self, Registration},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    /// Strength rules are enforced by the account service
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address or username
    #[serde(alias = "email", alias = "username")]
    #[validate(length(min = 1, message = "Login is required"))]
    pub login: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// # Errors
///
/// - `422` on malformed input or a weak password
/// - `409` when the email or username is taken
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    req.validate()?;

    let user = users::register(
        &state.db,
        Registration {
            email: req.email,
            username: req.username,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        },
    )
    .await?;

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user, tokens })))
}

/// Unknown accounts and wrong passwords get the same 401
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let user = users::authenticate(&state.db, &req.login, &req.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid login or password".to_string()))?;

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    Ok(Json(LoginResponse {
        user_id: user.id.to_string(),
        tokens,
    }))
}

/// A refresh token of a since-deleted account is rejected with 401
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    if users::get_profile(&state.db, &Actor::new(claims.sub)).await.is_err() {
        tracing::debug!(user_id = %claims.sub, "Refresh for unknown or deleted account");
        return Err(ApiError::Unauthorized("Account no longer exists".to_string()));
    }

    let access_token = jwt::create_token(&Claims::new(claims.sub, TokenType::Access), state.jwt_secret())?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: TokenType::Access.lifetime().num_seconds(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let valid: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "pat@example.com",
            "username": "pat",
            "password": "Str0ng!Passw0rd"
        }))
        .unwrap();
        assert!(valid.validate().is_ok());

        let invalid: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "not-an-email",
            "username": "p",
            "password": "short"
        }))
        .unwrap();
        let errors = invalid.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_login_accepts_email_or_username_key() {
        let by_email: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "pat@example.com",
            "password": "x"
        }))
        .unwrap();
        assert_eq!(by_email.login, "pat@example.com");

        let by_username: LoginRequest = serde_json::from_value(serde_json::json!({
            "username": "pat",
            "password": "x"
        }))
        .unwrap();
        assert_eq!(by_username.login, "pat");
    }
}
