/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`. Core failures convert through
/// `From<CoreError>` and keep their machine-readable code in the `error`
/// field of the body:
///
/// | Core error | Status | `error` |
/// |---|---|---|
/// | `NotFound` | 404 | `not_found` |
/// | `Forbidden` | 403 | `forbidden` |
/// | `Conflict` | 409 | `conflict` |
/// | `InvalidState` | 409 | `inactive` / `already_deleted` |
/// | `Validation` | 422 | `validation` |
/// | `Transient` | 503 | `transient` |
/// | `Internal` | 500 | `internal` |
///
/// # Example
///
/// ```
/// use habitrack_api::error::{ApiError, ApiResult};
/// use habitrack_shared::error::CoreError;
///
/// fn lookup() -> ApiResult<()> {
///     Err(CoreError::not_found("Habit").into())
/// }
///
/// assert!(matches!(lookup(), Err(ApiError::Core(CoreError::NotFound(_)))));
/// ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use habitrack_shared::{
    auth::{jwt::JwtError, middleware::AuthError, password::PasswordError},
    error::CoreError,
};
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {} errors", .0.len())]
    ValidationError(Vec<ValidationErrorDetail>),

    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { retry_after: u64, message: String },

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::Conflict(_) | CoreError::InvalidState(_) => StatusCode::CONFLICT,
        CoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn core_message(err: &CoreError) -> String {
    match err {
        CoreError::NotFound(msg)
        | CoreError::Forbidden(msg)
        | CoreError::Conflict(msg)
        | CoreError::Validation(msg) => msg.clone(),
        CoreError::InvalidState(violation) => violation.to_string(),
        CoreError::Transient(_) => "Service temporarily unavailable, retry later".to_string(),
        CoreError::Internal(_) => "An internal error occurred".to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, details, retry_after) = match self {
            ApiError::Core(err) => {
                match &err {
                    CoreError::Internal(detail) => tracing::error!(error = %detail, "Internal error"),
                    CoreError::Transient(detail) => tracing::warn!(error = %detail, "Transient storage failure"),
                    _ => {}
                }
                (core_status(&err), err.code(), core_message(&err), None, None)
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation",
                "Request validation failed".to_string(),
                Some(errors),
                None,
            ),
            ApiError::RateLimitExceeded { retry_after, message } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
                message,
                None,
                Some(retry_after),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "An internal error occurred".to_string(),
                    None,
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
            details,
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    ValidationErrorDetail::new(
                        field.to_string(),
                        error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid {}", field)),
                    )
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Encode(msg) => ApiError::InternalError(format!("Token creation failed: {}", msg)),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Database(e) => ApiError::Core(CoreError::from(e)),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use habitrack_shared::error::StateViolation;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_core_error_statuses() {
        assert_eq!(status_of(CoreError::not_found("Habit")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(CoreError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(CoreError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(CoreError::InvalidState(StateViolation::HabitInactive)),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(CoreError::already_deleted()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(CoreError::Validation("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(CoreError::Transient("pool".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(CoreError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ApiError::Core(CoreError::Internal("secret detail".into()));
        assert_eq!(core_message(&CoreError::Internal("secret detail".into())), "An internal error occurred");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_state_violation_message() {
        assert_eq!(
            core_message(&CoreError::InvalidState(StateViolation::HabitInactive)),
            "habit is inactive"
        );
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::RateLimitExceeded {
            retry_after: 7,
            message: "slow down".into(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
    }

    #[test]
    fn test_jwt_errors_are_unauthorized() {
        assert_eq!(status_of(JwtError::Expired), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(JwtError::Invalid("bad".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(JwtError::Encode("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = ApiError::ValidationError(vec![
            ValidationErrorDetail::new("email", "Invalid email format"),
            ValidationErrorDetail::new("password", "Password too short"),
        ]);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
    }
}
