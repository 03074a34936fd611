/// Core error taxonomy
///
/// Every core operation returns `CoreResult<T>`. Each variant carries a stable
/// machine-readable code (see [`CoreError::code`]) that the HTTP layer passes
/// through to clients unchanged.
///
/// Storage errors are translated here so that storage-specific codes never
/// leak past the core:
///
/// - unique violations become [`CoreError::Conflict`]
/// - foreign key violations become [`CoreError::NotFound`]
/// - pool timeouts and connection failures become [`CoreError::Transient`]
/// - anything else becomes [`CoreError::Internal`]
///
/// # Example
///
/// ```
/// use habitrack_shared::error::{CoreError, StateViolation};
///
/// let err = CoreError::InvalidState(StateViolation::HabitInactive);
/// assert_eq!(err.code(), "inactive");
/// ```

/// Result alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Reason an operation was rejected because of the entity's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateViolation {
    /// Completion attempted on a habit with `is_active = false`
    HabitInactive,

    /// Soft-delete attempted on an entity that is already deleted
    AlreadyDeleted,
}

impl StateViolation {
    /// Machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            StateViolation::HabitInactive => "inactive",
            StateViolation::AlreadyDeleted => "already_deleted",
        }
    }
}

impl std::fmt::Display for StateViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateViolation::HabitInactive => write!(f, "habit is inactive"),
            StateViolation::AlreadyDeleted => write!(f, "resource is already deleted"),
        }
    }
}

/// Typed failure surfaced by the core
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Entity missing, soft-deleted, or owned by someone else
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ownership or immutability violation (e.g. system tags)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation surfaced from storage
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entity exists but is in the wrong state for the operation
    #[error("Invalid state: {0}")]
    InvalidState(StateViolation),

    /// Domain invariant violated by the input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Storage connectivity problem; the caller may retry
    #[error("Transient storage failure: {0}")]
    Transient(String),

    /// Anything unexpected
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable code for the failure
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Conflict(_) => "conflict",
            CoreError::InvalidState(violation) => violation.code(),
            CoreError::Validation(_) => "validation",
            CoreError::Transient(_) => "transient",
            CoreError::Internal(_) => "internal",
        }
    }

    /// Shorthand for `NotFound` with a resource name
    pub fn not_found(resource: &str) -> Self {
        CoreError::NotFound(format!("{} not found", resource))
    }

    /// Shorthand for the already-deleted state violation
    pub fn already_deleted() -> Self {
        CoreError::InvalidState(StateViolation::AlreadyDeleted)
    }
}

/// Maps a violated unique constraint/index name to a client-facing message
fn conflict_message(constraint: &str) -> String {
    match constraint {
        "users_email_key" => "Email already exists".to_string(),
        "users_username_key" => "Username already exists".to_string(),
        "tags_owner_name_live_idx" => "A tag with this name already exists".to_string(),
        "habit_tags_live_pair_idx" => "Tag is already attached to this habit".to_string(),
        other => format!("Constraint violation: {}", other),
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let constraint = db_err.constraint().unwrap_or("unique");
                    return CoreError::Conflict(conflict_message(constraint));
                }
                if db_err.is_foreign_key_violation() {
                    return CoreError::NotFound("Referenced resource not found".to_string());
                }
                if db_err.is_check_violation() {
                    return CoreError::Validation(format!(
                        "Check constraint violated: {}",
                        db_err.constraint().unwrap_or("unknown")
                    ));
                }
                CoreError::Internal(format!("Database error: {}", db_err))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                CoreError::Transient(err.to_string())
            }
            other => CoreError::Internal(format!("Database error: {}", other)),
        }
    }
}
