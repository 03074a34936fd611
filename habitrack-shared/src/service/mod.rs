/// Core operations
///
/// Each function takes the pool and an explicit [`crate::policy::Actor`],
/// runs at most one transaction, and returns a [`crate::error::CoreResult`].
/// Mutations that return a nested view re-read it through
/// [`crate::aggregate`] after commit.
///
/// # Modules
///
/// - `users`: registration, login and the caller's own account
/// - `habits`: habits with their tag sets, completions and audit reads
/// - `tags`: personal and system tags

pub mod habits;
pub mod tags;
pub mod users;

use crate::error::{CoreError, CoreResult};

/// Rejects names that are empty after trimming
pub(crate) fn ensure_name(field: &str, value: &str, max_len: usize) -> CoreResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(CoreError::Validation(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(())
}
