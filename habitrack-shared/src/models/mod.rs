/// Database models for Habitrack
///
/// Each model owns its SQL. Functions that take `&mut PgConnection` are meant
/// to run inside a transaction opened by [`crate::service`]; functions that
/// take `&PgPool` are standalone reads or single-statement writes.
///
/// # Models
///
/// - `user`: User accounts (root tenant entity)
/// - `habit`: Habits owned by one user
/// - `tag`: Personal and system tags
/// - `habit_tag`: Habit ↔ Tag association rows
/// - `entry`: Habit completion entries

pub mod entry;
pub mod habit;
pub mod habit_tag;
pub mod tag;
pub mod user;
