/// Database plumbing
///
/// - `pool`: connection pool construction and health
/// - `migrations`: embedded schema migrations
///
/// Models live in [`crate::models`].

pub mod migrations;
pub mod pool;
