/// API route handlers, one module per resource
///
/// Handlers translate HTTP shapes into calls on `habitrack_shared::service`
/// and never touch SQL directly.

pub mod auth;
pub mod habits;
pub mod health;
pub mod tags;
pub mod users;
