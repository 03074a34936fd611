/// Request middleware owned by the API server
///
/// Authentication lives in `habitrack_shared::auth::middleware`; this
/// module adds per-user rate limiting on top of it.

pub mod rate_limit;
