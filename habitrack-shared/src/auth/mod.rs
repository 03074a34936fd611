/// Credential handling
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and the password policy
/// - [`jwt`]: HS256 access and refresh tokens
/// - [`middleware`]: axum middleware resolving a bearer token to an
///   [`crate::policy::Actor`]

pub mod jwt;
pub mod middleware;
pub mod password;
