/// Account operations
///
/// Registration hashes the password before anything touches the database;
/// plaintext passwords never leave this module. Accounts are soft-deleted
/// and a deleted account can neither log in nor be looked up.

use sqlx::PgPool;
use tracing::{info, warn};

use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{CoreError, CoreResult};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::patch::Patch;
use crate::policy::{self, Actor};

const USERNAME_MAX_LEN: usize = 50;

/// Input for [`register`]
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Input for [`update_profile`]
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Patch<String>,
    pub last_name: Patch<String>,
}

fn hash(password: &str) -> CoreResult<String> {
    validate_password_strength(password).map_err(CoreError::Validation)?;
    hash_password(password).map_err(|e| CoreError::Internal(e.to_string()))
}

/// Creates an account
///
/// # Errors
///
/// - `Validation` for a weak password or a blank username
/// - `Conflict` when the email or username is taken
pub async fn register(pool: &PgPool, input: Registration) -> CoreResult<User> {
    super::ensure_name("username", &input.username, USERNAME_MAX_LEN)?;
    let password_hash = hash(&input.password)?;

    let user = User::create(
        pool,
        CreateUser {
            email: input.email.trim().to_lowercase(),
            username: input.username.trim().to_string(),
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
        },
    )
    .await?;

    info!(user_id = %user.id, "User registered");
    Ok(user)
}

/// Checks credentials; `login` is an email address or a username
///
/// Returns `Ok(None)` for unknown accounts and wrong passwords alike.
pub async fn authenticate(pool: &PgPool, login: &str, password: &str) -> CoreResult<Option<User>> {
    let login = login.trim();
    let user = if login.contains('@') {
        User::find_by_email(pool, &login.to_lowercase()).await?
    } else {
        User::find_by_username(pool, login).await?
    };

    let Some(user) = user else {
        warn!("Login attempt for unknown account");
        return Ok(None);
    };

    let valid = verify_password(password, &user.password_hash)
        .map_err(|e| CoreError::Internal(e.to_string()))?;
    if !valid {
        warn!(user_id = %user.id, "Login attempt with wrong password");
        return Ok(None);
    }

    info!(user_id = %user.id, "User authenticated");
    Ok(Some(user))
}

/// Loads the actor's own live account
pub async fn get_profile(pool: &PgPool, actor: &Actor) -> CoreResult<User> {
    User::find_by_id(pool, actor.user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("User"))
}

/// Applies a partial update to the actor's account
pub async fn update_profile(pool: &PgPool, actor: &Actor, changes: ProfileChanges) -> CoreResult<User> {
    if let Some(username) = &changes.username {
        super::ensure_name("username", username, USERNAME_MAX_LEN)?;
    }

    let password_hash = changes.password.as_deref().map(hash).transpose()?;

    let update = UpdateUser {
        email: changes.email.map(|email| email.trim().to_lowercase()),
        username: changes.username.map(|username| username.trim().to_string()),
        password_hash,
        first_name: changes.first_name.into_option(),
        last_name: changes.last_name.into_option(),
    };

    if update.is_empty() {
        return get_profile(pool, actor).await;
    }

    let user = User::update(pool, actor.user_id, update)
        .await?
        .ok_or_else(|| CoreError::not_found("User"))?;

    info!(user_id = %user.id, "Profile updated");
    Ok(user)
}

/// Soft-deletes the actor's account
///
/// Owned habits and tags are left untouched; they become unreachable
/// because a deleted account can no longer authenticate.
pub async fn delete_account(pool: &PgPool, actor: &Actor) -> CoreResult<()> {
    let mut tx = pool.begin().await?;

    let state = User::lock_deletion_state(&mut *tx, actor.user_id).await?;
    policy::ensure_deletable(state, "User")?;

    User::soft_delete(&mut *tx, actor.user_id).await?;
    tx.commit().await?;

    info!(user_id = %actor.user_id, "Account deleted");
    Ok(())
}
