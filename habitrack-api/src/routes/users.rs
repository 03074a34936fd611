/// Own-account endpoints under `/v1/users/me`

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Extension, Json};
use habitrack_shared::{
    models::user::User,
    patch::Patch,
    policy::Actor,
    service::users::{self, ProfileChanges},
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,

    /// `null` clears the name
    #[serde(default)]
    pub first_name: Patch<String>,

    #[serde(default)]
    pub last_name: Patch<String>,
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<User>> {
    Ok(Json(users::get_profile(&state.db, &actor).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let user = users::update_profile(
        &state.db,
        &actor,
        ProfileChanges {
            email: req.email,
            username: req.username,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        },
    )
    .await?;

    Ok(Json(user))
}

/// Soft-deletes the account; existing tokens stop working immediately
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<StatusCode> {
    users::delete_account(&state.db, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
