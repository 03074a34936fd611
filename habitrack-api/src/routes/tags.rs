/// Tag endpoints
///
/// Listing and fetching show system tags plus the caller's own, each with
/// its creator's public profile (`created_by` is `null` for system tags).
/// Updating or deleting a system tag answers 403.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use habitrack_shared::{
    aggregate::TagWithCreator,
    models::tag::{NewTag, TagChanges},
    policy::Actor,
    service::tags::{self, DEFAULT_COLOR},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1 to 50 characters"))]
    pub name: String,

    /// `#RRGGBB`; defaults to a neutral grey
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTagRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1 to 50 characters"))]
    pub name: Option<String>,

    pub color: Option<String>,
}

pub async fn list_tags(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<Vec<TagWithCreator>>> {
    Ok(Json(tags::list_tags(&state.db, &actor).await?))
}

pub async fn create_tag(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateTagRequest>,
) -> ApiResult<(StatusCode, Json<TagWithCreator>)> {
    req.validate()?;

    let tag = tags::create_tag(
        &state.db,
        &actor,
        NewTag {
            name: req.name,
            color: req.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn get_tag(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TagWithCreator>> {
    Ok(Json(tags::get_tag(&state.db, &actor, id).await?))
}

pub async fn update_tag(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTagRequest>,
) -> ApiResult<Json<TagWithCreator>> {
    req.validate()?;

    let tag = tags::update_tag(
        &state.db,
        &actor,
        id,
        TagChanges {
            name: req.name,
            color: req.color,
        },
    )
    .await?;

    Ok(Json(tag))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tags::delete_tag(&state.db, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
