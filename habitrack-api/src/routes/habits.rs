/// Habit endpoints
///
/// | Method | Path | Success |
/// |---|---|---|
/// | `GET` | `/v1/habits?active=` | 200, habits with tags |
/// | `POST` | `/v1/habits` | 201, habit with tags |
/// | `GET` | `/v1/habits/:id` | 200 |
/// | `PATCH` | `/v1/habits/:id` | 200 |
/// | `DELETE` | `/v1/habits/:id` | 204 |
/// | `POST` | `/v1/habits/:id/complete` | 201, the new entry |
/// | `GET` | `/v1/habits/:id/entries?limit=&offset=` | 200, one page |
/// | `GET` | `/v1/habits/:id/tag-history` | 200, every association ever made |
///
/// In a `PATCH` body an omitted `tag_ids` keeps the current tags, while
/// `[]` or `null` clears them.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use habitrack_shared::{
    aggregate::HabitWithTags,
    models::{
        entry::{Entry, NewEntry},
        habit::{Frequency, HabitChanges},
        habit_tag::HabitTag,
    },
    patch::Patch,
    policy::Actor,
    service::habits::{self, CreateHabit, EntryPage, HabitFilter, Page, UpdateHabit},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

fn default_active() -> bool {
    true
}

fn default_target_count() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHabitRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub frequency: Frequency,

    #[serde(default = "default_target_count")]
    #[validate(range(min = 1, message = "Target count must be at least 1"))]
    pub target_count: i32,

    #[serde(default = "default_active")]
    pub is_active: bool,

    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateHabitRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Patch<String>,

    pub frequency: Option<Frequency>,

    #[validate(range(min = 1, message = "Target count must be at least 1"))]
    pub target_count: Option<i32>,

    pub is_active: Option<bool>,

    #[serde(default)]
    pub tag_ids: Patch<Vec<Uuid>>,
}

impl From<UpdateHabitRequest> for UpdateHabit {
    fn from(req: UpdateHabitRequest) -> Self {
        UpdateHabit {
            changes: HabitChanges {
                name: req.name,
                description: req.description,
                frequency: req.frequency,
                target_count: req.target_count,
                is_active: req.is_active,
            },
            tag_ids: req.tag_ids,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CompleteHabitRequest {
    /// Defaults to now
    pub completion_date: Option<DateTime<Utc>>,

    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListHabitsQuery {
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_habits(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListHabitsQuery>,
) -> ApiResult<Json<Vec<HabitWithTags>>> {
    let habits = habits::list_habits(&state.db, &actor, HabitFilter { active: query.active }).await?;
    Ok(Json(habits))
}

pub async fn create_habit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateHabitRequest>,
) -> ApiResult<(StatusCode, Json<HabitWithTags>)> {
    req.validate()?;

    let habit = habits::create_habit(
        &state.db,
        &actor,
        CreateHabit {
            name: req.name,
            description: req.description,
            frequency: req.frequency,
            target_count: req.target_count,
            is_active: req.is_active,
            tag_ids: req.tag_ids,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(habit)))
}

pub async fn get_habit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HabitWithTags>> {
    Ok(Json(habits::get_habit(&state.db, &actor, id).await?))
}

pub async fn update_habit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateHabitRequest>,
) -> ApiResult<Json<HabitWithTags>> {
    req.validate()?;

    let habit = habits::update_habit(&state.db, &actor, id, req.into()).await?;
    Ok(Json(habit))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    habits::delete_habit(&state.db, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The body is optional; an empty request records a completion now
pub async fn complete_habit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    body: Option<Json<CompleteHabitRequest>>,
) -> ApiResult<(StatusCode, Json<Entry>)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    req.validate()?;

    let entry = habits::complete_habit(
        &state.db,
        &actor,
        id,
        NewEntry {
            completion_date: req.completion_date,
            note: req.note,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_entries(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<EntryPage>> {
    let page = Page::new(query.limit, query.offset);
    Ok(Json(habits::list_entries(&state.db, &actor, id, page).await?))
}

pub async fn tag_history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<HabitTag>>> {
    Ok(Json(habits::tag_history(&state.db, &actor, id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateHabitRequest =
            serde_json::from_str(r#"{"name": "Run", "frequency": "daily"}"#).unwrap();

        assert_eq!(req.target_count, 1);
        assert!(req.is_active);
        assert!(req.tag_ids.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_zero_target() {
        let req: CreateHabitRequest = serde_json::from_str(
            r#"{"name": "Run", "frequency": "daily", "target_count": 0}"#,
        )
        .unwrap();

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("target_count"));
    }

    #[test]
    fn test_unknown_frequency_is_rejected() {
        let parsed = serde_json::from_str::<CreateHabitRequest>(
            r#"{"name": "Run", "frequency": "weekly"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_update_request_tag_ids_presence() {
        let omitted: UpdateHabit = serde_json::from_str::<UpdateHabitRequest>(r#"{"name": "Walk"}"#)
            .unwrap()
            .into();
        assert!(omitted.tag_ids.is_absent());
        assert_eq!(omitted.changes.name.as_deref(), Some("Walk"));

        let cleared: UpdateHabit = serde_json::from_str::<UpdateHabitRequest>(r#"{"tag_ids": []}"#)
            .unwrap()
            .into();
        assert_eq!(cleared.tag_ids, Patch::Value(vec![]));

        let nulled: UpdateHabit = serde_json::from_str::<UpdateHabitRequest>(r#"{"tag_ids": null}"#)
            .unwrap()
            .into();
        assert_eq!(nulled.tag_ids, Patch::Null);
    }

    #[test]
    fn test_update_request_description_null_clears() {
        let req: UpdateHabitRequest = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(req.description, Patch::Null);
    }
}
