/// Habit operations
///
/// Creates and updates write the habit row and its tag set in one
/// transaction: either both land or neither does. Tag sets are replaced
/// wholesale, retiring every live association before inserting the new
/// list, and the stored order follows the order the ids were supplied in.
///
/// # Example
///
/// ```no_run
/// use habitrack_shared::models::habit::Frequency;
/// use habitrack_shared::patch::Patch;
/// use habitrack_shared::policy::Actor;
/// use habitrack_shared::service::habits::{create_habit, update_habit, CreateHabit, UpdateHabit};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid, tag: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let actor = Actor::new(user_id);
///
/// let habit = create_habit(&pool, &actor, CreateHabit {
///     name: "Morning run".to_string(),
///     description: None,
///     frequency: Frequency::Daily,
///     target_count: 1,
///     is_active: true,
///     tag_ids: vec![tag],
/// }).await?;
///
/// // Clears the tag set, leaves every scalar field alone
/// let habit = update_habit(&pool, &actor, habit.habit.id, UpdateHabit {
///     tag_ids: Patch::Value(vec![]),
///     ..Default::default()
/// }).await?;
/// assert!(habit.tags.is_empty());
/// # Ok(())
/// # }
/// ```

use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::{aggregate, aggregate_one, HabitWithTags};
use crate::error::{CoreError, CoreResult};
use crate::models::entry::{Entry, NewEntry};
use crate::models::habit::{Frequency, Habit, HabitChanges, NewHabit};
use crate::models::habit_tag::HabitTag;
use crate::models::tag::{Tag, TagSummary};
use crate::patch::Patch;
use crate::policy::{self, Actor};

const NAME_MAX_LEN: usize = 100;

/// Default page size for entry listings
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page size accepted for entry listings
pub const MAX_PAGE_SIZE: i64 = 100;

/// Input for [`create_habit`]
#[derive(Debug, Clone)]
pub struct CreateHabit {
    pub name: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub target_count: i32,
    pub is_active: bool,
    /// Duplicates collapse to their first occurrence
    pub tag_ids: Vec<Uuid>,
}

/// Input for [`update_habit`]
///
/// `tag_ids` is [`Patch::Absent`] to keep the current set; `Null` and an
/// empty list both clear it.
#[derive(Debug, Clone, Default)]
pub struct UpdateHabit {
    pub changes: HabitChanges,
    pub tag_ids: Patch<Vec<Uuid>>,
}

/// Filter for [`list_habits`]
#[derive(Debug, Clone, Copy, Default)]
pub struct HabitFilter {
    pub active: Option<bool>,
}

/// Offset pagination
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Page {
    /// Builds a page from optional query values, clamping to sane bounds
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

/// One page of completion entries
#[derive(Debug, Clone, serde::Serialize)]
pub struct EntryPage {
    pub entries: Vec<Entry>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn ensure_target_count(target_count: i32) -> CoreResult<()> {
    if target_count <= 0 {
        return Err(CoreError::Validation(
            "target_count must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

/// Checks every id is visible to the actor, then inserts them in order
async fn attach_tags(
    conn: &mut PgConnection,
    actor: &Actor,
    habit_id: Uuid,
    tag_ids: &[Uuid],
) -> CoreResult<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }

    let visible = Tag::visible_ids(&mut *conn, actor.user_id, tag_ids).await?;
    if let Err(err) = policy::ensure_all_visible(tag_ids, &visible) {
        warn!(habit_id = %habit_id, user_id = %actor.user_id, "Rejected invisible tag id");
        return Err(err);
    }

    HabitTag::insert_all(conn, habit_id, tag_ids).await?;
    Ok(())
}

/// Re-reads the nested view of one habit
async fn load_habit(pool: &PgPool, actor: &Actor, habit_id: Uuid) -> CoreResult<HabitWithTags> {
    let rows = Habit::join_rows(pool, actor.user_id, Some(habit_id), None).await?;

    aggregate_one::<Habit, TagSummary, _>(rows, habit_id)
        .map(HabitWithTags::from)
        .ok_or_else(|| CoreError::not_found("Habit"))
}

/// Creates a habit together with its tag set
///
/// # Errors
///
/// - `Validation` when `target_count` is not positive or the name is blank
/// - `NotFound` when any tag id is unknown, deleted, or another user's
pub async fn create_habit(
    pool: &PgPool,
    actor: &Actor,
    input: CreateHabit,
) -> CoreResult<HabitWithTags> {
    super::ensure_name("name", &input.name, NAME_MAX_LEN)?;
    ensure_target_count(input.target_count)?;

    let tag_ids = policy::dedupe_tag_ids(&input.tag_ids);
    let new_habit = NewHabit {
        name: input.name,
        description: input.description,
        frequency: input.frequency,
        target_count: input.target_count,
        is_active: input.is_active,
    };

    let mut tx = pool.begin().await?;
    let habit = Habit::insert(&mut *tx, actor.user_id, &new_habit).await?;
    attach_tags(&mut *tx, actor, habit.id, &tag_ids).await?;
    tx.commit().await?;

    info!(
        habit_id = %habit.id,
        user_id = %actor.user_id,
        tag_count = tag_ids.len(),
        "Habit created"
    );

    load_habit(pool, actor, habit.id).await
}

/// Lists the actor's live habits, newest first
pub async fn list_habits(
    pool: &PgPool,
    actor: &Actor,
    filter: HabitFilter,
) -> CoreResult<Vec<HabitWithTags>> {
    let rows = Habit::join_rows(pool, actor.user_id, None, filter.active).await?;
    let habits: Vec<HabitWithTags> = aggregate::<Habit, TagSummary, _>(rows)
        .into_iter()
        .map(HabitWithTags::from)
        .collect();

    debug!(user_id = %actor.user_id, count = habits.len(), "Listed habits");
    Ok(habits)
}

/// Fetches one live habit owned by the actor
pub async fn get_habit(pool: &PgPool, actor: &Actor, habit_id: Uuid) -> CoreResult<HabitWithTags> {
    load_habit(pool, actor, habit_id).await
}

/// Applies a partial update and, when supplied, replaces the tag set
///
/// The scalar update always runs first and takes the row lock; when it
/// matches nothing the call fails with `NotFound` and no association is
/// touched.
pub async fn update_habit(
    pool: &PgPool,
    actor: &Actor,
    habit_id: Uuid,
    input: UpdateHabit,
) -> CoreResult<HabitWithTags> {
    if let Some(name) = &input.changes.name {
        super::ensure_name("name", name, NAME_MAX_LEN)?;
    }
    if let Some(target_count) = input.changes.target_count {
        ensure_target_count(target_count)?;
    }

    let replacement = input
        .tag_ids
        .into_present_or_default()
        .map(|ids| policy::dedupe_tag_ids(&ids));

    let mut tx = pool.begin().await?;

    let updated = Habit::update_scoped(&mut *tx, habit_id, actor.user_id, &input.changes).await?;
    if updated.is_none() {
        warn!(habit_id = %habit_id, user_id = %actor.user_id, "Update matched no habit");
        return Err(CoreError::not_found("Habit"));
    }

    if let Some(tag_ids) = &replacement {
        let retired = HabitTag::retire_all(&mut *tx, habit_id).await?;
        attach_tags(&mut *tx, actor, habit_id, tag_ids).await?;
        debug!(habit_id = %habit_id, retired, attached = tag_ids.len(), "Replaced tag set");
    }

    tx.commit().await?;

    info!(
        habit_id = %habit_id,
        user_id = %actor.user_id,
        tags_replaced = replacement.is_some(),
        "Habit updated"
    );

    load_habit(pool, actor, habit_id).await
}

/// Soft-deletes a habit; entries and associations are kept
///
/// # Errors
///
/// - `NotFound` when the actor owns no such habit
/// - `InvalidState(AlreadyDeleted)` when it is already deleted
pub async fn delete_habit(pool: &PgPool, actor: &Actor, habit_id: Uuid) -> CoreResult<()> {
    let mut tx = pool.begin().await?;

    let state = Habit::lock_deletion_state(&mut *tx, habit_id, actor.user_id).await?;
    if let Err(err) = policy::ensure_deletable(state, "Habit") {
        warn!(habit_id = %habit_id, user_id = %actor.user_id, code = err.code(), "Habit delete rejected");
        return Err(err);
    }

    Habit::soft_delete(&mut *tx, habit_id, actor.user_id).await?;
    tx.commit().await?;

    info!(habit_id = %habit_id, user_id = %actor.user_id, "Habit deleted");
    Ok(())
}

/// Records one completion of a live, active habit
///
/// The habit row is held `FOR SHARE` until the entry is written, so a
/// concurrent deactivate or delete cannot interleave.
pub async fn complete_habit(
    pool: &PgPool,
    actor: &Actor,
    habit_id: Uuid,
    entry: NewEntry,
) -> CoreResult<Entry> {
    let mut tx = pool.begin().await?;

    let habit = Habit::lock_live_for_share(&mut *tx, habit_id, actor.user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Habit"))?;

    if let Err(err) = policy::ensure_completable(&habit) {
        warn!(habit_id = %habit_id, user_id = %actor.user_id, "Completion of inactive habit rejected");
        return Err(err);
    }

    let entry = Entry::insert(&mut *tx, habit.id, &entry).await?;
    tx.commit().await?;

    info!(habit_id = %habit_id, entry_id = %entry.id, "Habit completed");
    Ok(entry)
}

/// Lists completion entries of an owned habit, including a deleted one
pub async fn list_entries(
    pool: &PgPool,
    actor: &Actor,
    habit_id: Uuid,
    page: Page,
) -> CoreResult<EntryPage> {
    Habit::find_owned(pool, habit_id, actor.user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Habit"))?;

    let entries = Entry::list_by_habit(pool, habit_id, page.limit, page.offset).await?;
    let total = Entry::count_by_habit(pool, habit_id).await?;

    Ok(EntryPage {
        entries,
        total,
        limit: page.limit,
        offset: page.offset,
    })
}

/// Every association the habit ever had, retired rows included
pub async fn tag_history(pool: &PgPool, actor: &Actor, habit_id: Uuid) -> CoreResult<Vec<HabitTag>> {
    Habit::find_owned(pool, habit_id, actor.user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Habit"))?;

    Ok(HabitTag::history(pool, habit_id).await?)
}
