/// Habit model and database operations
///
/// Habits are owned exclusively by one user. Every query in this module is
/// scoped by owner, and all reads except the deletion-state probe also
/// exclude soft-deleted rows (see [`crate::policy`]).
///
/// # Schema
///
/// ```sql
/// CREATE TYPE habit_frequency AS ENUM ('daily', 'monthly', 'annually');
///
/// CREATE TABLE habits (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     name VARCHAR(100) NOT NULL,
///     description TEXT,
///     frequency habit_frequency NOT NULL,
///     target_count INTEGER NOT NULL DEFAULT 1 CHECK (target_count > 0),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::tag::TagSummary;
use crate::aggregate::{JoinRow, Keyed};
use crate::patch::Patch;
use crate::policy;

const HABIT_COLUMNS: &str = "id, user_id, name, description, frequency, target_count, \
                             is_active, created_at, updated_at, deleted_at";

/// How often a habit is meant to be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "habit_frequency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Monthly,
    Annually,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Monthly => "monthly",
            Frequency::Annually => "annually",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "monthly" => Ok(Frequency::Monthly),
            "annually" => Ok(Frequency::Annually),
            other => Err(format!("Invalid frequency: {}", other)),
        }
    }
}

/// Habit row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Habit {
    pub id: Uuid,

    /// Owner
    pub user_id: Uuid,

    pub name: String,

    pub description: Option<String>,

    pub frequency: Frequency,

    /// Completions expected per period; always positive
    pub target_count: i32,

    /// Inactive habits cannot be completed
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub deleted_at: Option<DateTime<Utc>>,
}

impl Keyed for Habit {
    fn key(&self) -> Uuid {
        self.id
    }
}

/// Scalar fields for a new habit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHabit {
    pub name: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub target_count: i32,
    pub is_active: bool,
}

/// Partial update of a habit's scalar fields
///
/// `description` distinguishes "leave alone" from "clear" through [`Patch`].
#[derive(Debug, Clone, Default)]
pub struct HabitChanges {
    pub name: Option<String>,
    pub description: Patch<String>,
    pub frequency: Option<Frequency>,
    pub target_count: Option<i32>,
    pub is_active: Option<bool>,
}

impl HabitChanges {
    /// Whether any scalar column would be written
    pub fn has_scalar_changes(&self) -> bool {
        self.name.is_some()
            || self.description.is_present()
            || self.frequency.is_some()
            || self.target_count.is_some()
            || self.is_active.is_some()
    }
}

/// Flat row of `habits LEFT JOIN habit_tags LEFT JOIN tags`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HabitTagRow {
    #[sqlx(flatten)]
    pub habit: Habit,
    pub tag_id: Option<Uuid>,
    pub tag_name: Option<String>,
    pub tag_color: Option<String>,
    pub tag_created_by_id: Option<Uuid>,
}

impl From<HabitTagRow> for JoinRow<Habit, TagSummary> {
    fn from(row: HabitTagRow) -> Self {
        // A live association whose tag was soft-deleted yields tag_id = NULL
        let child = match (row.tag_id, row.tag_name, row.tag_color) {
            (Some(id), Some(name), Some(color)) => Some(TagSummary {
                id,
                name,
                color,
                created_by_id: row.tag_created_by_id,
            }),
            _ => None,
        };

        JoinRow {
            parent: row.habit,
            child,
        }
    }
}

impl Habit {
    /// Inserts a habit owned by `user_id`
    pub async fn insert(
        conn: &mut PgConnection,
        user_id: Uuid,
        data: &NewHabit,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO habits (user_id, name, description, frequency, target_count, is_active)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            HABIT_COLUMNS
        );

        sqlx::query_as::<_, Habit>(&query)
            .bind(user_id)
            .bind(&data.name)
            .bind(&data.description)
            .bind(data.frequency)
            .bind(data.target_count)
            .bind(data.is_active)
            .fetch_one(conn)
            .await
    }

    /// Applies a partial update scoped to (id, owner, not deleted)
    ///
    /// `updated_at` is always bumped, so the statement also takes the row
    /// lock even when `changes` carries no scalar fields. Returns `None` when
    /// zero rows matched.
    pub async fn update_scoped(
        conn: &mut PgConnection,
        id: Uuid,
        owner: Uuid,
        changes: &HabitChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE habits SET updated_at = NOW()");
        let mut bind_count = 2;

        if changes.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if changes.description.is_present() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if changes.frequency.is_some() {
            bind_count += 1;
            query.push_str(&format!(", frequency = ${}", bind_count));
        }
        if changes.target_count.is_some() {
            bind_count += 1;
            query.push_str(&format!(", target_count = ${}", bind_count));
        }
        if changes.is_active.is_some() {
            bind_count += 1;
            query.push_str(&format!(", is_active = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND {} RETURNING {}",
            policy::habit_scope("habits", 2),
            HABIT_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, Habit>(&query).bind(id).bind(owner);

        if let Some(name) = &changes.name {
            q = q.bind(name);
        }
        if let Some(description) = changes.description.as_ref().into_option() {
            q = q.bind(description);
        }
        if let Some(frequency) = changes.frequency {
            q = q.bind(frequency);
        }
        if let Some(target_count) = changes.target_count {
            q = q.bind(target_count);
        }
        if let Some(is_active) = changes.is_active {
            q = q.bind(is_active);
        }

        q.fetch_optional(conn).await
    }

    /// Finds a live habit owned by `owner`
    pub async fn find_live(
        pool: &PgPool,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM habits WHERE id = $1 AND {}",
            HABIT_COLUMNS,
            policy::habit_scope("habits", 2)
        );

        sqlx::query_as::<_, Habit>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    /// Finds an owned habit whether or not it is deleted
    ///
    /// Only for audit reads (entries, tag history) that outlive the habit.
    pub async fn find_owned(
        pool: &PgPool,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM habits WHERE id = $1 AND user_id = $2",
            HABIT_COLUMNS
        );

        sqlx::query_as::<_, Habit>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    /// Locks a live owned habit against concurrent update/delete
    ///
    /// Used by completion: the habit is read but never written.
    pub async fn lock_live_for_share(
        conn: &mut PgConnection,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM habits WHERE id = $1 AND {} FOR SHARE",
            HABIT_COLUMNS,
            policy::habit_scope("habits", 2)
        );

        sqlx::query_as::<_, Habit>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(conn)
            .await
    }

    /// Reads `deleted_at` for an owned habit regardless of deletion state
    ///
    /// `None` means no such habit for this owner. Locks the row.
    pub async fn lock_deletion_state(
        conn: &mut PgConnection,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<Option<DateTime<Utc>>>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT deleted_at FROM habits WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(conn)
        .await
    }

    /// Soft-deletes a live owned habit
    pub async fn soft_delete(
        conn: &mut PgConnection,
        id: Uuid,
        owner: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE habits SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND {}",
            policy::habit_scope("habits", 2)
        );

        let result = sqlx::query(&query)
            .bind(id)
            .bind(owner)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetches the flat habit/tag join rows for `owner`
    ///
    /// Rows are ordered newest habit first, then by tag position, which is
    /// the order the aggregation engine preserves. `habit_id` narrows to one
    /// habit; `active` filters on `is_active`.
    pub async fn join_rows<'c, E>(
        executor: E,
        owner: Uuid,
        habit_id: Option<Uuid>,
        active: Option<bool>,
    ) -> Result<Vec<HabitTagRow>, sqlx::Error>
    where
        E: PgExecutor<'c>,
    {
        let query = format!(
            r#"
            SELECT h.id, h.user_id, h.name, h.description, h.frequency, h.target_count,
                   h.is_active, h.created_at, h.updated_at, h.deleted_at,
                   t.id AS tag_id, t.name AS tag_name, t.color AS tag_color,
                   t.created_by_id AS tag_created_by_id
            FROM habits h
            LEFT JOIN habit_tags ht ON ht.habit_id = h.id AND ht.deleted_at IS NULL
            LEFT JOIN tags t ON t.id = ht.tag_id AND t.deleted_at IS NULL
            WHERE {}
              AND ($2::uuid IS NULL OR h.id = $2)
              AND ($3::boolean IS NULL OR h.is_active = $3)
            ORDER BY h.created_at DESC, h.id, ht.position, ht.created_at
            "#,
            policy::habit_scope("h", 1)
        );

        sqlx::query_as::<_, HabitTagRow>(&query)
            .bind(owner)
            .bind(habit_id)
            .bind(active)
            .fetch_all(executor)
            .await
    }
}
