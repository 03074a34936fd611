/// Habit ↔ Tag association rows
///
/// A habit's tag set is exactly its live (`deleted_at IS NULL`) rows in this
/// table. Replacing a tag set retires every live row and inserts fresh ones,
/// so retired rows stay behind as an audit trail. The partial unique index
/// `habit_tags_live_pair_idx` forbids two live rows for the same pair.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE habit_tags (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     habit_id UUID NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
///     tag_id UUID NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
///     position INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
///
/// CREATE UNIQUE INDEX habit_tags_live_pair_idx
///     ON habit_tags (habit_id, tag_id) WHERE deleted_at IS NULL;
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Association row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HabitTag {
    pub id: Uuid,
    pub habit_id: Uuid,
    pub tag_id: Uuid,
    /// Index of the tag in the list it was supplied with
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl HabitTag {
    /// Inserts one live row per tag id, recording list order in `position`
    ///
    /// Callers pass an already de-duplicated list. An empty list is a no-op.
    pub async fn insert_all(
        conn: &mut PgConnection,
        habit_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        if tag_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO habit_tags (habit_id, tag_id, position)
            SELECT $1, tag_id, (ord - 1)::int
            FROM UNNEST($2::uuid[]) WITH ORDINALITY AS supplied(tag_id, ord)
            "#,
        )
        .bind(habit_id)
        .bind(tag_ids)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Retires every live association of a habit
    pub async fn retire_all(conn: &mut PgConnection, habit_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE habit_tags SET deleted_at = NOW() WHERE habit_id = $1 AND deleted_at IS NULL",
        )
        .bind(habit_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Lists every association of a habit, retired rows included
    ///
    /// Oldest first. Callers must have checked ownership of `habit_id`.
    pub async fn history(pool: &PgPool, habit_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, HabitTag>(
            r#"
            SELECT id, habit_id, tag_id, position, created_at, deleted_at
            FROM habit_tags
            WHERE habit_id = $1
            ORDER BY created_at, position
            "#,
        )
        .bind(habit_id)
        .fetch_all(pool)
        .await
    }
}
