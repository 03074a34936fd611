/// Completion entries
///
/// An entry records one completion of a habit. Entries are append-only: the
/// application never updates or deletes them, and there is no uniqueness
/// constraint, so completing a habit twice on the same day yields two rows.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE entries (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     habit_id UUID NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
///     completion_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     note TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: Uuid,
    pub habit_id: Uuid,
    pub completion_date: DateTime<Utc>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEntry {
    /// Defaults to now when `None`
    pub completion_date: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl Entry {
    pub async fn insert(
        conn: &mut PgConnection,
        habit_id: Uuid,
        data: &NewEntry,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (habit_id, completion_date, note)
            VALUES ($1, COALESCE($2, NOW()), $3)
            RETURNING id, habit_id, completion_date, note, created_at
            "#,
        )
        .bind(habit_id)
        .bind(data.completion_date)
        .bind(&data.note)
        .fetch_one(conn)
        .await
    }

    /// Lists entries for a habit, newest completion first
    ///
    /// Callers must have checked ownership of `habit_id`.
    pub async fn list_by_habit(
        pool: &PgPool,
        habit_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, habit_id, completion_date, note, created_at
            FROM entries
            WHERE habit_id = $1
            ORDER BY completion_date DESC, created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(habit_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_habit(pool: &PgPool, habit_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries WHERE habit_id = $1")
            .bind(habit_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
