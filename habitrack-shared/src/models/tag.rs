/// Tag model and database operations
///
/// A tag with `created_by_id = NULL` is a system tag: visible to every user
/// and writable by none. Tags with a creator are personal and visible only
/// to that creator.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tags (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(50) NOT NULL,
///     color VARCHAR(7) NOT NULL DEFAULT '#6B7280',
///     created_by_id UUID REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::aggregate::{JoinRow, Keyed};
use crate::policy;

const TAG_COLUMNS: &str = "id, name, color, created_by_id, created_at, updated_at, deleted_at";

/// Tag row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: Uuid,

    pub name: String,

    /// Hex color, `#RRGGBB`
    pub color: String,

    /// `None` for system tags
    pub created_by_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tag {
    pub fn is_system(&self) -> bool {
        self.created_by_id.is_none()
    }
}

impl Keyed for Tag {
    fn key(&self) -> Uuid {
        self.id
    }
}

/// Tag projection nested under a habit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub created_by_id: Option<Uuid>,
}

/// Public projection of a tag's creator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCreator {
    pub id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Input for creating a personal tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
}

/// Partial update of a tag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagChanges {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// Flat row of `tags LEFT JOIN users`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TagCreatorRow {
    #[sqlx(flatten)]
    pub tag: Tag,
    pub creator_id: Option<Uuid>,
    pub creator_username: Option<String>,
    pub creator_first_name: Option<String>,
    pub creator_last_name: Option<String>,
}

impl From<TagCreatorRow> for JoinRow<Tag, TagCreator> {
    fn from(row: TagCreatorRow) -> Self {
        let child = match (row.creator_id, row.creator_username) {
            (Some(id), Some(username)) => Some(TagCreator {
                id,
                username,
                first_name: row.creator_first_name,
                last_name: row.creator_last_name,
            }),
            _ => None,
        };

        JoinRow {
            parent: row.tag,
            child,
        }
    }
}

impl Tag {
    /// Inserts a personal tag for `creator`
    pub async fn insert(pool: &PgPool, creator: Uuid, data: &NewTag) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO tags (name, color, created_by_id) VALUES ($1, $2, $3) RETURNING {}",
            TAG_COLUMNS
        );

        sqlx::query_as::<_, Tag>(&query)
            .bind(&data.name)
            .bind(&data.color)
            .bind(creator)
            .fetch_one(pool)
            .await
    }

    /// Loads a tag by id with a row lock, ignoring visibility and deletion
    ///
    /// Write paths run the policy checks on the returned row themselves so
    /// that "system tag" and "already deleted" can be told apart from
    /// "not found".
    pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM tags WHERE id = $1 FOR UPDATE", TAG_COLUMNS);

        sqlx::query_as::<_, Tag>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Updates a tag's name and/or color
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        changes: &TagChanges,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "UPDATE tags
             SET name = COALESCE($2, name), color = COALESCE($3, color), updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {}",
            TAG_COLUMNS
        );

        sqlx::query_as::<_, Tag>(&query)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.color)
            .fetch_one(conn)
            .await
    }

    /// Marks a tag as deleted
    pub async fn soft_delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tags SET deleted_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns which of `ids` are visible to `actor`
    ///
    /// Rows are locked `FOR SHARE` so a concurrent tag delete cannot slip in
    /// between the check and the association insert.
    pub async fn visible_ids(
        conn: &mut PgConnection,
        actor: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let query = format!(
            "SELECT id FROM tags WHERE id = ANY($2) AND {} FOR SHARE",
            policy::tag_visibility("tags", 1)
        );

        sqlx::query_scalar::<_, Uuid>(&query)
            .bind(actor)
            .bind(ids)
            .fetch_all(conn)
            .await
    }

    /// Fetches the flat tag/creator join rows visible to `actor`
    ///
    /// System tags sort first, then personal tags by name. A deleted
    /// creator is still joined, so `created_by` stays set for personal tags.
    pub async fn creator_rows<'c, E>(
        executor: E,
        actor: Uuid,
        tag_id: Option<Uuid>,
    ) -> Result<Vec<TagCreatorRow>, sqlx::Error>
    where
        E: PgExecutor<'c>,
    {
        let query = format!(
            r#"
            SELECT t.id, t.name, t.color, t.created_by_id, t.created_at, t.updated_at,
                   t.deleted_at,
                   u.id AS creator_id, u.username AS creator_username,
                   u.first_name AS creator_first_name, u.last_name AS creator_last_name
            FROM tags t
            LEFT JOIN users u ON u.id = t.created_by_id
            WHERE {}
              AND ($2::uuid IS NULL OR t.id = $2)
            ORDER BY (t.created_by_id IS NOT NULL), lower(t.name), t.id
            "#,
            policy::tag_visibility("t", 1)
        );

        sqlx::query_as::<_, TagCreatorRow>(&query)
            .bind(actor)
            .bind(tag_id)
            .fetch_all(executor)
            .await
    }
}
