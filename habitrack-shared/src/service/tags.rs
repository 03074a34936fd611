/// Tag operations
///
/// Reads see the actor's own tags plus system tags. Writes go through
/// [`policy::ensure_tag_writable`] on a row locked without the visibility
/// filter, so a system tag reports `Forbidden` rather than `NotFound`.

use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::{aggregate, aggregate_one, TagWithCreator};
use crate::error::{CoreError, CoreResult};
use crate::models::tag::{NewTag, Tag, TagChanges, TagCreator};
use crate::policy::{self, Actor, TagWrite};

const NAME_MAX_LEN: usize = 50;

/// Default color for tags created without one
pub const DEFAULT_COLOR: &str = "#6B7280";

/// Whether `color` is `#RRGGBB`
pub fn is_hex_color(color: &str) -> bool {
    let bytes = color.as_bytes();
    bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(u8::is_ascii_hexdigit)
}

fn ensure_color(color: &str) -> CoreResult<()> {
    if !is_hex_color(color) {
        return Err(CoreError::Validation(
            "color must be a hex color like #1A2B3C".to_string(),
        ));
    }
    Ok(())
}

async fn load_tag(pool: &PgPool, actor: &Actor, tag_id: Uuid) -> CoreResult<TagWithCreator> {
    let rows = Tag::creator_rows(pool, actor.user_id, Some(tag_id)).await?;

    aggregate_one::<Tag, TagCreator, _>(rows, tag_id)
        .map(TagWithCreator::from)
        .ok_or_else(|| CoreError::not_found("Tag"))
}

/// Creates a personal tag owned by the actor
///
/// # Errors
///
/// `Conflict` when the actor already has a live tag with the same name,
/// compared case-insensitively.
pub async fn create_tag(pool: &PgPool, actor: &Actor, input: NewTag) -> CoreResult<TagWithCreator> {
    super::ensure_name("name", &input.name, NAME_MAX_LEN)?;
    ensure_color(&input.color)?;

    let tag = Tag::insert(pool, actor.user_id, &input).await?;
    info!(tag_id = %tag.id, user_id = %actor.user_id, "Tag created");

    load_tag(pool, actor, tag.id).await
}

/// Lists system tags followed by the actor's own, each with its creator
pub async fn list_tags(pool: &PgPool, actor: &Actor) -> CoreResult<Vec<TagWithCreator>> {
    let rows = Tag::creator_rows(pool, actor.user_id, None).await?;
    let tags: Vec<TagWithCreator> = aggregate::<Tag, TagCreator, _>(rows)
        .into_iter()
        .map(TagWithCreator::from)
        .collect();

    debug!(user_id = %actor.user_id, count = tags.len(), "Listed tags");
    Ok(tags)
}

/// Fetches one visible tag with its creator
pub async fn get_tag(pool: &PgPool, actor: &Actor, tag_id: Uuid) -> CoreResult<TagWithCreator> {
    load_tag(pool, actor, tag_id).await
}

/// Renames and/or recolors one of the actor's tags
pub async fn update_tag(
    pool: &PgPool,
    actor: &Actor,
    tag_id: Uuid,
    changes: TagChanges,
) -> CoreResult<TagWithCreator> {
    if let Some(name) = &changes.name {
        super::ensure_name("name", name, NAME_MAX_LEN)?;
    }
    if let Some(color) = &changes.color {
        ensure_color(color)?;
    }

    let mut tx = pool.begin().await?;

    let tag = Tag::lock_by_id(&mut *tx, tag_id).await?;
    if let Err(err) = policy::ensure_tag_writable(tag.as_ref(), actor, TagWrite::Update) {
        warn!(tag_id = %tag_id, user_id = %actor.user_id, code = err.code(), "Tag update rejected");
        return Err(err);
    }

    Tag::update(&mut *tx, tag_id, &changes).await?;
    tx.commit().await?;

    info!(tag_id = %tag_id, user_id = %actor.user_id, "Tag updated");
    load_tag(pool, actor, tag_id).await
}

/// Soft-deletes one of the actor's tags
///
/// Habits that carried the tag stop showing it; their association rows are
/// left in place for the tag history.
pub async fn delete_tag(pool: &PgPool, actor: &Actor, tag_id: Uuid) -> CoreResult<()> {
    let mut tx = pool.begin().await?;

    let tag = Tag::lock_by_id(&mut *tx, tag_id).await?;
    if let Err(err) = policy::ensure_tag_writable(tag.as_ref(), actor, TagWrite::Delete) {
        warn!(tag_id = %tag_id, user_id = %actor.user_id, code = err.code(), "Tag delete rejected");
        return Err(err);
    }

    Tag::soft_delete(&mut *tx, tag_id).await?;
    tx.commit().await?;

    info!(tag_id = %tag_id, user_id = %actor.user_id, "Tag deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_hex_color() {
        assert!(is_hex_color("#10B981"));
        assert!(is_hex_color("#abcdef"));
        assert!(is_hex_color(DEFAULT_COLOR));

        assert!(!is_hex_color("10B981"));
        assert!(!is_hex_color("#10B98"));
        assert!(!is_hex_color("#10B9811"));
        assert!(!is_hex_color("#GGGGGG"));
        assert!(!is_hex_color(""));
    }

    #[test]
    fn test_ensure_color_code() {
        assert_eq!(ensure_color("red").unwrap_err().code(), "validation");
    }
}
