/// Scoping and soft-delete policy
///
/// Every habit query is scoped to `(owner = actor, not deleted)` and every
/// tag query to `(created by actor or system, not deleted)`. The SQL
/// fragments here are the single source of those predicates; models splice
/// them into their statements.
///
/// The checks below classify rows that were loaded without the filters
/// (deletion-state probes, locked tag rows) into the right [`CoreError`].
///
/// # Example
///
/// ```
/// use habitrack_shared::policy::habit_scope;
///
/// assert_eq!(
///     habit_scope("h", 2),
///     "h.user_id = $2 AND h.deleted_at IS NULL"
/// );
/// ```

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, StateViolation};
use crate::models::habit::Habit;
use crate::models::tag::Tag;

/// The authenticated user on whose behalf a core operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
}

impl Actor {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Habit read filter bound to parameter `$param`
pub fn habit_scope(alias: &str, param: usize) -> String {
    format!(
        "{alias}.user_id = ${param} AND {alias}.deleted_at IS NULL",
        alias = alias,
        param = param
    )
}

/// Tag visibility filter bound to parameter `$param`
pub fn tag_visibility(alias: &str, param: usize) -> String {
    format!(
        "({alias}.created_by_id = ${param} OR {alias}.created_by_id IS NULL) \
         AND {alias}.deleted_at IS NULL",
        alias = alias,
        param = param
    )
}

/// Interprets the result of a deletion-state probe before a soft delete
///
/// `None` (no row in scope) is `NotFound`; a set `deleted_at` is
/// `AlreadyDeleted`.
pub fn ensure_deletable(
    state: Option<Option<DateTime<Utc>>>,
    resource: &str,
) -> CoreResult<()> {
    match state {
        None => Err(CoreError::not_found(resource)),
        Some(Some(_)) => Err(CoreError::already_deleted()),
        Some(None) => Ok(()),
    }
}

/// Which write is being attempted on a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagWrite {
    Update,
    Delete,
}

/// Checks that `actor` may modify `tag`
///
/// Order matters: system tags are `Forbidden` before anything else, other
/// users' tags are `NotFound`, and a deleted tag is `NotFound` for updates
/// but `AlreadyDeleted` for deletes.
pub fn ensure_tag_writable(tag: Option<&Tag>, actor: &Actor, write: TagWrite) -> CoreResult<()> {
    let tag = tag.ok_or_else(|| CoreError::not_found("Tag"))?;

    if tag.is_system() {
        return Err(CoreError::Forbidden(
            "System tags cannot be modified".to_string(),
        ));
    }

    if tag.created_by_id != Some(actor.user_id) {
        return Err(CoreError::not_found("Tag"));
    }

    if tag.deleted_at.is_some() {
        return Err(match write {
            TagWrite::Update => CoreError::not_found("Tag"),
            TagWrite::Delete => CoreError::already_deleted(),
        });
    }

    Ok(())
}

/// Checks that a habit, already loaded in scope, can accept a completion
pub fn ensure_completable(habit: &Habit) -> CoreResult<()> {
    if !habit.is_active {
        return Err(CoreError::InvalidState(StateViolation::HabitInactive));
    }
    Ok(())
}

/// Collapses repeated tag ids, keeping the first occurrence of each
pub fn dedupe_tag_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Fails with `NotFound` unless every requested id is in `visible`
pub fn ensure_all_visible(requested: &[Uuid], visible: &[Uuid]) -> CoreResult<()> {
    let visible: HashSet<&Uuid> = visible.iter().collect();

    match requested.iter().find(|id| !visible.contains(id)) {
        Some(missing) => Err(CoreError::NotFound(format!("Tag {} not found", missing))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::habit::Frequency;

    fn tag(created_by_id: Option<Uuid>, deleted: bool) -> Tag {
        Tag {
            id: Uuid::new_v4(),
            name: "reading".to_string(),
            color: "#3B82F6".to_string(),
            created_by_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: deleted.then(Utc::now),
        }
    }

    #[test]
    fn test_habit_scope_fragment() {
        assert_eq!(
            habit_scope("habits", 2),
            "habits.user_id = $2 AND habits.deleted_at IS NULL"
        );
    }

    #[test]
    fn test_tag_visibility_fragment() {
        assert_eq!(
            tag_visibility("t", 1),
            "(t.created_by_id = $1 OR t.created_by_id IS NULL) AND t.deleted_at IS NULL"
        );
    }

    #[test]
    fn test_ensure_deletable() {
        assert!(matches!(
            ensure_deletable(None, "Habit"),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            ensure_deletable(Some(Some(Utc::now())), "Habit"),
            Err(CoreError::InvalidState(StateViolation::AlreadyDeleted))
        ));
        assert!(ensure_deletable(Some(None), "Habit").is_ok());
    }

    #[test]
    fn test_system_tag_is_forbidden_for_everyone() {
        let actor = Actor::new(Uuid::new_v4());
        let system = tag(None, false);

        for write in [TagWrite::Update, TagWrite::Delete] {
            let err = ensure_tag_writable(Some(&system), &actor, write).unwrap_err();
            assert_eq!(err.code(), "forbidden");
        }
    }

    #[test]
    fn test_foreign_tag_is_not_found() {
        let actor = Actor::new(Uuid::new_v4());
        let foreign = tag(Some(Uuid::new_v4()), false);

        let err = ensure_tag_writable(Some(&foreign), &actor, TagWrite::Delete).unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn test_deleted_own_tag() {
        let actor = Actor::new(Uuid::new_v4());
        let deleted = tag(Some(actor.user_id), true);

        let err = ensure_tag_writable(Some(&deleted), &actor, TagWrite::Update).unwrap_err();
        assert_eq!(err.code(), "not_found");

        let err = ensure_tag_writable(Some(&deleted), &actor, TagWrite::Delete).unwrap_err();
        assert_eq!(err.code(), "already_deleted");
    }

    #[test]
    fn test_live_own_tag_is_writable() {
        let actor = Actor::new(Uuid::new_v4());
        let own = tag(Some(actor.user_id), false);
        assert!(ensure_tag_writable(Some(&own), &actor, TagWrite::Update).is_ok());
        assert!(ensure_tag_writable(None, &actor, TagWrite::Update).is_err());
    }

    #[test]
    fn test_ensure_completable() {
        let mut habit = Habit {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Stretch".to_string(),
            description: None,
            frequency: Frequency::Daily,
            target_count: 1,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        assert!(ensure_completable(&habit).is_ok());

        habit.is_active = false;
        let err = ensure_completable(&habit).unwrap_err();
        assert_eq!(err.code(), "inactive");
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(dedupe_tag_ids(&[a, a, b, c, b]), vec![a, b, c]);
        assert!(dedupe_tag_ids(&[]).is_empty());
    }

    #[test]
    fn test_ensure_all_visible() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(ensure_all_visible(&[a], &[a, b]).is_ok());
        assert!(ensure_all_visible(&[], &[]).is_ok());

        let err = ensure_all_visible(&[a, b], &[a]).unwrap_err();
        assert_eq!(err.to_string(), format!("Not found: Tag {} not found", b));
    }
}
