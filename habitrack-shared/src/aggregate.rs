/// Aggregation of flat join rows into nested views
///
/// A `LEFT JOIN` of a parent table with a child table yields one row per
/// (parent, child) pair, or one row with a `NULL` child for parents without
/// children. This module folds such rows back into one group per parent.
///
/// Guarantees:
///
/// - each parent id appears exactly once, in first-seen row order
/// - children are appended in row order, skipping repeats of the same child
///   id under the same parent
/// - construction is O(rows): an id → slot index sits beside the ordered
///   `Vec` of groups
///
/// [`aggregate_one`] distinguishes "no such parent" (`None`) from "parent
/// with zero children" (`Some` with an empty `children`).
///
/// # Example
///
/// ```
/// use habitrack_shared::aggregate::{aggregate, JoinRow, Keyed};
/// use uuid::Uuid;
///
/// #[derive(Debug, Clone)]
/// struct Item(Uuid);
/// impl Keyed for Item {
///     fn key(&self) -> Uuid { self.0 }
/// }
///
/// let (a, b, x) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
/// let rows = vec![
///     JoinRow { parent: Item(a), child: Some(Item(x)) },
///     JoinRow { parent: Item(b), child: None },
///     JoinRow { parent: Item(a), child: None },
/// ];
///
/// let groups = aggregate(rows);
/// assert_eq!(groups.len(), 2);
/// assert_eq!(groups[0].parent.0, a);
/// assert_eq!(groups[0].children.len(), 1);
/// assert!(groups[1].children.is_empty());
/// ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::habit::Habit;
use crate::models::tag::{Tag, TagCreator, TagSummary};

/// Anything identified by a primary key
pub trait Keyed {
    fn key(&self) -> Uuid;
}

/// One flat join row: a parent projection plus an optional child
#[derive(Debug, Clone)]
pub struct JoinRow<P, C> {
    pub parent: P,
    pub child: Option<C>,
}

/// A parent with every child collected from its rows
#[derive(Debug, Clone, PartialEq)]
pub struct Group<P, C> {
    pub parent: P,
    pub children: Vec<C>,
}

/// Incremental, insertion-ordered aggregation
#[derive(Debug)]
pub struct Aggregator<P, C> {
    slots: HashMap<Uuid, usize>,
    seen_children: HashSet<(Uuid, Uuid)>,
    groups: Vec<Group<P, C>>,
}

impl<P: Keyed, C: Keyed> Default for Aggregator<P, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Keyed, C: Keyed> Aggregator<P, C> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            seen_children: HashSet::new(),
            groups: Vec::new(),
        }
    }

    /// Folds one row into the aggregation
    pub fn push(&mut self, row: JoinRow<P, C>) {
        let parent_id = row.parent.key();

        let slot = match self.slots.get(&parent_id) {
            Some(&slot) => slot,
            None => {
                let slot = self.groups.len();
                self.slots.insert(parent_id, slot);
                self.groups.push(Group {
                    parent: row.parent,
                    children: Vec::new(),
                });
                slot
            }
        };

        if let Some(child) = row.child {
            if self.seen_children.insert((parent_id, child.key())) {
                self.groups[slot].children.push(child);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in first-seen order
    pub fn finish(self) -> Vec<Group<P, C>> {
        self.groups
    }

    /// Removes and returns the group for `id`, if any row carried it
    pub fn take(mut self, id: Uuid) -> Option<Group<P, C>> {
        let slot = self.slots.remove(&id)?;
        Some(self.groups.swap_remove(slot))
    }
}

/// Aggregates rows into one group per parent, in first-seen order
pub fn aggregate<P, C, I>(rows: I) -> Vec<Group<P, C>>
where
    P: Keyed,
    C: Keyed,
    I: IntoIterator,
    I::Item: Into<JoinRow<P, C>>,
{
    let mut aggregator = Aggregator::new();
    for row in rows {
        aggregator.push(row.into());
    }
    aggregator.finish()
}

/// Aggregates rows and returns only the group for `id`
///
/// `None` when no row carried that parent.
pub fn aggregate_one<P, C, I>(rows: I, id: Uuid) -> Option<Group<P, C>>
where
    P: Keyed,
    C: Keyed,
    I: IntoIterator,
    I::Item: Into<JoinRow<P, C>>,
{
    let mut aggregator = Aggregator::new();
    for row in rows {
        aggregator.push(row.into());
    }
    aggregator.take(id)
}

impl Keyed for TagSummary {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Keyed for TagCreator {
    fn key(&self) -> Uuid {
        self.id
    }
}

/// Nested habit view returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitWithTags {
    #[serde(flatten)]
    pub habit: Habit,
    pub tags: Vec<TagSummary>,
}

impl From<Group<Habit, TagSummary>> for HabitWithTags {
    fn from(group: Group<Habit, TagSummary>) -> Self {
        Self {
            habit: group.parent,
            tags: group.children,
        }
    }
}

/// Nested tag view returned to clients; `created_by` is `None` for system tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagWithCreator {
    #[serde(flatten)]
    pub tag: Tag,
    pub created_by: Option<TagCreator>,
}

impl From<Group<Tag, TagCreator>> for TagWithCreator {
    fn from(group: Group<Tag, TagCreator>) -> Self {
        Self {
            tag: group.parent,
            created_by: group.children.into_iter().next(),
        }
    }
}
