// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tree mutation.
//!
//! The only place allowed to change tree shape, store placement, or member
//! placement. Every operation reads the full forest of both tiers, computes
//! the new forest, and persists it in a single save, so a subtree is never
//! observed half-moved.
//!
//! # Invariants
//!
//! - Reparenting under self or under a descendant is rejected.
//! - A group's store key always equals its parent's, and a subtree changes
//!   store key as a whole.
//! - Member paths stay unique within a group.

use crate::{
    group::{
        aggregate_members, descendant_ids, is_ancestor, is_valid_color, Group, GroupId,
        GroupPatch, MemberRef, StoreKey,
    },
    probe::FileProbe,
    workspace::Workspace,
};

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Result of a tree or member mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Mutation applied and persisted.
    Applied,

    /// Mutation would not change anything, nothing persisted.
    Unchanged,

    /// Target group or member does not exist.
    NotFound,

    /// Mutation refused to protect tree invariants.
    Rejected(Rejection),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Reason a mutation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// Group dropped onto itself.
    #[error("cannot move a group into itself")]
    SelfDrop,

    /// Group dropped onto one of its own descendants.
    #[error("cannot move a group into one of its own subgroups")]
    Cycle,

    /// Color is neither a palette token nor a hex literal.
    #[error("invalid group color")]
    InvalidColor,
}

/// New parent for a reparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    /// Root of the group's current store.
    Root,

    /// Child of target group, adopting its store.
    Group(GroupId),
}

/// Where a dragged group was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Onto another group.
    Group(GroupId),

    /// Onto empty space at the top level.
    LocalRoot,

    /// Onto the global section node.
    GlobalSection,
}

/// Everything removed by a cascade delete.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Identifiers of the deleted group and all of its descendants.
    pub removed: HashSet<GroupId>,

    /// Members of the deleted subtree, collected before deletion so callers
    /// can clear decorations.
    pub members: Vec<MemberRef>,
}

impl<P> Workspace<P>
where
    P: FileProbe,
{
    /// Create a new group.
    ///
    /// A child group inherits its parent's color and store, ignoring the
    /// requested store. Returns `None` if the parent does not exist.
    #[instrument(skip(self), level = "debug")]
    pub fn create_group(
        &mut self,
        name: &str,
        parent: Option<&GroupId>,
        store_key: StoreKey,
    ) -> Option<GroupId> {
        let mut groups = self.store.forest();
        let mut group = Group::new(name, store_key);
        group.icon = self.defaults.icon.clone();
        group.color = self.defaults.color.clone();

        if let Some(parent_id) = parent {
            let Some(parent) = groups.iter().find(|candidate| candidate.id == *parent_id) else {
                warn!("cannot create {name:?}, parent group {parent_id} does not exist");
                return None;
            };
            group.color = parent.color.clone();
            group.store_key = parent.store_key;
            group.parent_id = Some(parent_id.clone());
        }

        group.order = sibling_count(&groups, group.parent_id.as_ref(), group.store_key, None);
        let id = group.id.clone();
        info!("create {} group {:?}", group.store_key, group.name);
        groups.push(group);
        self.store.save(groups);

        Some(id)
    }

    /// Update fields of one group.
    ///
    /// Parent changes are validated like [`Workspace::reparent`], and store
    /// changes carry the whole subtree along.
    pub fn update_group(&mut self, id: &GroupId, patch: &GroupPatch) -> Outcome {
        self.patch_groups(id, patch, false)
    }

    /// Update fields of one group and every descendant.
    ///
    /// Only the target group is reparented when the patch names a parent.
    pub fn update_group_recursive(&mut self, id: &GroupId, patch: &GroupPatch) -> Outcome {
        self.patch_groups(id, patch, true)
    }

    /// Delete group together with its entire subtree in one save.
    #[instrument(skip(self), level = "debug")]
    pub fn delete_group(&mut self, id: &GroupId) -> DeleteOutcome {
        let groups = self.store.forest();
        let Some((parent_id, store_key)) = groups
            .iter()
            .find(|group| group.id == *id)
            .map(|group| (group.parent_id.clone(), group.store_key))
        else {
            debug!("group {id} already gone");
            return DeleteOutcome::default();
        };

        // INVARIANT: Collect members before the subtree disappears.
        let members = aggregate_members(id, &groups);
        let mut removed = descendant_ids(id, &groups);
        removed.insert(id.clone());

        let mut remaining: Vec<Group> = groups
            .into_iter()
            .filter(|group| !removed.contains(&group.id))
            .collect();
        repack_siblings(&mut remaining, parent_id.as_ref(), store_key);
        info!("delete {} groups", removed.len());
        self.store.save(remaining);

        DeleteOutcome { removed, members }
    }

    /// Add member references to a group.
    ///
    /// References whose path is already present are skipped. Returns number
    /// of references actually added.
    pub fn add_members(&mut self, id: &GroupId, refs: impl IntoIterator<Item = MemberRef>) -> usize {
        let mut groups = self.store.forest();
        let Some(group) = groups.iter_mut().find(|group| group.id == *id) else {
            warn!("cannot add members, group {id} does not exist");
            return 0;
        };

        let mut added = 0;
        for member in refs {
            if !group.contains(&member.path) {
                group.members.push(member);
                added += 1;
            }
        }

        if added > 0 {
            info!("add {added} members to {:?}", group.name);
            self.store.save(groups);
        }

        added
    }

    /// Add paths to a group, probing each for its type.
    pub fn add_paths(&mut self, id: &GroupId, paths: impl IntoIterator<Item = PathBuf>) -> usize {
        let refs: Vec<MemberRef> = paths
            .into_iter()
            .map(|path| {
                let is_directory = self.probe.is_dir(&path);
                MemberRef::new(path, is_directory)
            })
            .collect();
        self.add_members(id, refs)
    }

    /// Remove member from a group. Returns whether anything was removed.
    pub fn remove_member(&mut self, id: &GroupId, path: impl AsRef<Path>) -> bool {
        let mut groups = self.store.forest();
        let Some(group) = groups.iter_mut().find(|group| group.id == *id) else {
            return false;
        };

        let Some(index) = group.position_of(path.as_ref()) else {
            return false;
        };
        group.members.remove(index);
        self.store.save(groups);

        true
    }

    /// Move member within its group to just before another member.
    ///
    /// Without `before`, or when `before` is not a member, the dragged member
    /// goes to the end. Dropping a member onto itself changes nothing.
    pub fn reorder_member(
        &mut self,
        id: &GroupId,
        dragged: impl AsRef<Path>,
        before: Option<&Path>,
    ) -> Outcome {
        let mut groups = self.store.forest();
        let Some(group) = groups.iter_mut().find(|group| group.id == *id) else {
            return Outcome::NotFound;
        };

        let Some(from) = group.position_of(dragged.as_ref()) else {
            return Outcome::NotFound;
        };
        if before == Some(dragged.as_ref()) {
            return Outcome::Unchanged;
        }

        let original = group.members.clone();
        let member = group.members.remove(from);
        insert_before(&mut group.members, member, before);
        if group.members == original {
            return Outcome::Unchanged;
        }

        self.store.save(groups);
        Outcome::Applied
    }

    /// Move member from one group to another, possibly across stores.
    ///
    /// If the target already holds the path, the member only leaves the
    /// source group.
    pub fn move_member(
        &mut self,
        from: &GroupId,
        to: &GroupId,
        path: impl AsRef<Path>,
        before: Option<&Path>,
    ) -> Outcome {
        if from == to {
            return self.reorder_member(from, path, before);
        }

        let mut groups = self.store.forest();
        let Some(target) = groups.iter().position(|group| group.id == *to) else {
            return Outcome::NotFound;
        };
        let Some(source) = groups.iter_mut().find(|group| group.id == *from) else {
            return Outcome::NotFound;
        };
        let Some(index) = source.position_of(path.as_ref()) else {
            return Outcome::NotFound;
        };

        let member = source.members.remove(index);
        let target = &mut groups[target];
        if !target.contains(&member.path) {
            insert_before(&mut target.members, member, before);
        }

        self.store.save(groups);
        Outcome::Applied
    }

    /// Assign dense sibling order to groups in given sequence.
    ///
    /// Siblings of the first listed group that are not mentioned keep their
    /// relative order and follow after. Listed ids that are not siblings of
    /// the first are ignored.
    pub fn reorder_siblings(&mut self, ordered: &[GroupId]) -> Outcome {
        let mut groups = self.store.forest();
        let Some(first) = ordered
            .first()
            .and_then(|id| groups.iter().find(|group| group.id == *id))
        else {
            return Outcome::NotFound;
        };
        let parent = first.parent_id.clone();
        let store_key = first.store_key;

        let mut siblings: Vec<(usize, GroupId)> = groups
            .iter()
            .filter(|group| group.parent_id == parent && group.store_key == store_key)
            .map(|group| (group.order, group.id.clone()))
            .collect();
        siblings.sort();

        let mut sequence: Vec<GroupId> = Vec::with_capacity(siblings.len());
        for id in ordered {
            if siblings.iter().any(|(_, sibling)| sibling == id) && !sequence.contains(id) {
                sequence.push(id.clone());
            }
        }
        for (_, id) in siblings {
            if !sequence.contains(&id) {
                sequence.push(id);
            }
        }

        let mut changed = false;
        for (order, id) in sequence.iter().enumerate() {
            if let Some(group) = groups.iter_mut().find(|group| group.id == *id) {
                changed |= group.order != order;
                group.order = order;
            }
        }

        if !changed {
            return Outcome::Unchanged;
        }

        self.store.save(groups);
        Outcome::Applied
    }

    /// Move group under a new parent.
    ///
    /// Rejects moving a group into itself or into its own subtree. When the
    /// new parent lives in the other store, the whole subtree migrates with
    /// it in the same save.
    #[instrument(skip(self), level = "debug")]
    pub fn reparent(&mut self, id: &GroupId, parent: Parent) -> Outcome {
        let mut groups = self.store.forest();
        let Some(group) = groups.iter().find(|group| group.id == *id) else {
            return Outcome::NotFound;
        };

        let (parent_id, store_key) = match parent {
            Parent::Root => (None, group.store_key),
            Parent::Group(parent_id) => match check_parent(id, &parent_id, &groups) {
                Ok(store_key) => (Some(parent_id), store_key),
                Err(outcome) => return outcome,
            },
        };

        self.relocate(&mut groups, id, parent_id, store_key)
    }

    /// Move group and its entire subtree to another store.
    ///
    /// A group whose parent stays behind in the old store becomes a root of
    /// the new store, so a subtree is never split across stores.
    #[instrument(skip(self), level = "debug")]
    pub fn move_subtree_to_store(&mut self, id: &GroupId, store_key: StoreKey) -> Outcome {
        let mut groups = self.store.forest();
        let Some(group) = groups.iter().find(|group| group.id == *id) else {
            return Outcome::NotFound;
        };

        let parent_id = group.parent_id.clone().filter(|parent| {
            groups
                .iter()
                .any(|candidate| candidate.id == *parent && candidate.store_key == store_key)
        });

        self.relocate(&mut groups, id, parent_id, store_key)
    }

    /// Apply a drag-and-drop of one group onto a drop target.
    pub fn drop_group(&mut self, id: &GroupId, target: DropTarget) -> Outcome {
        match target {
            DropTarget::Group(parent) => self.reparent(id, Parent::Group(parent)),
            DropTarget::LocalRoot => {
                let mut groups = self.store.forest();
                if !groups.iter().any(|group| group.id == *id) {
                    return Outcome::NotFound;
                }
                self.relocate(&mut groups, id, None, StoreKey::Local)
            }
            DropTarget::GlobalSection => {
                let mut groups = self.store.forest();
                if !groups.iter().any(|group| group.id == *id) {
                    return Outcome::NotFound;
                }
                self.relocate(&mut groups, id, None, StoreKey::Global)
            }
        }
    }

    fn patch_groups(&mut self, id: &GroupId, patch: &GroupPatch, recursive: bool) -> Outcome {
        let mut groups = self.store.forest();
        let Some(group) = groups.iter().find(|group| group.id == *id) else {
            return Outcome::NotFound;
        };

        if let Some(color) = patch.color.as_deref().filter(|color| !is_valid_color(color)) {
            warn!("{}: {color:?}", Rejection::InvalidColor);
            return Outcome::Rejected(Rejection::InvalidColor);
        }

        // INVARIANT: Validate structure first, so a rejected patch changes nothing.
        let placement = match (&patch.parent_id, patch.store_key) {
            (Some(Some(parent_id)), _) => match check_parent(id, parent_id, &groups) {
                Ok(store_key) => Some((Some(parent_id.clone()), store_key)),
                Err(outcome) => return outcome,
            },
            (Some(None), store_key) => Some((None, store_key.unwrap_or(group.store_key))),
            (None, Some(store_key)) => {
                let parent_id = group.parent_id.clone().filter(|parent| {
                    groups
                        .iter()
                        .any(|candidate| candidate.id == *parent && candidate.store_key == store_key)
                });
                Some((parent_id, store_key))
            }
            (None, None) => None,
        };

        let mut targets = HashSet::from([id.clone()]);
        if recursive {
            targets.extend(descendant_ids(id, &groups));
        }

        let attributes = patch.attributes_only();
        let mut changed = false;
        for group in groups.iter_mut().filter(|group| targets.contains(&group.id)) {
            let patched = attributes.apply(group);
            changed |= patched != *group;
            *group = patched;
        }

        if let Some((parent_id, store_key)) = placement {
            if self.relocate(&mut groups, id, parent_id, store_key).is_applied() {
                return Outcome::Applied;
            }
        }

        if !changed {
            return Outcome::Unchanged;
        }

        self.store.save(groups);
        Outcome::Applied
    }

    /// Place group under parent in store, carrying its subtree, and persist.
    fn relocate(
        &mut self,
        groups: &mut [Group],
        id: &GroupId,
        parent_id: Option<GroupId>,
        store_key: StoreKey,
    ) -> Outcome {
        let Some(group) = groups.iter().find(|group| group.id == *id) else {
            return Outcome::NotFound;
        };
        if group.parent_id == parent_id && group.store_key == store_key {
            return Outcome::Unchanged;
        }
        let (old_parent, old_store) = (group.parent_id.clone(), group.store_key);

        let mut subtree = descendant_ids(id, groups);
        subtree.insert(id.clone());
        let order = sibling_count(groups, parent_id.as_ref(), store_key, Some(id));

        for group in groups.iter_mut() {
            if subtree.contains(&group.id) {
                group.store_key = store_key;
            }

            if group.id == *id {
                group.parent_id = parent_id.clone();
                group.order = order;
            }
        }

        repack_siblings(groups, old_parent.as_ref(), old_store);

        info!("move {} groups into {store_key} store", subtree.len());
        self.store.save(groups.to_vec());
        Outcome::Applied
    }
}

/// Validate prospective parent, returning the store the child must adopt.
fn check_parent(id: &GroupId, parent_id: &GroupId, groups: &[Group]) -> Result<StoreKey, Outcome> {
    if parent_id == id {
        warn!("{}", Rejection::SelfDrop);
        return Err(Outcome::Rejected(Rejection::SelfDrop));
    }

    let Some(parent) = groups.iter().find(|group| group.id == *parent_id) else {
        return Err(Outcome::NotFound);
    };

    if is_ancestor(id, parent_id, groups) {
        warn!("{}", Rejection::Cycle);
        return Err(Outcome::Rejected(Rejection::Cycle));
    }

    Ok(parent.store_key)
}

fn sibling_count(
    groups: &[Group],
    parent_id: Option<&GroupId>,
    store_key: StoreKey,
    except: Option<&GroupId>,
) -> usize {
    groups
        .iter()
        .filter(|group| group.parent_id.as_ref() == parent_id && group.store_key == store_key)
        .filter(|group| Some(&group.id) != except)
        .count()
}

/// Close gaps in sibling order left behind by a group moving away.
fn repack_siblings(groups: &mut [Group], parent_id: Option<&GroupId>, store_key: StoreKey) {
    let mut siblings: Vec<usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, group)| group.parent_id.as_ref() == parent_id && group.store_key == store_key)
        .map(|(index, _)| index)
        .collect();
    siblings.sort_by_key(|index| groups[*index].order);

    for (order, index) in siblings.into_iter().enumerate() {
        groups[index].order = order;
    }
}

fn insert_before(members: &mut Vec<MemberRef>, member: MemberRef, before: Option<&Path>) {
    let index = before
        .and_then(|before| members.iter().position(|existing| existing.path == before))
        .unwrap_or(members.len());
    members.insert(index, member);
}
