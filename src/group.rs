// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Group model.
//!
//! A __group__ is a named, nestable collection of file and folder references.
//! Groups form a forest: each group optionally names a parent group, and a
//! group without a parent is a root. Every group belongs to exactly one of two
//! store tiers, see [`StoreKey`].
//!
//! # Invariants
//!
//! - Parent links never form a cycle.
//! - A group and all of its descendants share the same [`StoreKey`].
//! - No two members of one group share a path.
//! - Group identifiers are unique across both store tiers.
//!
//! All traversal over the forest goes through [`descendant_ids`],
//! [`is_ancestor`], and [`aggregate_members`]. Each of them tolerates a
//! malformed forest (cycles, dangling parents) and always terminates.

use crate::path::display_name;

use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet, VecDeque},
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::warn;
use uuid::Uuid;

/// Icon given to new root groups when nothing else is configured.
pub const DEFAULT_ICON: &str = "folder";

/// Color given to new root groups when nothing else is configured.
pub const DEFAULT_COLOR: &str = "blue";

/// Named palette tokens accepted as group colors.
pub const PALETTE: &[&str] = &[
    "red", "orange", "yellow", "green", "blue", "purple", "pink", "gray",
];

/// Stable group identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Construct group identifier from existing value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh identifier that has never been handed out before.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for GroupId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for GroupId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Store tier a group lives in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKey {
    /// Tied to one project root.
    #[default]
    Local,

    /// Available from every project.
    Global,
}

impl Display for StoreKey {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Local => fmt.write_str("local"),
            Self::Global => fmt.write_str("global"),
        }
    }
}

/// Member ordering policy of a group.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Keep stored order, i.e., manual drag ordering.
    #[default]
    Manual,
    NameAsc,
    NameDesc,
    DateAsc,
    DateDesc,

    /// Lowercase extension first, then name.
    Type,
}

impl SortOrder {
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual)
    }
}

impl Display for SortOrder {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Manual => "manual",
            Self::NameAsc => "name-asc",
            Self::NameDesc => "name-desc",
            Self::DateAsc => "date-asc",
            Self::DateDesc => "date-desc",
            Self::Type => "type",
        };
        fmt.write_str(label)
    }
}

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label {
            "manual" => Ok(Self::Manual),
            "name-asc" => Ok(Self::NameAsc),
            "name-desc" => Ok(Self::NameDesc),
            "date-asc" => Ok(Self::DateAsc),
            "date-desc" => Ok(Self::DateDesc),
            "type" => Ok(Self::Type),
            other => Err(UnknownSortOrder(other.into())),
        }
    }
}

/// Sort order label does not name a known policy.
#[derive(Clone, Debug, thiserror::Error)]
#[error("unknown sort order {0:?}, expected one of manual, name-asc, name-desc, date-asc, date-desc, type")]
pub struct UnknownSortOrder(String);

/// One file or folder entry inside a group.
///
/// Paths are always absolute in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub path: PathBuf,
    pub name: String,
    pub is_directory: Option<bool>,
}

impl MemberRef {
    /// Construct member reference, deriving its display name from the path.
    pub fn new(path: impl Into<PathBuf>, is_directory: Option<bool>) -> Self {
        let path = path.into();
        let name = display_name(&path);
        Self {
            path,
            name,
            is_directory,
        }
    }

    /// Same member relocated to another path.
    ///
    /// Keeps the directory flag, since a rename does not change file type.
    pub fn relocated(&self, path: impl Into<PathBuf>) -> Self {
        Self::new(path, self.is_directory)
    }
}

/// A node in the group forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub members: Vec<MemberRef>,
    pub order: usize,
    pub parent_id: Option<GroupId>,
    pub store_key: StoreKey,
    pub collapsed: bool,
    pub pinned: bool,
    pub short_description: Option<String>,
    pub details: Option<String>,
    pub created_by: Option<String>,
    pub badge_text: Option<String>,
    pub sort_order: SortOrder,
}

impl Group {
    /// Construct new root group with a fresh identifier and default metadata.
    pub fn new(name: impl Into<String>, store_key: StoreKey) -> Self {
        Self {
            id: GroupId::generate(),
            name: name.into(),
            icon: DEFAULT_ICON.into(),
            color: DEFAULT_COLOR.into(),
            members: Vec::new(),
            order: 0,
            parent_id: None,
            store_key,
            collapsed: false,
            pinned: false,
            short_description: None,
            details: None,
            created_by: None,
            badge_text: None,
            sort_order: SortOrder::Manual,
        }
    }

    /// Check if group directly contains a member at target path.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.members
            .iter()
            .any(|member| member.path == path.as_ref())
    }

    /// Find position of member at target path.
    pub fn position_of(&self, path: impl AsRef<Path>) -> Option<usize> {
        self.members
            .iter()
            .position(|member| member.path == path.as_ref())
    }
}

/// Sibling display ordering: pinned groups first, then by `order`.
pub fn sibling_cmp(a: &Group, b: &Group) -> Ordering {
    b.pinned
        .cmp(&a.pinned)
        .then_with(|| a.order.cmp(&b.order))
}

/// Partial update of a group's mutable fields.
///
/// Fields left as `None` keep their current value. Clearable fields use a
/// nested `Option`, where `Some(None)` clears the value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub short_description: Option<Option<String>>,
    pub details: Option<Option<String>>,
    pub created_by: Option<Option<String>>,
    pub collapsed: Option<bool>,
    pub pinned: Option<bool>,
    pub badge_text: Option<Option<String>>,
    pub sort_order: Option<SortOrder>,
    pub parent_id: Option<Option<GroupId>>,
    pub store_key: Option<StoreKey>,
}

impl GroupPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copy of patch without parent or store changes.
    pub fn attributes_only(&self) -> Self {
        Self {
            parent_id: None,
            store_key: None,
            ..self.clone()
        }
    }

    /// Produce copy of group with patched fields overridden.
    ///
    /// Badge text is normalized through [`normalize_badge`].
    pub fn apply(&self, group: &Group) -> Group {
        let mut patched = group.clone();
        if let Some(name) = &self.name {
            patched.name = name.clone();
        }
        if let Some(icon) = &self.icon {
            patched.icon = icon.clone();
        }
        if let Some(color) = &self.color {
            patched.color = color.clone();
        }
        if let Some(short_description) = &self.short_description {
            patched.short_description = short_description.clone();
        }
        if let Some(details) = &self.details {
            patched.details = details.clone();
        }
        if let Some(created_by) = &self.created_by {
            patched.created_by = created_by.clone();
        }
        if let Some(collapsed) = self.collapsed {
            patched.collapsed = collapsed;
        }
        if let Some(pinned) = self.pinned {
            patched.pinned = pinned;
        }
        if let Some(badge_text) = &self.badge_text {
            patched.badge_text = badge_text.as_deref().and_then(normalize_badge);
        }
        if let Some(sort_order) = self.sort_order {
            patched.sort_order = sort_order;
        }
        if let Some(parent_id) = &self.parent_id {
            patched.parent_id = parent_id.clone();
        }
        if let Some(store_key) = self.store_key {
            patched.store_key = store_key;
        }

        patched
    }
}

/// Trim badge text down to at most two characters.
///
/// Returns `None` when nothing printable is left.
pub fn normalize_badge(text: &str) -> Option<String> {
    let badge: String = text.trim().chars().take(2).collect();
    (!badge.is_empty()).then_some(badge)
}

/// Check if color is a palette token or a six digit hex literal.
///
/// Palette tokens may also be written in their `charts.` namespaced form.
pub fn is_valid_color(color: &str) -> bool {
    let token = color.strip_prefix("charts.").unwrap_or(color);
    if PALETTE.contains(&token) {
        return true;
    }

    let hex = color.strip_prefix('#').unwrap_or(color);
    hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Collect identifiers of every transitive child of target group.
///
/// Target group itself is never part of the result, even if a malformed
/// forest loops back to it.
pub fn descendant_ids(group_id: &GroupId, groups: &[Group]) -> HashSet<GroupId> {
    let children = child_index(groups);
    let mut visited = HashSet::from([group_id]);
    let mut descendants = HashSet::new();
    let mut queue = VecDeque::from([group_id]);

    while let Some(current) = queue.pop_front() {
        for &child in children.get(current).into_iter().flatten() {
            // INVARIANT: Visit each node once so cycles cannot loop forever.
            if visited.insert(child) {
                descendants.insert(child.clone());
                queue.push_back(child);
            }
        }
    }

    descendants
}

/// Check if candidate is an ancestor of target node.
///
/// Walks the parent chain upward from target node. A node is not its own
/// ancestor unless the forest contains a cycle through it.
pub fn is_ancestor(candidate: &GroupId, node: &GroupId, groups: &[Group]) -> bool {
    let parents: HashMap<&GroupId, &GroupId> = groups
        .iter()
        .filter_map(|group| group.parent_id.as_ref().map(|parent| (&group.id, parent)))
        .collect();

    let mut visited = HashSet::new();
    let mut current = node;
    while let Some(parent) = parents.get(current) {
        if *parent == candidate {
            return true;
        }

        if !visited.insert(*parent) {
            return false;
        }
        current = *parent;
    }

    false
}

/// Union of members of target group and all of its descendants.
///
/// Walks group-then-children depth first, visiting children in sibling display
/// order and keeping each group's own member order. A path reachable through
/// several groups is reported once, at its first occurrence.
pub fn aggregate_members(group_id: &GroupId, groups: &[Group]) -> Vec<MemberRef> {
    let by_id: HashMap<&GroupId, &Group> = groups.iter().map(|group| (&group.id, group)).collect();
    let children = child_index(groups);
    let mut visited = HashSet::new();
    let mut seen_paths = HashSet::new();
    let mut members = Vec::new();
    let mut stack = vec![group_id];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }

        let Some(group) = by_id.get(current) else {
            continue;
        };

        for member in &group.members {
            if seen_paths.insert(member.path.as_path()) {
                members.push(member.clone());
            }
        }

        let mut kids: Vec<&Group> = children
            .get(current)
            .into_iter()
            .flatten()
            .filter_map(|id| by_id.get(*id).copied())
            .collect();
        kids.sort_by(|a, b| sibling_cmp(a, b));

        // INVARIANT: Push in reverse so first child is walked first.
        stack.extend(kids.into_iter().rev().map(|kid| &kid.id));
    }

    members
}

/// Direct children of target parent within given store, in display order.
///
/// Passing `None` as the parent lists root groups of the store.
pub fn children_of<'a>(
    parent: Option<&GroupId>,
    store_key: StoreKey,
    groups: &'a [Group],
) -> Vec<&'a Group> {
    let mut children: Vec<&Group> = groups
        .iter()
        .filter(|group| group.parent_id.as_ref() == parent && group.store_key == store_key)
        .collect();
    children.sort_by(|a, b| sibling_cmp(a, b));
    children
}

/// Repair dangling parents and parent cycles in a freshly loaded forest.
///
/// Groups whose parent does not exist in the forest become roots. Then every
/// group that turns out to be its own ancestor is promoted to root, which
/// breaks the cycle it was part of. Returns number of groups repaired.
pub fn repair_forest(groups: &mut [Group]) -> usize {
    let ids: HashSet<GroupId> = groups.iter().map(|group| group.id.clone()).collect();
    let mut repaired = 0;

    for group in groups.iter_mut() {
        let dangling = match &group.parent_id {
            Some(parent) => *parent == group.id || !ids.contains(parent),
            None => false,
        };

        if dangling {
            warn!("group {:?} points at missing parent, promoting to root", group.name);
            group.parent_id = None;
            repaired += 1;
        }
    }

    for index in 0..groups.len() {
        let id = groups[index].id.clone();
        if is_ancestor(&id, &id, groups) {
            warn!(
                "group {:?} is part of a parent cycle, promoting to root",
                groups[index].name
            );
            groups[index].parent_id = None;
            repaired += 1;
        }
    }

    repaired
}

/// Give a fresh identifier to every group whose id is already taken.
///
/// Children of a renumbered group are re-pointed at the new id. Returns number
/// of groups renumbered.
pub fn reassign_colliding_ids(groups: &mut [Group], taken: &HashSet<GroupId>) -> usize {
    let mut renamed = HashMap::new();
    for group in groups.iter_mut() {
        if group.id.as_str().is_empty() || taken.contains(&group.id) {
            let fresh = GroupId::generate();
            warn!("group id {} collides, reassigning to {}", group.id, fresh);
            renamed.insert(group.id.clone(), fresh.clone());
            group.id = fresh;
        }
    }

    if renamed.is_empty() {
        return 0;
    }

    for group in groups.iter_mut() {
        if let Some(fresh) = group.parent_id.as_ref().and_then(|parent| renamed.get(parent)) {
            group.parent_id = Some(fresh.clone());
        }
    }

    renamed.len()
}

fn child_index(groups: &[Group]) -> HashMap<&GroupId, Vec<&GroupId>> {
    let mut index: HashMap<&GroupId, Vec<&GroupId>> = HashMap::new();
    for group in groups {
        if let Some(parent) = &group.parent_id {
            index.entry(parent).or_default().push(&group.id);
        }
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn group(id: &str, parent: Option<&str>, order: usize) -> Group {
        let mut group = Group::new(id.to_uppercase(), StoreKey::Local);
        group.id = GroupId::new(id);
        group.parent_id = parent.map(GroupId::new);
        group.order = order;
        group
    }

    fn ids(values: &[&str]) -> HashSet<GroupId> {
        values.iter().copied().map(GroupId::new).collect()
    }

    #[test]
    fn descendants_cover_whole_subtree_only() {
        let groups = vec![
            group("a", None, 0),
            group("b", Some("a"), 0),
            group("c", Some("b"), 0),
            group("d", Some("a"), 1),
            group("e", None, 1),
        ];

        assert_eq!(descendant_ids(&"a".into(), &groups), ids(&["b", "c", "d"]));
        assert_eq!(descendant_ids(&"b".into(), &groups), ids(&["c"]));
        assert_eq!(descendant_ids(&"e".into(), &groups), ids(&[]));
        assert_eq!(descendant_ids(&"missing".into(), &groups), ids(&[]));
    }

    #[test]
    fn descendants_terminate_on_cycle() {
        let groups = vec![group("a", Some("c"), 0), group("b", Some("a"), 0), group("c", Some("b"), 0)];
        assert_eq!(descendant_ids(&"a".into(), &groups), ids(&["b", "c"]));
    }

    #[test]
    fn ancestor_walks_parent_chain() {
        let groups = vec![group("a", None, 0), group("b", Some("a"), 0), group("c", Some("b"), 0)];

        assert!(is_ancestor(&"a".into(), &"c".into(), &groups));
        assert!(is_ancestor(&"b".into(), &"c".into(), &groups));
        assert!(!is_ancestor(&"c".into(), &"a".into(), &groups));
        assert!(!is_ancestor(&"a".into(), &"a".into(), &groups));
    }

    #[test]
    fn ancestor_terminates_on_cycle() {
        let groups = vec![group("a", Some("b"), 0), group("b", Some("a"), 0), group("x", None, 0)];
        assert!(!is_ancestor(&"x".into(), &"a".into(), &groups));
        assert!(is_ancestor(&"a".into(), &"a".into(), &groups));
    }

    #[test]
    fn aggregate_walks_group_then_children() {
        let mut root = group("root", None, 0);
        root.members.push(MemberRef::new("/p/root.txt", Some(false)));
        let mut late = group("late", Some("root"), 1);
        late.members.push(MemberRef::new("/p/late.txt", Some(false)));
        let mut early = group("early", Some("root"), 0);
        early.members.push(MemberRef::new("/p/early.txt", Some(false)));
        early.members.push(MemberRef::new("/p/root.txt", Some(false)));
        let mut nested = group("nested", Some("early"), 0);
        nested.members.push(MemberRef::new("/p/nested.txt", None));

        let groups = vec![root, late, early, nested];
        let result: Vec<PathBuf> = aggregate_members(&"root".into(), &groups)
            .into_iter()
            .map(|member| member.path)
            .collect();
        let expect: Vec<PathBuf> = ["/p/root.txt", "/p/early.txt", "/p/nested.txt", "/p/late.txt"]
            .into_iter()
            .map(PathBuf::from)
            .collect();

        assert_eq!(result, expect);
    }

    #[test]
    fn patch_overrides_only_named_fields() {
        let original = group("a", None, 3);
        let patch = GroupPatch {
            name: Some("Renamed".into()),
            pinned: Some(true),
            badge_text: Some(Some("  xyz ".into())),
            short_description: Some(Some("notes".into())),
            ..Default::default()
        };

        let result = patch.apply(&original);
        assert_eq!(result.name, "Renamed");
        assert!(result.pinned);
        assert_eq!(result.badge_text.as_deref(), Some("xy"));
        assert_eq!(result.short_description.as_deref(), Some("notes"));
        assert_eq!(result.order, 3);
        assert_eq!(result.icon, original.icon);

        let cleared = GroupPatch {
            short_description: Some(None),
            badge_text: Some(Some("   ".into())),
            ..Default::default()
        }
        .apply(&result);
        assert_eq!(cleared.short_description, None);
        assert_eq!(cleared.badge_text, None);
    }

    #[test]
    fn pinned_siblings_sort_first() {
        let a = group("a", None, 0);
        let mut b = group("b", None, 1);
        let c = group("c", None, 2);
        b.pinned = true;

        let groups = vec![c, a, b];
        let result: Vec<&str> = children_of(None, StoreKey::Local, &groups)
            .into_iter()
            .map(|group| group.id.as_str())
            .collect();
        assert_eq!(result, vec!["b", "a", "c"]);
    }

    #[test_case("blue", true; "palette token")]
    #[test_case("charts.purple", true; "namespaced palette token")]
    #[test_case("#a0B1c2", true; "hash hex literal")]
    #[test_case("ff8800", true; "bare hex literal")]
    #[test_case("#ff88", false; "short hex literal")]
    #[test_case("turquoise", false; "unknown token")]
    #[test]
    fn color_validation(color: &str, expect: bool) {
        use pretty_assertions::assert_eq;
        assert_eq!(is_valid_color(color), expect);
    }

    #[test]
    fn repair_promotes_orphans_and_breaks_cycles() {
        let mut groups = vec![
            group("a", Some("gone"), 0),
            group("b", Some("c"), 0),
            group("c", Some("b"), 0),
            group("d", Some("a"), 0),
        ];

        assert_eq!(repair_forest(&mut groups), 2);
        assert_eq!(groups[0].parent_id, None);
        assert_eq!(groups[1].parent_id, None);
        assert_eq!(groups[2].parent_id, Some("b".into()));
        assert_eq!(groups[3].parent_id, Some("a".into()));
    }

    #[test]
    fn colliding_ids_are_renumbered_with_children() {
        let mut groups = vec![group("a", None, 0), group("b", Some("a"), 0)];
        let taken = ids(&["a"]);

        assert_eq!(reassign_colliding_ids(&mut groups, &taken), 1);
        assert_ne!(groups[0].id, GroupId::new("a"));
        assert_eq!(groups[1].parent_id.as_ref(), Some(&groups[0].id));
    }

    #[test]
    fn sort_order_labels() {
        for order in [
            SortOrder::Manual,
            SortOrder::NameAsc,
            SortOrder::NameDesc,
            SortOrder::DateAsc,
            SortOrder::DateDesc,
            SortOrder::Type,
        ] {
            assert_eq!(order.to_string().parse::<SortOrder>().ok(), Some(order));
        }
        assert!("newest".parse::<SortOrder>().is_err());
    }
}
