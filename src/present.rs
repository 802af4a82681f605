// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Display-ready view of the group forest.
//!
//! A [`Presenter`] turns the visible forest into the ordered tree a UI walks.
//! Local root groups come first, followed by one synthetic global section
//! node holding the global roots. Each group lists its subgroups before its
//! own members, and members follow the group's [`SortOrder`].

use crate::{
    group::{children_of, Group, GroupId, MemberRef, SortOrder, StoreKey},
    probe::FileProbe,
};

use std::{
    cmp::Ordering,
    fmt::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};

/// Label of the synthetic node holding global root groups.
pub const GLOBAL_SECTION_LABEL: &str = "Global Groups";

/// Node of the display tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TreeNode {
    /// Synthetic parent of all global root groups.
    GlobalSection,

    /// A group.
    Group(GroupId),

    /// A member inside a group.
    Member { group: GroupId, path: PathBuf },
}

/// Ordered tree view over a snapshot of the visible forest.
#[derive(Debug)]
pub struct Presenter<'a, P>
where
    P: FileProbe,
{
    groups: Vec<Group>,
    probe: &'a P,
}

impl<'a, P> Presenter<'a, P>
where
    P: FileProbe,
{
    pub fn new(groups: Vec<Group>, probe: &'a P) -> Self {
        Self { groups, probe }
    }

    /// Top-level nodes: local roots, then the global section if non-empty.
    pub fn roots(&self) -> Vec<TreeNode> {
        let mut roots: Vec<TreeNode> = children_of(None, StoreKey::Local, &self.groups)
            .into_iter()
            .map(|group| TreeNode::Group(group.id.clone()))
            .collect();

        if !children_of(None, StoreKey::Global, &self.groups).is_empty() {
            roots.push(TreeNode::GlobalSection);
        }

        roots
    }

    /// Children of target node in display order.
    pub fn children(&self, node: &TreeNode) -> Vec<TreeNode> {
        match node {
            TreeNode::GlobalSection => children_of(None, StoreKey::Global, &self.groups)
                .into_iter()
                .map(|group| TreeNode::Group(group.id.clone()))
                .collect(),
            TreeNode::Group(id) => {
                let Some(group) = self.group(id) else {
                    return Vec::new();
                };

                let mut nodes: Vec<TreeNode> =
                    children_of(Some(id), group.store_key, &self.groups)
                        .into_iter()
                        .map(|child| TreeNode::Group(child.id.clone()))
                        .collect();
                nodes.extend(
                    sort_members(&group.members, group.sort_order, self.probe)
                        .into_iter()
                        .map(|member| TreeNode::Member {
                            group: id.clone(),
                            path: member.path.clone(),
                        }),
                );
                nodes
            }
            TreeNode::Member { .. } => Vec::new(),
        }
    }

    /// Parent of target node.
    ///
    /// A global root group's parent is the global section node.
    pub fn parent(&self, node: &TreeNode) -> Option<TreeNode> {
        match node {
            TreeNode::GlobalSection => None,
            TreeNode::Group(id) => {
                let group = self.group(id)?;
                match (&group.parent_id, group.store_key) {
                    (Some(parent), _) => Some(TreeNode::Group(parent.clone())),
                    (None, StoreKey::Global) => Some(TreeNode::GlobalSection),
                    (None, StoreKey::Local) => None,
                }
            }
            TreeNode::Member { group, .. } => Some(TreeNode::Group(group.clone())),
        }
    }

    pub fn group(&self, id: &GroupId) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == *id)
    }

    /// Human-readable label of target node.
    pub fn label(&self, node: &TreeNode) -> String {
        match node {
            TreeNode::GlobalSection => GLOBAL_SECTION_LABEL.into(),
            TreeNode::Group(id) => self
                .group(id)
                .map(|group| group.name.clone())
                .unwrap_or_else(|| id.to_string()),
            TreeNode::Member { group, path } => self
                .group(group)
                .and_then(|group| group.members.iter().find(|member| member.path == *path))
                .map(|member| member.name.clone())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    /// Render the whole tree as indented text.
    pub fn render(&self, show_ids: bool) -> String {
        let mut out = String::new();
        for root in self.roots() {
            self.render_node(&mut out, &root, 0, show_ids);
        }

        out
    }

    fn render_node(&self, out: &mut String, node: &TreeNode, depth: usize, show_ids: bool) {
        let indent = "  ".repeat(depth);
        let _ = match node {
            TreeNode::GlobalSection => writeln!(out, "{indent}{}", self.label(node)),
            TreeNode::Group(id) => {
                let mut line = format!("{indent}{}", self.label(node));
                if let Some(group) = self.group(id) {
                    if group.pinned {
                        line.push_str(" *");
                    }
                    if let Some(description) = &group.short_description {
                        let _ = write!(line, " ({description})");
                    }
                }
                if show_ids {
                    let _ = write!(line, " [{id}]");
                }
                writeln!(out, "{line}")
            }
            TreeNode::Member { group, path } => {
                let is_dir = self
                    .group(group)
                    .and_then(|group| group.members.iter().find(|member| member.path == *path))
                    .and_then(|member| member.is_directory)
                    .unwrap_or(false);
                let suffix = if is_dir { "/" } else { "" };
                writeln!(out, "{indent}- {}{suffix}", self.label(node))
            }
        };

        for child in self.children(node) {
            self.render_node(out, &child, depth + 1, show_ids);
        }
    }
}

/// Order members according to sort policy.
///
/// Date policies are best-effort. Members whose modification time cannot be
/// read keep their stored slot, and only the remaining members are reordered
/// among themselves.
pub fn sort_members<'m>(
    members: &'m [MemberRef],
    sort_order: SortOrder,
    probe: &impl FileProbe,
) -> Vec<&'m MemberRef> {
    let mut sorted: Vec<&MemberRef> = members.iter().collect();
    match sort_order {
        SortOrder::Manual => {}
        SortOrder::NameAsc => sorted.sort_by(|a, b| name_cmp(a, b)),
        SortOrder::NameDesc => sorted.sort_by(|a, b| name_cmp(b, a)),
        SortOrder::Type => sorted.sort_by(|a, b| type_key(a).cmp(&type_key(b))),
        SortOrder::DateAsc => sort_by_date(&mut sorted, probe, false),
        SortOrder::DateDesc => sort_by_date(&mut sorted, probe, true),
    }

    sorted
}

/// Case-insensitive name comparison, ties broken by exact name.
///
/// NOTE: Names compare by Unicode code point after lowercasing, with no
/// locale collation and no numeric awareness. Accented letters therefore
/// sort after `z`, and `file10` sorts before `file2`.
fn name_cmp(a: &MemberRef, b: &MemberRef) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

fn type_key(member: &MemberRef) -> (String, String) {
    let extension = Path::new(&member.name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    (extension, member.name.to_lowercase())
}

fn sort_by_date(members: &mut [&MemberRef], probe: &impl FileProbe, descending: bool) {
    let stamped: Vec<(usize, SystemTime)> = members
        .iter()
        .enumerate()
        .filter_map(|(slot, member)| probe.modified(&member.path).map(|time| (slot, time)))
        .collect();

    let mut order: Vec<(usize, SystemTime)> = stamped.clone();
    // INVARIANT: Stable sort, so equal times keep stored order.
    order.sort_by(|a, b| match descending {
        false => a.1.cmp(&b.1),
        true => b.1.cmp(&a.1),
    });

    let snapshot: Vec<&MemberRef> = members.to_vec();
    for ((slot, _), (from, _)) in stamped.iter().zip(order.iter()) {
        members[*slot] = snapshot[*from];
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::probe::StdProbe;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::{
        collections::HashMap,
        time::{Duration, UNIX_EPOCH},
    };

    #[derive(Default)]
    struct Clock(HashMap<PathBuf, SystemTime>);

    impl Clock {
        fn at(mut self, path: &str, secs: u64) -> Self {
            self.0.insert(path.into(), UNIX_EPOCH + Duration::from_secs(secs));
            self
        }
    }

    impl FileProbe for Clock {
        fn exists(&self, path: &Path) -> bool {
            self.0.contains_key(path)
        }

        fn is_dir(&self, _: &Path) -> Option<bool> {
            None
        }

        fn modified(&self, path: &Path) -> Option<SystemTime> {
            self.0.get(path).copied()
        }
    }

    fn group(name: &str, store_key: StoreKey, order: usize) -> Group {
        let mut group = Group::new(name, store_key);
        group.order = order;
        group
    }

    fn names(members: Vec<&MemberRef>) -> Vec<&str> {
        members.into_iter().map(|member| member.name.as_str()).collect()
    }

    #[test]
    fn pinned_group_comes_first() {
        let a = group("A", StoreKey::Local, 0);
        let mut b = group("B", StoreKey::Local, 1);
        b.pinned = true;
        let presenter = Presenter::new(vec![a, b], &StdProbe);

        let labels: Vec<String> = presenter
            .roots()
            .iter()
            .map(|node| presenter.label(node))
            .collect();
        assert_eq!(labels, vec!["B", "A"]);
    }

    #[test]
    fn global_roots_hang_under_section_node() {
        let local = group("Local", StoreKey::Local, 0);
        let global = group("Global", StoreKey::Global, 0);
        let mut nested = group("Nested", StoreKey::Global, 0);
        nested.parent_id = Some(global.id.clone());
        let presenter = Presenter::new(vec![global.clone(), local.clone(), nested.clone()], &StdProbe);

        assert_eq!(
            presenter.roots(),
            vec![TreeNode::Group(local.id.clone()), TreeNode::GlobalSection]
        );
        assert_eq!(
            presenter.children(&TreeNode::GlobalSection),
            vec![TreeNode::Group(global.id.clone())]
        );
        assert_eq!(
            presenter.parent(&TreeNode::Group(global.id.clone())),
            Some(TreeNode::GlobalSection)
        );
        assert_eq!(
            presenter.parent(&TreeNode::Group(nested.id)),
            Some(TreeNode::Group(global.id))
        );
        assert_eq!(presenter.parent(&TreeNode::Group(local.id)), None);
    }

    #[test]
    fn no_section_node_without_global_roots() {
        let presenter = Presenter::new(vec![group("Local", StoreKey::Local, 0)], &StdProbe);
        assert!(!presenter.roots().contains(&TreeNode::GlobalSection));
    }

    #[test]
    fn subgroups_precede_members() {
        let mut parent = group("Parent", StoreKey::Local, 0);
        parent.members.push(MemberRef::new("/p/a.ts", Some(false)));
        let mut child = group("Child", StoreKey::Local, 0);
        child.parent_id = Some(parent.id.clone());
        let presenter = Presenter::new(vec![parent.clone(), child.clone()], &StdProbe);

        let member = TreeNode::Member {
            group: parent.id.clone(),
            path: "/p/a.ts".into(),
        };
        assert_eq!(
            presenter.children(&TreeNode::Group(parent.id.clone())),
            vec![TreeNode::Group(child.id), member.clone()]
        );
        assert_eq!(presenter.parent(&member), Some(TreeNode::Group(parent.id)));
    }

    #[test]
    fn name_and_type_policies() {
        let members: Vec<MemberRef> = ["/p/b.rs", "/p/A.md", "/p/c.md", "/p/a.rs"]
            .into_iter()
            .map(|path| MemberRef::new(path, None))
            .collect();

        assert_eq!(names(sort_members(&members, SortOrder::Manual, &StdProbe)), vec!["b.rs", "A.md", "c.md", "a.rs"]);
        assert_eq!(names(sort_members(&members, SortOrder::NameAsc, &StdProbe)), vec!["A.md", "a.rs", "b.rs", "c.md"]);
        assert_eq!(names(sort_members(&members, SortOrder::NameDesc, &StdProbe)), vec!["c.md", "b.rs", "a.rs", "A.md"]);
        assert_eq!(names(sort_members(&members, SortOrder::Type, &StdProbe)), vec!["A.md", "c.md", "a.rs", "b.rs"]);
    }

    #[test]
    fn name_policy_compares_code_points_not_locale() {
        let members: Vec<MemberRef> = ["/p/éclair.md", "/p/Zeta.md", "/p/file2", "/p/file10"]
            .into_iter()
            .map(|path| MemberRef::new(path, None))
            .collect();

        assert_eq!(
            names(sort_members(&members, SortOrder::NameAsc, &StdProbe)),
            vec!["file10", "file2", "Zeta.md", "éclair.md"]
        );
    }

    #[test]
    fn date_policy_keeps_unknown_members_in_place() {
        let members: Vec<MemberRef> = ["/p/new", "/p/unknown", "/p/old", "/p/mid"]
            .into_iter()
            .map(|path| MemberRef::new(path, None))
            .collect();
        let clock = Clock::default().at("/p/new", 30).at("/p/old", 10).at("/p/mid", 20);

        assert_eq!(names(sort_members(&members, SortOrder::DateAsc, &clock)), vec!["old", "unknown", "mid", "new"]);
        assert_eq!(names(sort_members(&members, SortOrder::DateDesc, &clock)), vec!["new", "unknown", "mid", "old"]);
    }

    #[test]
    fn render_walks_whole_tree() {
        let mut auth = group("Auth", StoreKey::Local, 0);
        auth.short_description = Some("login flow".into());
        let mut api = group("API", StoreKey::Local, 0);
        api.parent_id = Some(auth.id.clone());
        api.members.push(MemberRef::new("/proj/src", Some(true)));
        api.members.push(MemberRef::new("/proj/src/a.ts", Some(false)));
        let mut shared = group("Shared", StoreKey::Global, 0);
        shared.pinned = true;
        let presenter = Presenter::new(vec![shared, auth, api], &StdProbe);

        let expect = indoc! {"
            Auth (login flow)
              API
                - src/
                - a.ts
            Global Groups
              Shared *
        "};
        assert_eq!(presenter.render(false), expect);
    }
}
