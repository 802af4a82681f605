// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

#![cfg(unix)]

use filegroups::{
    config::Settings,
    group::{descendant_ids, is_ancestor},
    present::TreeNode,
    GroupId, GroupPatch, MemberRef, Outcome, Parent, Rejection, StoreKey, Workspace,
};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    env::current_dir,
    fs::{create_dir_all, read_to_string, remove_file, rename, write},
    path::{Path, PathBuf},
};

/// Project directory plus a private global store location.
pub(crate) struct ProjectFixture {
    root: PathBuf,
    settings: Settings,
}

impl ProjectFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let base = path.as_ref();
        let root = base.join("proj");
        create_dir_all(&root)?;

        let settings = Settings {
            global_store: Some(base.join("data").join("global-groups.json")),
            ..Default::default()
        };

        Ok(Self { root, settings })
    }

    pub(crate) fn here() -> Result<Self> {
        Self::new(current_dir()?)
    }

    pub(crate) fn open(&self) -> Result<Workspace> {
        Ok(Workspace::open(&self.root, &self.settings)?)
    }

    pub(crate) fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub(crate) fn touch(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(dir) = path.parent() {
            create_dir_all(dir)?;
        }
        write(&path, "")?;

        Ok(path)
    }

    pub(crate) fn local_artifact(&self) -> PathBuf {
        self.root.join(&self.settings.local_artifact)
    }

    pub(crate) fn global_artifact(&self) -> Result<PathBuf> {
        Ok(self.settings.global_artifact()?)
    }
}

fn create(workspace: &mut Workspace, name: &str, parent: Option<&GroupId>, store_key: StoreKey) -> GroupId {
    workspace
        .create_group(name, parent, store_key)
        .expect("group should be created")
}

#[sealed_test]
fn nested_members_aggregate_under_ancestor() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let mut workspace = fixture.open()?;
    let auth = create(&mut workspace, "Auth", None, StoreKey::Local);
    let api = create(&mut workspace, "API", Some(&auth), StoreKey::Local);
    let file = fixture.touch("src/a.ts")?;

    assert_eq!(workspace.add_paths(&api, [file.clone()]), 1);
    assert_eq!(workspace.all_members(&auth), vec![MemberRef::new(file, Some(false))]);

    Ok(())
}

#[sealed_test]
fn pinned_group_is_presented_first() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let mut workspace = fixture.open()?;
    let _a = create(&mut workspace, "A", None, StoreKey::Local);
    let b = create(&mut workspace, "B", None, StoreKey::Local);
    workspace.update_group(&b, &GroupPatch { pinned: Some(true), ..Default::default() });

    let presenter = workspace.presenter();
    let labels: Vec<String> = presenter
        .roots()
        .iter()
        .map(|node| presenter.label(node))
        .collect();
    assert_eq!(labels, vec!["B", "A"]);

    Ok(())
}

#[sealed_test]
fn cycle_forming_reparent_leaves_tree_unchanged() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let mut workspace = fixture.open()?;
    let a = create(&mut workspace, "A", None, StoreKey::Local);
    let b = create(&mut workspace, "B", None, StoreKey::Local);

    assert_eq!(workspace.reparent(&a, Parent::Group(b.clone())), Outcome::Applied);
    let artifact = read_to_string(fixture.local_artifact())?;
    assert_eq!(
        workspace.reparent(&b, Parent::Group(a.clone())),
        Outcome::Rejected(Rejection::Cycle)
    );
    assert_eq!(read_to_string(fixture.local_artifact())?, artifact);

    let groups = workspace.store().forest();
    for group in &groups {
        assert!(!is_ancestor(&group.id, &group.id, &groups));
    }

    Ok(())
}

#[sealed_test]
fn local_members_persist_relative_to_project_root() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let mut workspace = fixture.open()?;
    let x = create(&mut workspace, "X", None, StoreKey::Local);
    let readme = fixture.touch("docs/readme.md")?;
    workspace.add_paths(&x, [readme.clone()]);

    let artifact = read_to_string(fixture.local_artifact())?;
    assert!(artifact.contains(r#""path": "docs/readme.md""#));

    let reopened = fixture.open()?;
    let group = reopened.group(&x).expect("group survives reopen");
    assert_eq!(group.members, vec![MemberRef::new(readme, Some(false))]);

    Ok(())
}

#[sealed_test]
fn global_members_persist_as_absolute_paths() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let mut workspace = fixture.open()?;
    let shared = create(&mut workspace, "Shared", None, StoreKey::Global);
    let file = fixture.touch("lib/util.rs")?;
    workspace.add_paths(&shared, [file.clone()]);

    let artifact = read_to_string(fixture.global_artifact()?)?;
    assert!(artifact.contains(&format!(r#""path": "{}""#, file.display())));

    // Global groups follow the user into another project.
    let other = ProjectFixture {
        root: current_dir()?.join("other"),
        settings: fixture.settings.clone(),
    };
    create_dir_all(&other.root)?;
    let elsewhere = other.open()?;
    assert_eq!(elsewhere.all_members(&shared), vec![MemberRef::new(file, Some(false))]);

    Ok(())
}

#[sealed_test]
fn rename_notification_relocates_member() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let mut workspace = fixture.open()?;
    let group = create(&mut workspace, "G", None, StoreKey::Local);
    let from = fixture.touch("a.ts")?;
    let to = fixture.path("b.ts");
    workspace.add_paths(&group, [from.clone()]);

    rename(&from, &to)?;
    workspace.on_renamed(&from, &to);

    let members = workspace.group(&group).map(|group| group.members).unwrap_or_default();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].path, to);
    assert_eq!(members[0].name, "b.ts");

    Ok(())
}

#[sealed_test]
fn cleanup_of_missing_files_is_idempotent() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let mut workspace = fixture.open()?;
    let local = create(&mut workspace, "L", None, StoreKey::Local);
    let global = create(&mut workspace, "G", None, StoreKey::Global);
    let kept = fixture.touch("kept.txt")?;
    let doomed = fixture.touch("doomed.txt")?;
    workspace.add_paths(&local, [kept.clone(), doomed.clone()]);
    workspace.add_paths(&global, [doomed.clone()]);

    remove_file(&doomed)?;
    assert_eq!(workspace.missing_members().len(), 1);
    assert_eq!(workspace.cleanup_missing_files(), vec![doomed]);
    assert!(workspace.cleanup_missing_files().is_empty());
    assert_eq!(workspace.all_members(&local), vec![MemberRef::new(kept, Some(false))]);
    assert!(workspace.all_members(&global).is_empty());

    Ok(())
}

#[sealed_test]
fn cross_store_reparent_moves_whole_subtree_on_disk() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let mut workspace = fixture.open()?;
    let top = create(&mut workspace, "Top", None, StoreKey::Local);
    let mid = create(&mut workspace, "Mid", Some(&top), StoreKey::Local);
    let _leaf = create(&mut workspace, "Leaf", Some(&mid), StoreKey::Local);
    let shared = create(&mut workspace, "Shared", None, StoreKey::Global);
    let moved: Vec<GroupId> = descendant_ids(&top, &workspace.store().forest())
        .into_iter()
        .chain([top.clone()])
        .collect();

    assert_eq!(workspace.reparent(&top, Parent::Group(shared.clone())), Outcome::Applied);

    let reopened = fixture.open()?;
    assert!(reopened.store().groups(StoreKey::Local).is_empty());
    for id in &moved {
        assert_eq!(reopened.group(id).map(|group| group.store_key), Some(StoreKey::Global));
    }
    assert_eq!(reopened.subgroups(&shared).len(), 1);

    Ok(())
}

#[sealed_test]
fn cascade_delete_removes_exactly_the_subtree() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let mut workspace = fixture.open()?;
    let top = create(&mut workspace, "Top", None, StoreKey::Local);
    let child = create(&mut workspace, "Child", Some(&top), StoreKey::Local);
    let _grandchild = create(&mut workspace, "Grandchild", Some(&child), StoreKey::Local);
    let sibling = create(&mut workspace, "Sibling", None, StoreKey::Local);
    let mut expect = descendant_ids(&top, &workspace.store().forest());
    expect.insert(top.clone());

    let deleted = workspace.delete_group(&top);
    assert_eq!(deleted.removed, expect);

    let reopened = fixture.open()?;
    let remaining: Vec<GroupId> = reopened.combined_groups().into_iter().map(|group| group.id).collect();
    assert_eq!(remaining, vec![sibling]);

    Ok(())
}

#[sealed_test]
fn hidden_global_groups_survive_local_saves() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let mut workspace = fixture.open()?;
    let shared = create(&mut workspace, "Shared", None, StoreKey::Global);
    assert!(workspace.set_hide_global_groups(true));

    create(&mut workspace, "Local", None, StoreKey::Local);
    assert!(!workspace.presenter().roots().contains(&TreeNode::GlobalSection));

    let reopened = fixture.open()?;
    assert!(reopened.hide_global_groups());
    assert!(reopened.store().groups(StoreKey::Global).iter().any(|group| group.id == shared));

    Ok(())
}

#[sealed_test]
fn legacy_artifact_loads_with_defaults() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let artifact = fixture.local_artifact();
    create_dir_all(artifact.parent().expect("artifact has parent"))?;
    write(
        &artifact,
        indoc! {r#"
            [
              {
                "id": "legacy",
                "name": "Old",
                "files": [ { "path": "notes.txt", "name": "notes.txt" } ],
                "order": 0
              }
            ]
        "#},
    )?;

    let workspace = fixture.open()?;
    let group = workspace.group(&GroupId::new("legacy")).expect("legacy group loads");
    assert!(!group.pinned);
    assert!(!group.collapsed);
    assert_eq!(group.members[0].path, fixture.path("notes.txt"));

    Ok(())
}

#[sealed_test]
fn malformed_artifact_yields_empty_workspace() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let artifact = fixture.local_artifact();
    create_dir_all(artifact.parent().expect("artifact has parent"))?;
    write(&artifact, "{ definitely not json")?;

    let mut workspace = fixture.open()?;
    assert!(workspace.combined_groups().is_empty());

    // Next save repairs the artifact.
    create(&mut workspace, "Fresh", None, StoreKey::Local);
    assert_eq!(fixture.open()?.combined_groups().len(), 1);

    Ok(())
}

#[sealed_test]
fn unknown_sort_order_keeps_every_stored_group() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    let artifact = fixture.local_artifact();
    create_dir_all(artifact.parent().expect("artifact has parent"))?;
    write(
        &artifact,
        indoc! {r#"
            {
              "version": 3,
              "groups": [
                { "id": "a", "name": "A", "files": [], "order": 0, "sortOrder": "size-desc" },
                { "id": "b", "name": "B", "files": [], "order": 1, "pinned": null }
              ]
            }
        "#},
    )?;

    let mut workspace = fixture.open()?;
    assert_eq!(workspace.combined_groups().len(), 2);

    create(&mut workspace, "C", None, StoreKey::Local);
    let names: Vec<String> = fixture
        .open()?
        .combined_groups()
        .into_iter()
        .map(|group| group.name)
        .collect();
    assert_eq!(names, vec!["A", "B", "C"]);

    Ok(())
}

#[sealed_test]
fn closing_untouched_workspace_writes_nothing() -> Result<()> {
    let fixture = ProjectFixture::here()?;
    fixture.open()?.close();
    assert!(!fixture.local_artifact().exists());
    assert!(!fixture.global_artifact()?.exists());

    let artifact = fixture.local_artifact();
    create_dir_all(artifact.parent().expect("artifact has parent"))?;
    write(&artifact, "{ unfinished edit")?;
    fixture.open()?.close();
    assert_eq!(read_to_string(&artifact)?, "{ unfinished edit");

    Ok(())
}
