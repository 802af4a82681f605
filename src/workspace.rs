// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Workspace service.
//!
//! A __workspace__ is one project root viewed through filegroups. It owns the
//! [`DualStore`] holding both group forests, and is the only entry point the
//! outer layers (the command line, a tree UI) talk to.
//!
//! # Lifecycle
//!
//! Open a workspace once at launch through [`Workspace::open`], which loads
//! both artifacts, and hand it back through [`Workspace::close`] on shutdown,
//! which flushes any cache still ahead of its artifact to disk.
//!
//! # Interface
//!
//! Reads always reflect the latest save. Writes live in [`mutate`] and
//! [`reconcile`], follow the pattern "read full forest, compute new forest,
//! persist once", and fire the store's change listeners once per operation.
//! Expected conditions such as unknown ids, duplicate members, or
//! cycle-forming moves are reported as counts, booleans, or an [`Outcome`],
//! never as errors.

pub mod mutate;
pub mod reconcile;

pub use mutate::{DeleteOutcome, DropTarget, Outcome, Parent, Rejection};

use crate::{
    config::Settings,
    group::{aggregate_members, children_of, Group, GroupId, MemberRef, StoreKey},
    present::Presenter,
    probe::{FileProbe, StdProbe},
    store::{watch::WatchTargets, DualStore},
};

use std::path::{Path, PathBuf};
use tracing::info;

/// Presentation hints given to new root groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefaults {
    pub icon: String,
    pub color: String,
}

impl Default for GroupDefaults {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            icon: settings.default_icon,
            color: settings.default_color,
        }
    }
}

/// Top-level group service for one project root.
#[derive(Debug)]
pub struct Workspace<P = StdProbe>
where
    P: FileProbe,
{
    pub(crate) store: DualStore,
    pub(crate) probe: P,
    pub(crate) defaults: GroupDefaults,
}

impl Workspace<StdProbe> {
    /// Open workspace for project root using given settings.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`](crate::config::ConfigError::NoWayHome)
    ///   if the global artifact location cannot be determined.
    pub fn open(
        project_root: impl Into<PathBuf>,
        settings: &Settings,
    ) -> Result<Self, crate::config::ConfigError> {
        let project_root = project_root.into();
        let local_artifact = project_root.join(&settings.local_artifact);
        let global_artifact = settings.global_artifact()?;
        let store = DualStore::open(&project_root, local_artifact, global_artifact);
        let defaults = GroupDefaults {
            icon: settings.default_icon.clone(),
            color: settings.default_color.clone(),
        };
        info!("opened workspace at {:?}", project_root.display());

        Ok(Self::with_probe(store, StdProbe).with_defaults(defaults))
    }
}

impl<P> Workspace<P>
where
    P: FileProbe,
{
    /// Construct workspace over an already loaded store.
    pub fn with_probe(store: DualStore, probe: P) -> Self {
        Self {
            store,
            probe,
            defaults: GroupDefaults::default(),
        }
    }

    /// Replace presentation hints given to new root groups.
    pub fn with_defaults(mut self, defaults: GroupDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Flush unsaved changes to disk and release the workspace.
    pub fn close(mut self) {
        self.store.flush();
        info!("closed workspace at {:?}", self.store.project_root().display());
    }

    pub fn store(&self) -> &DualStore {
        &self.store
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn project_root(&self) -> &Path {
        self.store.project_root()
    }

    /// Paths a filesystem watcher should cover for this workspace.
    pub fn watch_targets(&self) -> WatchTargets {
        WatchTargets {
            project_root: self.store.project_root().to_path_buf(),
            local_artifact: self.store.artifact(StoreKey::Local).to_path_buf(),
            global_artifact: self.store.artifact(StoreKey::Global).to_path_buf(),
        }
    }

    /// Register listener fired whenever the visible forest may have changed.
    pub fn on_change(&mut self, listener: impl Fn() + Send + 'static) {
        self.store.on_change(listener);
    }

    /// Visible groups, global first unless hidden for this project.
    pub fn combined_groups(&self) -> Vec<Group> {
        self.store.combined_groups()
    }

    /// Visible root groups, local before global, each in display order.
    pub fn root_groups(&self) -> Vec<Group> {
        let groups = self.combined_groups();
        let mut roots: Vec<Group> = children_of(None, StoreKey::Local, &groups)
            .into_iter()
            .cloned()
            .collect();
        roots.extend(children_of(None, StoreKey::Global, &groups).into_iter().cloned());
        roots
    }

    /// Direct children of target group in display order.
    pub fn subgroups(&self, id: &GroupId) -> Vec<Group> {
        let groups = self.combined_groups();
        let Some(parent) = groups.iter().find(|group| group.id == *id) else {
            return Vec::new();
        };

        children_of(Some(id), parent.store_key, &groups)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn group(&self, id: &GroupId) -> Option<Group> {
        self.combined_groups().into_iter().find(|group| group.id == *id)
    }

    /// Members of target group and all of its descendants.
    pub fn all_members(&self, id: &GroupId) -> Vec<MemberRef> {
        aggregate_members(id, &self.combined_groups())
    }

    /// Resolve group by exact id, or else by unique case-insensitive name.
    pub fn find_group(&self, id_or_name: &str) -> Option<Group> {
        let groups = self.combined_groups();
        if let Some(group) = groups.iter().find(|group| group.id.as_str() == id_or_name) {
            return Some(group.clone());
        }

        let mut named = groups
            .into_iter()
            .filter(|group| group.name.eq_ignore_ascii_case(id_or_name));
        match (named.next(), named.next()) {
            (Some(group), None) => Some(group),
            _ => None,
        }
    }

    /// Badge text and color to decorate a path with.
    ///
    /// Taken from the first visible group containing the path. Badge text
    /// falls back to the group name's first letter.
    pub fn badge_for(&self, path: impl AsRef<Path>) -> Option<(String, String)> {
        let group = self
            .combined_groups()
            .into_iter()
            .find(|group| group.contains(path.as_ref()))?;
        let badge = match &group.badge_text {
            Some(badge) => badge.clone(),
            None => group.name.chars().take(1).collect::<String>().to_uppercase(),
        };

        Some((badge, group.color))
    }

    pub fn hide_global_groups(&self) -> bool {
        self.store.hide_global_groups()
    }

    /// Toggle visibility of global groups for this project.
    pub fn set_hide_global_groups(&mut self, hide: bool) -> bool {
        self.store.set_hide_global_groups(hide)
    }

    /// Display-ready view of the visible forest.
    pub fn presenter(&self) -> Presenter<'_, P> {
        Presenter::new(self.combined_groups(), &self.probe)
    }
}
