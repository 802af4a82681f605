// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dual group store.
//!
//! Filegroups keeps two independent group forests: a __local__ forest tied to
//! one project root, and a __global__ forest available from every project.
//! The [`DualStore`] is the system of record for both.
//!
//! # Store Layout
//!
//! Each tier is a [`ForestStore`]: an in-memory cache mirrored to a durable
//! JSON artifact. The local artifact lives inside the project, by default at
//! `.filegroups/groups.json`, and stores member paths relative to the project
//! root so it can be committed alongside the project. The global artifact
//! lives in the user's data directory, by default at
//! `$XDG_DATA_HOME/filegroups/global-groups.json`, and stores absolute paths.
//!
//! # Failure Semantics
//!
//! Artifact problems never reach the caller. An unreadable or malformed
//! artifact is treated as "no data yet", and a failed write is logged while
//! the cache stays authoritative until the next successful save. Repairs a
//! load had to make, such as renumbering colliding identifiers, are written
//! back right away so they stay stable across launches.
//!
//! # Change Notification
//!
//! Every completed save, and every external artifact change that actually
//! alters a cached forest, fires registered listeners exactly once.

pub mod forest;
pub mod watch;

pub use forest::ForestStore;

use crate::group::{reassign_colliding_ids, Group, GroupId, StoreKey};

use std::{
    collections::HashSet,
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

/// System of record for local and global group forests.
#[derive(Debug)]
pub struct DualStore {
    project_root: PathBuf,
    local: ForestStore,
    global: ForestStore,
    listeners: Listeners,
}

impl DualStore {
    /// Construct new dual store with empty caches.
    ///
    /// Nothing is read until [`DualStore::load_local`] and
    /// [`DualStore::load_global`] are called.
    pub fn new(
        project_root: impl Into<PathBuf>,
        local_artifact: impl Into<PathBuf>,
        global_artifact: impl Into<PathBuf>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            local: ForestStore::new(StoreKey::Local, local_artifact, Some(project_root.clone())),
            global: ForestStore::new(StoreKey::Global, global_artifact, None),
            project_root,
            listeners: Listeners::default(),
        }
    }

    /// Construct new dual store and load both artifacts.
    pub fn open(
        project_root: impl Into<PathBuf>,
        local_artifact: impl Into<PathBuf>,
        global_artifact: impl Into<PathBuf>,
    ) -> Self {
        let mut store = Self::new(project_root, local_artifact, global_artifact);
        store.load_local();
        store.load_global();
        info!(
            "opened {} local and {} global groups",
            store.local.groups().len(),
            store.global.groups().len()
        );
        store
    }

    pub fn project_root(&self) -> &Path {
        self.project_root.as_path()
    }

    /// Path to durable artifact of target tier.
    pub fn artifact(&self, store_key: StoreKey) -> &Path {
        self.tier(store_key).artifact()
    }

    /// Load local artifact into cache. Returns whether the cache changed.
    pub fn load_local(&mut self) -> bool {
        self.load(StoreKey::Local)
    }

    /// Load global artifact into cache. Returns whether the cache changed.
    pub fn load_global(&mut self) -> bool {
        self.load(StoreKey::Global)
    }

    /// Reload target tier after its artifact changed on disk.
    ///
    /// Listeners fire only if the reload changed the cache, so echoes of this
    /// process's own writes stay silent.
    pub fn reload(&mut self, store_key: StoreKey) -> bool {
        let changed = self.load(store_key);
        if changed {
            info!("{store_key} groups changed on disk");
            self.emit();
        }

        changed
    }

    /// Both forests, global groups first, regardless of visibility.
    ///
    /// Mutations must always start from this view so hidden global groups are
    /// never dropped by a save.
    pub fn forest(&self) -> Vec<Group> {
        let mut groups = self.global.groups().to_vec();
        groups.extend_from_slice(self.local.groups());
        groups
    }

    /// Visible groups, global groups first unless hidden for this project.
    pub fn combined_groups(&self) -> Vec<Group> {
        if self.hide_global_groups() {
            return self.local.groups().to_vec();
        }

        self.forest()
    }

    /// Cached groups of target tier.
    pub fn groups(&self, store_key: StoreKey) -> &[Group] {
        self.tier(store_key).groups()
    }

    /// Persist full forest, partitioned by store key.
    ///
    /// The global artifact is only written if the global forest is non-empty
    /// now or was non-empty before, so a never-used global file is not
    /// created, yet can still be cleared once groups existed.
    pub fn save(&mut self, groups: Vec<Group>) {
        let (global, local): (Vec<Group>, Vec<Group>) = groups
            .into_iter()
            .partition(|group| group.store_key == StoreKey::Global);

        self.local.replace(local);
        self.persist(StoreKey::Local);

        let write_global = !global.is_empty() || self.global.is_populated();
        self.global.replace(global);
        if write_global {
            self.persist(StoreKey::Global);
        }

        self.emit();
    }

    /// Write caches that are ahead of their artifacts.
    ///
    /// A tier with nothing new to write is left alone, so flushing never
    /// creates an artifact for an unused tier nor clobbers one that failed to
    /// load.
    pub fn flush(&mut self) {
        for store_key in [StoreKey::Local, StoreKey::Global] {
            if self.tier(store_key).is_dirty() {
                self.persist(store_key);
            }
        }
    }

    pub fn hide_global_groups(&self) -> bool {
        self.local.hide_global_groups()
    }

    /// Toggle visibility of global groups for this project.
    ///
    /// Persisted in the local artifact. Global data is never touched. Returns
    /// whether the setting changed.
    pub fn set_hide_global_groups(&mut self, hide: bool) -> bool {
        if self.local.hide_global_groups() == hide {
            return false;
        }

        self.local.set_hide_global_groups(hide);
        self.persist(StoreKey::Local);
        self.emit();
        true
    }

    /// Register listener fired whenever a forest changes.
    pub fn on_change(&mut self, listener: impl Fn() + Send + 'static) {
        self.listeners.0.push(Box::new(listener));
    }

    fn load(&mut self, store_key: StoreKey) -> bool {
        let changed = match self.tier_mut(store_key).load() {
            Ok(changed) => changed,
            Err(error) => {
                warn!("ignoring unusable {store_key} group artifact: {error}");
                false
            }
        };

        // INVARIANT: Identifiers stay unique across both tiers, the local copy yields.
        let taken: HashSet<GroupId> = self.global.groups().iter().map(|group| group.id.clone()).collect();
        let renumbered = reassign_colliding_ids(self.local.groups_mut(), &taken);
        if renumbered > 0 {
            self.local.mark_dirty();
        }
        self.flush();

        changed || renumbered > 0
    }

    fn persist(&mut self, store_key: StoreKey) {
        if let Err(error) = self.tier_mut(store_key).persist() {
            error!("failed to persist {store_key} groups, keeping in-memory state: {error:?}");
        }
    }

    fn emit(&self) {
        debug!("notify {} change listeners", self.listeners.0.len());
        for listener in &self.listeners.0 {
            listener();
        }
    }

    fn tier(&self, store_key: StoreKey) -> &ForestStore {
        match store_key {
            StoreKey::Local => &self.local,
            StoreKey::Global => &self.global,
        }
    }

    fn tier_mut(&mut self, store_key: StoreKey) -> &mut ForestStore {
        match store_key {
            StoreKey::Local => &mut self.local,
            StoreKey::Global => &mut self.global,
        }
    }
}

#[derive(Default)]
struct Listeners(Vec<Box<dyn Fn() + Send>>);

impl Debug for Listeners {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("Listeners")
            .field("count", &self.0.len())
            .finish()
    }
}

/// All possible error types for group store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Artifact exists but cannot be read.
    #[error("failed to read group artifact at {:?}", path.display())]
    ReadArtifact {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Artifact cannot be written.
    #[error("failed to write group artifact at {:?}", path.display())]
    WriteArtifact {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Artifact directory cannot be created.
    #[error("failed to create artifact directory at {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Artifact content is malformed.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Filesystem watch cannot be established.
    #[error(transparent)]
    Watch(#[from] notify::Error),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
