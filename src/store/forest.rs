// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Single store tier.
//!
//! A [`ForestStore`] pairs the in-memory cache of one group forest with the
//! durable artifact it is mirrored to. The cache is the working truth. The
//! artifact only catches up on the next successful [`ForestStore::persist`].
//!
//! A tier is __dirty__ while its cache holds something the artifact does not,
//! e.g., after a change that failed to persist, or after a load had to repair
//! the forest it read.

use crate::{
    config::{GroupEntry, GroupsDocument, DOCUMENT_VERSION},
    group::{repair_forest, Group, GroupId, StoreKey},
    store::{Result, StoreError},
};

use std::{
    collections::HashSet,
    ffi::OsString,
    fs::{read_to_string, rename, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Cache plus durable artifact of one store tier.
#[derive(Debug, Clone)]
pub struct ForestStore {
    store_key: StoreKey,
    artifact: PathBuf,
    root: Option<PathBuf>,
    groups: Vec<Group>,
    hide_global_groups: bool,
    populated: bool,
    dirty: bool,
}

impl ForestStore {
    /// Construct new empty store tier.
    ///
    /// Member paths are persisted relative to `root` when one is given.
    pub fn new(store_key: StoreKey, artifact: impl Into<PathBuf>, root: Option<PathBuf>) -> Self {
        Self {
            store_key,
            artifact: artifact.into(),
            root,
            groups: Vec::new(),
            hide_global_groups: false,
            populated: false,
            dirty: false,
        }
    }

    pub fn artifact(&self) -> &Path {
        self.artifact.as_path()
    }

    pub fn groups(&self) -> &[Group] {
        self.groups.as_slice()
    }

    pub(crate) fn groups_mut(&mut self) -> &mut [Group] {
        self.groups.as_mut_slice()
    }

    /// Check if this tier has ever held any group.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn hide_global_groups(&self) -> bool {
        self.hide_global_groups
    }

    pub fn set_hide_global_groups(&mut self, hide: bool) {
        self.dirty |= self.hide_global_groups != hide;
        self.hide_global_groups = hide;
    }

    /// Check if cache holds changes the artifact has not caught up with.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Replace cached forest.
    pub fn replace(&mut self, groups: Vec<Group>) {
        self.populated |= !groups.is_empty();
        self.dirty |= groups != self.groups;
        self.groups = groups;
    }

    /// Read durable artifact.
    ///
    /// Returns `None` if the artifact does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ReadArtifact`] if artifact cannot be read.
    /// - Return [`StoreError::Config`] if artifact content is malformed.
    #[instrument(skip(self), fields(store = %self.store_key), level = "debug")]
    pub fn read(&self) -> Result<Option<GroupsDocument>> {
        let data = match read_to_string(&self.artifact) {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("no artifact at {:?}", self.artifact.display());
                return Ok(None);
            }
            Err(error) => {
                return Err(StoreError::ReadArtifact {
                    source: error,
                    path: self.artifact.clone(),
                })
            }
        };

        Ok(Some(data.parse()?))
    }

    /// Load durable artifact into cache.
    ///
    /// Decodes member paths, repairs dangling parents and parent cycles, and
    /// renumbers duplicate identifiers. A missing artifact leaves the cache
    /// untouched. Returns whether the cache changed.
    ///
    /// The tier is left dirty only if repairs were needed, so the repaired
    /// forest can be written back.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ReadArtifact`] if artifact cannot be read.
    /// - Return [`StoreError::Config`] if artifact content is malformed.
    pub fn load(&mut self) -> Result<bool> {
        let Some(document) = self.read()? else {
            return Ok(false);
        };

        let mut groups: Vec<Group> = document
            .groups
            .into_iter()
            .map(|entry| entry.into_group(self.store_key, self.root.as_deref()))
            .collect();

        let mut repaired = 0;
        let mut seen = HashSet::new();
        for group in groups.iter_mut() {
            if group.id.as_str().is_empty() || !seen.insert(group.id.clone()) {
                warn!("group {:?} has a missing or duplicate id, reassigning", group.name);
                group.id = GroupId::generate();
                seen.insert(group.id.clone());
                repaired += 1;
            }
        }
        repaired += repair_forest(&mut groups);

        let hide_global_groups = document.hide_global_groups.unwrap_or(false);
        let changed = groups != self.groups || hide_global_groups != self.hide_global_groups;
        debug!("loaded {} {} groups", groups.len(), self.store_key);

        self.populated |= !groups.is_empty();
        self.groups = groups;
        self.hide_global_groups = hide_global_groups;
        self.dirty = repaired > 0;

        Ok(changed)
    }

    /// Build artifact document from cache.
    pub fn document(&self) -> GroupsDocument {
        GroupsDocument {
            version: DOCUMENT_VERSION,
            groups: self
                .groups
                .iter()
                .map(|group| GroupEntry::from_group(group, self.root.as_deref()))
                .collect(),
            hide_global_groups: match self.store_key {
                StoreKey::Local => Some(self.hide_global_groups),
                StoreKey::Global => None,
            },
        }
    }

    /// Write cache to durable artifact.
    ///
    /// Content goes to a scratch file first that is then renamed over the
    /// artifact, so readers never observe a half-written document. The tier
    /// is clean again only once the rename went through.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CreateDir`] if artifact directory cannot be
    ///   created.
    /// - Return [`StoreError::WriteArtifact`] if artifact cannot be written.
    #[instrument(skip(self), fields(store = %self.store_key), level = "debug")]
    pub fn persist(&mut self) -> Result<()> {
        if let Some(dir) = self.artifact.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            mkdirp::mkdirp(dir).map_err(|error| StoreError::CreateDir {
                source: error,
                path: dir.to_path_buf(),
            })?;
        }

        let scratch = scratch_path(&self.artifact);
        let contents = self.document().to_string();
        write(&scratch, contents.as_bytes()).map_err(|error| StoreError::WriteArtifact {
            source: error,
            path: scratch.clone(),
        })?;
        rename(&scratch, &self.artifact).map_err(|error| StoreError::WriteArtifact {
            source: error,
            path: self.artifact.clone(),
        })?;
        self.dirty = false;
        debug!("persisted {} groups to {:?}", self.groups.len(), self.artifact.display());

        Ok(())
    }
}

/// Scratch file used while persisting target artifact.
pub(crate) fn scratch_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_name()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| OsString::from("groups"));
    name.push(".tmp");
    artifact.with_file_name(name)
}
