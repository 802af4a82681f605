// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem watching.
//!
//! Translate raw [`notify`] events into the handful of changes filegroups
//! reacts to: a member path was deleted, a member path was renamed, or one of
//! the two group artifacts changed on disk. Translated events are forwarded
//! into a [`tokio`] channel so the owner of the store can apply them one at a
//! time on its own task.

use crate::{
    group::StoreKey,
    path::is_within,
    store::{forest::scratch_path, Result, StoreError},
};

use notify::{
    event::{ModifyKind, RenameMode},
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Change filegroups reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Path no longer exists.
    Deleted(PathBuf),

    /// Path was moved or renamed.
    Renamed { from: PathBuf, to: PathBuf },

    /// Durable artifact of a store tier changed.
    ArtifactChanged(StoreKey),
}

/// Paths being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTargets {
    pub project_root: PathBuf,
    pub local_artifact: PathBuf,
    pub global_artifact: PathBuf,
}

impl WatchTargets {
    /// Translate raw filesystem event.
    ///
    /// Only paired renames are reported as renames. Unpaired rename halves
    /// are dropped, since treating them as deletions would lose the member
    /// before its matching half arrives.
    pub fn translate(&self, event: &Event) -> Vec<WatchEvent> {
        match &event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
                [from, to] => {
                    if let Some(key) = self.artifact_key(to).or_else(|| self.artifact_key(from)) {
                        return vec![WatchEvent::ArtifactChanged(key)];
                    }

                    if self.is_scratch(from) || self.is_scratch(to) {
                        return Vec::new();
                    }

                    vec![WatchEvent::Renamed {
                        from: from.clone(),
                        to: to.clone(),
                    }]
                }
                _ => Vec::new(),
            },
            EventKind::Modify(ModifyKind::Name(mode)) => {
                debug!("ignoring unpaired rename half {mode:?}");
                self.artifact_changes(&event.paths)
            }
            EventKind::Remove(_) => event
                .paths
                .iter()
                .filter(|path| !self.is_scratch(path))
                .map(|path| match self.artifact_key(path) {
                    Some(key) => WatchEvent::ArtifactChanged(key),
                    None => WatchEvent::Deleted(path.clone()),
                })
                .collect(),
            EventKind::Create(_) | EventKind::Modify(_) => self.artifact_changes(&event.paths),
            _ => Vec::new(),
        }
    }

    fn artifact_changes(&self, paths: &[PathBuf]) -> Vec<WatchEvent> {
        let mut changes = Vec::new();
        for key in paths.iter().filter_map(|path| self.artifact_key(path)) {
            if !changes.contains(&WatchEvent::ArtifactChanged(key)) {
                changes.push(WatchEvent::ArtifactChanged(key));
            }
        }

        changes
    }

    fn artifact_key(&self, path: &Path) -> Option<StoreKey> {
        if path == self.local_artifact.as_path() {
            Some(StoreKey::Local)
        } else if path == self.global_artifact.as_path() {
            Some(StoreKey::Global)
        } else {
            None
        }
    }

    fn is_scratch(&self, path: &Path) -> bool {
        path == scratch_path(&self.local_artifact).as_path()
            || path == scratch_path(&self.global_artifact).as_path()
    }
}

/// Live filesystem watch over a project and both artifacts.
///
/// Watching stops when this value is dropped.
#[derive(Debug)]
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
}

impl StoreWatcher {
    /// Start watching targets, forwarding translated events to sender.
    ///
    /// The project root is watched recursively. Artifacts outside of the
    /// project root get their parent directory watched, which is created if
    /// missing so the artifact can appear later.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Watch`] if a watch cannot be established.
    /// - Return [`StoreError::CreateDir`] if an artifact directory cannot be
    ///   created.
    pub fn spawn(targets: WatchTargets, sender: UnboundedSender<WatchEvent>) -> Result<Self> {
        let translator = targets.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for change in translator.translate(&event) {
                        if sender.send(change).is_err() {
                            debug!("watch receiver dropped");
                        }
                    }
                }
                Err(error) => warn!("filesystem watch error: {error}"),
            }
        })?;

        watcher.watch(&targets.project_root, RecursiveMode::Recursive)?;
        for artifact in [&targets.local_artifact, &targets.global_artifact] {
            if is_within(artifact, &targets.project_root) {
                continue;
            }

            if let Some(dir) = artifact.parent() {
                mkdirp::mkdirp(dir).map_err(|error| StoreError::CreateDir {
                    source: error,
                    path: dir.to_path_buf(),
                })?;
                watcher.watch(dir, RecursiveMode::NonRecursive)?;
            }
        }
        info!("watching {:?}", targets.project_root.display());

        Ok(Self { _watcher: watcher })
    }
}
