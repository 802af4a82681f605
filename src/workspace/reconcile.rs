// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem reconciliation.
//!
//! Keep member references valid as files move or vanish underneath the
//! groups. Changes are pushed in through [`Workspace::apply_watch_event`]
//! rather than polled. Both stores are reconciled together, hidden global
//! groups included, and each notification results in at most one save.
//!
//! Every operation returns the member paths it touched, so a tree UI can
//! refresh their decorations.

use crate::{
    group::MemberRef,
    path::{is_within, rebase},
    probe::FileProbe,
    store::watch::WatchEvent,
    workspace::Workspace,
};

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

impl<P> Workspace<P>
where
    P: FileProbe,
{
    /// Drop every member at or below deleted path from all groups.
    ///
    /// Returns the removed member paths.
    #[instrument(skip(self), level = "debug")]
    pub fn on_deleted(&mut self, path: impl AsRef<Path> + std::fmt::Debug) -> Vec<PathBuf> {
        let path = path.as_ref();
        let mut groups = self.store.forest();
        let mut removed = Vec::new();

        for group in groups.iter_mut() {
            group.members.retain(|member| {
                if !is_within(&member.path, path) {
                    return true;
                }

                if !removed.contains(&member.path) {
                    removed.push(member.path.clone());
                }
                false
            });
        }

        if removed.is_empty() {
            debug!("deleted path {:?} is not a member", path.display());
            return removed;
        }

        info!("drop {} members under deleted {:?}", removed.len(), path.display());
        self.store.save(groups);
        removed
    }

    /// Point every member at or below renamed path to its new location.
    ///
    /// Names are recomputed from the new path. The directory flag is kept,
    /// and only probed when it was never known. A group that already holds
    /// the new path just loses the old one. Returns old and new paths of
    /// every relocated member.
    #[instrument(skip(self), level = "debug")]
    pub fn on_renamed(
        &mut self,
        from: impl AsRef<Path> + std::fmt::Debug,
        to: impl AsRef<Path> + std::fmt::Debug,
    ) -> Vec<PathBuf> {
        let (from, to) = (from.as_ref(), to.as_ref());
        let mut groups = self.store.forest();
        let mut touched = Vec::new();

        for group in groups.iter_mut() {
            if !group.members.iter().any(|member| is_within(&member.path, from)) {
                continue;
            }

            let mut seen = HashSet::new();
            let mut members = Vec::with_capacity(group.members.len());
            for member in group.members.drain(..) {
                let member = match rebase(&member.path, from, to) {
                    Some(moved) => {
                        let mut relocated = member.relocated(moved);
                        if relocated.is_directory.is_none() {
                            relocated.is_directory = self.probe.is_dir(&relocated.path);
                        }

                        for path in [&member.path, &relocated.path] {
                            if !touched.contains(path) {
                                touched.push(path.clone());
                            }
                        }
                        relocated
                    }
                    None => member,
                };

                if seen.insert(member.path.clone()) {
                    members.push(member);
                }
            }
            group.members = members;
        }

        if touched.is_empty() {
            debug!("renamed path {:?} is not a member", from.display());
            return touched;
        }

        info!("relocate members {:?} -> {:?}", from.display(), to.display());
        self.store.save(groups);
        touched
    }

    /// Every member whose path is currently unreachable, once per path.
    pub fn missing_members(&self) -> Vec<MemberRef> {
        let mut seen = HashSet::new();
        self.store
            .forest()
            .into_iter()
            .flat_map(|group| group.members)
            .filter(|member| seen.insert(member.path.clone()))
            .filter(|member| !self.probe.exists(&member.path))
            .collect()
    }

    /// Remove every unreachable member from all groups in one save.
    ///
    /// Returns the removed member paths. Running it again without a
    /// filesystem change in between removes nothing.
    #[instrument(skip(self), level = "debug")]
    pub fn cleanup_missing_files(&mut self) -> Vec<PathBuf> {
        let missing: HashSet<PathBuf> = self
            .missing_members()
            .into_iter()
            .map(|member| member.path)
            .collect();
        if missing.is_empty() {
            return Vec::new();
        }

        let mut groups = self.store.forest();
        let mut removed = Vec::new();
        for group in groups.iter_mut() {
            group.members.retain(|member| {
                let keep = !missing.contains(&member.path);
                if !keep && !removed.contains(&member.path) {
                    removed.push(member.path.clone());
                }
                keep
            });
        }

        info!("clean up {} missing members", removed.len());
        self.store.save(groups);
        removed
    }

    /// Apply one translated filesystem event.
    ///
    /// Returns member paths whose decorations need a refresh.
    pub fn apply_watch_event(&mut self, event: WatchEvent) -> Vec<PathBuf> {
        match event {
            WatchEvent::Deleted(path) => self.on_deleted(path),
            WatchEvent::Renamed { from, to } => self.on_renamed(from, to),
            WatchEvent::ArtifactChanged(store_key) => {
                self.store.reload(store_key);
                Vec::new()
            }
        }
    }
}
