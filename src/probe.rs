// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem probing.
//!
//! Groups never look inside the files they reference. The only questions ever
//! asked of the filesystem are whether a path exists, whether it is a
//! directory, and when it was last modified. All answers are best-effort: a
//! failed probe never surfaces as an error, it simply yields the safe default.

use std::{fs, path::Path, time::SystemTime};

/// Layer of indirection for filesystem stat calls.
pub trait FileProbe {
    /// Check if path is currently reachable.
    ///
    /// Probe failure counts as unreachable.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory, `None` if it cannot be determined.
    fn is_dir(&self, path: &Path) -> Option<bool>;

    /// Last modification time, `None` if it cannot be determined.
    fn modified(&self, path: &Path) -> Option<SystemTime>;
}

/// Probe the real filesystem through [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdProbe;

impl FileProbe for StdProbe {
    fn exists(&self, path: &Path) -> bool {
        path.try_exists().unwrap_or(false)
    }

    fn is_dir(&self, path: &Path) -> Option<bool> {
        fs::metadata(path).ok().map(|meta| meta.is_dir())
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|meta| meta.modified()).ok()
    }
}

impl<P: FileProbe + ?Sized> FileProbe for &P {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> Option<bool> {
        (**self).is_dir(path)
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        (**self).modified(path)
    }
}
