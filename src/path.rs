// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Convert member paths between their resolved absolute form and the portable
//! project-relative form used by the local group artifact, and determine
//! default locations for files that live outside of any project.
//!
//! # Portability Gap
//!
//! A member outside of the project root cannot be expressed relative to it.
//! Such members keep their absolute path even inside the otherwise portable
//! local artifact, so that one entry will not survive moving the project to
//! another machine.

use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

/// Express absolute path relative to project root.
///
/// Prefix matching is separator-normalized, and case-insensitive on Windows.
/// Relative results always use forward slashes. A path outside of the root is
/// returned unchanged. The root itself maps to `"."`.
///
/// NOTE: A local member outside of the project root therefore keeps its
/// absolute path in the otherwise portable local artifact.
pub fn to_relative(absolute: impl AsRef<Path>, root: impl AsRef<Path>) -> PathBuf {
    let path = normalize(absolute.as_ref());
    let base = normalize(root.as_ref());

    match strip_root(&path, &base) {
        Some("") => PathBuf::from("."),
        Some(rest) => PathBuf::from(rest),
        None => absolute.as_ref().to_path_buf(),
    }
}

/// Resolve possibly relative path against project root.
///
/// Paths that already look absolute, i.e., carry a drive marker or a leading
/// separator, are returned unchanged. Everything else is joined onto the root
/// using the platform separator.
pub fn to_absolute(path: impl AsRef<Path>, root: impl AsRef<Path>) -> PathBuf {
    let raw = path.as_ref().to_string_lossy();
    if is_absolute_like(&raw) {
        return path.as_ref().to_path_buf();
    }

    if raw.is_empty() || raw == "." {
        return root.as_ref().to_path_buf();
    }

    root.as_ref().join(raw.replace(['/', '\\'], MAIN_SEPARATOR_STR))
}

/// Check if path string is absolute on any platform.
pub fn is_absolute_like(path: &str) -> bool {
    let bytes = path.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';

    has_drive || path.starts_with('/') || path.starts_with('\\')
}

/// Check if path equals or lies below target directory.
pub fn is_within(path: impl AsRef<Path>, dir: impl AsRef<Path>) -> bool {
    strip_root(&normalize(path.as_ref()), &normalize(dir.as_ref())).is_some()
}

/// Move path from one directory prefix to another.
///
/// Returns `None` if path is not within the old prefix.
pub fn rebase(
    path: impl AsRef<Path>,
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
) -> Option<PathBuf> {
    let path = normalize(path.as_ref());
    match strip_root(&path, &normalize(from.as_ref()))? {
        "" => Some(to.as_ref().to_path_buf()),
        rest => Some(to.as_ref().join(rest.replace('/', MAIN_SEPARATOR_STR))),
    }
}

/// Last segment of a path, used as display name.
pub fn display_name(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

/// Determine default absolute path to settings file.
///
/// Uses `$XDG_CONFIG_HOME/filegroups/config.toml`. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if user directory path cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("filegroups").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to global group artifact.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/filegroups/global-groups.json`.
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if user directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_global_artifact() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("filegroups").join("global-groups.json"))
        .ok_or(NoWayHome)
}

fn normalize(path: &Path) -> String {
    let mut text = path.to_string_lossy().replace('\\', "/");

    // INVARIANT: Keep bare roots like "/" and "C:/" intact.
    while text.len() > 1 && text.ends_with('/') && !text.ends_with(":/") {
        text.pop();
    }

    text
}

fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    if root.is_empty() {
        return None;
    }

    let head = path.get(..root.len())?;
    let same = if cfg!(windows) {
        head.eq_ignore_ascii_case(root)
    } else {
        head == root
    };
    if !same {
        return None;
    }

    let rest = &path[root.len()..];
    if rest.is_empty() || root.ends_with('/') {
        return Some(rest);
    }

    // INVARIANT: Only match on a component boundary, "/proj2" is not in "/proj".
    rest.strip_prefix('/')
}

/// No way to determine user's config or data directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
/// - [`dirs::data_dir`](https://docs.rs/dirs/latest/dirs/fn.data_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's config or data directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
