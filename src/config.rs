// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the files filegroups reads and writes to simplify the
//! process of serialization and deserialization. File I/O is left to the
//! caller to figure out, except for [`Settings::load`].
//!
//! # Group Artifact
//!
//! Each store tier keeps its groups in a human-readable JSON document, see
//! [`GroupsDocument`]. Documents are versioned, but loaders never reject a
//! version they do not know. Absent optional fields get stable defaults, so
//! older documents load cleanly. The oldest layout, a bare array of groups,
//! is accepted as version 1.
//!
//! Loading is lenient below the document level. A field holding `null` or a
//! value of the wrong shape falls back to its default, an unknown sort order
//! falls back to manual ordering, and a group or member entry that cannot be
//! read at all is skipped. Only a document that is not JSON, or whose top
//! level is neither an object nor an array, is rejected outright.
//!
//! # Settings
//!
//! Application settings are kept in a TOML file, see [`Settings`].

use crate::{
    group::{Group, GroupId, MemberRef, SortOrder, StoreKey, DEFAULT_COLOR, DEFAULT_ICON},
    path::{default_global_artifact, to_absolute, to_relative},
};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::warn;

/// Current group artifact layout version.
pub const DOCUMENT_VERSION: u32 = 3;

/// Group artifact layout.
///
/// One document per store tier. Member paths in the local document are
/// relative to the project root, member paths in the global document are
/// absolute.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsDocument {
    #[serde(default = "legacy_version", deserialize_with = "version_or_legacy")]
    pub version: u32,

    #[serde(default, deserialize_with = "skip_malformed")]
    pub groups: Vec<GroupEntry>,

    /// Per-project visibility of global groups, local document only.
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub hide_global_groups: Option<bool>,
}

impl Default for GroupsDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            groups: Vec::new(),
            hide_global_groups: None,
        }
    }
}

impl FromStr for GroupsDocument {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(data).map_err(ConfigError::Deserialize)?;
        match value {
            Value::Array(entries) => Ok(Self {
                version: legacy_version(),
                groups: entries_from(entries),
                hide_global_groups: None,
            }),
            document => serde_json::from_value(document).map_err(ConfigError::Deserialize),
        }
    }
}

impl Display for GroupsDocument {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            serde_json::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn legacy_version() -> u32 {
    1
}

/// Serialized form of one group.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    #[serde(default, deserialize_with = "or_default")]
    pub id: String,

    #[serde(default, deserialize_with = "or_default")]
    pub name: String,

    #[serde(default = "default_icon", deserialize_with = "icon_or_default")]
    pub icon: String,

    #[serde(default = "default_color", deserialize_with = "color_or_default")]
    pub color: String,

    #[serde(default, deserialize_with = "skip_malformed")]
    pub files: Vec<MemberEntry>,

    #[serde(default, deserialize_with = "or_default")]
    pub order: usize,

    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,

    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, deserialize_with = "or_default")]
    pub collapsed: bool,

    #[serde(default, deserialize_with = "or_default")]
    pub pinned: bool,

    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub badge_text: Option<String>,

    #[serde(
        default,
        deserialize_with = "sort_order_or_manual",
        skip_serializing_if = "SortOrder::is_manual"
    )]
    pub sort_order: SortOrder,
}

impl GroupEntry {
    /// Encode group for persistence.
    ///
    /// Member paths are made relative to `root` when one is given.
    pub fn from_group(group: &Group, root: Option<&Path>) -> Self {
        Self {
            id: group.id.to_string(),
            name: group.name.clone(),
            icon: group.icon.clone(),
            color: group.color.clone(),
            files: group
                .members
                .iter()
                .map(|member| MemberEntry::from_member(member, root))
                .collect(),
            order: group.order,
            parent_id: group.parent_id.as_ref().map(ToString::to_string),
            short_description: group.short_description.clone(),
            details: group.details.clone(),
            created_by: group.created_by.clone(),
            collapsed: group.collapsed,
            pinned: group.pinned,
            badge_text: group.badge_text.clone(),
            sort_order: group.sort_order,
        }
    }

    /// Decode persisted group into given store tier.
    ///
    /// Member paths are resolved against `root` when one is given. Duplicate
    /// member paths collapse onto their first occurrence.
    pub fn into_group(self, store_key: StoreKey, root: Option<&Path>) -> Group {
        let mut members: Vec<MemberRef> = Vec::with_capacity(self.files.len());
        for entry in self.files {
            let member = entry.into_member(root);
            if !members.iter().any(|existing| existing.path == member.path) {
                members.push(member);
            }
        }

        Group {
            id: GroupId::new(self.id),
            name: self.name,
            icon: self.icon,
            color: self.color,
            members,
            order: self.order,
            parent_id: self.parent_id.map(GroupId::new),
            store_key,
            collapsed: self.collapsed,
            pinned: self.pinned,
            short_description: self.short_description,
            details: self.details,
            created_by: self.created_by,
            badge_text: self.badge_text,
            sort_order: self.sort_order,
        }
    }
}

/// Serialized form of one member reference.
#[derive(Debug, Default, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberEntry {
    pub path: String,

    #[serde(default, deserialize_with = "or_default")]
    pub name: String,

    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub is_directory: Option<bool>,
}

impl MemberEntry {
    fn from_member(member: &MemberRef, root: Option<&Path>) -> Self {
        let path = match root {
            Some(root) => to_relative(&member.path, root),
            None => member.path.clone(),
        };

        Self {
            path: path.to_string_lossy().into_owned(),
            name: member.name.clone(),
            is_directory: member.is_directory,
        }
    }

    fn into_member(self, root: Option<&Path>) -> MemberRef {
        let path = match root {
            Some(root) => to_absolute(&self.path, root),
            None => PathBuf::from(&self.path),
        };

        // INVARIANT: Display name always tracks the resolved path.
        MemberRef::new(path, self.is_directory)
    }
}

fn default_icon() -> String {
    DEFAULT_ICON.into()
}

fn default_color() -> String {
    DEFAULT_COLOR.into()
}

fn version_or_legacy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|_| legacy_version()))
}

fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }

    Ok(serde_json::from_value(value).unwrap_or_else(|error| {
        warn!("ignoring malformed field value: {error}");
        T::default()
    }))
}

fn string_or<'de, D>(deserializer: D, fallback: &str) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        _ => Ok(fallback.into()),
    }
}

fn icon_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    string_or(deserializer, DEFAULT_ICON)
}

fn color_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    string_or(deserializer, DEFAULT_COLOR)
}

fn sort_order_or_manual<'de, D>(deserializer: D) -> Result<SortOrder, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(label) => Ok(label.parse().unwrap_or_else(|error| {
            warn!("{error}, falling back to manual");
            SortOrder::Manual
        })),
        _ => Ok(SortOrder::Manual),
    }
}

fn skip_malformed<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(entries) => Ok(entries_from(entries)),
        _ => Ok(Vec::new()),
    }
}

fn entries_from<T: DeserializeOwned>(entries: Vec<Value>) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!("skipping unreadable entry: {error}");
                None
            }
        })
        .collect()
}

/// Application settings layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Location of global group artifact.
    pub global_store: Option<PathBuf>,

    /// Location of local group artifact relative to project root.
    pub local_artifact: PathBuf,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Check for unreachable members when a workspace is opened.
    pub sweep_on_startup: bool,

    /// Icon given to new root groups.
    pub default_icon: String,

    /// Color given to new root groups.
    pub default_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_store: None,
            local_artifact: PathBuf::from(".filegroups").join("groups.json"),
            log_filter: "info".into(),
            sweep_on_startup: true,
            default_icon: DEFAULT_ICON.into(),
            default_color: DEFAULT_COLOR.into(),
        }
    }
}

impl Settings {
    /// Load settings from target file.
    ///
    /// A missing file yields default settings.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadSettings`] if file exists but cannot be
    ///   read.
    /// - Return [`ConfigError::DeserializeSettings`] if file content is not
    ///   valid settings.
    /// - Return [`ConfigError::ShellExpansion`] if global store path cannot
    ///   be expanded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match read_to_string(path.as_ref()) {
            Ok(data) => data.parse(),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(ConfigError::ReadSettings {
                source: error,
                path: path.as_ref().to_path_buf(),
            }),
        }
    }

    /// Determine absolute path to global group artifact.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if no global store is configured
    ///   and the default location cannot be determined.
    pub fn global_artifact(&self) -> Result<PathBuf> {
        match &self.global_store {
            Some(path) => Ok(path.clone()),
            None => Ok(default_global_artifact()?),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings =
            toml::de::from_str(data).map_err(ConfigError::DeserializeSettings)?;

        // INVARIANT: Perform shell expansion on global store field.
        if let Some(path) = &settings.global_store {
            let expanded = shellexpand::full(path.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned();
            settings.global_store = Some(PathBuf::from(expanded));
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::SerializeSettings)?
                .as_str(),
        )
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize group artifact.
    #[error(transparent)]
    Deserialize(serde_json::Error),

    /// Failed to serialize group artifact.
    #[error(transparent)]
    Serialize(serde_json::Error),

    /// Failed to deserialize settings.
    #[error(transparent)]
    DeserializeSettings(#[from] toml::de::Error),

    /// Failed to serialize settings.
    #[error(transparent)]
    SerializeSettings(#[from] toml::ser::Error),

    /// Settings file exists but cannot be read.
    #[error("failed to read settings at {:?}", path.display())]
    ReadSettings {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to perform shell expansion on settings.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Default location cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] crate::path::NoWayHome),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
