//! Stat results.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::path::APath;

/// Kind of filesystem object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    File,
    Directory,
    SymbolicLink,
    Unknown,
}

/// Owner of a filesystem object. Names are absent when they can't be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
    pub user_id: u32,
    pub group_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

impl Ownership {
    pub fn new(user_id: u32, group_id: u32) -> Self {
        Self {
            user_id,
            group_id,
            user_name: None,
            group_name: None,
        }
    }

    pub fn with_names(mut self, user_name: Option<String>, group_name: Option<String>) -> Self {
        self.user_name = user_name;
        self.group_name = group_name;
        self
    }
}

/// Unix permission bits (`0o7777` mask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u32);

impl Permissions {
    pub fn new(mode: u32) -> Self {
        Self(mode & 0o7777)
    }

    pub fn mode(&self) -> u32 {
        self.0
    }
}

impl From<u32> for Permissions {
    fn from(mode: u32) -> Self {
        Self::new(mode)
    }
}

impl fmt::Display for Permissions {
    /// `rwxr-xr-x` form; special bits are not shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const FLAGS: [(u32, char); 9] = [
            (0o400, 'r'),
            (0o200, 'w'),
            (0o100, 'x'),
            (0o040, 'r'),
            (0o020, 'w'),
            (0o010, 'x'),
            (0o004, 'r'),
            (0o002, 'w'),
            (0o001, 'x'),
        ];
        let rendered: String = FLAGS
            .iter()
            .map(|&(bit, c)| if self.0 & bit != 0 { c } else { '-' })
            .collect();
        f.write_str(&rendered)
    }
}

/// Metadata snapshot of a single path.
///
/// The looked-up path is held by composition; variant gateways return
/// `APathLookup<LocalPath>` or `APathLookup<SafPath>` and the router widens
/// them with [`APathLookup::into_apath`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct APathLookup<P = APath> {
    pub lookedup: P,
    pub file_type: FileType,
    pub size: u64,
    pub modified_at: SystemTime,
    pub ownership: Option<Ownership>,
    pub permissions: Option<Permissions>,
    /// Link target, for symbolic links.
    pub target: Option<P>,
}

impl<P> APathLookup<P> {
    pub fn path(&self) -> &P {
        &self.lookedup
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::SymbolicLink
    }

    /// Swap the path type, keeping all metadata.
    pub fn map_path<Q>(self, f: impl Fn(P) -> Q) -> APathLookup<Q> {
        APathLookup {
            lookedup: f(self.lookedup),
            file_type: self.file_type,
            size: self.size,
            modified_at: self.modified_at,
            ownership: self.ownership,
            permissions: self.permissions,
            target: self.target.map(f),
        }
    }
}

impl<P: Into<APath>> APathLookup<P> {
    pub fn into_apath(self) -> APathLookup<APath> {
        self.map_path(Into::into)
    }
}
