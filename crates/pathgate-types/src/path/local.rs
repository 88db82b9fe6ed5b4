//! Conventional filesystem paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{PathType, check_path_type};
use crate::error::{PathError, PathResult};
use crate::segments::{Segments, SegmentsExt, to_segs};

/// A path on the local filesystem.
///
/// Segments are the `/`-separated pieces of the path string. Absolute paths
/// lead with an empty root segment: `/sdcard/test` is `["", "sdcard", "test"]`
/// and `/` is `[""]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "LocalPathWire", into = "LocalPathWire")]
pub struct LocalPath {
    file: PathBuf,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalPathWire {
    file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path_type: Option<PathType>,
}

impl TryFrom<LocalPathWire> for LocalPath {
    type Error = PathError;

    fn try_from(wire: LocalPathWire) -> Result<Self, Self::Error> {
        check_path_type(wire.path_type, PathType::Local)?;
        Ok(Self { file: wire.file })
    }
}

impl From<LocalPath> for LocalPathWire {
    fn from(local: LocalPath) -> Self {
        Self {
            file: local.file,
            path_type: None,
        }
    }
}

impl LocalPath {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    /// Rebuild a path from its segments (inverse of [`LocalPath::segments`]).
    pub fn build<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Segments = segments.into_iter().map(Into::into).collect();
        if segments.len() == 1 && segments[0].is_empty() {
            return Self::new("/");
        }
        Self::new(segments.join_segments("/"))
    }

    pub fn as_path(&self) -> &Path {
        &self.file
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.file
    }

    pub fn path(&self) -> String {
        self.file.to_string_lossy().into_owned()
    }

    pub fn name(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn segments(&self) -> Segments {
        let path = self.path();
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() && !path.is_empty() {
            return vec![String::new()];
        }
        to_segs(trimmed, "/")
    }

    /// Append `names` below this path.
    ///
    /// A name holding `/` is split into one segment per piece. Empty, `.`
    /// and `..` pieces are dropped, so a child never leaves its parent.
    pub fn child<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut file = self.file.clone();
        for name in names {
            name.as_ref()
                .split('/')
                .filter(|piece| !matches!(*piece, "" | "." | ".."))
                .for_each(|piece| file.push(piece));
        }
        Self { file }
    }

    pub fn parent(&self) -> Option<Self> {
        self.file.parent().map(Self::new)
    }

    pub fn is_ancestor_of(&self, other: &LocalPath) -> bool {
        self.segments().is_ancestor_of(&other.segments(), false)
    }

    pub fn is_parent_of(&self, other: &LocalPath) -> bool {
        self.segments().is_parent_of(&other.segments(), false)
    }

    pub fn starts_with(&self, prefix: &LocalPath) -> bool {
        self.segments()
            .starts_with_segments(&prefix.segments(), false, true)
    }

    /// Segments leading from this path down to `child`.
    pub fn crumbs_to(&self, child: &LocalPath) -> PathResult<Segments> {
        let (own, theirs) = (self.segments(), child.segments());
        if !theirs.starts_with_segments(&own, false, false) {
            return Err(PathError::mismatch(format!("{child} is not below {self}")));
        }
        Ok(theirs[own.len()..].to_vec())
    }
}

impl From<PathBuf> for LocalPath {
    fn from(file: PathBuf) -> Self {
        Self::new(file)
    }
}

impl From<&Path> for LocalPath {
    fn from(file: &Path) -> Self {
        Self::new(file)
    }
}

impl AsRef<Path> for LocalPath {
    fn as_ref(&self) -> &Path {
        &self.file
    }
}

impl fmt::Display for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())
    }
}
