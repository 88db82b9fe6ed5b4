//! Opaque string paths.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{PathType, check_path_type};
use crate::error::{PathError, PathResult};
use crate::segments::Segments;

/// A path that is carried around as an uninterpreted string.
///
/// No backend serves raw paths; they exist so that callers can hold on to
/// identifiers they received from elsewhere. Segment decomposition is refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPathWire", into = "RawPathWire")]
pub struct RawPath {
    path: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPathWire {
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path_type: Option<PathType>,
}

impl TryFrom<RawPathWire> for RawPath {
    type Error = PathError;

    fn try_from(wire: RawPathWire) -> Result<Self, Self::Error> {
        check_path_type(wire.path_type, PathType::Raw)?;
        Ok(Self { path: wire.path })
    }
}

impl From<RawPath> for RawPathWire {
    fn from(raw: RawPath) -> Self {
        Self {
            path: raw.path,
            path_type: None,
        }
    }
}

impl RawPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Text after the last `/`.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Always fails: raw paths have no segment structure.
    pub fn segments(&self) -> PathResult<Segments> {
        Err(PathError::Unsupported {
            operation: "segments",
            path_type: PathType::Raw,
        })
    }

    /// Append names with `/`.
    pub fn child<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = self.path.clone();
        for name in names {
            if !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(name.as_ref().trim_start_matches('/'));
        }
        Self { path }
    }

    pub fn is_ancestor_of(&self, other: &RawPath) -> bool {
        let prefix = format!("{}/", self.path.trim_end_matches('/'));
        other.path.starts_with(&prefix) && other.path.len() > prefix.len()
    }

    pub fn is_parent_of(&self, other: &RawPath) -> bool {
        let prefix = format!("{}/", self.path.trim_end_matches('/'));
        self.is_ancestor_of(other) && !other.path[prefix.len()..].contains('/')
    }

    pub fn starts_with(&self, prefix: &RawPath) -> bool {
        self.path.starts_with(&prefix.path)
    }
}

impl fmt::Display for RawPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
