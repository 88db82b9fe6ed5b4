//! Tree-scoped content-provider paths.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{PathType, check_path_type};
use crate::error::{PathError, PathResult};
use crate::segments::{Segments, SegmentsExt};
use crate::tree_uri::TreeUri;

/// A document addressed by a tree URI plus relative segments below it.
///
/// Two `SafPath`s are only comparable when their tree roots are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "SafPathWire", into = "SafPathWire")]
pub struct SafPath {
    tree_root: TreeUri,
    segments: Segments,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafPathWire {
    tree_root: TreeUri,
    #[serde(default)]
    segments: Segments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path_type: Option<PathType>,
}

impl TryFrom<SafPathWire> for SafPath {
    type Error = PathError;

    fn try_from(wire: SafPathWire) -> Result<Self, Self::Error> {
        check_path_type(wire.path_type, PathType::Saf)?;
        Ok(Self::new(wire.tree_root, wire.segments))
    }
}

impl From<SafPath> for SafPathWire {
    fn from(saf: SafPath) -> Self {
        Self {
            tree_root: saf.tree_root,
            segments: saf.segments,
            path_type: None,
        }
    }
}

impl SafPath {
    pub fn new(tree_root: TreeUri, segments: Segments) -> Self {
        Self {
            tree_root,
            segments,
        }
    }

    /// Parse `tree_root` and attach `segments`.
    ///
    /// Fails with [`PathError::InvalidArgument`] when the root is not a tree URI.
    pub fn build<I, S>(tree_root: &str, segments: I) -> PathResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tree_root = TreeUri::parse(tree_root)?;
        Ok(Self::new(
            tree_root,
            segments.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn tree_root(&self) -> &TreeUri {
        &self.tree_root
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Location on the storage volume: the tree's own segments followed by
    /// this path's segments.
    pub fn volume_segments(&self) -> Segments {
        self.segments.prepend(&self.tree_root.root_segments())
    }

    pub fn path(&self) -> String {
        if self.segments.is_empty() {
            self.tree_root.to_string()
        } else {
            format!("{}/{}", self.tree_root, self.segments.join_segments("/"))
        }
    }

    pub fn name(&self) -> String {
        if let Some(last) = self.segments.last() {
            return last.clone();
        }
        let id = self.tree_root.document_id();
        match id.rsplit_once('/') {
            Some((_, name)) => name.to_string(),
            None => id
                .split_once(':')
                .map(|(_, rel)| rel)
                .unwrap_or(id.as_str())
                .to_string(),
        }
    }

    pub fn child<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut segments = self.segments.clone();
        segments.extend(names.into_iter().map(|n| n.as_ref().to_string()));
        Self::new(self.tree_root.clone(), segments)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.segments.split_last()?;
        Some(Self::new(self.tree_root.clone(), head.to_vec()))
    }

    /// The top of a storage volume with no segments below it.
    pub fn is_storage_root(&self) -> bool {
        self.tree_root.is_storage_root() && self.segments.is_empty()
    }

    pub fn is_ancestor_of(&self, other: &SafPath) -> bool {
        self.tree_root == other.tree_root && self.segments.is_ancestor_of(&other.segments, false)
    }

    pub fn is_parent_of(&self, other: &SafPath) -> bool {
        self.tree_root == other.tree_root && self.segments.is_parent_of(&other.segments, false)
    }

    pub fn starts_with(&self, prefix: &SafPath) -> bool {
        self.tree_root == prefix.tree_root
            && self
                .segments
                .starts_with_segments(&prefix.segments, false, true)
    }

    /// Segments leading from this path down to `child`.
    pub fn crumbs_to(&self, child: &SafPath) -> PathResult<Segments> {
        if self.tree_root != child.tree_root {
            return Err(PathError::mismatch(format!(
                "different tree roots: {} and {}",
                self.tree_root, child.tree_root
            )));
        }
        if !child
            .segments
            .starts_with_segments(&self.segments, false, false)
        {
            return Err(PathError::mismatch(format!("{child} is not below {self}")));
        }
        Ok(child.segments[self.segments.len()..].to_vec())
    }
}

impl fmt::Display for SafPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
