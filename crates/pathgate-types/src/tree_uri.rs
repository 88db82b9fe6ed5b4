//! Tree URIs: the capability roots of content-provider storage.
//!
//! A tree URI has the shape `content://<authority>/tree/<documentId>` where the
//! document id is percent-encoded and reads `<volume>:<relative/path>`, e.g.
//! `content://com.android.externalstorage.documents/tree/primary%3AAndroid%2Fdata`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PathError, PathResult};
use crate::segments::Segments;

const SCHEME: &str = "content://";

/// A validated tree URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreeUri(String);

impl TreeUri {
    /// Parse and validate a tree URI.
    pub fn parse(uri: impl Into<String>) -> PathResult<Self> {
        let uri = uri.into();
        if !Self::is_tree_uri(&uri) {
            return Err(PathError::invalid_argument(format!("not a tree uri: {uri}")));
        }
        Ok(Self(uri))
    }

    /// Build the tree URI for a document id under `authority`.
    pub fn from_document_id(authority: &str, document_id: &str) -> PathResult<Self> {
        Self::parse(format!(
            "{SCHEME}{authority}/tree/{}",
            urlencoding::encode(document_id)
        ))
    }

    /// Whether `uri` is a content URI whose first path segment is `tree`
    /// followed by a document id.
    pub fn is_tree_uri(uri: &str) -> bool {
        match split(uri) {
            Some((authority, segments)) => {
                !authority.is_empty()
                    && segments.len() >= 2
                    && segments[0] == "tree"
                    && !segments[1].is_empty()
            }
            None => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn authority(&self) -> &str {
        split(&self.0).map(|(authority, _)| authority).unwrap_or_default()
    }

    /// The decoded tree document id (`primary:Android/data`).
    pub fn document_id(&self) -> String {
        let raw = split(&self.0)
            .and_then(|(_, segments)| segments.get(1).copied())
            .unwrap_or_default();
        urlencoding::decode(raw)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| raw.to_string())
    }

    /// Storage volume the tree lives on (`primary`).
    pub fn volume(&self) -> String {
        let id = self.document_id();
        match id.split_once(':') {
            Some((volume, _)) => volume.to_string(),
            None => id,
        }
    }

    /// Segments of the tree's own location on its volume.
    ///
    /// `primary:Android/data` yields `[Android, data]`; a volume root yields
    /// nothing.
    pub fn root_segments(&self) -> Segments {
        let id = self.document_id();
        let relative = id.split_once(':').map(|(_, rel)| rel).unwrap_or_default();
        relative
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// True for the top of a storage volume (`primary:`).
    pub fn is_storage_root(&self) -> bool {
        self.document_id().ends_with(':')
    }
}

/// Split a content URI into authority and raw (still encoded) path segments.
fn split(uri: &str) -> Option<(&str, Vec<&str>)> {
    let rest = uri.strip_prefix(SCHEME)?;
    let (authority, path) = rest.split_once('/')?;
    let path = path.split(['?', '#']).next().unwrap_or_default();
    Some((authority, path.split('/').filter(|s| !s.is_empty()).collect()))
}

impl fmt::Display for TreeUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TreeUri {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TreeUri {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TreeUri> for String {
    fn from(uri: TreeUri) -> Self {
        uri.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHORITY: &str = "com.android.externalstorage.documents";

    #[test]
    fn test_parse_tree_uri() {
        let uri = TreeUri::parse(format!("content://{AUTHORITY}/tree/primary%3AAndroid%2Fdata"))
            .unwrap();
        assert_eq!(uri.authority(), AUTHORITY);
        assert_eq!(uri.document_id(), "primary:Android/data");
        assert_eq!(uri.volume(), "primary");
        assert_eq!(uri.root_segments(), vec!["Android", "data"]);
        assert!(!uri.is_storage_root());
    }

    #[test]
    fn test_storage_root() {
        let uri = TreeUri::from_document_id(AUTHORITY, "primary:").unwrap();
        assert_eq!(uri.as_str(), format!("content://{AUTHORITY}/tree/primary%3A"));
        assert!(uri.is_storage_root());
        assert!(uri.root_segments().is_empty());
    }

    #[test]
    fn test_rejects_non_tree_uris() {
        assert!(TreeUri::parse("file:///sdcard").is_err());
        assert!(TreeUri::parse(format!("content://{AUTHORITY}/document/primary%3A")).is_err());
        assert!(TreeUri::parse(format!("content://{AUTHORITY}/tree")).is_err());
        assert!(TreeUri::parse("content:///tree/primary%3A").is_err());
        assert!(matches!(
            "/sdcard".parse::<TreeUri>(),
            Err(PathError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_document_suffix_is_ignored() {
        let uri = TreeUri::parse(format!(
            "content://{AUTHORITY}/tree/primary%3Asafstor/document/primary%3Asafstor%2Fx"
        ))
        .unwrap();
        assert_eq!(uri.document_id(), "primary:safstor");
    }
}
