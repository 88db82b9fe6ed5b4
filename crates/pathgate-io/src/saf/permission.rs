//! Persisted URI grants and grant matching.

use async_trait::async_trait;
use pathgate_types::{SafPath, Segments, SegmentsExt, TreeUri};
use serde::{Deserialize, Serialize};

use super::provider::ProviderResult;

/// A grant on a tree URI, as persisted by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UriPermission {
    pub uri: TreeUri,
    pub read: bool,
    pub write: bool,
}

impl UriPermission {
    /// A read+write grant.
    pub fn full(uri: TreeUri) -> Self {
        Self {
            uri,
            read: true,
            write: true,
        }
    }
}

/// The grant that covers a path, and how to get from it to the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatch {
    pub grant: UriPermission,
    /// Segments below the grant's tree root leading to the target.
    pub missing: Segments,
}

/// Find the most specific read+write grant covering `target`.
///
/// The target's volume location is shortened one segment at a time until it
/// equals a grant's tree location on the same authority and volume.
pub fn match_permission(grants: &[UriPermission], target: &SafPath) -> Option<PermissionMatch> {
    let tree = target.tree_root();
    let candidates: Vec<(&UriPermission, Segments)> = grants
        .iter()
        .filter(|g| g.read && g.write)
        .filter(|g| g.uri.authority() == tree.authority() && g.uri.volume() == tree.volume())
        .map(|g| (g, g.uri.root_segments()))
        .collect();

    let full = target.volume_segments();
    (0..=full.len()).rev().find_map(|len| {
        let head = &full[..len];
        candidates
            .iter()
            .find(|(_, root)| root.matches(head, false))
            .map(|(grant, _)| PermissionMatch {
                grant: (*grant).clone(),
                missing: full[len..].to_vec(),
            })
    })
}

/// Access to the platform's persisted grants.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn persisted_permissions(&self) -> Vec<UriPermission>;

    /// Persist a read+write grant on `uri`.
    async fn take_permission(&self, uri: &TreeUri) -> ProviderResult<UriPermission>;

    async fn release_permission(&self, uri: &TreeUri) -> ProviderResult<()>;
}
