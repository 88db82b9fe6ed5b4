//! Tree-URI gateway.
//!
//! Serves [`SafPath`]s through a content provider. Access is capability
//! based: a path is reachable only below a persisted read+write grant.
//!
//! Key components:
//! - [`SafGateway`]: the [`APathGateway`] implementation
//! - [`DocumentProvider`]: content-provider client
//! - [`PermissionStore`] and [`match_permission`]: persisted grants
//! - [`MemoryDocumentProvider`], [`MemoryPermissionStore`]: in-memory backends
//!
//! ## Design Decisions
//!
//! - **No caching**: every call finds the covering grant and walks from its
//!   root down to the target, one document per segment. Grants and documents
//!   can change behind our back at any time.
//! - **Symlinks**: documents have no links; `create_symlink` is unsupported.

mod memory;
mod permission;
mod provider;

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use pathgate_types::{APathLookup, FileType, Ownership, Permissions, SafPath, TreeUri};
use tracing::{debug, trace, warn};

pub use memory::{MemoryDocumentProvider, MemoryPermissionStore};
pub use permission::{PermissionMatch, PermissionStore, UriPermission, match_permission};
pub use provider::{
    DIRECTORY_MIME, Document, DocumentProvider, DocumentStat, ProviderError, ProviderResult,
};

use crate::config::SafConfig;
use crate::gateway::{APathGateway, GatewayError, GatewayReader, GatewayResult, GatewayWriter};
use crate::sharedresource::{KeepAlive, SharedResource};

/// A document resolved from a grant.
struct Resolved {
    tree: TreeUri,
    document: Document,
}

/// Gateway for tree-URI paths.
pub struct SafGateway {
    provider: Arc<dyn DocumentProvider>,
    permissions: Arc<dyn PermissionStore>,
    config: SafConfig,
    keep_alive: SharedResource<KeepAlive>,
}

impl std::fmt::Debug for SafGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafGateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SafGateway {
    pub fn new(
        provider: Arc<dyn DocumentProvider>,
        permissions: Arc<dyn PermissionStore>,
        config: SafConfig,
    ) -> Self {
        Self {
            provider,
            permissions,
            config,
            keep_alive: SharedResource::keep_alive("saf-gateway"),
        }
    }

    // ========================================================================
    // Grants
    // ========================================================================

    /// Persisted grants, as the platform reports them.
    pub async fn permissions(&self) -> Vec<UriPermission> {
        self.permissions.persisted_permissions().await
    }

    /// Whether a read+write grant covers `path`.
    pub async fn has_permission(&self, path: &SafPath) -> bool {
        match_permission(&self.permissions().await, path).is_some()
    }

    pub async fn take_permission(&self, uri: &TreeUri) -> GatewayResult<UriPermission> {
        debug!(%uri, "taking permission");
        self.permissions
            .take_permission(uri)
            .await
            .map_err(|e| GatewayError::write(SafPath::new(uri.clone(), Vec::new()), e))
    }

    pub async fn release_permission(&self, uri: &TreeUri) -> GatewayResult<()> {
        debug!(%uri, "releasing permission");
        self.permissions
            .release_permission(uri)
            .await
            .map_err(|e| GatewayError::write(SafPath::new(uri.clone(), Vec::new()), e))
    }

    async fn grant_for(&self, path: &SafPath) -> GatewayResult<PermissionMatch> {
        match match_permission(&self.permissions().await, path) {
            Some(matched) => Ok(matched),
            None => {
                trace!(%path, "no grant covers path");
                Err(GatewayError::missing_grant(path.clone()))
            }
        }
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Walk from the covering grant's root to `path`.
    ///
    /// `Ok(None)` when some segment doesn't exist.
    async fn find(&self, path: &SafPath) -> GatewayResult<Option<Resolved>> {
        let matched = self.grant_for(path).await?;
        let tree = matched.grant.uri;
        let mut current = self
            .provider
            .tree_root(&tree)
            .await
            .map_err(|e| GatewayError::read(path.clone(), e))?;

        for name in &matched.missing {
            if !current.is_directory() {
                return Ok(None);
            }
            let children = self
                .provider
                .list_children(&tree, &current.document_id)
                .await
                .map_err(|e| GatewayError::read(path.clone(), e))?;
            match children.into_iter().find(|child| child.name() == *name) {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        trace!(%path, document = %current.document_id, "resolved");
        Ok(Some(Resolved {
            tree,
            document: current,
        }))
    }

    async fn resolve_for_read(&self, path: &SafPath) -> GatewayResult<Resolved> {
        self.find(path)
            .await?
            .ok_or_else(|| GatewayError::read_msg(path.clone(), "does not exist"))
    }

    async fn resolve_for_write(&self, path: &SafPath) -> GatewayResult<Resolved> {
        self.find(path)
            .await?
            .ok_or_else(|| GatewayError::write_msg(path.clone(), "does not exist"))
    }

    async fn to_lookup(
        &self,
        path: SafPath,
        resolved: &Resolved,
    ) -> GatewayResult<APathLookup<SafPath>> {
        let document = &resolved.document;
        if !document.readable {
            return Err(GatewayError::read_msg(path, "not readable"));
        }
        let stat = self
            .provider
            .stat(&resolved.tree, &document.document_id)
            .await
            .map_err(|e| GatewayError::read(path.clone(), e))?
            .unwrap_or_default();
        Ok(APathLookup {
            lookedup: path,
            file_type: if document.is_directory() {
                FileType::Directory
            } else {
                FileType::File
            },
            size: document.size,
            modified_at: document.last_modified,
            ownership: stat.ownership,
            permissions: stat.permissions,
            target: None,
        })
    }

    async fn children(&self, path: &SafPath) -> GatewayResult<(Resolved, Vec<Document>)> {
        let resolved = self.resolve_for_read(path).await?;
        if !resolved.document.is_directory() {
            return Err(GatewayError::read_msg(path.clone(), "not a directory"));
        }
        let children = self
            .provider
            .list_children(&resolved.tree, &resolved.document.document_id)
            .await
            .map_err(|e| GatewayError::read(path.clone(), e))?;
        Ok((resolved, children))
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Create `path` with `mime_type`, inserting missing directories on the way.
    async fn create_chain(&self, path: &SafPath, mime_type: &str) -> GatewayResult<Document> {
        let matched = self.grant_for(path).await?;
        let Some((target_name, parents)) = matched.missing.split_last() else {
            return Err(GatewayError::write_msg(
                path.clone(),
                "can't create the root of a grant",
            ));
        };
        let tree = matched.grant.uri;
        let fail = |e: ProviderError| GatewayError::write(path.clone(), e);

        let mut parent = self.provider.tree_root(&tree).await.map_err(fail)?;
        for name in parents {
            let children = self
                .provider
                .list_children(&tree, &parent.document_id)
                .await
                .map_err(fail)?;
            parent = match children.into_iter().find(|c| c.name() == *name) {
                Some(existing) if existing.is_directory() => existing,
                Some(_) => {
                    return Err(GatewayError::write_msg(
                        path.clone(),
                        format!("{name} is not a directory"),
                    ));
                }
                None => {
                    debug!(%path, parent = %name, "creating parent directory");
                    self.create_named(path, &tree, &parent, DIRECTORY_MIME, name)
                        .await?
                }
            };
        }

        let siblings = self
            .provider
            .list_children(&tree, &parent.document_id)
            .await
            .map_err(fail)?;
        if siblings.iter().any(|c| c.name() == *target_name) {
            return Err(GatewayError::write_msg(path.clone(), "already exists"));
        }
        self.create_named(path, &tree, &parent, mime_type, target_name)
            .await
    }

    async fn create_named(
        &self,
        path: &SafPath,
        tree: &TreeUri,
        parent: &Document,
        mime_type: &str,
        name: &str,
    ) -> GatewayResult<Document> {
        let created = self
            .provider
            .create_document(tree, &parent.document_id, mime_type, name)
            .await
            .map_err(|e| GatewayError::write(path.clone(), e))?;
        if created.name() != name {
            warn!(%path, wanted = name, got = %created.name(), "provider renamed new document");
            return Err(GatewayError::write_msg(
                path.clone(),
                format!("wanted {name}, provider created {}", created.name()),
            ));
        }
        Ok(created)
    }
}

#[async_trait]
impl APathGateway for SafGateway {
    type Path = SafPath;

    async fn lookup(&self, path: &SafPath) -> GatewayResult<APathLookup<SafPath>> {
        let resolved = self.resolve_for_read(path).await?;
        self.to_lookup(path.clone(), &resolved).await
    }

    async fn list_files(&self, path: &SafPath) -> GatewayResult<Vec<SafPath>> {
        let (_, children) = self.children(path).await?;
        Ok(children.iter().map(|c| path.child([c.name()])).collect())
    }

    async fn lookup_files(&self, path: &SafPath) -> GatewayResult<Vec<APathLookup<SafPath>>> {
        let (parent, children) = self.children(path).await?;
        let mut lookups = Vec::with_capacity(children.len());
        for document in children {
            let child = path.child([document.name()]);
            let resolved = Resolved {
                tree: parent.tree.clone(),
                document,
            };
            lookups.push(self.to_lookup(child, &resolved).await?);
        }
        Ok(lookups)
    }

    async fn exists(&self, path: &SafPath) -> GatewayResult<bool> {
        Ok(self.find(path).await?.is_some())
    }

    async fn can_read(&self, path: &SafPath) -> GatewayResult<bool> {
        match self.find(path).await {
            Ok(found) => Ok(found.is_some_and(|r| r.document.readable)),
            Err(GatewayError::MissingCapabilityGrant { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn can_write(&self, path: &SafPath) -> GatewayResult<bool> {
        match self.find(path).await {
            Ok(found) => Ok(found.is_some_and(|r| r.document.writable)),
            Err(GatewayError::MissingCapabilityGrant { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn read(&self, path: &SafPath) -> GatewayResult<GatewayReader> {
        let resolved = self.resolve_for_read(path).await?;
        if resolved.document.is_directory() {
            return Err(GatewayError::read_msg(path.clone(), "is a directory"));
        }
        let reader = self
            .provider
            .open_read(&resolved.tree, &resolved.document.document_id)
            .await
            .map_err(|e| GatewayError::read(path.clone(), e))?;
        Ok(GatewayReader::new(reader))
    }

    async fn create_dir(&self, path: &SafPath) -> GatewayResult<bool> {
        match self.find(path).await? {
            Some(r) if r.document.is_directory() => Ok(false),
            Some(_) => Err(GatewayError::write_msg(path.clone(), "exists but is a file")),
            None => {
                self.create_chain(path, DIRECTORY_MIME).await?;
                debug!(%path, "created directory");
                Ok(true)
            }
        }
    }

    async fn create_file(&self, path: &SafPath) -> GatewayResult<bool> {
        match self.find(path).await? {
            Some(r) if r.document.is_directory() => Err(GatewayError::write_msg(
                path.clone(),
                "exists but is a directory",
            )),
            Some(_) => Ok(false),
            None => {
                self.create_chain(path, &self.config.default_file_mime)
                    .await?;
                debug!(%path, "created file");
                Ok(true)
            }
        }
    }

    async fn write(&self, path: &SafPath) -> GatewayResult<GatewayWriter> {
        let resolved = match self.find(path).await? {
            Some(resolved) => resolved,
            None => {
                let document = self
                    .create_chain(path, &self.config.default_file_mime)
                    .await?;
                Resolved {
                    tree: self.grant_for(path).await?.grant.uri,
                    document,
                }
            }
        };
        if resolved.document.is_directory() {
            return Err(GatewayError::write_msg(path.clone(), "is a directory"));
        }
        let writer = self
            .provider
            .open_write(&resolved.tree, &resolved.document.document_id)
            .await
            .map_err(|e| GatewayError::write(path.clone(), e))?;
        Ok(GatewayWriter::new(writer))
    }

    async fn delete(&self, path: &SafPath) -> GatewayResult<()> {
        let Some(resolved) = self.find(path).await? else {
            warn!(%path, "tried to delete document, but it's already gone");
            return Ok(());
        };
        let document = &resolved.document;
        if document.is_directory() {
            let children = self
                .provider
                .list_children(&resolved.tree, &document.document_id)
                .await
                .map_err(|e| GatewayError::write(path.clone(), e))?;
            if !children.is_empty() {
                return Err(GatewayError::write_msg(path.clone(), "directory not empty"));
            }
        }
        match self
            .provider
            .delete_document(&resolved.tree, &document.document_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(ProviderError::NotFound(_)) => {
                warn!(%path, "tried to delete document, but it's already gone");
                Ok(())
            }
            Err(e) => Err(GatewayError::write(path.clone(), e)),
        }
    }

    async fn create_symlink(&self, link: &SafPath, _target: &SafPath) -> GatewayResult<()> {
        Err(GatewayError::unsupported("create_symlink", link.clone()))
    }

    async fn set_modified_at(&self, path: &SafPath, modified_at: SystemTime) -> GatewayResult<()> {
        let resolved = self.resolve_for_write(path).await?;
        self.provider
            .set_last_modified(&resolved.tree, &resolved.document.document_id, modified_at)
            .await
            .map_err(|e| GatewayError::write(path.clone(), e))
    }

    async fn set_permissions(&self, path: &SafPath, permissions: Permissions) -> GatewayResult<()> {
        let resolved = self.resolve_for_write(path).await?;
        self.provider
            .set_permissions(&resolved.tree, &resolved.document.document_id, permissions)
            .await
            .map_err(|e| GatewayError::write(path.clone(), e))
    }

    async fn set_ownership(&self, path: &SafPath, ownership: Ownership) -> GatewayResult<()> {
        let resolved = self.resolve_for_write(path).await?;
        self.provider
            .set_ownership(&resolved.tree, &resolved.document.document_id, ownership)
            .await
            .map_err(|e| GatewayError::write(path.clone(), e))
    }

    fn shared_resource(&self) -> &SharedResource<KeepAlive> {
        &self.keep_alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const AUTHORITY: &str = "com.android.externalstorage.documents";

    fn setup(grant: &str) -> (SafGateway, MemoryDocumentProvider, SafPath) {
        let provider = MemoryDocumentProvider::new(AUTHORITY);
        provider.insert_dir("primary:");
        provider.insert_dir(grant);
        let store = MemoryPermissionStore::new()
            .with_grant(UriPermission::full(provider.tree(grant).unwrap()));
        let gateway = SafGateway::new(
            Arc::new(provider.clone()),
            Arc::new(store),
            SafConfig::default(),
        );
        let volume = SafPath::new(provider.tree("primary:").unwrap(), Vec::new());
        (gateway, provider, volume)
    }

    #[tokio::test]
    async fn test_create_dir_below_grant() {
        let (gateway, provider, volume) = setup("primary:Android/data");
        let target = volume.child(["Android", "data", "com.app", "files"]);

        assert!(gateway.create_dir(&target).await.unwrap());
        assert!(provider.document("primary:Android/data/com.app").is_some());
        assert!(gateway.exists(&target).await.unwrap());
        assert!(!gateway.create_dir(&target).await.unwrap());

        let looked = gateway.lookup(&target).await.unwrap();
        assert_eq!(looked.file_type, FileType::Directory);
        assert_eq!(looked.lookedup, target);
    }

    #[tokio::test]
    async fn test_missing_grant() {
        let (gateway, _provider, volume) = setup("primary:Android/data");
        let outside = volume.child(["DCIM"]);

        let err = gateway.lookup(&outside).await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingCapabilityGrant { .. }));
        assert!(!gateway.can_read(&outside).await.unwrap());
        assert!(!gateway.can_write(&outside).await.unwrap());
        assert!(!gateway.has_permission(&outside).await);
    }

    #[tokio::test]
    async fn test_list_files_derives_missing_names() {
        let (gateway, provider, volume) = setup("primary:");
        provider.insert_file("primary:Download/a.txt", "a");
        provider.insert_file("primary:Download/b.txt", "b");
        provider.clear_display_name("primary:Download/b.txt");

        let dir = volume.child(["Download"]);
        let children = gateway.list_files(&dir).await.unwrap();
        assert_eq!(children, vec![dir.child(["a.txt"]), dir.child(["b.txt"])]);

        let lookups = gateway.lookup_files(&dir).await.unwrap();
        assert_eq!(lookups.len(), 2);
        assert!(lookups.iter().all(|l| l.is_file()));
        assert_eq!(lookups[0].size, 1);
    }

    #[tokio::test]
    async fn test_write_read_roundtrip_creates_file() {
        let (gateway, provider, volume) = setup("primary:");
        let file = volume.child(["notes", "today.txt"]);

        let mut writer = gateway.write(&file).await.unwrap();
        writer.write_all(b"hello").await.unwrap();
        writer.shutdown().await.unwrap();
        assert_eq!(provider.content("primary:notes/today.txt").unwrap(), b"hello");

        let mut reader = gateway.read(&file).await.unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn test_create_file_existing_and_wrong_type() {
        let (gateway, _provider, volume) = setup("primary:");
        let file = volume.child(["f"]);
        assert!(gateway.create_file(&file).await.unwrap());
        assert!(!gateway.create_file(&file).await.unwrap());
        assert!(gateway.create_dir(&file).await.is_err());

        let err = gateway.create_file(&volume).await.unwrap_err();
        assert!(matches!(err, GatewayError::WriteFailure { .. }));
    }

    #[tokio::test]
    async fn test_unreadable_lookup_fails() {
        let (gateway, provider, volume) = setup("primary:");
        provider.insert_file("primary:secret", "x");
        provider.set_access("primary:secret", false, false);

        let secret = volume.child(["secret"]);
        assert!(gateway.exists(&secret).await.unwrap());
        assert!(!gateway.can_read(&secret).await.unwrap());
        let err = gateway.lookup(&secret).await.unwrap_err();
        assert!(matches!(err, GatewayError::ReadFailure { .. }));
    }

    #[tokio::test]
    async fn test_delete() {
        let (gateway, _provider, volume) = setup("primary:");
        let dir = volume.child(["d"]);
        let file = dir.child(["f"]);
        gateway.create_file(&file).await.unwrap();

        assert!(gateway.delete(&dir).await.is_err());
        gateway.delete(&file).await.unwrap();
        gateway.delete(&dir).await.unwrap();
        assert!(!gateway.exists(&dir).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_document_succeeds() {
        let (gateway, provider, volume) = setup("primary:");
        gateway.delete(&volume.child(["gone"])).await.unwrap();
        gateway.delete(&volume.child(["no", "such", "dir"])).await.unwrap();
        assert!(provider.document("primary:gone").is_none());
    }

    #[tokio::test]
    async fn test_symlinks_unsupported() {
        let (gateway, _provider, volume) = setup("primary:");
        let err = gateway
            .create_symlink(&volume.child(["l"]), &volume.child(["t"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::UnsupportedOperation {
                operation: "create_symlink",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_metadata_through_stat() {
        let (gateway, _provider, volume) = setup("primary:");
        let file = volume.child(["m"]);
        gateway.create_file(&file).await.unwrap();
        assert_eq!(gateway.lookup(&file).await.unwrap().permissions, None);

        gateway
            .set_permissions(&file, Permissions::new(0o640))
            .await
            .unwrap();
        gateway
            .set_ownership(&file, Ownership::new(1000, 1000))
            .await
            .unwrap();
        let when = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(42);
        gateway.set_modified_at(&file, when).await.unwrap();

        let looked = gateway.lookup(&file).await.unwrap();
        assert_eq!(looked.permissions, Some(Permissions::new(0o640)));
        assert_eq!(looked.ownership, Some(Ownership::new(1000, 1000)));
        assert_eq!(looked.modified_at, when);
    }

    #[tokio::test]
    async fn test_take_and_release_permission() {
        let (gateway, provider, volume) = setup("primary:Android/data");
        let dcim = provider.tree("primary:DCIM").unwrap();
        provider.insert_dir("primary:DCIM");
        let photos = volume.child(["DCIM"]);

        assert!(!gateway.has_permission(&photos).await);
        gateway.take_permission(&dcim).await.unwrap();
        assert!(gateway.has_permission(&photos).await);
        assert_eq!(gateway.permissions().await.len(), 2);

        gateway.release_permission(&dcim).await.unwrap();
        assert!(!gateway.has_permission(&photos).await);
        assert_eq!(
            match_permission(&gateway.permissions().await, &photos.child(["x"])),
            None
        );
    }
}
