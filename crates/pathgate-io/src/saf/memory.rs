//! In-memory content provider and grant store.
//!
//! Document ids follow the external storage provider's scheme:
//! `<volume>:<relative/path>`, with `<volume>:` as the volume root.

use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;
use pathgate_types::{Ownership, PathResult, Permissions, TreeUri};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

use super::permission::{PermissionStore, UriPermission};
use super::provider::{
    DIRECTORY_MIME, Document, DocumentProvider, DocumentStat, ProviderError, ProviderResult,
};

#[derive(Debug, Clone)]
struct Node {
    document: Document,
    content: Vec<u8>,
    stat: Option<DocumentStat>,
}

type Nodes = Arc<Mutex<BTreeMap<String, Node>>>;

fn child_id(parent_id: &str, name: &str) -> String {
    if parent_id.ends_with(':') {
        format!("{parent_id}{name}")
    } else {
        format!("{parent_id}/{name}")
    }
}

fn parent_id(id: &str) -> Option<String> {
    if let Some((parent, _)) = id.rsplit_once('/') {
        return Some(parent.to_string());
    }
    match id.split_once(':') {
        Some((volume, rest)) if !rest.is_empty() => Some(format!("{volume}:")),
        _ => None,
    }
}

fn leaf_name(id: &str) -> String {
    id.rsplit(['/', ':']).next().unwrap_or(id).to_string()
}

/// Content provider holding documents in memory.
#[derive(Debug, Clone)]
pub struct MemoryDocumentProvider {
    authority: String,
    nodes: Nodes,
}

impl MemoryDocumentProvider {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            nodes: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Tree URI for `document_id` on this provider.
    pub fn tree(&self, document_id: &str) -> PathResult<TreeUri> {
        TreeUri::from_document_id(&self.authority, document_id)
    }

    /// Add a directory and any missing parents (volume roots included).
    pub fn insert_dir(&self, document_id: &str) {
        let mut nodes = self.nodes.lock();
        Self::ensure_dir(&mut nodes, document_id);
    }

    /// Add a file with `content`, creating missing parents.
    pub fn insert_file(&self, document_id: &str, content: impl Into<Vec<u8>>) {
        let content = content.into();
        let mut nodes = self.nodes.lock();
        if let Some(parent) = parent_id(document_id) {
            Self::ensure_dir(&mut nodes, &parent);
        }
        nodes.insert(
            document_id.to_string(),
            Node {
                document: Document {
                    document_id: document_id.to_string(),
                    display_name: Some(leaf_name(document_id)),
                    mime_type: "application/octet-stream".to_string(),
                    size: content.len() as u64,
                    last_modified: SystemTime::now(),
                    readable: true,
                    writable: true,
                },
                content,
                stat: None,
            },
        );
    }

    /// Change what the provider reports as readable/writable.
    pub fn set_access(&self, document_id: &str, readable: bool, writable: bool) {
        if let Some(node) = self.nodes.lock().get_mut(document_id) {
            node.document.readable = readable;
            node.document.writable = writable;
        }
    }

    /// Drop the display name so clients must derive names from ids.
    pub fn clear_display_name(&self, document_id: &str) {
        if let Some(node) = self.nodes.lock().get_mut(document_id) {
            node.document.display_name = None;
        }
    }

    pub fn document(&self, document_id: &str) -> Option<Document> {
        self.nodes
            .lock()
            .get(document_id)
            .map(|n| n.document.clone())
    }

    pub fn content(&self, document_id: &str) -> Option<Vec<u8>> {
        self.nodes.lock().get(document_id).map(|n| n.content.clone())
    }

    fn ensure_dir(nodes: &mut BTreeMap<String, Node>, document_id: &str) {
        if nodes.contains_key(document_id) {
            return;
        }
        if let Some(parent) = parent_id(document_id) {
            Self::ensure_dir(nodes, &parent);
        }
        let display_name = parent_id(document_id).map(|_| leaf_name(document_id));
        nodes.insert(
            document_id.to_string(),
            Node {
                document: Document {
                    document_id: document_id.to_string(),
                    display_name,
                    mime_type: DIRECTORY_MIME.to_string(),
                    size: 0,
                    last_modified: SystemTime::now(),
                    readable: true,
                    writable: true,
                },
                content: Vec::new(),
                stat: None,
            },
        );
    }

    /// Check that `document_id` is inside `tree` on this provider.
    fn check_scope(&self, tree: &TreeUri, document_id: &str) -> ProviderResult<()> {
        if tree.authority() != self.authority {
            return Err(ProviderError::PermissionDenied(format!(
                "{tree} is not served by {}",
                self.authority
            )));
        }
        let root = tree.document_id();
        if document_id == root || document_id.starts_with(&child_id(&root, "")) {
            Ok(())
        } else {
            Err(ProviderError::PermissionDenied(format!(
                "{document_id} is outside {tree}"
            )))
        }
    }

    fn with_node<T>(
        &self,
        tree: &TreeUri,
        document_id: &str,
        f: impl FnOnce(&mut Node) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        self.check_scope(tree, document_id)?;
        let mut nodes = self.nodes.lock();
        let node = nodes
            .get_mut(document_id)
            .ok_or_else(|| ProviderError::NotFound(document_id.to_string()))?;
        f(node)
    }
}

#[async_trait]
impl DocumentProvider for MemoryDocumentProvider {
    async fn tree_root(&self, tree: &TreeUri) -> ProviderResult<Document> {
        let root = tree.document_id();
        self.with_node(tree, &root, |node| Ok(node.document.clone()))
    }

    async fn list_children(&self, tree: &TreeUri, parent: &str) -> ProviderResult<Vec<Document>> {
        self.check_scope(tree, parent)?;
        let nodes = self.nodes.lock();
        let node = nodes
            .get(parent)
            .ok_or_else(|| ProviderError::NotFound(parent.to_string()))?;
        if !node.document.is_directory() {
            return Err(ProviderError::Other(format!("{parent} is not a directory")));
        }
        let parent = Some(parent.to_string());
        Ok(nodes
            .iter()
            .filter(|(id, _)| parent_id(id) == parent)
            .map(|(_, n)| n.document.clone())
            .collect())
    }

    async fn create_document(
        &self,
        tree: &TreeUri,
        parent: &str,
        mime_type: &str,
        display_name: &str,
    ) -> ProviderResult<Document> {
        self.check_scope(tree, parent)?;
        let mut nodes = self.nodes.lock();
        match nodes.get(parent) {
            Some(node) if node.document.is_directory() => {}
            Some(_) => return Err(ProviderError::Other(format!("{parent} is not a directory"))),
            None => return Err(ProviderError::NotFound(parent.to_string())),
        }

        // Taken names get a counter suffix, like the platform provider does.
        let mut name = display_name.to_string();
        let mut n = 1;
        while nodes.contains_key(&child_id(parent, &name)) {
            name = format!("{display_name} ({n})");
            n += 1;
        }

        let document = Document {
            document_id: child_id(parent, &name),
            display_name: Some(name),
            mime_type: mime_type.to_string(),
            size: 0,
            last_modified: SystemTime::now(),
            readable: true,
            writable: true,
        };
        trace!(id = %document.document_id, "created document");
        nodes.insert(
            document.document_id.clone(),
            Node {
                document: document.clone(),
                content: Vec::new(),
                stat: None,
            },
        );
        Ok(document)
    }

    async fn delete_document(&self, tree: &TreeUri, document_id: &str) -> ProviderResult<()> {
        self.check_scope(tree, document_id)?;
        let mut nodes = self.nodes.lock();
        if nodes.remove(document_id).is_none() {
            return Err(ProviderError::NotFound(document_id.to_string()));
        }
        let below = child_id(document_id, "");
        nodes.retain(|id, _| !id.starts_with(&below));
        Ok(())
    }

    async fn open_read(
        &self,
        tree: &TreeUri,
        document_id: &str,
    ) -> ProviderResult<Box<dyn AsyncRead + Send + Unpin>> {
        self.with_node(tree, document_id, |node| {
            if node.document.is_directory() {
                return Err(ProviderError::Other(format!("{document_id} is a directory")));
            }
            if !node.document.readable {
                return Err(ProviderError::PermissionDenied(document_id.to_string()));
            }
            Ok(Box::new(io::Cursor::new(node.content.clone())) as Box<dyn AsyncRead + Send + Unpin>)
        })
    }

    async fn open_write(
        &self,
        tree: &TreeUri,
        document_id: &str,
    ) -> ProviderResult<Box<dyn AsyncWrite + Send + Unpin>> {
        self.with_node(tree, document_id, |node| {
            if node.document.is_directory() {
                return Err(ProviderError::Other(format!("{document_id} is a directory")));
            }
            if !node.document.writable {
                return Err(ProviderError::PermissionDenied(document_id.to_string()));
            }
            node.content.clear();
            node.document.size = 0;
            node.document.last_modified = SystemTime::now();
            Ok(())
        })?;
        Ok(Box::new(MemoryWriter {
            nodes: self.nodes.clone(),
            document_id: document_id.to_string(),
        }))
    }

    async fn set_last_modified(
        &self,
        tree: &TreeUri,
        document_id: &str,
        modified_at: SystemTime,
    ) -> ProviderResult<()> {
        self.with_node(tree, document_id, |node| {
            node.document.last_modified = modified_at;
            Ok(())
        })
    }

    async fn set_permissions(
        &self,
        tree: &TreeUri,
        document_id: &str,
        permissions: Permissions,
    ) -> ProviderResult<()> {
        self.with_node(tree, document_id, |node| {
            node.stat.get_or_insert_with(DocumentStat::default).permissions = Some(permissions);
            Ok(())
        })
    }

    async fn set_ownership(
        &self,
        tree: &TreeUri,
        document_id: &str,
        ownership: Ownership,
    ) -> ProviderResult<()> {
        self.with_node(tree, document_id, |node| {
            node.stat.get_or_insert_with(DocumentStat::default).ownership = Some(ownership);
            Ok(())
        })
    }

    async fn stat(&self, tree: &TreeUri, document_id: &str) -> ProviderResult<Option<DocumentStat>> {
        self.with_node(tree, document_id, |node| Ok(node.stat.clone()))
    }
}

/// Appends straight into the shared node.
struct MemoryWriter {
    nodes: Nodes,
    document_id: String,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut nodes = self.nodes.lock();
        let Some(node) = nodes.get_mut(&self.document_id) else {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} was deleted", self.document_id),
            )));
        };
        node.content.extend_from_slice(buf);
        node.document.size = node.content.len() as u64;
        node.document.last_modified = SystemTime::now();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Grant store backed by a list.
#[derive(Debug, Default, Clone)]
pub struct MemoryPermissionStore {
    grants: Arc<Mutex<Vec<UriPermission>>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grant(self, grant: UriPermission) -> Self {
        self.grants.lock().push(grant);
        self
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn persisted_permissions(&self) -> Vec<UriPermission> {
        self.grants.lock().clone()
    }

    async fn take_permission(&self, uri: &TreeUri) -> ProviderResult<UriPermission> {
        let grant = UriPermission::full(uri.clone());
        let mut grants = self.grants.lock();
        grants.retain(|g| &g.uri != uri);
        grants.push(grant.clone());
        Ok(grant)
    }

    async fn release_permission(&self, uri: &TreeUri) -> ProviderResult<()> {
        self.grants.lock().retain(|g| &g.uri != uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const AUTHORITY: &str = "com.android.externalstorage.documents";

    fn setup() -> (MemoryDocumentProvider, TreeUri) {
        let provider = MemoryDocumentProvider::new(AUTHORITY);
        provider.insert_dir("primary:");
        let tree = provider.tree("primary:").unwrap();
        (provider, tree)
    }

    #[test]
    fn test_parent_ids() {
        assert_eq!(parent_id("primary:a/b"), Some("primary:a".to_string()));
        assert_eq!(parent_id("primary:a"), Some("primary:".to_string()));
        assert_eq!(parent_id("primary:"), None);
        assert_eq!(child_id("primary:", "a"), "primary:a");
        assert_eq!(child_id("primary:a", "b"), "primary:a/b");
    }

    #[tokio::test]
    async fn test_listing_and_names() {
        let (provider, tree) = setup();
        provider.insert_file("primary:Download/b.txt", "b");
        provider.insert_file("primary:Download/a.txt", "a");
        provider.insert_file("primary:Download/deeper/c.txt", "c");

        let children = provider.list_children(&tree, "primary:Download").await.unwrap();
        let names: Vec<_> = children.iter().map(Document::name).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "deeper"]);
        assert!(children[2].is_directory());
    }

    #[tokio::test]
    async fn test_create_renames_on_collision() {
        let (provider, tree) = setup();
        provider.insert_file("primary:x", "");
        let created = provider
            .create_document(&tree, "primary:", "text/plain", "x")
            .await
            .unwrap();
        assert_eq!(created.name(), "x (1)");
    }

    #[tokio::test]
    async fn test_scope_is_enforced() {
        let provider = MemoryDocumentProvider::new(AUTHORITY);
        provider.insert_dir("primary:Android/data");
        provider.insert_file("primary:DCIM/photo.jpg", "jpg");
        let tree = provider.tree("primary:Android/data").unwrap();

        assert!(provider.tree_root(&tree).await.is_ok());
        let err = provider
            .open_read(&tree, "primary:DCIM/photo.jpg")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (provider, tree) = setup();
        provider.insert_file("primary:note.txt", "old content");

        let mut writer = provider.open_write(&tree, "primary:note.txt").await.unwrap();
        writer.write_all(b"new").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut reader = provider.open_read(&tree, "primary:note.txt").await.unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "new");
        assert_eq!(provider.document("primary:note.txt").unwrap().size, 3);
    }

    #[tokio::test]
    async fn test_delete_removes_subtree() {
        let (provider, tree) = setup();
        provider.insert_file("primary:a/b/c", "");
        provider.insert_file("primary:ab", "");
        provider.delete_document(&tree, "primary:a").await.unwrap();
        assert!(provider.document("primary:a/b/c").is_none());
        assert!(provider.document("primary:ab").is_some());
    }

    #[tokio::test]
    async fn test_permission_store() {
        let store = MemoryPermissionStore::new();
        let uri = TreeUri::from_document_id(AUTHORITY, "primary:").unwrap();
        store.take_permission(&uri).await.unwrap();
        store.take_permission(&uri).await.unwrap();
        assert_eq!(store.persisted_permissions().await.len(), 1);
        store.release_permission(&uri).await.unwrap();
        assert!(store.persisted_permissions().await.is_empty());
    }
}
