//! Content-provider client interface.
//!
//! Documents live in trees rooted at a [`TreeUri`]. A provider only resolves
//! documents inside the tree it is asked about.

use std::time::SystemTime;

use async_trait::async_trait;
use pathgate_types::{Ownership, Permissions, TreeUri};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// MIME type the provider uses for directories.
pub const DIRECTORY_MIME: &str = "vnd.android.document/directory";

/// Error reported by a content provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("provider I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("provider error: {0}")]
    Other(String),
}

/// Provider result type.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// One row of a provider query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub document_id: String,
    /// Absent for providers that don't report one.
    pub display_name: Option<String>,
    pub mime_type: String,
    pub size: u64,
    pub last_modified: SystemTime,
    pub readable: bool,
    pub writable: bool,
}

impl Document {
    pub fn is_directory(&self) -> bool {
        self.mime_type == DIRECTORY_MIME
    }

    /// Display name, or the last component of the document id.
    pub fn name(&self) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        let id = self.document_id.as_str();
        let relative = id.split_once(':').map(|(_, rel)| rel).unwrap_or(id);
        relative
            .rsplit('/')
            .next()
            .unwrap_or(relative)
            .to_string()
    }
}

/// POSIX-ish details some providers can report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStat {
    pub ownership: Option<Ownership>,
    pub permissions: Option<Permissions>,
}

/// Client for a content provider's document API.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// The document at the top of `tree`.
    async fn tree_root(&self, tree: &TreeUri) -> ProviderResult<Document>;

    /// Direct children of a directory document.
    async fn list_children(&self, tree: &TreeUri, parent_id: &str) -> ProviderResult<Vec<Document>>;

    /// Create a document below `parent_id`.
    ///
    /// Providers may pick a different name than requested when the name is
    /// taken; callers check [`Document::name`] on the result.
    async fn create_document(
        &self,
        tree: &TreeUri,
        parent_id: &str,
        mime_type: &str,
        display_name: &str,
    ) -> ProviderResult<Document>;

    async fn delete_document(&self, tree: &TreeUri, document_id: &str) -> ProviderResult<()>;

    async fn open_read(
        &self,
        tree: &TreeUri,
        document_id: &str,
    ) -> ProviderResult<Box<dyn AsyncRead + Send + Unpin>>;

    /// Open for writing, truncating existing content.
    async fn open_write(
        &self,
        tree: &TreeUri,
        document_id: &str,
    ) -> ProviderResult<Box<dyn AsyncWrite + Send + Unpin>>;

    async fn set_last_modified(
        &self,
        tree: &TreeUri,
        document_id: &str,
        modified_at: SystemTime,
    ) -> ProviderResult<()>;

    async fn set_permissions(
        &self,
        tree: &TreeUri,
        document_id: &str,
        permissions: Permissions,
    ) -> ProviderResult<()>;

    async fn set_ownership(
        &self,
        tree: &TreeUri,
        document_id: &str,
        ownership: Ownership,
    ) -> ProviderResult<()>;

    /// Ownership and mode bits, when the provider exposes them.
    async fn stat(&self, tree: &TreeUri, document_id: &str) -> ProviderResult<Option<DocumentStat>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, name: Option<&str>) -> Document {
        Document {
            document_id: id.to_string(),
            display_name: name.map(str::to_string),
            mime_type: "text/plain".to_string(),
            size: 0,
            last_modified: SystemTime::UNIX_EPOCH,
            readable: true,
            writable: true,
        }
    }

    #[test]
    fn test_name_falls_back_to_document_id() {
        assert_eq!(doc("primary:a/b/c.txt", Some("shown")).name(), "shown");
        assert_eq!(doc("primary:a/b/c.txt", None).name(), "c.txt");
        assert_eq!(doc("primary:top", None).name(), "top");
        assert_eq!(doc("opaque-id", None).name(), "opaque-id");
    }

    #[test]
    fn test_directory_mime() {
        let mut d = doc("primary:a", None);
        assert!(!d.is_directory());
        d.mime_type = DIRECTORY_MIME.to_string();
        assert!(d.is_directory());
    }
}
