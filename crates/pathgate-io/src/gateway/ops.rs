//! Gateway operations trait.

use std::fmt::Display;
use std::time::SystemTime;

use async_trait::async_trait;
use pathgate_types::{APath, APathLookup, Ownership, Permissions};

use super::GatewayResult;
use super::stream::{GatewayReader, GatewayWriter};
use crate::sharedresource::{KeepAlive, SharedResource};

/// Core gateway operations.
///
/// Each gateway serves exactly one path variant (`Path`). The router,
/// [`GatewaySwitch`](crate::GatewaySwitch), serves [`APath`] and forwards to
/// the variant gateways.
///
/// Errors are [`GatewayError`](super::GatewayError)s; nothing is reported
/// through sentinel return values.
#[async_trait]
pub trait APathGateway: Send + Sync {
    /// Path variant this gateway understands.
    type Path: Clone + Display + Send + Sync + Into<APath> + 'static;

    // ========================================================================
    // Reading
    // ========================================================================

    /// Stat a single path.
    async fn lookup(&self, path: &Self::Path) -> GatewayResult<APathLookup<Self::Path>>;

    /// Direct children of a directory.
    async fn list_files(&self, path: &Self::Path) -> GatewayResult<Vec<Self::Path>>;

    /// Direct children of a directory, with metadata.
    async fn lookup_files(&self, path: &Self::Path) -> GatewayResult<Vec<APathLookup<Self::Path>>>;

    async fn exists(&self, path: &Self::Path) -> GatewayResult<bool>;

    async fn can_read(&self, path: &Self::Path) -> GatewayResult<bool>;

    async fn can_write(&self, path: &Self::Path) -> GatewayResult<bool>;

    /// Open a file for reading.
    async fn read(&self, path: &Self::Path) -> GatewayResult<GatewayReader>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Create a directory and any missing parents.
    ///
    /// Returns `false` when a directory already exists there.
    async fn create_dir(&self, path: &Self::Path) -> GatewayResult<bool>;

    /// Create an empty file, creating missing parent directories.
    ///
    /// Returns `false` when a file already exists there.
    async fn create_file(&self, path: &Self::Path) -> GatewayResult<bool>;

    /// Open a file for writing, truncating it.
    async fn write(&self, path: &Self::Path) -> GatewayResult<GatewayWriter>;

    /// Delete a file or an empty directory.
    async fn delete(&self, path: &Self::Path) -> GatewayResult<()>;

    /// Create a symbolic link at `link` pointing to `target`.
    async fn create_symlink(&self, link: &Self::Path, target: &Self::Path) -> GatewayResult<()>;

    async fn set_modified_at(&self, path: &Self::Path, modified_at: SystemTime)
    -> GatewayResult<()>;

    async fn set_permissions(&self, path: &Self::Path, permissions: Permissions)
    -> GatewayResult<()>;

    async fn set_ownership(&self, path: &Self::Path, ownership: Ownership) -> GatewayResult<()>;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Keep-alive anchor for the gateway's internal resources.
    ///
    /// While somebody holds a lease on it, expensive sessions opened by the
    /// gateway stay open between calls.
    fn shared_resource(&self) -> &SharedResource<KeepAlive>;
}
