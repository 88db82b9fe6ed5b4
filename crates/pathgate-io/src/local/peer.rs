//! Privileged peer interface.
//!
//! The peer is a separate process running with elevated rights (root shell,
//! system service). Only its client side is modelled here; transport and
//! protocol are up to the implementation.

use std::time::SystemTime;

use async_trait::async_trait;
use pathgate_types::{APathLookup, LocalPath, Ownership, Permissions};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Error reported by the privileged peer.
#[derive(Debug, Error)]
pub enum PeerError {
    /// The peer ran the operation and it failed there.
    #[error("peer I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer refused or returned something unusable.
    #[error("peer error: {0}")]
    Remote(String),

    /// The connection is gone.
    #[error("peer disconnected")]
    Disconnected,
}

/// Peer result type.
pub type PeerResult<T> = Result<T, PeerError>;

/// Operations the privileged peer executes on our behalf.
///
/// Boolean results follow the peer's native convention (`false` = the
/// operation did not take effect); the gateway turns them into errors.
#[async_trait]
pub trait PrivilegedPeer: Send + Sync {
    /// Liveness check; a dead peer is never handed out.
    async fn is_alive(&self) -> bool;

    async fn look_up(&self, path: &LocalPath) -> PeerResult<APathLookup<LocalPath>>;

    async fn list_files(&self, path: &LocalPath) -> PeerResult<Vec<LocalPath>>;

    async fn lookup_files(&self, path: &LocalPath) -> PeerResult<Vec<APathLookup<LocalPath>>>;

    async fn exists(&self, path: &LocalPath) -> PeerResult<bool>;

    async fn can_read(&self, path: &LocalPath) -> PeerResult<bool>;

    async fn can_write(&self, path: &LocalPath) -> PeerResult<bool>;

    async fn read_file(&self, path: &LocalPath) -> PeerResult<Box<dyn AsyncRead + Send + Unpin>>;

    async fn write_file(&self, path: &LocalPath) -> PeerResult<Box<dyn AsyncWrite + Send + Unpin>>;

    async fn mkdirs(&self, path: &LocalPath) -> PeerResult<bool>;

    async fn create_new_file(&self, path: &LocalPath) -> PeerResult<bool>;

    async fn delete(&self, path: &LocalPath) -> PeerResult<bool>;

    async fn create_symlink(&self, link: &LocalPath, target: &LocalPath) -> PeerResult<bool>;

    async fn set_modified_at(&self, path: &LocalPath, modified_at: SystemTime) -> PeerResult<bool>;

    async fn set_permissions(&self, path: &LocalPath, permissions: Permissions) -> PeerResult<bool>;

    async fn set_ownership(&self, path: &LocalPath, ownership: Ownership) -> PeerResult<bool>;
}

/// Opens sessions with a privileged peer.
#[async_trait]
pub trait PrivilegedPeerConnector: Send + Sync {
    /// Whether privileged execution is possible at all on this device.
    ///
    /// The gateway asks once and remembers the answer.
    async fn is_available(&self) -> PeerResult<bool>;

    /// Open a new session.
    async fn connect(&self) -> PeerResult<Box<dyn PrivilegedPeer>>;
}
