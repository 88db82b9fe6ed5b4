//! In-process privileged peer.
//!
//! Executes peer operations directly in this process. This is the host side
//! of the privileged protocol; used on its own it is useful when the process
//! already runs elevated, and in tests.

use std::time::SystemTime;

use async_trait::async_trait;
use pathgate_types::{APathLookup, LocalPath, Ownership, Permissions};
use tokio::io::{AsyncRead, AsyncWrite};

use super::direct;
use super::peer::{PeerResult, PrivilegedPeer, PrivilegedPeerConnector};

/// Runs operations with this process's own rights.
#[derive(Debug, Default, Clone)]
pub struct HostPeer;

#[async_trait]
impl PrivilegedPeer for HostPeer {
    async fn is_alive(&self) -> bool {
        true
    }

    async fn look_up(&self, path: &LocalPath) -> PeerResult<APathLookup<LocalPath>> {
        Ok(direct::lookup(path).await?)
    }

    async fn list_files(&self, path: &LocalPath) -> PeerResult<Vec<LocalPath>> {
        Ok(direct::list(path).await?)
    }

    async fn lookup_files(&self, path: &LocalPath) -> PeerResult<Vec<APathLookup<LocalPath>>> {
        Ok(direct::lookup_files(path).await?)
    }

    async fn exists(&self, path: &LocalPath) -> PeerResult<bool> {
        Ok(direct::exists(path.as_path()).await)
    }

    async fn can_read(&self, path: &LocalPath) -> PeerResult<bool> {
        Ok(direct::readable(path.as_path()).await)
    }

    async fn can_write(&self, path: &LocalPath) -> PeerResult<bool> {
        Ok(direct::writable(path.as_path()).await)
    }

    async fn read_file(&self, path: &LocalPath) -> PeerResult<Box<dyn AsyncRead + Send + Unpin>> {
        Ok(Box::new(direct::open_read(path).await?))
    }

    async fn write_file(&self, path: &LocalPath) -> PeerResult<Box<dyn AsyncWrite + Send + Unpin>> {
        Ok(Box::new(direct::open_write(path).await?))
    }

    async fn mkdirs(&self, path: &LocalPath) -> PeerResult<bool> {
        Ok(direct::mkdirs(path).await?)
    }

    async fn create_new_file(&self, path: &LocalPath) -> PeerResult<bool> {
        Ok(direct::create_new_file(path).await?)
    }

    async fn delete(&self, path: &LocalPath) -> PeerResult<bool> {
        direct::delete(path).await?;
        Ok(true)
    }

    async fn create_symlink(&self, link: &LocalPath, target: &LocalPath) -> PeerResult<bool> {
        direct::create_symlink(link, target).await?;
        Ok(true)
    }

    async fn set_modified_at(&self, path: &LocalPath, modified_at: SystemTime) -> PeerResult<bool> {
        direct::set_modified_at(path, modified_at).await?;
        Ok(true)
    }

    async fn set_permissions(&self, path: &LocalPath, permissions: Permissions) -> PeerResult<bool> {
        direct::set_permissions(path, permissions).await?;
        Ok(true)
    }

    async fn set_ownership(&self, path: &LocalPath, ownership: Ownership) -> PeerResult<bool> {
        direct::set_ownership(path, ownership).await?;
        Ok(true)
    }
}

/// Hands out [`HostPeer`] sessions.
#[derive(Debug, Clone)]
pub struct HostPeerConnector {
    available: bool,
}

impl HostPeerConnector {
    pub fn new(available: bool) -> Self {
        Self { available }
    }

    /// Available when the process runs as root.
    pub fn detect() -> Self {
        Self::new(nix::unistd::geteuid().is_root())
    }
}

#[async_trait]
impl PrivilegedPeerConnector for HostPeerConnector {
    async fn is_available(&self) -> PeerResult<bool> {
        Ok(self.available)
    }

    async fn connect(&self) -> PeerResult<Box<dyn PrivilegedPeer>> {
        Ok(Box::new(HostPeer))
    }
}
