//! Test doubles for the privileged route.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use pathgate_types::{APathLookup, FileType, LocalPath, Ownership, Permissions};
use tokio::io::{AsyncRead, AsyncWrite};

use super::peer::{PeerError, PeerResult, PrivilegedPeer, PrivilegedPeerConnector};

/// Peer with a fixed view of the world: every directory holds one file.
pub(crate) struct FakePeer;

pub(crate) fn fake_lookup(path: &LocalPath) -> APathLookup<LocalPath> {
    APathLookup {
        lookedup: path.clone(),
        file_type: FileType::File,
        size: 10,
        modified_at: SystemTime::UNIX_EPOCH,
        ownership: Some(Ownership::new(0, 0)),
        permissions: Some(Permissions::new(0o600)),
        target: None,
    }
}

#[async_trait]
impl PrivilegedPeer for FakePeer {
    async fn is_alive(&self) -> bool {
        true
    }
    async fn look_up(&self, path: &LocalPath) -> PeerResult<APathLookup<LocalPath>> {
        Ok(fake_lookup(path))
    }
    async fn list_files(&self, path: &LocalPath) -> PeerResult<Vec<LocalPath>> {
        Ok(vec![path.child(["from-peer"])])
    }
    async fn lookup_files(&self, path: &LocalPath) -> PeerResult<Vec<APathLookup<LocalPath>>> {
        Ok(vec![fake_lookup(&path.child(["from-peer"]))])
    }
    async fn exists(&self, _: &LocalPath) -> PeerResult<bool> {
        Ok(true)
    }
    async fn can_read(&self, _: &LocalPath) -> PeerResult<bool> {
        Ok(true)
    }
    async fn can_write(&self, _: &LocalPath) -> PeerResult<bool> {
        Ok(true)
    }
    async fn read_file(&self, _: &LocalPath) -> PeerResult<Box<dyn AsyncRead + Send + Unpin>> {
        Ok(Box::new(std::io::Cursor::new(b"privileged".to_vec())))
    }
    async fn write_file(&self, _: &LocalPath) -> PeerResult<Box<dyn AsyncWrite + Send + Unpin>> {
        Ok(Box::new(tokio::io::sink()))
    }
    async fn mkdirs(&self, _: &LocalPath) -> PeerResult<bool> {
        Ok(true)
    }
    async fn create_new_file(&self, _: &LocalPath) -> PeerResult<bool> {
        Ok(true)
    }
    async fn delete(&self, _: &LocalPath) -> PeerResult<bool> {
        Ok(true)
    }
    async fn create_symlink(&self, _: &LocalPath, _: &LocalPath) -> PeerResult<bool> {
        Ok(true)
    }
    async fn set_modified_at(&self, _: &LocalPath, _: SystemTime) -> PeerResult<bool> {
        Ok(true)
    }
    async fn set_permissions(&self, _: &LocalPath, _: Permissions) -> PeerResult<bool> {
        Ok(true)
    }
    async fn set_ownership(&self, _: &LocalPath, _: Ownership) -> PeerResult<bool> {
        Ok(false)
    }
}

/// Connector that counts privilege probes and connections.
#[derive(Default)]
pub(crate) struct CountingConnector {
    pub available: bool,
    pub broken_probe: bool,
    pub probes: AtomicUsize,
    pub connects: AtomicUsize,
}

impl CountingConnector {
    pub fn available() -> Arc<Self> {
        Arc::new(Self {
            available: true,
            ..Default::default()
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl PrivilegedPeerConnector for CountingConnector {
    async fn is_available(&self) -> PeerResult<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.broken_probe {
            return Err(PeerError::Remote("probe exploded".into()));
        }
        Ok(self.available)
    }

    async fn connect(&self) -> PeerResult<Box<dyn PrivilegedPeer>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePeer))
    }
}
