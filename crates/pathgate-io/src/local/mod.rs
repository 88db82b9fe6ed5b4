//! Local filesystem gateway.
//!
//! Serves [`LocalPath`]s either directly, with this process's own rights, or
//! through a privileged peer. Each call picks a route from its [`Mode`]:
//!
//! - **Unprivileged** - direct I/O only
//! - **Privileged** - peer only; fails with `NoRouteAvailable` without one
//! - **Automatic** - a cheap probe decides; direct when it passes, otherwise
//!   escalate once if privileges are available
//!
//! ## Design Decisions
//!
//! - **Probe before privileges**: in automatic mode the privilege probe only
//!   runs after the direct probe came back negative.
//! - **Memoized availability**: whether privileges exist is asked once per
//!   gateway and remembered, including a failed probe (remembered as "no").
//! - **Session as child resource**: the peer session is a
//!   [`SharedResource`] adopted by the gateway's keep-alive, so it stays open
//!   between calls only while somebody keeps the gateway alive.

mod direct;
mod host;
mod peer;
#[cfg(test)]
mod testing;

use std::future::{Future, ready};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use pathgate_types::{APathLookup, LocalPath, Ownership, Permissions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use host::{HostPeer, HostPeerConnector};
pub use peer::{PeerError, PeerResult, PrivilegedPeer, PrivilegedPeerConnector};

use crate::config::LocalConfig;
use crate::gateway::{APathGateway, GatewayError, GatewayReader, GatewayResult, GatewayWriter};
use crate::sharedresource::{BoxError, KeepAlive, Lease, SharedResource};

/// Execution mode for local operations.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    #[default]
    Automatic,
    Unprivileged,
    Privileged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Direct,
    Privileged,
}

/// Which failure a backend error becomes.
#[derive(Clone, Copy)]
enum Side {
    Read,
    Write,
}

impl Side {
    fn fail(self, path: &LocalPath, cause: impl Into<BoxError>) -> GatewayError {
        match self {
            Side::Read => GatewayError::read(path.clone(), cause),
            Side::Write => GatewayError::write(path.clone(), cause),
        }
    }
}

type PeerSession = Box<dyn PrivilegedPeer>;

/// Gateway for conventional filesystem paths.
pub struct LocalGateway {
    config: LocalConfig,
    connector: Option<Arc<dyn PrivilegedPeerConnector>>,
    /// Privilege availability: `None` until probed.
    privileged: tokio::sync::Mutex<Option<bool>>,
    session: SharedResource<PeerSession>,
    keep_alive: SharedResource<KeepAlive>,
}

impl std::fmt::Debug for LocalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGateway")
            .field("config", &self.config)
            .field("connector", &self.connector.is_some())
            .field("session", &self.session)
            .finish()
    }
}

impl LocalGateway {
    /// Gateway without a privileged peer.
    pub fn new(config: LocalConfig) -> Self {
        Self::build(config, None)
    }

    /// Gateway that escalates through `connector`.
    pub fn with_connector(config: LocalConfig, connector: Arc<dyn PrivilegedPeerConnector>) -> Self {
        Self::build(config, Some(connector))
    }

    fn build(config: LocalConfig, connector: Option<Arc<dyn PrivilegedPeerConnector>>) -> Self {
        let factory_connector = connector.clone();
        let session = SharedResource::new("local:privileged-session", move || {
            let connector = factory_connector.clone();
            async move {
                let connector = connector.ok_or("no privileged peer configured")?;
                let peer = connector.connect().await?;
                if !peer.is_alive().await {
                    return Err(BoxError::from(PeerError::Disconnected));
                }
                Ok(peer)
            }
        });
        Self {
            config,
            connector,
            privileged: tokio::sync::Mutex::new(None),
            session,
            keep_alive: SharedResource::keep_alive("local-gateway"),
        }
    }

    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    /// Whether privileged execution is available. Probed once.
    pub async fn has_privileges(&self) -> bool {
        let mut memo = self.privileged.lock().await;
        if let Some(known) = *memo {
            return known;
        }
        let available = match &self.connector {
            None => false,
            Some(connector) => match connector.is_available().await {
                Ok(available) => available,
                Err(e) => {
                    warn!(error = %e, "privilege probe failed, treating as unavailable");
                    false
                }
            },
        };
        info!(available, "probed privileged access");
        *memo = Some(available);
        available
    }

    /// Pick a route. `probe` only runs in automatic mode.
    async fn route(
        &self,
        path: &LocalPath,
        mode: Mode,
        probe: impl Future<Output = bool>,
    ) -> GatewayResult<Route> {
        let direct = match mode {
            Mode::Unprivileged => true,
            Mode::Automatic => probe.await,
            Mode::Privileged => false,
        };
        if direct {
            return Ok(Route::Direct);
        }
        if self.has_privileges().await {
            if mode == Mode::Automatic {
                debug!(%path, "escalating to privileged route");
            }
            Ok(Route::Privileged)
        } else {
            Err(GatewayError::no_route(path.clone(), mode))
        }
    }

    /// Decide whether a failed direct attempt escalates.
    ///
    /// Permission problems without privileges mean no route exists; any
    /// other failure is reported as is.
    async fn escalate_after(
        &self,
        path: &LocalPath,
        mode: Mode,
        side: Side,
        error: std::io::Error,
    ) -> GatewayResult<()> {
        if mode == Mode::Unprivileged {
            return Err(side.fail(path, error));
        }
        if self.has_privileges().await {
            debug!(%path, error = %error, "direct attempt failed, escalating");
            return Ok(());
        }
        if error.kind() == std::io::ErrorKind::PermissionDenied {
            return Err(GatewayError::no_route(path.clone(), mode));
        }
        Err(side.fail(path, error))
    }

    async fn peer(&self, path: &LocalPath, side: Side) -> GatewayResult<Lease<PeerSession>> {
        self.keep_alive
            .add_child(&self.session)
            .await
            .map_err(|e| side.fail(path, e))?;
        self.session.get().await.map_err(|e| side.fail(path, e))
    }

    fn confirm(path: &LocalPath, done: bool, what: &str) -> GatewayResult<()> {
        if done {
            Ok(())
        } else {
            Err(GatewayError::write_msg(
                path.clone(),
                format!("privileged {what} had no effect"),
            ))
        }
    }

    // ========================================================================
    // Reading
    // ========================================================================

    pub async fn lookup_with_mode(
        &self,
        path: &LocalPath,
        mode: Mode,
    ) -> GatewayResult<APathLookup<LocalPath>> {
        match self.route(path, mode, direct::readable_ancestor(path.as_path())).await? {
            Route::Direct => direct::lookup(path)
                .await
                .map_err(|e| Side::Read.fail(path, e)),
            Route::Privileged => {
                let peer = self.peer(path, Side::Read).await?;
                peer.look_up(path).await.map_err(|e| Side::Read.fail(path, e))
            }
        }
    }

    pub async fn list_files_with_mode(
        &self,
        path: &LocalPath,
        mode: Mode,
    ) -> GatewayResult<Vec<LocalPath>> {
        if mode == Mode::Privileged {
            self.route(path, mode, ready(false)).await?;
        } else {
            match direct::list(path).await {
                Ok(children) => return Ok(children),
                Err(e) => self.escalate_after(path, mode, Side::Read, e).await?,
            }
        }
        let peer = self.peer(path, Side::Read).await?;
        peer.list_files(path)
            .await
            .map_err(|e| Side::Read.fail(path, e))
    }

    pub async fn lookup_files_with_mode(
        &self,
        path: &LocalPath,
        mode: Mode,
    ) -> GatewayResult<Vec<APathLookup<LocalPath>>> {
        if mode == Mode::Privileged {
            self.route(path, mode, ready(false)).await?;
        } else {
            match direct::lookup_files(path).await {
                Ok(lookups) => return Ok(lookups),
                Err(e) => self.escalate_after(path, mode, Side::Read, e).await?,
            }
        }
        let peer = self.peer(path, Side::Read).await?;
        peer.lookup_files(path)
            .await
            .map_err(|e| Side::Read.fail(path, e))
    }

    pub async fn exists_with_mode(&self, path: &LocalPath, mode: Mode) -> GatewayResult<bool> {
        let known = direct::existence_known(path.as_path(), self.config.known_roots.clone());
        match self.route(path, mode, known).await? {
            Route::Direct => Ok(direct::exists(path.as_path()).await),
            Route::Privileged => {
                let peer = self.peer(path, Side::Read).await?;
                peer.exists(path).await.map_err(|e| Side::Read.fail(path, e))
            }
        }
    }

    /// `false` rather than `NoRouteAvailable` when nothing can tell.
    pub async fn can_read_with_mode(&self, path: &LocalPath, mode: Mode) -> GatewayResult<bool> {
        if mode != Mode::Privileged && direct::readable(path.as_path()).await {
            return Ok(true);
        }
        if mode == Mode::Unprivileged {
            return Ok(false);
        }
        if !self.has_privileges().await {
            return match mode {
                Mode::Privileged => Err(GatewayError::no_route(path.clone(), mode)),
                _ => Ok(false),
            };
        }
        let peer = self.peer(path, Side::Read).await?;
        peer.can_read(path)
            .await
            .map_err(|e| Side::Read.fail(path, e))
    }

    /// `false` rather than `NoRouteAvailable` when nothing can tell.
    pub async fn can_write_with_mode(&self, path: &LocalPath, mode: Mode) -> GatewayResult<bool> {
        if mode != Mode::Privileged && direct::writable(path.as_path()).await {
            return Ok(true);
        }
        if mode == Mode::Unprivileged {
            return Ok(false);
        }
        if !self.has_privileges().await {
            return match mode {
                Mode::Privileged => Err(GatewayError::no_route(path.clone(), mode)),
                _ => Ok(false),
            };
        }
        let peer = self.peer(path, Side::Read).await?;
        peer.can_write(path)
            .await
            .map_err(|e| Side::Read.fail(path, e))
    }

    pub async fn read_with_mode(&self, path: &LocalPath, mode: Mode) -> GatewayResult<GatewayReader> {
        match self.route(path, mode, direct::readable_ancestor(path.as_path())).await? {
            Route::Direct => {
                let file = direct::open_read(path)
                    .await
                    .map_err(|e| Side::Read.fail(path, e))?;
                Ok(GatewayReader::new(file))
            }
            Route::Privileged => {
                let peer = self.peer(path, Side::Read).await?;
                let reader = peer
                    .read_file(path)
                    .await
                    .map_err(|e| Side::Read.fail(path, e))?;
                Ok(GatewayReader::with_guard(reader, peer))
            }
        }
    }

    // ========================================================================
    // Writing
    // ========================================================================

    pub async fn create_dir_with_mode(&self, path: &LocalPath, mode: Mode) -> GatewayResult<bool> {
        if mode != Mode::Privileged && direct::is_dir(path.as_path()).await {
            return Ok(false);
        }
        match self.route(path, mode, direct::writable_ancestor(path.as_path())).await? {
            Route::Direct => direct::mkdirs(path)
                .await
                .map_err(|e| Side::Write.fail(path, e)),
            Route::Privileged => {
                let peer = self.peer(path, Side::Write).await?;
                peer.mkdirs(path)
                    .await
                    .map_err(|e| Side::Write.fail(path, e))
            }
        }
    }

    pub async fn create_file_with_mode(&self, path: &LocalPath, mode: Mode) -> GatewayResult<bool> {
        if mode != Mode::Privileged && direct::exists(path.as_path()).await {
            if direct::is_dir(path.as_path()).await {
                return Err(GatewayError::write_msg(
                    path.clone(),
                    "exists but is a directory",
                ));
            }
            return Ok(false);
        }
        match self.route(path, mode, direct::writable_ancestor(path.as_path())).await? {
            Route::Direct => direct::create_new_file(path)
                .await
                .map_err(|e| Side::Write.fail(path, e)),
            Route::Privileged => {
                let peer = self.peer(path, Side::Write).await?;
                peer.create_new_file(path)
                    .await
                    .map_err(|e| Side::Write.fail(path, e))
            }
        }
    }

    pub async fn write_with_mode(&self, path: &LocalPath, mode: Mode) -> GatewayResult<GatewayWriter> {
        match self.route(path, mode, direct::writable_ancestor(path.as_path())).await? {
            Route::Direct => {
                let file = direct::open_write(path)
                    .await
                    .map_err(|e| Side::Write.fail(path, e))?;
                Ok(GatewayWriter::new(file))
            }
            Route::Privileged => {
                let peer = self.peer(path, Side::Write).await?;
                let writer = peer
                    .write_file(path)
                    .await
                    .map_err(|e| Side::Write.fail(path, e))?;
                Ok(GatewayWriter::with_guard(writer, peer))
            }
        }
    }

    /// Delete a file or empty directory.
    ///
    /// In automatic mode a failed direct deletion is retried once through the
    /// peer when privileges are available. A target that is already gone
    /// counts as deleted.
    pub async fn delete_with_mode(&self, path: &LocalPath, mode: Mode) -> GatewayResult<()> {
        if self.config.dry_run {
            info!(%path, "dry run, skipping delete");
            return Ok(());
        }
        let p = path.as_path();
        if mode != Mode::Privileged && direct::known_missing(p).await {
            return Self::already_gone(path);
        }

        let direct_first = match mode {
            Mode::Unprivileged => true,
            Mode::Automatic => direct::parent_writable(p).await,
            Mode::Privileged => false,
        };
        if direct_first {
            match direct::delete(path).await {
                Ok(()) => {
                    debug!(%path, "deleted");
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Self::already_gone(path);
                }
                Err(e) => {
                    self.escalate_after(path, mode, Side::Write, e).await?;
                    warn!(%path, "direct delete failed, retrying privileged");
                }
            }
        } else {
            self.route(path, mode, ready(false)).await?;
        }

        let peer = self.peer(path, Side::Write).await?;
        let deleted = match peer.delete(path).await {
            Ok(deleted) => deleted,
            Err(PeerError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Self::already_gone(path);
            }
            Err(e) => return Err(Side::Write.fail(path, e)),
        };
        if !deleted && !peer.exists(path).await.map_err(|e| Side::Write.fail(path, e))? {
            return Self::already_gone(path);
        }
        Self::confirm(path, deleted, "delete")
    }

    fn already_gone(path: &LocalPath) -> GatewayResult<()> {
        warn!(%path, "tried to delete, but it's already gone");
        Ok(())
    }

    pub async fn create_symlink_with_mode(
        &self,
        link: &LocalPath,
        target: &LocalPath,
        mode: Mode,
    ) -> GatewayResult<()> {
        match self.route(link, mode, direct::writable_ancestor(link.as_path())).await? {
            Route::Direct => direct::create_symlink(link, target)
                .await
                .map_err(|e| Side::Write.fail(link, e)),
            Route::Privileged => {
                let peer = self.peer(link, Side::Write).await?;
                let created = peer
                    .create_symlink(link, target)
                    .await
                    .map_err(|e| Side::Write.fail(link, e))?;
                Self::confirm(link, created, "symlink")
            }
        }
    }

    pub async fn set_modified_at_with_mode(
        &self,
        path: &LocalPath,
        modified_at: SystemTime,
        mode: Mode,
    ) -> GatewayResult<()> {
        match self.route(path, mode, direct::writable(path.as_path())).await? {
            Route::Direct => direct::set_modified_at(path, modified_at)
                .await
                .map_err(|e| Side::Write.fail(path, e)),
            Route::Privileged => {
                let peer = self.peer(path, Side::Write).await?;
                let done = peer
                    .set_modified_at(path, modified_at)
                    .await
                    .map_err(|e| Side::Write.fail(path, e))?;
                Self::confirm(path, done, "set_modified_at")
            }
        }
    }

    pub async fn set_permissions_with_mode(
        &self,
        path: &LocalPath,
        permissions: Permissions,
        mode: Mode,
    ) -> GatewayResult<()> {
        match self.route(path, mode, direct::writable(path.as_path())).await? {
            Route::Direct => direct::set_permissions(path, permissions)
                .await
                .map_err(|e| Side::Write.fail(path, e)),
            Route::Privileged => {
                let peer = self.peer(path, Side::Write).await?;
                let done = peer
                    .set_permissions(path, permissions)
                    .await
                    .map_err(|e| Side::Write.fail(path, e))?;
                Self::confirm(path, done, "set_permissions")
            }
        }
    }

    pub async fn set_ownership_with_mode(
        &self,
        path: &LocalPath,
        ownership: Ownership,
        mode: Mode,
    ) -> GatewayResult<()> {
        match self.route(path, mode, direct::writable(path.as_path())).await? {
            Route::Direct => direct::set_ownership(path, ownership)
                .await
                .map_err(|e| Side::Write.fail(path, e)),
            Route::Privileged => {
                let peer = self.peer(path, Side::Write).await?;
                let done = peer
                    .set_ownership(path, ownership)
                    .await
                    .map_err(|e| Side::Write.fail(path, e))?;
                Self::confirm(path, done, "set_ownership")
            }
        }
    }
}

#[async_trait]
impl APathGateway for LocalGateway {
    type Path = LocalPath;

    async fn lookup(&self, path: &LocalPath) -> GatewayResult<APathLookup<LocalPath>> {
        self.lookup_with_mode(path, self.config.default_mode).await
    }

    async fn list_files(&self, path: &LocalPath) -> GatewayResult<Vec<LocalPath>> {
        self.list_files_with_mode(path, self.config.default_mode).await
    }

    async fn lookup_files(&self, path: &LocalPath) -> GatewayResult<Vec<APathLookup<LocalPath>>> {
        self.lookup_files_with_mode(path, self.config.default_mode).await
    }

    async fn exists(&self, path: &LocalPath) -> GatewayResult<bool> {
        self.exists_with_mode(path, self.config.default_mode).await
    }

    async fn can_read(&self, path: &LocalPath) -> GatewayResult<bool> {
        self.can_read_with_mode(path, self.config.default_mode).await
    }

    async fn can_write(&self, path: &LocalPath) -> GatewayResult<bool> {
        self.can_write_with_mode(path, self.config.default_mode).await
    }

    async fn read(&self, path: &LocalPath) -> GatewayResult<GatewayReader> {
        self.read_with_mode(path, self.config.default_mode).await
    }

    async fn create_dir(&self, path: &LocalPath) -> GatewayResult<bool> {
        self.create_dir_with_mode(path, self.config.default_mode).await
    }

    async fn create_file(&self, path: &LocalPath) -> GatewayResult<bool> {
        self.create_file_with_mode(path, self.config.default_mode).await
    }

    async fn write(&self, path: &LocalPath) -> GatewayResult<GatewayWriter> {
        self.write_with_mode(path, self.config.default_mode).await
    }

    async fn delete(&self, path: &LocalPath) -> GatewayResult<()> {
        self.delete_with_mode(path, self.config.default_mode).await
    }

    async fn create_symlink(&self, link: &LocalPath, target: &LocalPath) -> GatewayResult<()> {
        self.create_symlink_with_mode(link, target, self.config.default_mode)
            .await
    }

    async fn set_modified_at(&self, path: &LocalPath, modified_at: SystemTime) -> GatewayResult<()> {
        self.set_modified_at_with_mode(path, modified_at, self.config.default_mode)
            .await
    }

    async fn set_permissions(&self, path: &LocalPath, permissions: Permissions) -> GatewayResult<()> {
        self.set_permissions_with_mode(path, permissions, self.config.default_mode)
            .await
    }

    async fn set_ownership(&self, path: &LocalPath, ownership: Ownership) -> GatewayResult<()> {
        self.set_ownership_with_mode(path, ownership, self.config.default_mode)
            .await
    }

    fn shared_resource(&self) -> &SharedResource<KeepAlive> {
        &self.keep_alive
    }
}
