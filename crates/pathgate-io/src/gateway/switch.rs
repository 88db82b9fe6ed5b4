//! Path-variant router.
//!
//! [`GatewaySwitch`] serves [`APath`] by forwarding each call to the gateway
//! for the path's variant. The first call that needs a backend activates it
//! by taking a lease on the backend's keep-alive; the lease is held for as
//! long as the switch lives.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use pathgate_types::{APath, APathLookup, Ownership, PathError, PathType, Permissions};
use tokio::sync::Mutex;
use tracing::debug;

use super::{APathGateway, GatewayError, GatewayReader, GatewayResult, GatewayWriter};
use crate::local::LocalGateway;
use crate::saf::{SafGateway, match_permission};
use crate::sharedresource::{KeepAlive, Lease, SharedResource};

type Activation = Mutex<Option<Lease<KeepAlive>>>;

/// Routes [`APath`] operations to variant gateways.
pub struct GatewaySwitch {
    local: Option<Arc<LocalGateway>>,
    saf: Option<Arc<SafGateway>>,
    local_active: Activation,
    saf_active: Activation,
    keep_alive: SharedResource<KeepAlive>,
}

impl std::fmt::Debug for GatewaySwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySwitch")
            .field("local", &self.local.is_some())
            .field("saf", &self.saf.is_some())
            .finish()
    }
}

impl Default for GatewaySwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewaySwitch {
    /// A switch with no backends; every call fails with `Unimplemented`.
    pub fn new() -> Self {
        Self {
            local: None,
            saf: None,
            local_active: Mutex::new(None),
            saf_active: Mutex::new(None),
            keep_alive: SharedResource::keep_alive("gateway-switch"),
        }
    }

    pub fn with_local(mut self, gateway: impl Into<Arc<LocalGateway>>) -> Self {
        self.local = Some(gateway.into());
        self
    }

    pub fn with_saf(mut self, gateway: impl Into<Arc<SafGateway>>) -> Self {
        self.saf = Some(gateway.into());
        self
    }

    pub fn local_gateway(&self) -> Option<&LocalGateway> {
        self.local.as_deref()
    }

    pub fn saf_gateway(&self) -> Option<&SafGateway> {
        self.saf.as_deref()
    }

    async fn activate<G: APathGateway>(
        &self,
        slot: &Activation,
        gateway: &G,
        path: &APath,
    ) -> GatewayResult<()> {
        let mut active = slot.lock().await;
        if active.is_none() {
            let lease = gateway
                .shared_resource()
                .add_parent(self.keep_alive.tag())
                .await
                .map_err(|e| GatewayError::read(path.clone(), e))?;
            debug!(gateway = lease.tag(), "activated gateway");
            *active = Some(lease);
        }
        Ok(())
    }

    async fn local(&self, path: &APath) -> GatewayResult<&LocalGateway> {
        let gateway = self.local.as_deref().ok_or(GatewayError::Unimplemented {
            path_type: PathType::Local,
        })?;
        self.activate(&self.local_active, gateway, path).await?;
        Ok(gateway)
    }

    async fn saf(&self, path: &APath) -> GatewayResult<&SafGateway> {
        let gateway = self.saf.as_deref().ok_or(GatewayError::Unimplemented {
            path_type: PathType::Saf,
        })?;
        self.activate(&self.saf_active, gateway, path).await?;
        Ok(gateway)
    }

    /// Give back what the backend holds for `path`.
    ///
    /// For tree-URI paths this releases the persisted grant covering the
    /// path. Other variants hold nothing per path.
    pub async fn release_resources(&self, path: &APath) -> GatewayResult<()> {
        let APath::Saf(p) = path else {
            return Ok(());
        };
        let saf = self.saf(path).await?;
        match match_permission(&saf.permissions().await, p) {
            Some(matched) => saf.release_permission(&matched.grant.uri).await,
            None => Ok(()),
        }
    }
}

fn unimplemented(path: &APath) -> GatewayError {
    GatewayError::Unimplemented {
        path_type: path.path_type(),
    }
}

#[async_trait]
impl APathGateway for GatewaySwitch {
    type Path = APath;

    async fn lookup(&self, path: &APath) -> GatewayResult<APathLookup> {
        match path {
            APath::Local(p) => Ok(self.local(path).await?.lookup(p).await?.into_apath()),
            APath::Saf(p) => Ok(self.saf(path).await?.lookup(p).await?.into_apath()),
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn list_files(&self, path: &APath) -> GatewayResult<Vec<APath>> {
        match path {
            APath::Local(p) => Ok(into_apaths(self.local(path).await?.list_files(p).await?)),
            APath::Saf(p) => Ok(into_apaths(self.saf(path).await?.list_files(p).await?)),
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn lookup_files(&self, path: &APath) -> GatewayResult<Vec<APathLookup>> {
        match path {
            APath::Local(p) => Ok(into_apath_lookups(
                self.local(path).await?.lookup_files(p).await?,
            )),
            APath::Saf(p) => Ok(into_apath_lookups(
                self.saf(path).await?.lookup_files(p).await?,
            )),
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn exists(&self, path: &APath) -> GatewayResult<bool> {
        match path {
            APath::Local(p) => self.local(path).await?.exists(p).await,
            APath::Saf(p) => self.saf(path).await?.exists(p).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn can_read(&self, path: &APath) -> GatewayResult<bool> {
        match path {
            APath::Local(p) => self.local(path).await?.can_read(p).await,
            APath::Saf(p) => self.saf(path).await?.can_read(p).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn can_write(&self, path: &APath) -> GatewayResult<bool> {
        match path {
            APath::Local(p) => self.local(path).await?.can_write(p).await,
            APath::Saf(p) => self.saf(path).await?.can_write(p).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn read(&self, path: &APath) -> GatewayResult<GatewayReader> {
        match path {
            APath::Local(p) => self.local(path).await?.read(p).await,
            APath::Saf(p) => self.saf(path).await?.read(p).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn create_dir(&self, path: &APath) -> GatewayResult<bool> {
        match path {
            APath::Local(p) => self.local(path).await?.create_dir(p).await,
            APath::Saf(p) => self.saf(path).await?.create_dir(p).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn create_file(&self, path: &APath) -> GatewayResult<bool> {
        match path {
            APath::Local(p) => self.local(path).await?.create_file(p).await,
            APath::Saf(p) => self.saf(path).await?.create_file(p).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn write(&self, path: &APath) -> GatewayResult<GatewayWriter> {
        match path {
            APath::Local(p) => self.local(path).await?.write(p).await,
            APath::Saf(p) => self.saf(path).await?.write(p).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn delete(&self, path: &APath) -> GatewayResult<()> {
        match path {
            APath::Local(p) => self.local(path).await?.delete(p).await,
            APath::Saf(p) => self.saf(path).await?.delete(p).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn create_symlink(&self, link: &APath, target: &APath) -> GatewayResult<()> {
        match (link, target) {
            (APath::Local(l), APath::Local(t)) => self.local(link).await?.create_symlink(l, t).await,
            (APath::Saf(l), APath::Saf(t)) => self.saf(link).await?.create_symlink(l, t).await,
            (APath::Raw(_), _) => Err(unimplemented(link)),
            _ => Err(PathError::mismatch(format!(
                "can't link {} path {link} to {} path {target}",
                link.path_type(),
                target.path_type()
            ))
            .into()),
        }
    }

    async fn set_modified_at(&self, path: &APath, modified_at: SystemTime) -> GatewayResult<()> {
        match path {
            APath::Local(p) => self.local(path).await?.set_modified_at(p, modified_at).await,
            APath::Saf(p) => self.saf(path).await?.set_modified_at(p, modified_at).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn set_permissions(&self, path: &APath, permissions: Permissions) -> GatewayResult<()> {
        match path {
            APath::Local(p) => self.local(path).await?.set_permissions(p, permissions).await,
            APath::Saf(p) => self.saf(path).await?.set_permissions(p, permissions).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    async fn set_ownership(&self, path: &APath, ownership: Ownership) -> GatewayResult<()> {
        match path {
            APath::Local(p) => self.local(path).await?.set_ownership(p, ownership).await,
            APath::Saf(p) => self.saf(path).await?.set_ownership(p, ownership).await,
            APath::Raw(_) => Err(unimplemented(path)),
        }
    }

    fn shared_resource(&self) -> &SharedResource<KeepAlive> {
        &self.keep_alive
    }
}

fn into_apaths<P: Into<APath>>(paths: Vec<P>) -> Vec<APath> {
    paths.into_iter().map(Into::into).collect()
}

fn into_apath_lookups<P: Into<APath>>(lookups: Vec<APathLookup<P>>) -> Vec<APathLookup> {
    lookups.into_iter().map(APathLookup::into_apath).collect()
}
