//! # pathgate-io
//!
//! Filesystem gateways for pathgate.
//!
//! One contract, [`APathGateway`], served by a backend per path variant:
//! - [`LocalGateway`] - conventional paths, direct or through a privileged peer
//! - [`SafGateway`] - tree-URI paths through a content provider and its grants
//! - [`GatewaySwitch`] - routes the [`APath`](pathgate_types::APath) union to the above
//!
//! Backends that hold expensive sessions expose them through
//! [`SharedResource`] keep-alives: hold a lease on a gateway's
//! [`shared_resource`](APathGateway::shared_resource) to keep its sessions
//! open between calls.

pub mod config;
pub mod gateway;
pub mod local;
pub mod saf;
pub mod sharedresource;

pub use config::{ConfigError, GatewayConfig, LocalConfig, SafConfig};
pub use gateway::{
    APathGateway, DeleteFilter, GatewayError, GatewayExt, GatewayReader, GatewayResult,
    GatewaySwitch, GatewayWriter, PathTreeWalker, WalkErrorPolicy, WalkFilter,
};
pub use local::{
    HostPeer, HostPeerConnector, LocalGateway, Mode, PeerError, PeerResult, PrivilegedPeer,
    PrivilegedPeerConnector,
};
pub use saf::{
    Document, DocumentProvider, DocumentStat, MemoryDocumentProvider, MemoryPermissionStore,
    PermissionMatch, PermissionStore, ProviderError, ProviderResult, SafGateway, UriPermission,
    match_permission,
};
pub use sharedresource::{BoxError, KeepAlive, Lease, ResourceError, SharedResource};
