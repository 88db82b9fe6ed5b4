//! Gateway abstraction.
//!
//! This module defines the contract every filesystem backend implements and
//! the pieces built on top of it.
//! Key components:
//!
//! - [`APathGateway`] - Core trait, typed to one path variant
//! - [`GatewaySwitch`] - Routes [`APath`](pathgate_types::APath) operations to variant gateways
//! - [`GatewayExt`] - Convenience operations for every gateway
//! - [`PathTreeWalker`] - Lazy recursive listing as a stream
//!
//! ## Design Decisions
//!
//! - **Typed gateways**: a gateway names its path variant as an associated
//!   type, so passing the wrong variant does not compile. Only the switch
//!   deals in the union.
//! - **Errors, not sentinels**: failures are [`GatewayError`]s wrapped once at
//!   the gateway that saw them; the switch passes them through.
//! - **Streams own their leases**: readers and writers can hold a lease on
//!   the session that produced them, released when the stream is dropped.

mod error;
mod ext;
mod ops;
mod stream;
mod switch;
mod walk;

pub use error::{GatewayError, GatewayResult};
pub use ext::{DeleteFilter, GatewayExt};
pub use ops::APathGateway;
pub use stream::{GatewayReader, GatewayWriter};
pub use switch::GatewaySwitch;
pub use walk::{PathTreeWalker, WalkErrorPolicy, WalkFilter};
