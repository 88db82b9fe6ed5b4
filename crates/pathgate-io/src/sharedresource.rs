//! Reference-counted, lazily created resources.
//!
//! A [`SharedResource`] owns a factory for something expensive (a privileged
//! session, a keep-alive token) and hands out [`Lease`]s. The value is built
//! on the first lease and dropped when the last lease goes away. Leases
//! release in `Drop`, so early returns, errors and task cancellation all
//! release correctly.
//!
//! ## Keep-alive graph
//!
//! [`SharedResource::add_child`] lets a live resource hold a lease on another
//! one. The child then stays alive for as long as the parent does and is
//! released together with it. Gateways use this to keep privileged sessions
//! open while somebody holds the gateway's own keep-alive.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, trace};

/// Boxed error returned by resource factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Resource lifecycle error.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The factory failed; nothing was retained.
    #[error("failed to acquire {tag}")]
    Acquire {
        tag: String,
        #[source]
        source: BoxError,
    },
}

type Factory<T> = dyn Fn() -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync;

struct Inner<T> {
    id: u64,
    tag: String,
    factory: Box<Factory<T>>,
    /// Lease bookkeeping; never held across an await.
    state: parking_lot::Mutex<State<T>>,
    /// Serializes construction so that only one factory call runs at a time.
    construct: tokio::sync::Mutex<()>,
}

struct State<T> {
    value: Option<Arc<T>>,
    /// Outstanding leases by id, with the owner that asked for them.
    leases: HashMap<u64, Option<String>>,
    /// Leases this resource holds on its children.
    children: HashMap<u64, Box<dyn Any + Send>>,
}

/// A lazily created value shared between leaseholders.
pub struct SharedResource<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SharedResource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for SharedResource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SharedResource")
            .field("tag", &self.inner.tag)
            .field("alive", &state.value.is_some())
            .field("leases", &state.leases.len())
            .field("children", &state.children.len())
            .finish()
    }
}

impl<T: Send + Sync + 'static> SharedResource<T> {
    /// Create a resource that calls `factory` whenever a value is needed.
    pub fn new<F, Fut>(tag: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        let factory: Box<Factory<T>> = Box::new(move || Box::pin(factory()));
        Self {
            inner: Arc::new(Inner {
                id: next_id(),
                tag: tag.into(),
                factory,
                state: parking_lot::Mutex::new(State {
                    value: None,
                    leases: HashMap::new(),
                    children: HashMap::new(),
                }),
                construct: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    /// Acquire a lease, creating the value if nobody holds one.
    pub async fn get(&self) -> Result<Lease<T>, ResourceError> {
        self.lease(None).await
    }

    /// Acquire a lease on behalf of `owner` (shows up in logs and `Debug`).
    pub async fn add_parent(&self, owner: impl Into<String>) -> Result<Lease<T>, ResourceError> {
        self.lease(Some(owner.into())).await
    }

    async fn lease(&self, owner: Option<String>) -> Result<Lease<T>, ResourceError> {
        if let Some(lease) = self.try_lease(&owner) {
            return Ok(lease);
        }

        let _construct = self.inner.construct.lock().await;
        if let Some(lease) = self.try_lease(&owner) {
            return Ok(lease);
        }

        debug!(tag = %self.inner.tag, owner = ?owner, "creating shared resource");
        let value = (self.inner.factory)()
            .await
            .map_err(|source| ResourceError::Acquire {
                tag: self.inner.tag.clone(),
                source,
            })?;
        let value = Arc::new(value);

        let id = next_id();
        let mut state = self.inner.state.lock();
        state.value = Some(value.clone());
        state.leases.insert(id, owner);
        Ok(Lease {
            id,
            inner: self.inner.clone(),
            value,
        })
    }

    fn try_lease(&self, owner: &Option<String>) -> Option<Lease<T>> {
        let mut state = self.inner.state.lock();
        let value = state.value.clone()?;
        let id = next_id();
        state.leases.insert(id, owner.clone());
        trace!(tag = %self.inner.tag, leases = state.leases.len(), "lease acquired");
        Some(Lease {
            id,
            inner: self.inner.clone(),
            value,
        })
    }

    /// Keep `child` alive for as long as this resource is alive.
    ///
    /// Does nothing when this resource has no value right now, or already
    /// holds `child`.
    pub async fn add_child<U: Send + Sync + 'static>(
        &self,
        child: &SharedResource<U>,
    ) -> Result<(), ResourceError> {
        let child_id = child.inner.id;
        {
            let state = self.inner.state.lock();
            if state.value.is_none() || state.children.contains_key(&child_id) {
                return Ok(());
            }
        }

        let lease = child.add_parent(self.inner.tag.clone()).await?;

        let surplus = {
            let mut state = self.inner.state.lock();
            if state.value.is_some() && !state.children.contains_key(&child_id) {
                debug!(parent = %self.inner.tag, child = %child.inner.tag, "adopted child resource");
                state.children.insert(child_id, Box::new(lease));
                None
            } else {
                Some(lease)
            }
        };
        drop(surplus);
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.inner.state.lock().value.is_some()
    }

    pub fn lease_count(&self) -> usize {
        self.inner.state.lock().leases.len()
    }
}

/// Token type for resources whose only job is to anchor the keep-alive graph.
#[derive(Debug, Clone)]
pub struct KeepAlive {
    pub tag: String,
}

impl SharedResource<KeepAlive> {
    /// A resource whose value is a [`KeepAlive`] token.
    pub fn keep_alive(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let token = tag.clone();
        Self::new(tag, move || {
            let tag = token.clone();
            async move { Ok(KeepAlive { tag }) }
        })
    }
}

/// Scoped handle on a [`SharedResource`] value.
///
/// Dropping the last lease drops the value and every child lease it held.
pub struct Lease<T: Send + Sync + 'static> {
    id: u64,
    inner: Arc<Inner<T>>,
    value: Arc<T>,
}

impl<T: Send + Sync + 'static> Lease<T> {
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }
}

impl<T: Send + Sync + 'static> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("tag", &self.inner.tag)
            .field("id", &self.id)
            .finish()
    }
}

impl<T: Send + Sync + 'static> Drop for Lease<T> {
    fn drop(&mut self) {
        let released = {
            let mut state = self.inner.state.lock();
            state.leases.remove(&self.id);
            if state.leases.is_empty() {
                Some((state.value.take(), std::mem::take(&mut state.children)))
            } else {
                None
            }
        };
        // Teardown happens outside the lock: child leases lock their own state.
        if let Some((value, children)) = released {
            debug!(tag = %self.inner.tag, children = children.len(), "releasing shared resource");
            drop(children);
            drop(value);
        }
    }
}
