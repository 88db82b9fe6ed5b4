//! Recursive tree walker.
//!
//! [`PathTreeWalker`] turns a start path into a lazy stream of lookups. A
//! file start yields just itself; a directory start yields every entry below
//! it (the start excluded). Each entry is emitted before its children are
//! listed. Newly found directories go to the front of the queue, so the most
//! recently emitted directory is the next one listed.
//!
//! Symlinks are reported, never followed. There is no cycle detection, so a
//! provider that reports directory cycles walks forever.
//!
//! A directory that can't be listed ends the walk by default. With
//! [`WalkErrorPolicy::Skip`] the error is logged and the walk goes on with
//! the next queued directory. A failing start lookup always ends the walk.

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, StreamExt};
use pathgate_types::APathLookup;
use tracing::{trace, warn};

use super::{APathGateway, GatewayResult};

/// Predicate deciding which entries are emitted and descended into.
pub type WalkFilter<P> = Box<dyn Fn(&APathLookup<P>) -> bool + Send + Sync>;

/// What a walk does when a directory listing fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WalkErrorPolicy {
    /// Yield the error and end the stream.
    #[default]
    Abort,
    /// Log the error and continue without that directory's entries.
    Skip,
}

/// Builder for a walk over one gateway.
pub struct PathTreeWalker<'a, G: APathGateway + ?Sized> {
    gateway: &'a G,
    start: G::Path,
    filter: Option<WalkFilter<G::Path>>,
    on_error: WalkErrorPolicy,
}

impl<'a, G: APathGateway + ?Sized> PathTreeWalker<'a, G> {
    pub fn new(gateway: &'a G, start: G::Path) -> Self {
        Self {
            gateway,
            start,
            filter: None,
            on_error: WalkErrorPolicy::Abort,
        }
    }

    pub fn with_on_error(mut self, policy: WalkErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    /// Skip entries for which `filter` is false. Skipped directories are not
    /// descended into.
    pub fn with_filter(
        mut self,
        filter: impl Fn(&APathLookup<G::Path>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Start walking. Nothing is looked up until the stream is polled.
    ///
    /// Under [`WalkErrorPolicy::Abort`] an error is yielded once and ends
    /// the stream.
    pub fn into_stream(self) -> BoxStream<'a, GatewayResult<APathLookup<G::Path>>> {
        let state = WalkState {
            gateway: self.gateway,
            start: Some(self.start),
            queue: VecDeque::new(),
            pending: VecDeque::new(),
            filter: self.filter,
            on_error: self.on_error,
            done: false,
        };
        stream::unfold(state, WalkState::step).boxed()
    }
}

struct WalkState<'a, G: APathGateway + ?Sized> {
    gateway: &'a G,
    /// Start path, until it has been looked up.
    start: Option<G::Path>,
    /// Directories waiting to be listed.
    queue: VecDeque<G::Path>,
    /// Listed entries waiting to be emitted.
    pending: VecDeque<APathLookup<G::Path>>,
    filter: Option<WalkFilter<G::Path>>,
    on_error: WalkErrorPolicy,
    done: bool,
}

impl<'a, G: APathGateway + ?Sized> WalkState<'a, G> {
    async fn step(mut self) -> Option<(GatewayResult<APathLookup<G::Path>>, Self)> {
        loop {
            if self.done {
                return None;
            }

            if let Some(start) = self.start.take() {
                match self.gateway.lookup(&start).await {
                    Ok(lookup) if lookup.is_directory() => self.queue.push_back(start),
                    Ok(lookup) => {
                        self.done = true;
                        return Some((Ok(lookup), self));
                    }
                    Err(e) => {
                        self.done = true;
                        return Some((Err(e), self));
                    }
                }
                continue;
            }

            if let Some(entry) = self.pending.pop_front() {
                if entry.is_directory() {
                    self.queue.push_front(entry.lookedup.clone());
                }
                return Some((Ok(entry), self));
            }

            let dir = self.queue.pop_front()?;
            trace!(%dir, queued = self.queue.len(), "listing");
            match self.gateway.lookup_files(&dir).await {
                Ok(children) => {
                    let filter = self.filter.as_ref();
                    self.pending.extend(
                        children
                            .into_iter()
                            .filter(|child| filter.is_none_or(|f| f(child))),
                    );
                }
                Err(e) if self.on_error == WalkErrorPolicy::Skip => {
                    warn!(%dir, error = %e, "skipping unlistable directory");
                }
                Err(e) => {
                    self.done = true;
                    return Some((Err(e), self));
                }
            }
        }
    }
}
