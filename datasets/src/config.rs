//! Ambient configuration (C0): tunables that are invariant for a
//! [`crate::dataset::Datasets`] instance's lifetime, bundled into one struct
//! built once and handed to the façade at construction time rather than
//! re-read per call.

use crate::commit_graph::MAX_TRAVERSAL_NODES;

/// Bounded-backoff policy for the root-update CAS loop.
///
/// Bounded backoff between lost-race attempts is allowed without changing
/// which errors are retried, but none is required. [`RetryPolicy::UNBOUNDED`]
/// is the literal default: no attempt cap, no sleep between attempts.
/// [`crate::root_update::update`] sleeps between lost-race attempts only
/// when `base_backoff_ms` is non-zero, doubling up to `max_backoff_ms` each
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` means retry until the chunk store's CAS accepts or a non-CAS
    /// error surfaces — loop termination is guaranteed only under progress
    /// by some writer, so there is no natural attempt cap to default to.
    pub max_attempts: Option<u32>,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    pub const UNBOUNDED: RetryPolicy = RetryPolicy { max_attempts: None, base_backoff_ms: 0, max_backoff_ms: 0 };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Tunables shared by every operation a [`crate::dataset::Datasets`]
/// exposes. Cheap to clone; build once per store and reuse.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub retry: RetryPolicy,
    /// Upper bound on nodes visited by a single [`crate::commit_graph::find_common_ancestor`]
    /// call. Defaults to [`MAX_TRAVERSAL_NODES`].
    pub max_traversal_nodes: usize,
}

impl Config {
    pub fn new() -> Self {
        Self { retry: RetryPolicy::UNBOUNDED, max_traversal_nodes: MAX_TRAVERSAL_NODES }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_traversal_nodes(mut self, max_traversal_nodes: usize) -> Self {
        self.max_traversal_nodes = max_traversal_nodes;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
