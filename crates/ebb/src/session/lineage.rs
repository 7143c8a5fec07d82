//! Session lineage cache
//!
//! Hosts spawn derived (child) sessions for sub-tasks. Derived sessions
//! should not accumulate their own working memory or raise interventions,
//! so the engine asks a [`SessionLineage`] whether a session has a parent.
//! The cache is injected by the host adapter; tests use
//! [`NoopSessionLineage`].

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::session::SessionId;

/// Default capacity for the lineage cache
pub const DEFAULT_LINEAGE_CAPACITY: usize = 1000;

/// Lookup of session -> parent session
pub trait SessionLineage: Send + Sync {
    /// Parent of `session`, if it is a derived session
    fn parent_of(&self, session: &SessionId) -> Option<SessionId>;

    /// Record that `child` was derived from `parent`
    fn record(&self, child: SessionId, parent: SessionId);

    /// Forget everything known about `session`
    fn forget(&self, session: &SessionId);

    /// True if the session was derived from another session
    fn is_derived(&self, session: &SessionId) -> bool {
        self.parent_of(session).is_some()
    }
}

/// Lineage cache that knows nothing; every session is a root session
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionLineage;

impl SessionLineage for NoopSessionLineage {
    fn parent_of(&self, _session: &SessionId) -> Option<SessionId> {
        None
    }

    fn record(&self, _child: SessionId, _parent: SessionId) {}

    fn forget(&self, _session: &SessionId) {}
}

/// Bounded lineage cache backed by an LRU
///
/// When full, the least recently looked-up session is dropped; a dropped
/// child is then treated as a root session until the host records it again.
#[derive(Debug)]
pub struct LruSessionLineage {
    cache: Mutex<LruCache<SessionId, SessionId>>,
}

impl LruSessionLineage {
    /// Creates a lineage cache with the given capacity; zero falls back to
    /// [`DEFAULT_LINEAGE_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(
            NonZeroUsize::new(DEFAULT_LINEAGE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        );
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Returns the number of tracked child sessions
    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum capacity of the cache
    pub fn capacity(&self) -> usize {
        self.cache
            .lock()
            .map(|c| c.cap().get())
            .unwrap_or(DEFAULT_LINEAGE_CAPACITY)
    }
}

impl Default for LruSessionLineage {
    fn default() -> Self {
        Self::new(DEFAULT_LINEAGE_CAPACITY)
    }
}

impl SessionLineage for LruSessionLineage {
    fn parent_of(&self, session: &SessionId) -> Option<SessionId> {
        let mut cache = self.cache.lock().ok()?;
        cache.get(session).cloned()
    }

    fn record(&self, child: SessionId, parent: SessionId) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(child, parent);
        }
    }

    fn forget(&self, session: &SessionId) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(session);
        }
    }
}
