//! Per-session mutation serialization
//!
//! Every store operation loads the full session document, mutates it and
//! saves it back. Two unserialized mutations on the same session would
//! silently drop one update, so each session gets its own async mutex.
//! Different sessions never contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::session::SessionId;

/// Registry of per-session mutexes
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the mutation lock for a session, waiting for any in-flight
    /// mutation on the same session to finish.
    pub async fn acquire(&self, session: &SessionId) -> OwnedMutexGuard<()> {
        // Clone the Arc out before awaiting so the map shard is not held
        let lock = self
            .locks
            .entry(session.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Release a held guard and drop the session's lock entry when no other
    /// task holds or awaits the same mutex. Returns whether the entry was removed.
    ///
    /// The check runs while the guard is still held, so a waiter that already
    /// cloned the mutex keeps the entry alive and later callers queue behind it.
    pub fn release_and_remove(&self, session: &SessionId, guard: OwnedMutexGuard<()>) -> bool {
        // One reference lives in the map, the other inside the guard
        let removed = self
            .locks
            .remove_if(session, |_, lock| Arc::strong_count(lock) <= 2)
            .is_some();
        drop(guard);
        removed
    }

    /// Number of sessions with a registered lock
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn sid(s: &str) -> SessionId {
        SessionId::try_from(s).unwrap()
    }

    #[tokio::test]
    async fn test_same_session_is_exclusive() {
        let locks = SessionLocks::new();
        let a = sid("a");

        let guard = locks.acquire(&a).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&a)).await;
        assert!(second.is_err(), "second acquire should wait");

        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&a)).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_different_sessions_do_not_contend() {
        let locks = SessionLocks::new();
        let _a = locks.acquire(&sid("a")).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&sid("b"))).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_release_and_remove_idle() {
        let locks = SessionLocks::new();
        let guard = locks.acquire(&sid("gone")).await;
        assert!(locks.release_and_remove(&sid("gone"), guard));
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_release_and_remove_keeps_lock_for_waiter() {
        let locks = Arc::new(SessionLocks::new());
        let busy = sid("busy");
        let holders = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let guard = locks.acquire(&busy).await;

        let waiter = {
            let (locks, busy) = (locks.clone(), busy.clone());
            let (holders, peak) = (holders.clone(), peak.clone());
            tokio::spawn(async move {
                let _guard = locks.acquire(&busy).await;
                let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                holders.fetch_sub(1, Ordering::SeqCst);
            })
        };

        // Let the waiter clone the mutex and park on it
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!locks.release_and_remove(&busy, guard));
        assert_eq!(locks.len(), 1);

        // Give the waiter the lock before contending for it again
        tokio::time::sleep(Duration::from_millis(5)).await;
        let _again = locks.acquire(&busy).await;
        let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        waiter.await.unwrap();
    }
}
