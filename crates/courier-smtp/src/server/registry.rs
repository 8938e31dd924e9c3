//! Live session bookkeeping.
//!
//! The listener registers each session it spawns; the session's task
//! unregisters itself when it ends; shutdown drains whatever remains.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;

struct Entry {
    peer: SocketAddr,
    task: AbortHandle,
}

/// Running sessions by id.
#[derive(Default)]
pub(crate) struct Registry {
    sessions: Mutex<HashMap<u64, Entry>>,
    next_id: AtomicU64,
}

impl Registry {
    /// Registers the task returned by `spawn`, which receives the session id.
    ///
    /// The lock is held while spawning, so a task that finishes at once
    /// still finds its entry to remove.
    pub(crate) fn register(&self, peer: SocketAddr, spawn: impl FnOnce(u64) -> AbortHandle) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut sessions = self.lock();
        let task = spawn(id);
        sessions.insert(id, Entry { peer, task });
        id
    }

    pub(crate) fn remove(&self, id: u64) {
        if let Some(entry) = self.lock().remove(&id) {
            tracing::trace!(id, peer = %entry.peer, "Session unregistered");
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes every session and aborts its task.
    pub(crate) fn abort_all(&self) -> usize {
        let drained: Vec<Entry> = self.lock().drain().map(|(_, entry)| entry).collect();
        for entry in &drained {
            tracing::debug!(peer = %entry.peer, "Aborting session");
            entry.task.abort();
        }
        drained.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn peer() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_task_removes_itself() {
        let registry = Arc::new(Registry::default());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let reg = Arc::clone(&registry);
        registry.register(peer(), move |id| {
            tokio::spawn(async move {
                let _ = rx.await;
                reg.remove(id);
            })
            .abort_handle()
        });
        assert_eq!(registry.len(), 1);

        tx.send(()).unwrap();
        for _ in 0..100 {
            if registry.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_abort_all() {
        let registry = Registry::default();
        for _ in 0..3 {
            registry.register(peer(), |_| {
                tokio::spawn(std::future::pending::<()>()).abort_handle()
            });
        }

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.abort_all(), 3);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = Registry::default();
        let a = registry.register(peer(), |_| tokio::spawn(async {}).abort_handle());
        let b = registry.register(peer(), |_| tokio::spawn(async {}).abort_handle());
        assert_ne!(a, b);
    }
}
