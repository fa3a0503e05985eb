//! Advisory per-namespace locking
//!
//! Mutating operations on one video id hold that id exclusively. Wiping the
//! whole store takes the gate in write mode, which waits for every
//! in-flight per-id operation and blocks new ones until it is done.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::namespace::VideoId;

#[derive(Debug, Default)]
pub struct NamespaceLocks {
    gate: RwLock<()>,
    held: Mutex<HashSet<VideoId>>,
    released: Condvar,
}

/// Exclusive hold on one id, released on drop
#[derive(Debug)]
pub struct NamespaceGuard<'a> {
    locks: &'a NamespaceLocks,
    id: VideoId,
    _gate: RwLockReadGuard<'a, ()>,
}

impl NamespaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `id` is free, then hold it
    pub fn lock(&self, id: &VideoId) -> NamespaceGuard<'_> {
        let gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(id) {
            debug!("⏳ Waiting for namespace {}", id);
            held = self.released.wait(held).unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(id.clone());

        NamespaceGuard {
            locks: self,
            id: id.clone(),
            _gate: gate,
        }
    }

    /// Exclude every per-id operation
    pub fn lock_all(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_locked(&self, id: &VideoId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

impl Drop for NamespaceGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.id);
        self.locks.released.notify_all();
    }
}
