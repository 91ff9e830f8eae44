//! Per-punk operation locks.
//!
//! All mutating marketplace operations on one punk are serialised; a
//! second concurrent operation is rejected immediately rather than queued,
//! so a stalled wallet RPC in one request can never stack up callers
//! behind it. The guard releases the punk on drop, error paths included.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use punks_core::PunkId;

/// Try-acquire lock set keyed by punk id.
#[derive(Clone, Default)]
pub struct PunkLocks {
    held: Arc<Mutex<HashSet<PunkId>>>,
}

impl PunkLocks {
    /// Creates an empty lock set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to take the punk. Returns `None` when another operation
    /// holds it.
    pub fn try_acquire(&self, punk_id: &PunkId) -> Option<PunkGuard> {
        let mut held = self.held.lock().unwrap();
        if !held.insert(*punk_id) {
            return None;
        }
        Some(PunkGuard {
            held: Arc::clone(&self.held),
            punk_id: *punk_id,
        })
    }

    /// Whether the punk is currently held (diagnostics only -- the answer
    /// is stale the moment it returns).
    pub fn is_held(&self, punk_id: &PunkId) -> bool {
        self.held.lock().unwrap().contains(punk_id)
    }
}

/// RAII guard for one punk.
pub struct PunkGuard {
    held: Arc<Mutex<HashSet<PunkId>>>,
    punk_id: PunkId,
}

impl Drop for PunkGuard {
    fn drop(&mut self) {
        self.held.lock().unwrap().remove(&self.punk_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(byte: u8) -> PunkId {
        PunkId::from_bytes([byte; 32])
    }

    #[test]
    fn second_acquire_is_rejected() {
        let locks = PunkLocks::new();
        let guard = locks.try_acquire(&pid(1)).unwrap();
        assert!(locks.try_acquire(&pid(1)).is_none());
        drop(guard);
        assert!(locks.try_acquire(&pid(1)).is_some());
    }

    #[test]
    fn distinct_punks_are_independent() {
        let locks = PunkLocks::new();
        let _a = locks.try_acquire(&pid(1)).unwrap();
        let _b = locks.try_acquire(&pid(2)).unwrap();
        assert!(locks.is_held(&pid(1)));
        assert!(locks.is_held(&pid(2)));
    }

    #[test]
    fn guard_releases_on_drop_mid_scope() {
        let locks = PunkLocks::new();
        {
            let _guard = locks.try_acquire(&pid(3)).unwrap();
            assert!(locks.is_held(&pid(3)));
        }
        assert!(!locks.is_held(&pid(3)));
    }
}
