//! Liveness tokens for evaluations and dispatches.
//!
//! Every producer invocation and every dispatch runs under an [`Epoch`].
//! When the node is recomputed (or a newer dispatch starts), the previous
//! epoch is retired: its registered cleanups run exactly once and its
//! `alive` flag flips to false. In-flight asynchronous continuations hold
//! an `Arc<Epoch>` and check the flag before applying effects, so work
//! belonging to a superseded computation quietly becomes a no-op instead
//! of corrupting newer state.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

/// Teardown registered against an epoch, run once at retirement.
pub type CleanupFn = Box<dyn FnOnce() + Send>;

/// A liveness token guarding one evaluation or dispatch invocation.
pub struct Epoch {
    alive: AtomicBool,
    cleanups: Mutex<SmallVec<[CleanupFn; 2]>>,
}

impl Epoch {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(true),
            cleanups: Mutex::new(SmallVec::new()),
        })
    }

    /// Whether the computation this epoch guards is still current.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Store a cleanup to run at retirement.
    ///
    /// A cleanup handed to an already-retired epoch runs immediately.
    pub(crate) fn push_cleanup(&self, cleanup: CleanupFn) {
        if !self.is_alive() {
            cleanup();
            return;
        }
        self.cleanups.lock().push(cleanup);
    }

    /// Run outstanding cleanups and mark the epoch dead.
    pub(crate) fn retire(&self) {
        let pending = std::mem::take(&mut *self.cleanups.lock());
        for cleanup in pending {
            cleanup();
        }
        self.alive.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Epoch")
            .field("alive", &self.is_alive())
            .field("cleanups", &self.cleanups.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn retire_runs_cleanups_once() {
        let epoch = Epoch::new();
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();

        epoch.push_cleanup(Box::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(epoch.is_alive());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        epoch.retire();
        assert!(!epoch.is_alive());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // A second retirement has nothing left to run.
        epoch.retire();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_after_retirement_runs_immediately() {
        let epoch = Epoch::new();
        epoch.retire();

        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        epoch.push_cleanup(Box::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
