//! Update batching.
//!
//! A commit and every recomputation it triggers form one batch. The batch
//! is scoped to the outermost commit on the current thread: nested
//! commits (dependents writing during propagation) enqueue listener
//! notifications instead of flushing them, and the queue drains once the
//! outermost commit completes. Notifications are deduplicated by node, so
//! a node committed several times within a batch notifies its listeners
//! at most once, with its final value; cross-node order is the order
//! commits were first seen.
//!
//! The thread-local scope mirrors how the engine itself is re-entrant:
//! all propagation for one logical update runs synchronously on the
//! calling thread, so a per-thread depth counter is exactly the "outermost
//! call in the stack" the flush must wait for.

use std::cell::RefCell;

use indexmap::IndexMap;

use super::key::NodeKey;
use super::memory::Memory;

#[cfg(debug_assertions)]
use super::error::GraphError;

/// Debug-build bound on recursive dependent recomputation. Deep enough
/// for any realistic graph, shallow enough to fail before the stack does.
#[cfg(debug_assertions)]
const MAX_RECOMPUTE_DEPTH: usize = 128;

#[derive(Default)]
struct BatchState {
    depth: usize,
    recompute_depth: usize,
    /// Pending notifications keyed by (memory id, node key); the map
    /// preserves first-seen order.
    queue: IndexMap<(u64, NodeKey), Memory>,
}

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
}

/// RAII scope for one commit level. [`BatchGuard::finish`] flushes the
/// queue when the outermost level exits; plain drop (unwinding out of a
/// panicking producer) rebalances the counter and discards the queue.
pub(crate) struct BatchGuard {
    finished: bool,
}

pub(crate) fn enter() -> BatchGuard {
    BATCH.with(|batch| batch.borrow_mut().depth += 1);
    BatchGuard { finished: false }
}

impl BatchGuard {
    pub(crate) fn finish(mut self) {
        self.finished = true;
        let pending = BATCH.with(|batch| {
            let mut state = batch.borrow_mut();
            state.depth -= 1;
            if state.depth == 0 {
                std::mem::take(&mut state.queue)
            } else {
                IndexMap::new()
            }
        });
        if !pending.is_empty() {
            flush(pending);
        }
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if !self.finished {
            BATCH.with(|batch| {
                let mut state = batch.borrow_mut();
                state.depth -= 1;
                if state.depth == 0 {
                    state.queue.clear();
                }
            });
        }
    }
}

/// Queue a node for listener notification at the end of the current batch.
pub(crate) fn enqueue(memory: &Memory, key: NodeKey) {
    BATCH.with(|batch| {
        batch
            .borrow_mut()
            .queue
            .entry((memory.id(), key))
            .or_insert_with(|| memory.clone());
    });
}

fn flush(pending: IndexMap<(u64, NodeKey), Memory>) {
    // One scheduler invocation per memory, preserving first-seen order
    // both across memories and across nodes within a memory.
    let mut groups: IndexMap<u64, (Memory, Vec<NodeKey>)> = IndexMap::new();
    for ((memory_id, key), memory) in pending {
        groups
            .entry(memory_id)
            .or_insert_with(|| (memory, Vec::new()))
            .1
            .push(key);
    }
    for (_, (memory, keys)) in groups {
        memory.deliver_batch(keys);
    }
}

/// Guard around one recursive dependent recomputation.
pub(crate) struct DepthGuard;

pub(crate) fn guard_recompute(key: &NodeKey) -> DepthGuard {
    #[cfg(debug_assertions)]
    BATCH.with(|batch| {
        let mut state = batch.borrow_mut();
        state.recompute_depth += 1;
        if state.recompute_depth > MAX_RECOMPUTE_DEPTH {
            state.recompute_depth = 0;
            panic!(
                "{}",
                GraphError::RecursionLimit {
                    key: key.clone(),
                    limit: MAX_RECOMPUTE_DEPTH,
                }
            );
        }
    });
    #[cfg(not(debug_assertions))]
    let _ = key;
    DepthGuard
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        BATCH.with(|batch| {
            let mut state = batch.borrow_mut();
            state.recompute_depth = state.recompute_depth.saturating_sub(1);
        });
    }
}
