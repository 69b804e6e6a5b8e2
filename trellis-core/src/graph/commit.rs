//! The write path.
//!
//! # How It Works
//!
//! 1. The candidate value is computed against a clone of the previous
//!    value, outside any lock, and checked against the node's equality
//!    predicate. An equal candidate is dropped entirely: no version bump,
//!    no propagation, no notification. This is the referential-stability
//!    gate that keeps redundant writes from rippling through the graph.
//!
//! 2. Otherwise the value is replaced and the version bumped, the node is
//!    queued for listener notification, and every current dependent is
//!    recomputed, depth-first. Dependent recomputation commits again
//!    through this same path, so propagation is recursive; the dependent
//!    set is snapshotted before iteration because recomputation rewires
//!    the live set.
//!
//! 3. All of this runs inside a batch scope (see [`super::batch`]):
//!    listeners hear nothing until the outermost commit on the thread
//!    completes, and each node notifies at most once per batch with its
//!    final value.
//!
//! A panicking producer or equality predicate propagates to the caller
//! with the previous committed value intact; the write path is never
//! reached.

use super::batch;
use super::evaluate;
use super::memory::Memory;
use super::node::{AnyNode, AtomAction, GraphValue, Node};

pub(crate) fn commit<S, A, R>(
    memory: &Memory,
    node: &Node<S, A, R>,
    action: AtomAction<S>,
    notify: bool,
) where
    S: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    let instance = evaluate::materialize(memory, node);

    let previous: S = instance.value();
    let next = action.apply(&previous);
    if node.suppresses(&previous, &next) {
        tracing::trace!(node = %node.key(), "commit suppressed by equality");
        return;
    }

    let batch_scope = batch::enter();

    let version = {
        let mut state = instance.state.write();
        state.value = std::sync::Arc::new(next);
        state.version += 1;
        state.version
    };
    tracing::trace!(node = %node.key(), version, "commit");

    if notify {
        batch::enqueue(memory, node.key().clone());
    }

    // Snapshot: recomputation mutates the live dependent set.
    let dependents: Vec<AnyNode> = instance.dependents.lock().values().cloned().collect();
    for dependent in dependents {
        let _depth = batch::guard_recompute(dependent.key());
        dependent.recompute(memory);
    }

    batch_scope.finish();
}
