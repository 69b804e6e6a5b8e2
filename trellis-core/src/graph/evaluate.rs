//! Evaluation engine.
//!
//! # How It Works
//!
//! 1. The first read or write of a node within a memory materializes its
//!    instance: a fresh epoch is created, the producer runs with an
//!    evaluation-mode scope, and every node read through the scope is
//!    recorded as a dependency edge. The instance is inserted after the
//!    producer returns (re-entrant creation of the same key is a caller
//!    error; the outermost evaluation wins the slot, as in the original
//!    engine this models).
//!
//! 2. Subsequent reads return the cached value. Nothing re-runs.
//!
//! 3. A recomputation detaches the node from its previous dependencies'
//!    dependent sets, retires the old epoch (running its cleanups and
//!    disarming any in-flight continuations), re-runs the producer under
//!    a fresh epoch, and commits the result through the write path, so
//!    equality suppression and propagation apply to recomputed values
//!    exactly as they do to written ones.
//!
//! No cycle detection is performed: a producer that synchronously reads
//! itself recurses unboundedly by contract. The commit path's debug
//! depth guard turns runaway *propagation* cycles into a diagnostic
//! panic instead of a stack overflow.

use std::sync::Arc;

use parking_lot::Mutex;

use super::commit;
use super::context::NodeScope;
use super::epoch::Epoch;
use super::instance::{DependencyList, InstanceState};
use super::memory::Memory;
use super::node::{AtomAction, GraphValue, Node, Producer};

/// Return the node's live instance, creating it on first access.
pub(crate) fn materialize<S, A, R>(memory: &Memory, node: &Node<S, A, R>) -> Arc<InstanceState>
where
    S: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    if let Some(existing) = memory.instance(node.key()) {
        return existing;
    }

    let epoch = Epoch::new();
    let dependencies = Mutex::new(DependencyList::new());
    let value = produce(memory, node, &epoch, &dependencies);

    let instance = Arc::new(InstanceState::new(
        node.key().clone(),
        node.erased(),
        Arc::new(value),
        epoch,
        dependencies.into_inner(),
    ));
    memory.install(Arc::clone(&instance));
    tracing::trace!(node = %node.key(), "instance materialized");

    instance
}

/// Read the node's current value, materializing on first access.
pub(crate) fn get_value<S, A, R>(memory: &Memory, node: &Node<S, A, R>) -> S
where
    S: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    materialize(memory, node).value::<S>()
}

fn produce<S, A, R>(
    memory: &Memory,
    node: &Node<S, A, R>,
    epoch: &Arc<Epoch>,
    dependencies: &Mutex<DependencyList>,
) -> S
where
    S: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    match node.producer() {
        Producer::Constant(value) => value.clone(),
        Producer::Computed(producer) => {
            let scope = NodeScope::for_evaluation(memory, node, epoch, dependencies);
            producer.as_ref()(&scope)
        }
    }
}

/// Invalidate the node's current evaluation and compute a fresh value.
///
/// This is both the public `reset` operation and the propagation step
/// applied to every dependent of a committed change.
pub(crate) fn recompute<S, A, R>(memory: &Memory, node: &Node<S, A, R>)
where
    S: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    let instance = materialize(memory, node);

    // Detach the reverse edges first so that nothing recomputes this node
    // against the epoch we are about to retire.
    let old_dependencies = std::mem::take(&mut *instance.dependencies.lock());
    for dependency in &old_dependencies {
        if let Some(dep_instance) = memory.instance(dependency.key()) {
            dep_instance.dependents.lock().shift_remove(node.key());
        }
    }

    let superseded = instance.replace_eval_epoch();
    superseded.retire();

    let epoch = instance.eval_epoch();
    tracing::trace!(node = %node.key(), "recompute");
    let value = produce(memory, node, &epoch, &instance.dependencies);

    commit::commit(memory, node, AtomAction::Put(value), true);
}
