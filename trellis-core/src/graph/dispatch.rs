//! Dispatch engine.
//!
//! A dispatch runs a node's action handler. Before the handler is
//! invoked, the node's previous dispatch epoch is retired: its cleanups
//! run and any continuation still holding it finds the flag dead. A
//! slow asynchronous effect belonging to an earlier dispatch therefore
//! cannot mutate graph state after a newer dispatch on the same node has
//! started.
//!
//! Dispatch epochs are deliberately separate from evaluation epochs: a
//! node can be mid-recomputation while also receiving a write without
//! the two invalidation streams crossing each other's cleanup
//! bookkeeping.

use super::context::NodeScope;
use super::evaluate;
use super::memory::Memory;
use super::node::{GraphValue, Node};

pub(crate) fn dispatch<S, A, R>(memory: &Memory, node: &Node<S, A, R>, action: A) -> R
where
    S: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    let instance = evaluate::materialize(memory, node);

    let superseded = instance.replace_dispatch_epoch();
    superseded.retire();

    let epoch = instance.dispatch_epoch();
    tracing::trace!(node = %node.key(), "dispatch");
    let scope = NodeScope::for_dispatch(memory, node, &epoch);
    node.invoke_action(&scope, action)
}
