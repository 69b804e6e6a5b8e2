//! Live per-memory node state.
//!
//! One [`InstanceState`] exists per key per memory, created lazily the
//! first time its definition is read or written. The committed value is
//! stored type-erased because a single memory holds nodes of many value
//! types; reads downcast back to the definition's value type.
//!
//! Edges are split into the forward dependency list (nodes read during
//! the most recent evaluation epoch) and the insertion-ordered reverse
//! dependent map (nodes that read this one). Both are rebuilt each epoch;
//! neither survives a recomputation.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::epoch::Epoch;
use super::error::GraphError;
use super::key::NodeKey;
use super::node::{AnyNode, GraphValue};

pub(crate) type SharedValue = Arc<dyn Any + Send + Sync>;
pub(crate) type ErasedListener = Arc<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>;
pub(crate) type DependencyList = SmallVec<[AnyNode; 4]>;

/// The committed value and its monotonically increasing version.
pub(crate) struct Committed {
    pub(crate) value: SharedValue,
    pub(crate) version: u64,
}

/// External listeners registered against one instance.
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: u64,
    entries: Vec<(u64, ErasedListener)>,
}

impl ListenerSet {
    pub(crate) fn add(&mut self, listener: ErasedListener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    pub(crate) fn snapshot(&self) -> Vec<ErasedListener> {
        self.entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

/// Mutable state for one node within one memory.
pub(crate) struct InstanceState {
    key: NodeKey,
    /// Erased handle to the defining node, kept for devtools rendering.
    pub(crate) definition: AnyNode,
    pub(crate) state: RwLock<Committed>,
    pub(crate) dependencies: Mutex<DependencyList>,
    pub(crate) dependents: Mutex<IndexMap<NodeKey, AnyNode>>,
    pub(crate) listeners: Mutex<ListenerSet>,
    eval_epoch: Mutex<Arc<Epoch>>,
    dispatch_epoch: Mutex<Arc<Epoch>>,
}

impl InstanceState {
    pub(crate) fn new(
        key: NodeKey,
        definition: AnyNode,
        value: SharedValue,
        eval_epoch: Arc<Epoch>,
        dependencies: DependencyList,
    ) -> Self {
        Self {
            key,
            definition,
            state: RwLock::new(Committed { value, version: 0 }),
            dependencies: Mutex::new(dependencies),
            dependents: Mutex::new(IndexMap::new()),
            listeners: Mutex::new(ListenerSet::default()),
            eval_epoch: Mutex::new(eval_epoch),
            dispatch_epoch: Mutex::new(Epoch::new()),
        }
    }

    pub(crate) fn key(&self) -> &NodeKey {
        &self.key
    }

    /// Clone the committed value back out at the definition's type.
    pub(crate) fn value<S: GraphValue>(&self) -> S {
        let state = self.state.read();
        match state.value.downcast_ref::<S>() {
            Some(value) => value.clone(),
            None => panic!(
                "{}",
                GraphError::KeyTypeMismatch {
                    key: self.key.clone()
                }
            ),
        }
    }

    pub(crate) fn version(&self) -> u64 {
        self.state.read().version
    }

    pub(crate) fn eval_epoch(&self) -> Arc<Epoch> {
        Arc::clone(&self.eval_epoch.lock())
    }

    /// Install a fresh evaluation epoch, returning the superseded one.
    pub(crate) fn replace_eval_epoch(&self) -> Arc<Epoch> {
        std::mem::replace(&mut *self.eval_epoch.lock(), Epoch::new())
    }

    pub(crate) fn dispatch_epoch(&self) -> Arc<Epoch> {
        Arc::clone(&self.dispatch_epoch.lock())
    }

    /// Install a fresh dispatch epoch, returning the superseded one.
    pub(crate) fn replace_dispatch_epoch(&self) -> Arc<Epoch> {
        std::mem::replace(&mut *self.dispatch_epoch.lock(), Epoch::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::Node;

    fn test_instance(value: i64) -> InstanceState {
        let node = Node::atom("test", value);
        InstanceState::new(
            NodeKey::from("test"),
            node.erased(),
            Arc::new(value),
            Epoch::new(),
            DependencyList::new(),
        )
    }

    #[test]
    fn value_roundtrips_through_erasure() {
        let instance = test_instance(42);
        assert_eq!(instance.value::<i64>(), 42);
        assert_eq!(instance.version(), 0);
    }

    #[test]
    #[should_panic(expected = "different value type")]
    fn mismatched_value_type_panics() {
        let instance = test_instance(42);
        let _: String = instance.value::<String>();
    }

    #[test]
    fn replacing_epochs_supersedes_the_old_one() {
        let instance = test_instance(0);
        let first = instance.eval_epoch();

        let superseded = instance.replace_eval_epoch();
        assert!(Arc::ptr_eq(&first, &superseded));
        assert!(!Arc::ptr_eq(&first, &instance.eval_epoch()));
    }

    #[test]
    fn listener_set_add_remove() {
        let mut listeners = ListenerSet::default();
        let a = listeners.add(Arc::new(|_| {}));
        let b = listeners.add(Arc::new(|_| {}));
        assert_ne!(a, b);
        assert_eq!(listeners.snapshot().len(), 2);

        listeners.remove(a);
        assert_eq!(listeners.snapshot().len(), 1);
    }
}
