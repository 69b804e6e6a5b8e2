//! Graph memory.
//!
//! A [`Memory`] owns every live instance of a node domain: values,
//! versions, edges, listeners, and epochs. Instances are created lazily
//! on first access and live until the memory is destroyed; there is no
//! per-instance garbage collection. Handles are cheap clones sharing one
//! underlying store, so a memory can be captured by async continuations.
//!
//! # Batch scheduling
//!
//! Listener notification for a batch is handed to the memory's
//! [`BatchScheduler`] as an owned flush closure. The default scheduler
//! runs it immediately and synchronously; a host (a UI framework's
//! commit phase, a test harness) can instead queue the closure and run
//! it when it chooses. The scheduler only controls *when* the flush
//! runs; coalescing and ordering are fixed by the engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::commit;
use super::dispatch;
use super::evaluate;
use super::instance::{ErasedListener, InstanceState};
use super::key::NodeKey;
use super::node::{AtomAction, GraphValue, Node};

/// Owned flush closure delivering one batch's notifications.
pub type FlushFn = Box<dyn FnOnce() + Send>;

/// Host hook deciding when a batch flush runs.
pub type BatchScheduler = Arc<dyn Fn(FlushFn) + Send + Sync>;

static MEMORY_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

struct MemoryInner {
    id: u64,
    nodes: DashMap<NodeKey, Arc<InstanceState>>,
    scheduler: BatchScheduler,
}

/// Process-lifetime-scoped storage for node instances.
pub struct Memory {
    inner: Arc<MemoryInner>,
}

impl Memory {
    /// A memory whose batches flush immediately and synchronously.
    pub fn new() -> Self {
        Self::with_scheduler(|flush| flush())
    }

    /// A memory whose batch flushes are handed to `scheduler`.
    pub fn with_scheduler(scheduler: impl Fn(FlushFn) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                id: MEMORY_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                nodes: DashMap::new(),
                scheduler: Arc::new(scheduler),
            }),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    pub(crate) fn instance(&self, key: &NodeKey) -> Option<Arc<InstanceState>> {
        self.inner.nodes.get(key).map(|entry| Arc::clone(&entry))
    }

    pub(crate) fn install(&self, instance: Arc<InstanceState>) {
        self.inner.nodes.insert(instance.key().clone(), instance);
    }

    pub(crate) fn all_instances(&self) -> Vec<Arc<InstanceState>> {
        self.inner
            .nodes
            .iter()
            .map(|entry| Arc::clone(&entry))
            .collect()
    }

    /// Read a node's current value, materializing it on first access.
    pub fn get<S, A, R>(&self, node: &Node<S, A, R>) -> S
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        evaluate::get_value(self, node)
    }

    /// Run the node's action handler.
    pub fn dispatch<S, A, R>(&self, node: &Node<S, A, R>, action: A) -> R
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        dispatch::dispatch(self, node, action)
    }

    /// Write a node directly, bypassing its action handler.
    pub fn put<S, A, R>(&self, node: &Node<S, A, R>, value: S)
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        commit::commit(self, node, AtomAction::Put(value), true);
    }

    /// Derive a node's next value from its previous one, bypassing its
    /// action handler.
    pub fn update<S, A, R>(&self, node: &Node<S, A, R>, f: impl FnOnce(&S) -> S + Send + 'static)
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        commit::commit(self, node, AtomAction::update(f), true);
    }

    /// Invalidate the node's current evaluation and recompute it.
    pub fn reset<S, A, R>(&self, node: &Node<S, A, R>)
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        evaluate::recompute(self, node);
    }

    /// Force-set a node's value without propagation or notification.
    ///
    /// For installing server-computed initial state before subscribers
    /// attach. Dependents are not recomputed and listeners do not fire;
    /// the version still bumps so stale readers can detect the change.
    pub fn hydrate<S, A, R>(&self, node: &Node<S, A, R>, value: S)
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        let instance = evaluate::materialize(self, node);
        let mut state = instance.state.write();
        state.value = Arc::new(value);
        state.version += 1;
        tracing::debug!(node = %node.key(), version = state.version, "hydrate");
    }

    /// Register a listener invoked with the node's value after each
    /// committed batch that touched it.
    pub fn subscribe<S, A, R>(
        &self,
        node: &Node<S, A, R>,
        listener: impl Fn(&S) + Send + Sync + 'static,
    ) -> Subscription
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        let instance = evaluate::materialize(self, node);
        let erased: ErasedListener = Arc::new(move |value| {
            if let Some(value) = value.downcast_ref::<S>() {
                listener(value);
            }
        });
        let id = instance.listeners.lock().add(erased);
        Subscription {
            memory: self.clone(),
            key: node.key().clone(),
            id,
        }
    }

    /// Whether the node has a live instance in this memory.
    pub fn exists<S, A, R>(&self, node: &Node<S, A, R>) -> bool
    where
        S: GraphValue,
    {
        self.inner.nodes.contains_key(node.key())
    }

    /// The node's commit version, materializing it on first access.
    pub fn version<S, A, R>(&self, node: &Node<S, A, R>) -> u64
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        evaluate::materialize(self, node).version()
    }

    /// Number of live instances.
    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    /// Tear the memory down: retire every instance's evaluation and
    /// dispatch epochs (running outstanding cleanups) and drop all
    /// instances.
    pub fn destroy(&self) {
        let instances = self.all_instances();
        tracing::debug!(memory = self.inner.id, nodes = instances.len(), "destroy");
        for instance in &instances {
            instance.replace_eval_epoch().retire();
            instance.replace_dispatch_epoch().retire();
        }
        self.inner.nodes.clear();
    }

    /// Deliver one batch's notifications through the scheduler.
    pub(crate) fn deliver_batch(&self, keys: Vec<NodeKey>) {
        let memory = self.clone();
        let flush: FlushFn = Box::new(move || {
            for key in &keys {
                let Some(instance) = memory.instance(key) else {
                    continue;
                };
                let listeners = instance.listeners.lock().snapshot();
                if listeners.is_empty() {
                    continue;
                }
                let value = Arc::clone(&instance.state.read().value);
                for listener in listeners {
                    listener.as_ref()(value.as_ref());
                }
            }
        });
        self.inner.scheduler.as_ref()(flush);
    }
}

impl Clone for Memory {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("id", &self.inner.id)
            .field("nodes", &self.inner.nodes.len())
            .finish()
    }
}

/// Handle returned by [`Memory::subscribe`]; listeners stay registered
/// until explicitly unsubscribed or the memory is destroyed.
pub struct Subscription {
    memory: Memory,
    key: NodeKey,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(instance) = self.memory.instance(&self.key) {
            instance.listeners.lock().remove(self.id);
        }
    }
}
