//! Capability contexts handed to producers and action handlers.
//!
//! A [`NodeScope`] is the only way user code reaches back into the graph
//! while the engine is running it. Every capability is checked against the
//! epoch of the invocation that created the scope: once that evaluation or
//! dispatch has been superseded, writes and resets silently no-op,
//! recursive dispatch yields `None`, and dependency edges discovered late
//! (inside a resolved asynchronous continuation) are dropped. Reads are
//! never gated; only their side effects on the graph are.
//!
//! [`NodeHandle`] is the owned, `Send` form of the same capability set,
//! for continuations that outlive the synchronous invocation: a producer
//! can hand a handle to a spawned task, and the handle's writes apply only
//! while the issuing epoch is still current. This is the engine's
//! cancellation model: superseded work is never aborted, it is disarmed.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use super::commit;
use super::dispatch;
use super::epoch::{CleanupFn, Epoch};
use super::error::Superseded;
use super::evaluate;
use super::instance::DependencyList;
use super::key::NodeKey;
use super::memory::Memory;
use super::node::{AtomAction, GraphValue, Node};

/// Context passed to producers (evaluation mode) and action handlers
/// (dispatch mode). Evaluation mode additionally records dependency
/// edges for reads made through [`NodeScope::get`].
pub struct NodeScope<'a, S: GraphValue, A = AtomAction<S>, R = ()> {
    memory: &'a Memory,
    node: &'a Node<S, A, R>,
    epoch: &'a Arc<Epoch>,
    /// `Some` while evaluating a producer; reads register edges here.
    tracking: Option<&'a Mutex<DependencyList>>,
}

impl<'a, S, A, R> NodeScope<'a, S, A, R>
where
    S: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    pub(crate) fn for_evaluation(
        memory: &'a Memory,
        node: &'a Node<S, A, R>,
        epoch: &'a Arc<Epoch>,
        tracking: &'a Mutex<DependencyList>,
    ) -> Self {
        Self {
            memory,
            node,
            epoch,
            tracking: Some(tracking),
        }
    }

    pub(crate) fn for_dispatch(
        memory: &'a Memory,
        node: &'a Node<S, A, R>,
        epoch: &'a Arc<Epoch>,
    ) -> Self {
        Self {
            memory,
            node,
            epoch,
            tracking: None,
        }
    }

    /// Read another node's current value.
    ///
    /// In evaluation mode, while the issuing epoch is alive, this also
    /// registers a dependency edge so a later change to `other` recomputes
    /// this node. Reads after supersession still return the value but
    /// leave no edge behind.
    pub fn get<S2, A2, R2>(&self, other: &Node<S2, A2, R2>) -> S2
    where
        S2: GraphValue,
        A2: Send + 'static,
        R2: 'static,
    {
        let instance = evaluate::materialize(self.memory, other);
        if self.epoch.is_alive() {
            if let Some(tracking) = self.tracking {
                let mut dependencies = tracking.lock();
                if !dependencies.iter().any(|dep| dep.key() == other.key()) {
                    dependencies.push(other.erased());
                }
                drop(dependencies);
                instance
                    .dependents
                    .lock()
                    .insert(self.node.key().clone(), self.node.erased());
            }
        }
        instance.value::<S2>()
    }

    /// Read this node's own current value without creating a self-edge.
    ///
    /// Calling this during the node's own first evaluation recurses into
    /// materialization and does not terminate; that is a caller error, by
    /// contract.
    pub fn get_self(&self) -> S {
        evaluate::get_value(self.memory, self.node)
    }

    /// Write another node directly, bypassing its action handler.
    /// Dropped if the issuing epoch has been superseded.
    pub fn mutate<S2, A2, R2>(&self, other: &Node<S2, A2, R2>, value: S2)
    where
        S2: GraphValue,
        A2: Send + 'static,
        R2: 'static,
    {
        if self.epoch.is_alive() {
            commit::commit(self.memory, other, AtomAction::Put(value), true);
        }
    }

    /// Write this node directly. Dropped if the epoch is superseded.
    pub fn mutate_self(&self, value: S) {
        self.apply_self(AtomAction::Put(value));
    }

    /// Derive another node's next value from its previous one.
    pub fn update<S2, A2, R2>(
        &self,
        other: &Node<S2, A2, R2>,
        f: impl FnOnce(&S2) -> S2 + Send + 'static,
    ) where
        S2: GraphValue,
        A2: Send + 'static,
        R2: 'static,
    {
        if self.epoch.is_alive() {
            commit::commit(self.memory, other, AtomAction::update(f), true);
        }
    }

    /// Derive this node's next value from its previous one.
    pub fn update_self(&self, f: impl FnOnce(&S) -> S + Send + 'static) {
        self.apply_self(AtomAction::update(f));
    }

    pub(crate) fn apply_self(&self, action: AtomAction<S>) {
        if self.epoch.is_alive() {
            commit::commit(self.memory, self.node, action, true);
        }
    }

    /// Dispatch an action to another node. Returns `None` once the
    /// issuing epoch has been superseded.
    pub fn set<S2, A2, R2>(&self, other: &Node<S2, A2, R2>, action: A2) -> Option<R2>
    where
        S2: GraphValue,
        A2: Send + 'static,
        R2: 'static,
    {
        if self.epoch.is_alive() {
            Some(dispatch::dispatch(self.memory, other, action))
        } else {
            None
        }
    }

    /// Dispatch an action to this node (re-entering the dispatch engine,
    /// which supersedes the current dispatch epoch). Returns `None` once
    /// the issuing epoch has been superseded.
    pub fn set_self(&self, action: A) -> Option<R> {
        if self.epoch.is_alive() {
            Some(dispatch::dispatch(self.memory, self.node, action))
        } else {
            None
        }
    }

    /// Force another node to recompute. Epoch-gated.
    pub fn reset<S2, A2, R2>(&self, other: &Node<S2, A2, R2>)
    where
        S2: GraphValue,
        A2: Send + 'static,
        R2: 'static,
    {
        if self.epoch.is_alive() {
            evaluate::recompute(self.memory, other);
        }
    }

    /// Force this node to recompute. Epoch-gated.
    pub fn reset_self(&self) {
        if self.epoch.is_alive() {
            evaluate::recompute(self.memory, self.node);
        }
    }

    /// Run a setup action scoped to the current epoch.
    ///
    /// `setup` runs immediately (and only) while the epoch is alive; a
    /// returned teardown is stored on the epoch and runs exactly once
    /// when the epoch is retired. Timers and external event listeners
    /// register here so they are torn down on recomputation.
    pub fn subscription(&self, setup: impl FnOnce() -> Option<CleanupFn>) {
        if self.epoch.is_alive() {
            if let Some(cleanup) = setup() {
                self.epoch.push_cleanup(cleanup);
            }
        }
    }

    /// Tie a future's settlement to the current epoch.
    ///
    /// The returned future yields `Err(Superseded)` if the epoch has been
    /// invalidated by the time the inner future settles, so stale
    /// asynchronous continuations cannot act on a superseded computation.
    pub fn resolve<T, F>(&self, future: F) -> impl Future<Output = Result<T, Superseded>>
    where
        F: Future<Output = T>,
    {
        let epoch = Arc::clone(self.epoch);
        async move {
            let value = future.await;
            if epoch.is_alive() {
                Ok(value)
            } else {
                Err(Superseded)
            }
        }
    }

    /// An owned, `Send` capability over this node, gated on the current
    /// epoch. Hand it to spawned tasks that settle later.
    pub fn handle(&self) -> NodeHandle<S, A, R> {
        NodeHandle {
            memory: self.memory.clone(),
            node: self.node.clone(),
            epoch: Arc::clone(self.epoch),
        }
    }

    pub fn key(&self) -> &NodeKey {
        self.node.key()
    }
}

/// Owned capability over one node, checked against the epoch that issued
/// it. All operations are silent no-ops (or `None`) once that epoch has
/// been superseded.
pub struct NodeHandle<S: GraphValue, A = AtomAction<S>, R = ()> {
    memory: Memory,
    node: Node<S, A, R>,
    epoch: Arc<Epoch>,
}

impl<S, A, R> NodeHandle<S, A, R>
where
    S: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    /// Whether the issuing epoch is still current.
    pub fn is_live(&self) -> bool {
        self.epoch.is_alive()
    }

    /// Write the node directly. No-op once superseded.
    pub fn mutate_self(&self, value: S) {
        if self.epoch.is_alive() {
            commit::commit(&self.memory, &self.node, AtomAction::Put(value), true);
        }
    }

    /// Derive the node's next value from its previous one. No-op once
    /// superseded.
    pub fn update_self(&self, f: impl FnOnce(&S) -> S + Send + 'static) {
        if self.epoch.is_alive() {
            commit::commit(&self.memory, &self.node, AtomAction::update(f), true);
        }
    }

    /// Dispatch an action to the node. `None` once superseded.
    pub fn set_self(&self, action: A) -> Option<R> {
        if self.epoch.is_alive() {
            Some(dispatch::dispatch(&self.memory, &self.node, action))
        } else {
            None
        }
    }

    /// Force the node to recompute. No-op once superseded.
    pub fn reset_self(&self) {
        if self.epoch.is_alive() {
            evaluate::recompute(&self.memory, &self.node);
        }
    }

    pub fn key(&self) -> &NodeKey {
        self.node.key()
    }
}

impl<S: GraphValue, A, R> Clone for NodeHandle<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            memory: self.memory.clone(),
            node: self.node.clone(),
            epoch: Arc::clone(&self.epoch),
        }
    }
}
