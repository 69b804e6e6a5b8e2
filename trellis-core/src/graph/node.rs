//! Node definitions.
//!
//! A [`Node`] is an immutable descriptor of a reactive computation: a key,
//! a value producer, an action handler, and an optional equality predicate
//! that suppresses redundant propagation. Definitions carry no live state;
//! the mutable half (value, version, edges, listeners) lives in a
//! [`Memory`](super::Memory) and is created lazily on first access.
//!
//! # Producers
//!
//! A producer is either a constant (the node starts at a fixed value and
//! changes only through writes) or a function of a [`NodeScope`]. Reads
//! performed through the scope during evaluation are recorded as
//! dependency edges, so the dependency set is discovered at runtime and
//! re-discovered on every recomputation.
//!
//! # Actions
//!
//! Every definition has an action handler. Atom constructors install the
//! default write-through handler: the action is an [`AtomAction`] that
//! either replaces the value or maps the previous value to the next one.
//! [`Node::with_action`] installs a custom handler with its own action and
//! result types, invoked by the dispatch engine with a dispatch-mode
//! scope.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::context::NodeScope;
use super::key::NodeKey;

/// Bound required of node values: cached values are cloned out of the
/// graph on every read and may cross threads inside async continuations.
pub trait GraphValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> GraphValue for T {}

/// The default action type: write-through replacement.
pub enum AtomAction<S> {
    /// Replace the value outright.
    Put(S),
    /// Derive the next value from the previous one.
    Update(Box<dyn FnOnce(&S) -> S + Send>),
}

impl<S> AtomAction<S> {
    /// Build an [`AtomAction::Update`] from a closure.
    pub fn update(f: impl FnOnce(&S) -> S + Send + 'static) -> Self {
        AtomAction::Update(Box::new(f))
    }

    pub(crate) fn apply(self, prev: &S) -> S {
        match self {
            AtomAction::Put(next) => next,
            AtomAction::Update(f) => f(prev),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for AtomAction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomAction::Put(value) => f.debug_tuple("Put").field(value).finish(),
            AtomAction::Update(_) => f.write_str("Update(..)"),
        }
    }
}

pub(crate) type ProducerFn<S, A, R> =
    Arc<dyn Fn(&NodeScope<S, A, R>) -> S + Send + Sync>;
pub(crate) type ActionFn<S, A, R> =
    Arc<dyn Fn(&NodeScope<S, A, R>, A) -> R + Send + Sync>;
pub(crate) type EqualsFn<S> = Arc<dyn Fn(&S, &S) -> bool + Send + Sync>;
pub(crate) type InspectFn =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Option<serde_json::Value> + Send + Sync>;

/// How a node obtains its value, resolved once at construction.
pub(crate) enum Producer<S: GraphValue, A, R> {
    Constant(S),
    Computed(ProducerFn<S, A, R>),
}

impl<S: GraphValue, A, R> Clone for Producer<S, A, R> {
    fn clone(&self) -> Self {
        match self {
            Producer::Constant(value) => Producer::Constant(value.clone()),
            Producer::Computed(f) => Producer::Computed(Arc::clone(f)),
        }
    }
}

struct NodeInner<S: GraphValue, A, R> {
    key: NodeKey,
    producer: Producer<S, A, R>,
    action: ActionFn<S, A, R>,
    equals: Option<EqualsFn<S>>,
    inspect: Option<InspectFn>,
}

/// Immutable descriptor of a reactive computation.
///
/// Cheap to clone; all clones share one definition. Identity for graph
/// purposes is the key: definitions with equal keys address the same
/// instance within a memory.
pub struct Node<S: GraphValue, A = AtomAction<S>, R = ()> {
    inner: Arc<NodeInner<S, A, R>>,
}

/// A node using the default write-through action.
pub type Atom<S> = Node<S, AtomAction<S>, ()>;

fn write_through<S: GraphValue>() -> ActionFn<S, AtomAction<S>, ()> {
    Arc::new(|scope, action| scope.apply_self(action))
}

impl<S: GraphValue> Node<S> {
    /// A node holding a constant initial value, writable through the
    /// default action.
    pub fn atom(key: impl Into<NodeKey>, value: S) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                key: key.into(),
                producer: Producer::Constant(value),
                action: write_through(),
                equals: None,
                inspect: None,
            }),
        }
    }

    /// A derived node: the producer runs lazily on first read and again on
    /// every recomputation, tracking the nodes it reads as dependencies.
    pub fn computed(
        key: impl Into<NodeKey>,
        producer: impl Fn(&NodeScope<S, AtomAction<S>, ()>) -> S + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                key: key.into(),
                producer: Producer::Computed(Arc::new(producer)),
                action: write_through(),
                equals: None,
                inspect: None,
            }),
        }
    }
}

impl<S, A, R> Node<S, A, R>
where
    S: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    /// A node with a custom dispatch handler. The handler receives a
    /// dispatch-mode scope and the action, and its return value becomes
    /// the dispatch result.
    pub fn with_action(
        key: impl Into<NodeKey>,
        producer: impl Fn(&NodeScope<S, A, R>) -> S + Send + Sync + 'static,
        action: impl Fn(&NodeScope<S, A, R>, A) -> R + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                key: key.into(),
                producer: Producer::Computed(Arc::new(producer)),
                action: Arc::new(action),
                equals: None,
                inspect: None,
            }),
        }
    }

    pub(crate) fn invoke_action(&self, scope: &NodeScope<S, A, R>, action: A) -> R {
        self.inner.action.as_ref()(scope, action)
    }

    pub(crate) fn erased(&self) -> AnyNode {
        AnyNode(Arc::new(ErasedDef(self.clone())))
    }
}

impl<S: GraphValue, A, R> Node<S, A, R> {
    pub fn key(&self) -> &NodeKey {
        &self.inner.key
    }

    /// Whether two handles refer to the same definition object.
    pub fn same_definition(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Install a custom equality predicate. A commit whose candidate value
    /// the predicate reports equal to the current value is dropped
    /// entirely: no version bump, no propagation, no notification.
    pub fn with_equality(self, equals: impl Fn(&S, &S) -> bool + Send + Sync + 'static) -> Self {
        self.rebuild(Some(Arc::new(equals)), self.inner.inspect.clone())
    }

    /// Suppress commits of values equal to the current one.
    pub fn distinct(self) -> Self
    where
        S: PartialEq,
    {
        self.with_equality(S::eq)
    }

    /// Render this node's value in devtools snapshots.
    pub fn inspectable(self) -> Self
    where
        S: Serialize,
    {
        let inspect: InspectFn = Arc::new(|value| {
            value
                .downcast_ref::<S>()
                .and_then(|v| serde_json::to_value(v).ok())
        });
        self.rebuild(self.inner.equals.clone(), Some(inspect))
    }

    fn rebuild(&self, equals: Option<EqualsFn<S>>, inspect: Option<InspectFn>) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                key: self.inner.key.clone(),
                producer: self.inner.producer.clone(),
                action: Arc::clone(&self.inner.action),
                equals,
                inspect,
            }),
        }
    }

    pub(crate) fn producer(&self) -> &Producer<S, A, R> {
        &self.inner.producer
    }

    /// Whether the equality predicate suppresses replacing `prev` with
    /// `next`.
    pub(crate) fn suppresses(&self, prev: &S, next: &S) -> bool {
        match &self.inner.equals {
            Some(equals) => equals.as_ref()(prev, next),
            None => false,
        }
    }
}

impl<S: GraphValue, A, R> Clone for Node<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: GraphValue, A, R> fmt::Debug for Node<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.inner.key)
            .field(
                "producer",
                match &self.inner.producer {
                    Producer::Constant(_) => &"constant",
                    Producer::Computed(_) => &"computed",
                },
            )
            .finish()
    }
}

/// Definition handle with the value type erased.
///
/// Edge sets hold these so that a commit can recompute dependents of any
/// value type through one uniform call.
pub(crate) trait ErasedNode: Send + Sync {
    fn key(&self) -> &NodeKey;
    fn recompute(&self, memory: &super::memory::Memory);
    fn render_value(&self, value: &(dyn Any + Send + Sync)) -> Option<serde_json::Value>;
}

struct ErasedDef<S: GraphValue, A, R>(Node<S, A, R>);

impl<S, A, R> ErasedNode for ErasedDef<S, A, R>
where
    S: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    fn key(&self) -> &NodeKey {
        self.0.key()
    }

    fn recompute(&self, memory: &super::memory::Memory) {
        super::evaluate::recompute(memory, &self.0);
    }

    fn render_value(&self, value: &(dyn Any + Send + Sync)) -> Option<serde_json::Value> {
        self.0.inner.inspect.as_ref().and_then(|f| f.as_ref()(value))
    }
}

#[derive(Clone)]
pub(crate) struct AnyNode(Arc<dyn ErasedNode>);

impl AnyNode {
    pub(crate) fn key(&self) -> &NodeKey {
        self.0.key()
    }

    pub(crate) fn recompute(&self, memory: &super::memory::Memory) {
        self.0.recompute(memory);
    }

    pub(crate) fn render_value(
        &self,
        value: &(dyn Any + Send + Sync),
    ) -> Option<serde_json::Value> {
        self.0.render_value(value)
    }
}

impl fmt::Debug for AnyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyNode").field(self.key()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_action_applies() {
        assert_eq!(AtomAction::Put(5).apply(&1), 5);
        assert_eq!(AtomAction::update(|prev: &i64| prev + 2).apply(&1), 3);
    }

    #[test]
    fn clones_share_the_definition() {
        let node = Node::atom("counter", 0i64);
        let other = node.clone();

        assert!(node.same_definition(&other));
        assert_eq!(node.key(), other.key());
    }

    #[test]
    fn rebuilt_definitions_keep_the_key() {
        let node = Node::atom("counter", 0i64).distinct();
        assert_eq!(node.key(), &NodeKey::from("counter"));
    }

    #[test]
    fn default_equality_never_suppresses() {
        let node = Node::atom("counter", 0i64);
        assert!(!node.suppresses(&1, &1));
    }

    #[test]
    fn distinct_suppresses_equal_values() {
        let node = Node::atom("counter", 0i64).distinct();
        assert!(node.suppresses(&1, &1));
        assert!(!node.suppresses(&1, &2));
    }

    #[test]
    fn custom_equality_wins() {
        let node = Node::atom("frozen", 0i64).with_equality(|_, _| true);
        assert!(node.suppresses(&1, &2));
    }
}
