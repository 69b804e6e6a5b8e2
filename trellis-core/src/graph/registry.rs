//! Key-based definition reuse.
//!
//! A [`Registry`] memoizes node definitions by key: constructing a node
//! under a key that is already registered returns the existing
//! definition, so widely-shared nodes can be declared at their point of
//! use without coordination. The registry is an explicit object with an
//! owned lifetime: inject one per domain rather than reaching for
//! process-global state.
//!
//! [`Registry::isolated`] is the documented exception mode: every
//! definition receives a fresh generated identity regardless of key
//! collisions, so repeated construction in a test suite cannot leak
//! state across cases through shared keys.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::NodeScope;
use super::error::GraphError;
use super::key::NodeKey;
use super::node::{AtomAction, GraphValue, Node};

/// How colliding keys are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Same key, same definition (idempotent construction).
    Memoize,
    /// Every definition gets a fresh generated identity.
    Isolate,
}

struct RegistryInner {
    policy: KeyPolicy,
    nodes: Mutex<HashMap<NodeKey, Box<dyn Any + Send + Sync>>>,
}

/// An explicit key → definition store.
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// A memoizing registry.
    pub fn new() -> Self {
        Self::with_policy(KeyPolicy::Memoize)
    }

    /// A registry that never reuses definitions.
    pub fn isolated() -> Self {
        Self::with_policy(KeyPolicy::Isolate)
    }

    pub fn with_policy(policy: KeyPolicy) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                policy,
                nodes: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn policy(&self) -> KeyPolicy {
        self.inner.policy
    }

    /// Return the definition registered under `key`, building and
    /// registering it if absent.
    ///
    /// `build` receives the key the definition must carry (under
    /// [`KeyPolicy::Isolate`] this is a fresh generated key, not the one
    /// supplied). Reusing a key under a different value type panics with
    /// [`GraphError::KeyTypeMismatch`].
    pub fn define<S, A, R>(
        &self,
        key: impl Into<NodeKey>,
        build: impl FnOnce(NodeKey) -> Node<S, A, R>,
    ) -> Node<S, A, R>
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        let key = key.into();

        if self.inner.policy == KeyPolicy::Isolate {
            return build(NodeKey::generate());
        }

        if let Some(existing) = self.lookup::<S, A, R>(&key) {
            return existing;
        }

        // Built outside the lock: `build` is user code and may itself
        // define nodes through this registry.
        let node = build(key.clone());

        let mut nodes = self.inner.nodes.lock();
        if let Some(entry) = nodes.get(&key) {
            // A re-entrant define won the slot; idempotent construction
            // means the first registration stands.
            return Self::downcast(&key, entry);
        }
        nodes.insert(key, Box::new(node.clone()));
        node
    }

    /// The definition registered under `key`, if any.
    pub fn get<S, A, R>(&self, key: impl Into<NodeKey>) -> Option<Node<S, A, R>>
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        self.lookup(&key.into())
    }

    /// Shorthand for a constant atom under `key`.
    pub fn atom<S: GraphValue>(&self, key: impl Into<NodeKey>, value: S) -> Node<S> {
        self.define(key, move |key| Node::atom(key, value))
    }

    /// Shorthand for a derived node under `key`.
    pub fn computed<S: GraphValue>(
        &self,
        key: impl Into<NodeKey>,
        producer: impl Fn(&NodeScope<S, AtomAction<S>, ()>) -> S + Send + Sync + 'static,
    ) -> Node<S> {
        self.define(key, move |key| Node::computed(key, producer))
    }

    pub fn contains(&self, key: impl Into<NodeKey>) -> bool {
        self.inner.nodes.lock().contains_key(&key.into())
    }

    pub fn len(&self) -> usize {
        self.inner.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.nodes.lock().is_empty()
    }

    fn lookup<S, A, R>(&self, key: &NodeKey) -> Option<Node<S, A, R>>
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        let nodes = self.inner.nodes.lock();
        nodes.get(key).map(|entry| Self::downcast(key, entry))
    }

    fn downcast<S, A, R>(key: &NodeKey, entry: &(dyn Any + Send + Sync)) -> Node<S, A, R>
    where
        S: GraphValue,
        A: Send + 'static,
        R: 'static,
    {
        match entry.downcast_ref::<Node<S, A, R>>() {
            Some(node) => node.clone(),
            None => panic!("{}", GraphError::KeyTypeMismatch { key: key.clone() }),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Registry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_returns_the_same_definition() {
        let registry = Registry::new();

        let first = registry.atom("counter", 0i64);
        let second = registry.atom("counter", 99i64);

        assert!(first.same_definition(&second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_keys_stay_distinct() {
        let registry = Registry::new();

        let a = registry.atom("a", 0i64);
        let b = registry.atom("b", 0i64);

        assert!(!a.same_definition(&b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn get_finds_registered_definitions() {
        let registry = Registry::new();
        let node = registry.atom("counter", 0i64);

        let found: Node<i64> = registry.get("counter").expect("registered");
        assert!(found.same_definition(&node));
        assert!(registry.get::<i64, AtomAction<i64>, ()>("missing").is_none());
    }

    #[test]
    #[should_panic(expected = "different value type")]
    fn reusing_a_key_under_a_different_type_panics() {
        let registry = Registry::new();
        registry.atom("counter", 0i64);
        registry.atom("counter", String::new());
    }

    #[test]
    fn isolated_registries_never_share() {
        let registry = Registry::isolated();

        let first = registry.atom("counter", 0i64);
        let second = registry.atom("counter", 0i64);

        assert!(!first.same_definition(&second));
        assert_ne!(first.key(), second.key());
        assert!(registry.is_empty());
    }
}
