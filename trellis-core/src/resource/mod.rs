//! Tri-state adaptation of asynchronous producers.
//!
//! A node can hold a future as its value, but readers usually want the
//! future's outcome, not the future itself. [`resource`] wraps a
//! future-valued node into a node of [`ResourceState`]: `Pending` is
//! returned synchronously, and a spawned task applies `Success` or
//! `Failure` once the future settles. The settlement goes through an
//! epoch-gated handle, so a settlement belonging to a superseded
//! evaluation is silently discarded instead of overwriting a newer
//! pending state.
//!
//! Failures surface as the `Failure` variant, never as a panic at the
//! read site; [`from_resource`] is the explicit opt-in that maps a
//! resource back into a future which errors on failure.
//!
//! Combinators live in this module's [`combine`] half: wait-for-all,
//! wait-for-any, and the synchronous join.
//!
//! Resource nodes spawn their settlement watchers with [`tokio::spawn`],
//! so they must be evaluated from within a tokio runtime.

mod combine;

pub use combine::{join_resources, wait_for_all, wait_for_any};

use std::fmt;
use std::sync::Arc;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use thiserror::Error;

use crate::graph::{Atom, AtomAction, GraphValue, Node, NodeScope};

/// Clonable failure payload of a settled resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResourceError {
    message: Arc<str>,
}

impl ResourceError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string().into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ResourceError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ResourceError {
    fn from(message: String) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The shared future form a resource watches: clonable, sendable, and
/// safe to await from several places at once.
pub type ResourceFuture<T> = Shared<BoxFuture<'static, Result<T, ResourceError>>>;

/// Box and share a future so it can be held as a node value.
pub fn resource_future<T, F>(future: F) -> ResourceFuture<T>
where
    T: GraphValue,
    F: std::future::Future<Output = Result<T, ResourceError>> + Send + 'static,
{
    future.boxed().shared()
}

/// Outcome of an asynchronous computation as seen by the graph.
#[derive(Clone)]
pub enum ResourceState<T> {
    /// Not settled yet; carries the future being watched.
    Pending(ResourceFuture<T>),
    Success(T),
    Failure(ResourceError),
}

impl<T> ResourceState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, ResourceState::Pending(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResourceState::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ResourceState::Failure(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            ResourceState::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ResourceError> {
        match self {
            ResourceState::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// The settled outcome, or `None` while pending.
    pub fn ready(self) -> Option<Result<T, ResourceError>> {
        match self {
            ResourceState::Pending(_) => None,
            ResourceState::Success(value) => Some(Ok(value)),
            ResourceState::Failure(error) => Some(Err(error)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ResourceState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Pending(_) => f.write_str("Pending(..)"),
            ResourceState::Success(value) => f.debug_tuple("Success").field(value).finish(),
            ResourceState::Failure(error) => f.debug_tuple("Failure").field(error).finish(),
        }
    }
}

/// Watch `future` from the evaluating node: spawn a settlement task that
/// writes the outcome back through an epoch-gated handle, and return
/// `Pending` for the current evaluation.
pub(crate) fn settle<T: GraphValue>(
    future: ResourceFuture<T>,
    scope: &NodeScope<ResourceState<T>, AtomAction<ResourceState<T>>, ()>,
) -> ResourceState<T> {
    let handle = scope.handle();
    let watched = future.clone();
    tokio::spawn(async move {
        let state = match watched.await {
            Ok(value) => ResourceState::Success(value),
            Err(error) => ResourceState::Failure(error),
        };
        handle.mutate_self(state);
    });
    ResourceState::Pending(future)
}

/// Wrap a future-valued node into a tri-state resource node.
pub fn resource<T, A, R>(source: &Node<ResourceFuture<T>, A, R>) -> Atom<ResourceState<T>>
where
    T: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    let key = format!("Resource({})", source.key());
    let source = source.clone();
    Node::computed(key, move |scope| {
        let future = scope.get(&source);
        settle(future, scope)
    })
}

/// Map a resource node back into a future-valued node. The future errors
/// on `Failure`; this is the explicit opt-in to raising failures.
pub fn from_resource<T, A, R>(source: &Node<ResourceState<T>, A, R>) -> Atom<ResourceFuture<T>>
where
    T: GraphValue,
    A: Send + 'static,
    R: 'static,
{
    let key = format!("Promise({})", source.key());
    let source = source.clone();
    Node::computed(key, move |scope| match scope.get(&source) {
        ResourceState::Pending(future) => future,
        ResourceState::Success(value) => resource_future(std::future::ready(Ok(value))),
        ResourceState::Failure(error) => resource_future(std::future::ready(Err(error))),
    })
}

/// Lift a future-node factory into a resource-node factory.
pub fn resource_factory<P, T, F>(factory: F) -> impl Fn(P) -> Atom<ResourceState<T>>
where
    T: GraphValue,
    F: Fn(P) -> Atom<ResourceFuture<T>>,
{
    move |param| resource(&factory(param))
}

pub(crate) fn join_keys<T, A, R>(nodes: &[Node<ResourceState<T>, A, R>]) -> String
where
    T: GraphValue,
{
    nodes
        .iter()
        .map(|node| node.key().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
