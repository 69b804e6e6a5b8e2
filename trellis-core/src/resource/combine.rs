//! Resource combinators.
//!
//! [`wait_for_all`] and [`wait_for_any`] race the underlying futures of
//! their input resources (conjunction and first-settlement respectively)
//! and expose the outcome as a single resource node. [`join_resources`]
//! does no racing at all: it recombines the inputs' current states
//! synchronously and recomputes whenever any of them changes.

use futures_util::future::{select_all, try_join_all};
use futures_util::FutureExt;

use crate::graph::{Atom, GraphValue, Node};

use super::{from_resource, join_keys, settle, ResourceFuture, ResourceState};

/// Succeed with every input's value, in input order, once all have
/// succeeded; fail as soon as any input fails, even while siblings are
/// still pending.
pub fn wait_for_all<T: GraphValue>(
    resources: &[Atom<ResourceState<T>>],
) -> Atom<ResourceState<Vec<T>>> {
    let key = format!("WaitForAll({})", join_keys(resources));
    let promises: Vec<Atom<ResourceFuture<T>>> =
        resources.iter().map(from_resource).collect();

    Node::computed(key, move |scope| {
        let futures: Vec<ResourceFuture<T>> =
            promises.iter().map(|promise| scope.get(promise)).collect();
        let combined: ResourceFuture<Vec<T>> = try_join_all(futures).boxed().shared();
        settle(combined, scope)
    })
}

/// Settle with the first input to settle, success or failure.
///
/// Panics if `resources` is empty: an empty race has no first settlement.
pub fn wait_for_any<T: GraphValue>(
    resources: &[Atom<ResourceState<T>>],
) -> Atom<ResourceState<T>> {
    assert!(
        !resources.is_empty(),
        "wait_for_any requires at least one resource"
    );

    let key = format!("WaitForAny({})", join_keys(resources));
    let promises: Vec<Atom<ResourceFuture<T>>> =
        resources.iter().map(from_resource).collect();

    Node::computed(key, move |scope| {
        let futures: Vec<ResourceFuture<T>> =
            promises.iter().map(|promise| scope.get(promise)).collect();
        let combined: ResourceFuture<T> = async move {
            let (first, _index, _rest) = select_all(futures).await;
            first
        }
        .boxed()
        .shared();
        settle(combined, scope)
    })
}

/// Recombine the inputs' current states into one value, without waiting
/// on anything. Recomputed synchronously whenever any input changes.
pub fn join_resources<T: GraphValue>(
    resources: &[Atom<ResourceState<T>>],
) -> Atom<Vec<ResourceState<T>>> {
    let key = format!("JoinedResource({})", join_keys(resources));
    let sources = resources.to_vec();

    Node::computed(key, move |scope| {
        sources.iter().map(|source| scope.get(source)).collect()
    })
}
