//! Integration tests for the graph engine.
//!
//! These exercise definitions, memory, evaluation, dispatch, and
//! propagation together through the public API.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use trellis_core::graph::{AtomAction, Memory, Node, Registry};

/// A write to a source ripples through a chain of derived nodes.
#[test]
fn propagation_through_a_chain() {
    let memory = Memory::new();

    let base = Node::atom("base", 5i64);
    let base_clone = base.clone();
    let doubled = Node::computed("doubled", move |scope| scope.get(&base_clone) * 2);
    let doubled_clone = doubled.clone();
    let plus_ten = Node::computed("plus_ten", move |scope| scope.get(&doubled_clone) + 10);

    assert_eq!(memory.get(&doubled), 10);
    assert_eq!(memory.get(&plus_ten), 20);

    memory.put(&base, 10);

    assert_eq!(memory.get(&doubled), 20);
    assert_eq!(memory.get(&plus_ten), 30);
}

/// A listener on the end of a chain fires once per batch with the final
/// value, not once per intermediate recomputation.
#[test]
fn chain_listeners_fire_once_per_write() {
    let memory = Memory::new();

    let base = Node::atom("base", 1i64);
    let base_clone = base.clone();
    let derived = Node::computed("derived", move |scope| scope.get(&base_clone) + 1);

    memory.get(&derived);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let _sub = memory.subscribe(&derived, move |value: &i64| {
        seen_clone.lock().push(*value);
    });

    memory.put(&base, 2);
    memory.put(&base, 3);

    assert_eq!(seen.lock().as_slice(), &[3, 4]);
}

/// Dependencies discovered at runtime are re-discovered on recompute:
/// edges from the previous evaluation are dropped, so writes to a node
/// that is no longer read do not trigger recomputation.
#[test]
fn dynamic_dependencies_rewire_on_recompute() {
    let memory = Memory::new();

    let use_first = Node::atom("use_first", true);
    let first = Node::atom("first", 10i64);
    let second = Node::atom("second", 20i64);

    let runs = Arc::new(AtomicI32::new(0));
    let runs_clone = runs.clone();
    let use_first_clone = use_first.clone();
    let first_clone = first.clone();
    let second_clone = second.clone();

    let chooser = Node::computed("chooser", move |scope| {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        if scope.get(&use_first_clone) {
            scope.get(&first_clone)
        } else {
            scope.get(&second_clone)
        }
    });

    assert_eq!(memory.get(&chooser), 10);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // Not a dependency yet: no recomputation.
    memory.put(&second, 21);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // Flipping the switch rewires the graph.
    memory.put(&use_first, false);
    assert_eq!(memory.get(&chooser), 21);
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // The stale edge to `first` is gone.
    memory.put(&first, 11);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(memory.get(&chooser), 21);

    // The live edge to `second` works.
    memory.put(&second, 22);
    assert_eq!(memory.get(&chooser), 22);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// A custom dispatch node drives an atom it closes over; dependents of
/// that atom recompute and notify within the dispatch's commits.
#[test]
fn dispatch_drives_the_graph_end_to_end() {
    let memory = Memory::new();

    let items = Node::atom("items", Vec::<String>::new());
    let items_clone = items.clone();
    let count = Node::computed("count", move |scope| scope.get(&items_clone).len());

    let items_for_action = items.clone();
    let push = Node::with_action(
        "push",
        |_| (),
        move |scope, item: String| -> usize {
            scope.update(&items_for_action, move |prev| {
                let mut next = prev.clone();
                next.push(item);
                next
            });
            scope.get(&items_for_action).len()
        },
    );

    assert_eq!(memory.get(&count), 0);

    assert_eq!(memory.dispatch(&push, "a".to_string()), 1);
    assert_eq!(memory.dispatch(&push, "b".to_string()), 2);

    assert_eq!(memory.get(&count), 2);
    assert_eq!(memory.get(&items), vec!["a".to_string(), "b".to_string()]);
}

/// Definitions obtained through a registry behave identically to direct
/// construction, and reuse by key means independent call sites share
/// state.
#[test]
fn registry_definitions_share_instances() {
    let registry = Registry::new();
    let memory = Memory::new();

    let here = registry.atom("shared_counter", 0i64);
    let there = registry.atom("shared_counter", 0i64);
    assert!(here.same_definition(&there));

    memory.put(&here, 41);
    assert_eq!(memory.get(&there), 41);
    assert_eq!(memory.version(&there), 1);
}

/// Equality-suppressed writes do not disturb dependents or listeners
/// anywhere downstream.
#[test]
fn suppressed_writes_are_invisible_downstream() {
    let memory = Memory::new();

    let source = Node::atom("source", 0i64).distinct();
    let source_clone = source.clone();
    let derived = Node::computed("derived", move |scope| scope.get(&source_clone) + 1);

    memory.get(&derived);

    let fired = Arc::new(AtomicI32::new(0));
    let fired_clone = fired.clone();
    let _sub = memory.subscribe(&derived, move |_: &i64| {
        fired_clone.fetch_add(1, Ordering::SeqCst);
    });

    memory.put(&source, 0);
    memory.put(&source, 0);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(memory.version(&source), 0);

    memory.put(&source, 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

/// Hydration installs state without waking anything up, and the graph
/// picks it up from the next evaluation onwards.
#[test]
fn hydrated_state_is_visible_to_later_recomputes() {
    let memory = Memory::new();

    let profile = Node::atom("profile", String::new());
    let profile_clone = profile.clone();
    let greeting = Node::computed("greeting", move |scope| {
        format!("hello, {}", scope.get(&profile_clone))
    });

    memory.hydrate(&profile, "ada".to_string());

    assert_eq!(memory.get(&greeting), "hello, ada");
    assert_eq!(memory.version(&profile), 1);
}

/// Dispatching an atom without a custom handler applies the default
/// write-through semantics.
#[test]
fn atom_dispatch_default_semantics() {
    let memory = Memory::new();
    let node = Node::atom("counter", 1i64);

    memory.dispatch(&node, AtomAction::Put(10));
    assert_eq!(memory.get(&node), 10);

    memory.dispatch(&node, AtomAction::update(|prev| prev * 3));
    assert_eq!(memory.get(&node), 30);
}

/// Destroying a memory runs epoch cleanups and forgets all instances.
#[test]
fn destroy_tears_down_subscriptions() {
    let memory = Memory::new();

    let teardowns = Arc::new(AtomicI32::new(0));
    let teardowns_clone = teardowns.clone();
    let ticker = Node::computed("ticker", move |scope| {
        let counter = teardowns_clone.clone();
        scope.subscription(move || {
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
        });
        0i64
    });

    memory.get(&ticker);
    assert_eq!(teardowns.load(Ordering::SeqCst), 0);

    memory.destroy();
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    assert!(!memory.exists(&ticker));
}

/// In debug builds, a propagation cycle trips the depth guard instead of
/// overflowing the stack.
#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "recompute depth exceeded")]
fn runaway_propagation_is_diagnosed() {
    let memory = Memory::new();

    let counter = Node::atom("counter", 0i64);
    let counter_clone = counter.clone();
    let feedback = Node::computed("feedback", move |scope| {
        let value = scope.get(&counter_clone);
        scope.mutate(&counter_clone, value + 1);
        value
    });

    memory.get(&feedback);
}

/// The devtools snapshot reflects live values and edges.
#[cfg(debug_assertions)]
#[test]
fn devtools_snapshot_shows_the_graph() {
    use trellis_core::graph::devtools;

    let memory = Memory::new();
    let base = Node::atom("base", 3i64).inspectable();
    let base_clone = base.clone();
    let derived = Node::computed("derived", move |scope| scope.get(&base_clone) * 7);

    assert_eq!(memory.get(&derived), 21);
    memory.put(&base, 4);

    let snapshot = devtools::snapshot(&memory);
    let json = snapshot.to_json();

    assert_eq!(json["nodes"][0]["id"], "base");
    assert_eq!(json["nodes"][0]["value"], 4);
    assert_eq!(json["nodes"][0]["dependents"][0], "derived");
    assert_eq!(json["nodes"][1]["id"], "derived");
    assert_eq!(json["nodes"][1]["dependencies"][0], "base");
}
