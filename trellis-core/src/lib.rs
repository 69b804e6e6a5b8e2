//! Trellis Core
//!
//! This crate provides the core runtime for the trellis reactive state
//! graph. It implements:
//!
//! - Keyed node definitions (atoms, derived nodes, custom dispatch nodes)
//! - A per-memory instance store with dynamic dependency tracking
//! - Recursive recomputation with batched listener notification
//! - Epoch-based supersession of stale evaluations and dispatches
//! - A tri-state resource adapter over asynchronous producers
//!
//! UI bindings, data-fetching caches, and inspection frontends are built
//! on top of this crate; none of them live here.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: node definitions, graph memory, evaluation, dispatch, and
//!   the batched write path
//! - `resource`: pending/success/failure adaptation of future-valued
//!   nodes, plus combinators
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::graph::{Memory, Node};
//!
//! let memory = Memory::new();
//!
//! let count = Node::atom("count", 0i64);
//! let count_for_double = count.clone();
//! let doubled = Node::computed("doubled", move |scope| {
//!     scope.get(&count_for_double) * 2
//! });
//!
//! let _sub = memory.subscribe(&doubled, |value| {
//!     println!("doubled is now {value}");
//! });
//!
//! memory.put(&count, 5);
//! // `doubled` recomputes to 10 and its listener fires once.
//! ```

pub mod graph;
pub mod resource;
