//! The graph evaluation engine.
//!
//! This module implements the reactive core: keyed node definitions,
//! per-memory live instances, dependency tracking during evaluation,
//! dispatch with supersession, and recursive propagation with batched
//! listener notification.
//!
//! # Overview
//!
//! A [`Node`] describes a computation; a [`Memory`] holds its live state.
//! Reading a node materializes it, running its producer under a
//! [`NodeScope`] that records every other node it reads as a dependency
//! edge. Writing a node (directly, or through its action handler via
//! dispatch) commits through a write path that suppresses equal values,
//! recomputes all transitive dependents depth-first, and notifies
//! external listeners once per batch.
//!
//! Each evaluation and each dispatch runs under an [`Epoch`]; superseding
//! the computation retires the epoch, which runs its cleanups and turns
//! any still-pending effects of the old computation into no-ops. That,
//! not task abortion, is the engine's cancellation model.

mod batch;
mod commit;
mod context;
mod dispatch;
mod epoch;
mod error;
mod evaluate;
mod instance;
mod key;
mod memory;
mod node;
mod registry;

#[cfg(debug_assertions)]
pub mod devtools;

pub use context::{NodeHandle, NodeScope};
pub use epoch::{CleanupFn, Epoch};
pub use error::{GraphError, Superseded};
pub use key::NodeKey;
pub use memory::{BatchScheduler, FlushFn, Memory, Subscription};
pub use node::{Atom, AtomAction, GraphValue, Node};
pub use registry::{KeyPolicy, Registry};
