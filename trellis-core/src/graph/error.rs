//! Diagnostic error types.
//!
//! The engine never catches panics from user-supplied producers or action
//! handlers; those propagate to the caller with graph state left at its
//! last committed value. The types here cover the two remaining cases:
//! caller logic errors the engine can name precisely (surfaced as panic
//! messages), and the expected supersession outcome of a stale epoch.

use thiserror::Error;

use super::key::NodeKey;

/// Caller logic errors detected by the engine.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The debug-build recompute guard tripped before the call stack
    /// overflowed. Almost always a cyclic dependent graph.
    #[error("recompute depth exceeded {limit} while propagating through `{key}`; the dependency graph likely contains a cycle")]
    RecursionLimit { key: NodeKey, limit: usize },

    /// A key is shared by definitions with different value types.
    #[error("`{key}` is already registered with a different value type")]
    KeyTypeMismatch { key: NodeKey },
}

/// Yielded by [`NodeScope::resolve`](crate::graph::NodeScope::resolve)
/// when the epoch that issued the wrapped future has been invalidated.
/// Not a failure: the computation was superseded and its result is moot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the computation that issued this operation has been superseded")]
pub struct Superseded;
