//! Node identity.
//!
//! Every node definition carries a key. Keys are either user-supplied
//! (a name or an explicit serial number) or generated from a process-wide
//! atomic counter. Instances inside a [`Memory`](crate::graph::Memory) are
//! addressed by key, so two definitions built with the same key alias the
//! same instance.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter for generated node keys.
///
/// Starts beyond the range plausibly used for explicit serial keys.
static KEY_COUNTER: AtomicU64 = AtomicU64::new(1 << 32);

/// Identity of a node definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    /// A user-supplied name.
    Named(Arc<str>),
    /// An explicit or generated serial number.
    Serial(u64),
}

impl NodeKey {
    /// Create a named key.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        NodeKey::Named(name.into())
    }

    /// Generate a fresh unique key.
    pub fn generate() -> Self {
        NodeKey::Serial(KEY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Named(name) => f.write_str(name),
            NodeKey::Serial(id) => write!(f, "#{id}"),
        }
    }
}

impl From<&str> for NodeKey {
    fn from(name: &str) -> Self {
        NodeKey::named(name)
    }
}

impl From<String> for NodeKey {
    fn from(name: String) -> Self {
        NodeKey::named(name)
    }
}

impl From<u64> for NodeKey {
    fn from(id: u64) -> Self {
        NodeKey::Serial(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique() {
        let k1 = NodeKey::generate();
        let k2 = NodeKey::generate();
        let k3 = NodeKey::generate();

        assert_ne!(k1, k2);
        assert_ne!(k2, k3);
        assert_ne!(k1, k3);
    }

    #[test]
    fn named_keys_compare_by_content() {
        assert_eq!(NodeKey::from("counter"), NodeKey::named("counter"));
        assert_ne!(NodeKey::from("counter"), NodeKey::from("total"));
        assert_ne!(NodeKey::from("7"), NodeKey::from(7u64));
    }

    #[test]
    fn display_forms() {
        assert_eq!(NodeKey::from("counter").to_string(), "counter");
        assert_eq!(NodeKey::from(7u64).to_string(), "#7");
    }
}
