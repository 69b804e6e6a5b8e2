//! Debug-build introspection.
//!
//! [`snapshot`] renders a memory's live graph into a serializable
//! structure for an external inspector. Per node: key, version, edge
//! lists, and (for nodes opted in via
//! [`Node::inspectable`](super::Node::inspectable)) the current value.
//! Compiled only with debug assertions; production builds carry no
//! introspection surface.

use serde::Serialize;

use super::memory::Memory;

/// Serializable view of one memory.
#[derive(Debug, Serialize)]
pub struct MemorySnapshot {
    pub nodes: Vec<NodeSnapshot>,
}

/// Serializable view of one instance.
#[derive(Debug, Serialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

/// Capture the current state of every instance in `memory`.
pub fn snapshot(memory: &Memory) -> MemorySnapshot {
    let mut nodes: Vec<NodeSnapshot> = memory
        .all_instances()
        .into_iter()
        .map(|instance| {
            let state = instance.state.read();
            let value = instance.definition.render_value(state.value.as_ref());
            let version = state.version;
            drop(state);

            let dependencies = instance
                .dependencies
                .lock()
                .iter()
                .map(|dep| dep.key().to_string())
                .collect();
            let dependents = instance
                .dependents
                .lock()
                .keys()
                .map(|key| key.to_string())
                .collect();

            NodeSnapshot {
                id: instance.key().to_string(),
                version,
                value,
                dependencies,
                dependents,
            }
        })
        .collect();

    // Instance iteration order is arbitrary; present a stable view.
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    MemorySnapshot { nodes }
}

impl MemorySnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("snapshot serialization")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    #[test]
    fn snapshot_captures_values_and_edges() {
        let memory = Memory::new();
        let source = Node::atom("source", 2i64).inspectable();
        let source_clone = source.clone();
        let derived = Node::computed("derived", move |scope| scope.get(&source_clone) * 2);

        assert_eq!(memory.get(&derived), 4);

        let snapshot = snapshot(&memory);
        assert_eq!(snapshot.nodes.len(), 2);

        let derived_view = &snapshot.nodes[0];
        assert_eq!(derived_view.id, "derived");
        assert_eq!(derived_view.dependencies, vec!["source".to_string()]);
        // Not marked inspectable: value omitted.
        assert!(derived_view.value.is_none());

        let source_view = &snapshot.nodes[1];
        assert_eq!(source_view.id, "source");
        assert_eq!(source_view.value, Some(serde_json::json!(2)));
        assert_eq!(source_view.dependents, vec!["derived".to_string()]);

        let json = snapshot.to_json();
        assert_eq!(json["nodes"][1]["id"], "source");
    }
}
