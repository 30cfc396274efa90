//! Deletion of a node together with everything downstream of it.

use super::store::GraphStore;
use super::types::{Edge, NodeId};
use std::collections::HashSet;

/// Result of applying a cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Every removed node id, the deleted node included.
    pub removed: HashSet<NodeId>,
    /// Nodes that had an edge into the deleted node. Their persisted
    /// connections need the removed child dropped.
    pub parents: Vec<NodeId>,
}

/// `node_id` plus every node reachable from it through outgoing edges.
pub fn compute_cascade(node_id: &str, edges: &[Edge]) -> HashSet<NodeId> {
    let mut collected = HashSet::from([node_id.to_string()]);
    let mut stack = vec![node_id.to_string()];

    while let Some(current) = stack.pop() {
        for edge in edges.iter().filter(|edge| edge.source == current) {
            if collected.insert(edge.target.clone()) {
                stack.push(edge.target.clone());
            }
        }
    }
    collected
}

/// Compute and apply the cascade for `node_id` against the store's current
/// snapshot. Protection of the master agent is the caller's job.
pub fn apply(store: &mut GraphStore, node_id: &str) -> CascadeOutcome {
    let graph = store.graph();
    let removed = compute_cascade(node_id, &graph.edges);
    let parents: Vec<NodeId> = graph
        .parents(node_id)
        .filter(|parent| !removed.contains(*parent))
        .cloned()
        .collect();

    store.remove_edges_touching(&removed);
    store.remove_nodes(&removed);

    tracing::debug!(
        node_id,
        removed = removed.len(),
        parents = parents.len(),
        "applied deletion cascade"
    );

    CascadeOutcome { removed, parents }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{AgentRef, Node, ROOT_NODE_ID};

    fn chain(ids: &[&str]) -> GraphStore {
        let mut store = GraphStore::new();
        let mut previous = ROOT_NODE_ID.to_string();
        for id in ids {
            store.add_node(Node::agent(AgentRef {
                id: id.to_string(),
                ..Default::default()
            }));
            store.add_edge(Edge::new(previous.clone(), *id)).expect("edge");
            previous = id.to_string();
        }
        store
    }

    #[test]
    fn deleting_mid_chain_removes_descendants() {
        let mut store = chain(&["a", "b", "c", "d"]);
        let outcome = apply(&mut store, "b");

        let expected: HashSet<NodeId> = ["b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(outcome.removed, expected);
        assert_eq!(outcome.parents, vec!["a".to_string()]);

        let graph = store.graph();
        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![ROOT_NODE_ID, "a"]);
        assert_eq!(graph.edges, vec![Edge::new(ROOT_NODE_ID, "a")]);
        assert!(graph.node("a").is_some_and(|n| n.is_leaf));
    }

    #[test]
    fn cascade_terminates_on_cycles() {
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "c"), Edge::new("c", "a")];
        let collected = compute_cascade("b", &edges);
        assert_eq!(collected.len(), 3);
    }

    #[test]
    fn no_dangling_edges_after_branching_delete() {
        let mut store = chain(&["a", "b"]);
        for id in ["c", "d"] {
            store.add_node(Node::agent(AgentRef {
                id: id.to_string(),
                ..Default::default()
            }));
        }
        store.add_edge(Edge::new("a", "c")).expect("edge");
        store.add_edge(Edge::new("c", "d")).expect("edge");

        let outcome = apply(&mut store, "a");
        assert_eq!(outcome.parents, vec![ROOT_NODE_ID.to_string()]);
        let graph = store.graph();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }
}
