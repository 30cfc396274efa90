//! Canonical owner of nodes and edges.

use super::types::{Edge, Graph, Node, NodeId, Position};
use crate::error::GraphError;
use std::collections::{HashMap, HashSet};

/// What `add_node` did with the incoming node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeInsert {
    Inserted,
    Merged,
}

/// Single writer of the graph. Every structural mutation marks the store
/// dirty and recomputes leaf flags.
#[derive(Debug, Clone)]
pub struct GraphStore {
    graph: Graph,
    dirty: bool,
}

impl GraphStore {
    /// A store holding only the root node.
    pub fn new() -> Self {
        Self {
            graph: Graph {
                nodes: vec![Node::root()],
                edges: Vec::new(),
            },
            dirty: true,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Insert a node, or merge its agent snapshot into the node already
    /// holding that id.
    pub fn add_node(&mut self, node: Node) -> NodeInsert {
        if let Some(existing) = self.graph.nodes.iter_mut().find(|n| n.id == node.id) {
            if existing.is_root() {
                tracing::warn!("ignoring agent snapshot addressed to the bridge node");
                return NodeInsert::Merged;
            }
            if let Some(incoming) = node.agent {
                match &mut existing.agent {
                    Some(current) => current.merge(incoming),
                    slot @ None => *slot = Some(incoming),
                }
            }
            existing.is_root_of_tree |= node.is_root_of_tree;
            tracing::debug!(node_id = %existing.id, "merged agent into existing node");
            return NodeInsert::Merged;
        }

        self.graph.nodes.push(node);
        self.mark_dirty();
        NodeInsert::Inserted
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if self.graph.has_edge(&edge.source, &edge.target) {
            return Err(GraphError::DuplicateEdge {
                from: edge.source,
                to: edge.target,
            });
        }
        self.graph.edges.push(edge);
        self.mark_dirty();
        Ok(())
    }

    pub fn remove_nodes(&mut self, ids: &HashSet<NodeId>) {
        let before = self.graph.nodes.len();
        self.graph.nodes.retain(|node| !ids.contains(&node.id));
        if self.graph.nodes.len() != before {
            self.mark_dirty();
        }
    }

    pub fn remove_edges_touching(&mut self, ids: &HashSet<NodeId>) {
        let before = self.graph.edges.len();
        self.graph.edges.retain(|edge| !edge.touches_any(ids));
        if self.graph.edges.len() != before {
            self.mark_dirty();
        }
    }

    pub fn set_master(&mut self, id: &str) {
        for node in &mut self.graph.nodes {
            node.is_root_of_tree = node.id == id;
        }
    }

    /// Write layout output. Nodes missing from `positions` keep their position.
    pub fn apply_positions(&mut self, positions: &HashMap<NodeId, Position>) {
        for node in &mut self.graph.nodes {
            if let Some(position) = positions.get(&node.id) {
                node.position = *position;
            }
        }
    }

    /// Returns whether anything structural changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.refresh_leaves();
    }

    fn refresh_leaves(&mut self) {
        let sources: HashSet<&str> = self
            .graph
            .edges
            .iter()
            .map(|edge| edge.source.as_str())
            .collect();
        let leaves: Vec<bool> = self
            .graph
            .nodes
            .iter()
            .map(|node| !sources.contains(node.id.as_str()))
            .collect();
        for (node, is_leaf) in self.graph.nodes.iter_mut().zip(leaves) {
            node.is_leaf = is_leaf;
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{AgentRef, ROOT_NODE_ID};
    use std::collections::BTreeMap;

    fn agent_ref(id: &str) -> AgentRef {
        AgentRef {
            id: id.to_string(),
            name: id.to_uppercase(),
            ..Default::default()
        }
    }

    #[test]
    fn re_adding_merges_without_clobbering() {
        let mut store = GraphStore::new();
        let mut original = agent_ref("a");
        original.description = "writes drafts".into();
        original.thread_id = Some("t-1".into());
        original.variables = BTreeMap::from([("tone".to_string(), serde_json::json!("dry"))]);
        assert_eq!(store.add_node(Node::agent(original)), NodeInsert::Inserted);
        store.take_dirty();

        let mut update = agent_ref("a");
        update.name = "Drafter".into();
        assert_eq!(store.add_node(Node::agent(update)), NodeInsert::Merged);

        assert_eq!(store.graph().nodes.len(), 2);
        let agent = store.graph().node("a").and_then(|n| n.agent.as_ref()).expect("agent");
        assert_eq!(agent.name, "Drafter");
        assert_eq!(agent.description, "writes drafts");
        assert_eq!(agent.thread_id.as_deref(), Some("t-1"));
        assert_eq!(agent.variables.len(), 1);
        assert!(!store.take_dirty());
    }

    #[test]
    fn duplicate_edge_is_reported() {
        let mut store = GraphStore::new();
        store.add_node(Node::agent(agent_ref("a")));
        store.add_edge(Edge::new(ROOT_NODE_ID, "a")).expect("first edge");
        let error = store
            .add_edge(Edge::new(ROOT_NODE_ID, "a"))
            .expect_err("second edge must fail");
        assert!(matches!(error, GraphError::DuplicateEdge { .. }));
        assert_eq!(store.graph().edges.len(), 1);
    }

    #[test]
    fn leaves_follow_edges() {
        let mut store = GraphStore::new();
        store.add_node(Node::agent(agent_ref("a")));
        store.add_node(Node::agent(agent_ref("b")));
        store.add_edge(Edge::new(ROOT_NODE_ID, "a")).expect("edge");
        store.add_edge(Edge::new("a", "b")).expect("edge");

        let leaf = |store: &GraphStore, id: &str| store.graph().node(id).map(|n| n.is_leaf);
        assert_eq!(leaf(&store, ROOT_NODE_ID), Some(false));
        assert_eq!(leaf(&store, "a"), Some(false));
        assert_eq!(leaf(&store, "b"), Some(true));

        store.remove_edges_touching(&HashSet::from(["b".to_string()]));
        store.remove_nodes(&HashSet::from(["b".to_string()]));
        assert_eq!(leaf(&store, "a"), Some(true));
        assert!(store.take_dirty());
    }

    #[test]
    fn agent_snapshot_never_lands_on_root() {
        let mut store = GraphStore::new();
        let mut imposter = agent_ref("x");
        imposter.id = ROOT_NODE_ID.to_string();

        assert_eq!(store.add_node(Node::agent(imposter)), NodeInsert::Merged);
        let root = store.graph().node(ROOT_NODE_ID).expect("root");
        assert!(root.is_root());
        assert!(root.agent.is_none());
        assert_eq!(store.graph().nodes.len(), 1);
    }
}
