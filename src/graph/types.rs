//! Node, edge, and graph value types shared by every graph component.

use crate::catalog::{AgentRecord, ConnectedAgentEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Identifier of the synthetic node representing the bridge itself.
pub const ROOT_NODE_ID: &str = "bridge-node-root";

/// Graph node identifier: an agent's persisted id, or [`ROOT_NODE_ID`].
pub type NodeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Agent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Snapshot of the agent record a node stands for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRef {
    pub id: String,
    pub name: String,
    pub description: String,
    pub thread_id: Option<String>,
    pub variables: BTreeMap<String, serde_json::Value>,
    pub variables_path: BTreeMap<String, String>,
    pub connected_agents: BTreeMap<String, ConnectedAgentEntry>,
    pub version_id: Option<String>,
}

impl AgentRef {
    /// Snapshot a record. Version snapshots keep their own id as the version.
    pub fn from_record(record: &AgentRecord) -> Self {
        let version_id = if record.parent_id.is_some() {
            Some(record.id.clone())
        } else {
            record.published_version_id.clone()
        };

        Self {
            id: record.key().to_string(),
            name: record.name.clone(),
            description: record.description.clone(),
            thread_id: record.thread_id.clone(),
            variables: record.variables.clone(),
            variables_path: record.variables_path.clone(),
            connected_agents: record.connected_agents.clone(),
            version_id,
        }
    }

    /// Fold a newer snapshot into this one. Blank incoming values never
    /// overwrite what the user already set.
    pub fn merge(&mut self, incoming: AgentRef) {
        if !incoming.variables.is_empty() {
            self.variables = incoming.variables;
        }
        if !incoming.variables_path.is_empty() {
            self.variables_path = incoming.variables_path;
        }
        if incoming.thread_id.as_deref().is_some_and(|id| !id.is_empty()) {
            self.thread_id = incoming.thread_id;
        }
        if !incoming.description.is_empty() {
            self.description = incoming.description;
        }
        if !incoming.name.is_empty() {
            self.name = incoming.name;
        }
        if incoming.version_id.is_some() {
            self.version_id = incoming.version_id;
        }
        self.connected_agents = incoming.connected_agents;
    }
}

/// One visual graph entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentRef>,
    /// Set only on the master agent, the one agent wired to the root.
    pub is_root_of_tree: bool,
    /// Maintained by the store from the current edge set.
    pub is_leaf: bool,
}

impl Node {
    pub fn root() -> Self {
        Self {
            id: ROOT_NODE_ID.to_string(),
            kind: NodeKind::Root,
            position: Position::default(),
            agent: None,
            is_root_of_tree: false,
            is_leaf: true,
        }
    }

    pub fn agent(agent: AgentRef) -> Self {
        Self {
            id: agent.id.clone(),
            kind: NodeKind::Agent,
            position: Position::default(),
            agent: Some(agent),
            is_root_of_tree: false,
            is_leaf: true,
        }
    }

    pub fn master(agent: AgentRef) -> Self {
        Self {
            is_root_of_tree: true,
            ..Self::agent(agent)
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root
    }

    /// Display name used as the key in a parent's `connected_agents` map.
    pub fn display_name(&self) -> &str {
        self.agent
            .as_ref()
            .map(|agent| agent.name.as_str())
            .unwrap_or(&self.id)
    }
}

/// Directed connection: output of `source` flows into `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }

    pub fn touches_any(&self, ids: &HashSet<NodeId>) -> bool {
        ids.contains(&self.source) || ids.contains(&self.target)
    }
}

/// Nodes unique by id and edges unique by pair, both in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.source == source && edge.target == target)
    }

    pub fn children<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.edges
            .iter()
            .filter(move |edge| edge.source == id)
            .map(|edge| &edge.target)
    }

    pub fn parents<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.edges
            .iter()
            .filter(move |edge| edge.target == id)
            .map(|edge| &edge.source)
    }

    pub fn root_edge(&self) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.touches(ROOT_NODE_ID))
    }

    /// The agent wired to the root, if any.
    pub fn master(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| node.is_root_of_tree)
    }
}
