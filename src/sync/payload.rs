//! Translation of graph edits into persisted `connected_agents` writes.

use crate::BridgeContext;
use crate::catalog::{AGENT_STATUS_ENABLED, ConnectedAgentEntry};
use crate::graph::{Graph, Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of one persistence write. Always carries the parent's full map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedAgentsUpdate {
    pub connected_agents: BTreeMap<String, ConnectedAgentEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    Add,
    Update,
    Remove,
}

/// A write addressed to one persisted record.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
    /// Version or bridge id the write is addressed to.
    pub target_id: String,
    pub update: ConnectedAgentsUpdate,
    pub op: SyncOp,
    /// Graph node whose map is written.
    pub parent: NodeId,
    /// Node the edit was about.
    pub child: NodeId,
}

/// The `connected_agents` map of `parent_id` as the graph currently shows it,
/// nested up to `max_depth` levels.
pub fn connected_agents_for(
    graph: &Graph,
    parent_id: &str,
    max_depth: usize,
) -> BTreeMap<String, ConnectedAgentEntry> {
    let mut map = BTreeMap::new();
    if max_depth == 0 {
        return map;
    }

    for child in graph.children(parent_id).filter_map(|id| graph.node(id)) {
        let Some(agent) = child.agent.as_ref() else {
            continue;
        };
        map.insert(
            agent.name.clone(),
            ConnectedAgentEntry {
                bridge_id: agent.id.clone(),
                thread_id: agent.thread_id.clone(),
                version_id: agent.version_id.clone(),
                connected_agents: connected_agents_for(graph, &child.id, max_depth - 1),
            },
        );
    }
    map
}

/// Where a write for `parent` goes. The root stands for the open version of
/// the whole flow; agents are addressed by their own version when known.
/// Entries written under the root name the open version as well.
fn target_for(parent: &Node, bridge: &BridgeContext) -> String {
    if parent.is_root() {
        return bridge
            .open_version_id
            .clone()
            .unwrap_or_else(|| bridge.bridge_id.clone());
    }
    parent
        .agent
        .as_ref()
        .and_then(|agent| agent.version_id.clone())
        .unwrap_or_else(|| parent.id.clone())
}

/// Build the write for an edit of `child` under `parent_id`. Returns `None`
/// when the parent is no longer in the graph.
pub fn build_request(
    graph: &Graph,
    bridge: &BridgeContext,
    parent_id: &str,
    child_id: &str,
    op: SyncOp,
    max_depth: usize,
) -> Option<SyncRequest> {
    let parent = graph.node(parent_id)?;
    let agent_status = match op {
        SyncOp::Add => Some(AGENT_STATUS_ENABLED.to_string()),
        SyncOp::Update | SyncOp::Remove => None,
    };

    let mut connected_agents = connected_agents_for(graph, parent_id, max_depth);
    if let (true, Some(open_version_id)) = (parent.is_root(), &bridge.open_version_id) {
        for entry in connected_agents.values_mut() {
            entry.version_id = Some(open_version_id.clone());
        }
    }

    Some(SyncRequest {
        target_id: target_for(parent, bridge),
        update: ConnectedAgentsUpdate {
            connected_agents,
            agent_status,
        },
        op,
        parent: parent_id.to_string(),
        child: child_id.to_string(),
    })
}
