//! Bridgeflow: the agent connection graph engine behind the agent console.
//!
//! A flow is one root bridge node feeding a tree of agents. The engine expands
//! existing `connected_agents` relationships into that tree, lays it out,
//! cascades deletions, and keeps each agent's persisted connections in step
//! with the graph.

pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod sync;

pub use controller::{AddTicket, GraphAction, GraphController, LoadTicket, Transaction};
pub use error::{Error, ErrorKind, Result};

use serde::{Deserialize, Serialize};

/// The bridge whose flow is being edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeContext {
    pub bridge_id: String,
    /// Version currently open in the editor. Root-level connections are
    /// written against this version.
    pub open_version_id: Option<String>,
}

impl BridgeContext {
    pub fn new(bridge_id: impl Into<String>) -> Self {
        Self {
            bridge_id: bridge_id.into(),
            open_version_id: None,
        }
    }

    pub fn with_open_version(mut self, version_id: impl Into<String>) -> Self {
        self.open_version_id = Some(version_id.into());
        self
    }
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEvent {
    /// A transaction was committed; re-render.
    GraphChanged {
        generation: u64,
        nodes: usize,
        edges: usize,
    },
    SyncCompleted {
        target_id: String,
        op: sync::SyncOp,
    },
    /// Non-blocking warning: the local graph was kept as is.
    SyncFailed {
        target_id: String,
        op: sync::SyncOp,
        error: String,
    },
}
