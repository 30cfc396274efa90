//! SyncBridge: pushes graph edits to each agent's persisted `connected_agents`.
//!
//! Writes are fire-and-forget. The controller queues a request and moves on;
//! a background worker runs every write as its own task. Each write carries
//! the parent's full map, so whichever write for a parent lands last defines
//! the persisted state. Failures are logged and broadcast, the local graph is
//! never rolled back.

pub mod client;
pub mod payload;

pub use client::{AgentPersistence, HttpAgentStore};
pub use payload::{ConnectedAgentsUpdate, SyncOp, SyncRequest, build_request, connected_agents_for};

use crate::GraphEvent;
use crate::error::SyncError;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Handle for queueing writes.
#[derive(Debug, Clone)]
pub struct SyncBridge {
    tx: mpsc::UnboundedSender<SyncRequest>,
}

impl SyncBridge {
    /// A bridge plus the receiving end, for callers that drive writes themselves.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Start the background worker on the current tokio runtime.
    pub fn spawn(
        persistence: Arc<dyn AgentPersistence>,
        events: broadcast::Sender<GraphEvent>,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (bridge, rx) = Self::channel();
        let handle = tokio::spawn(run_worker(rx, persistence, events));
        (bridge, handle)
    }

    pub fn submit(&self, request: SyncRequest) -> Result<(), SyncError> {
        tracing::debug!(
            target_id = %request.target_id,
            parent = %request.parent,
            child = %request.child,
            op = ?request.op,
            "queueing connected agents write"
        );
        self.tx.send(request).map_err(|_| SyncError::WorkerClosed)
    }
}

/// Drain `rx`, running each write concurrently. Returns once every bridge
/// handle is dropped; writes already started keep running to completion.
pub async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<SyncRequest>,
    persistence: Arc<dyn AgentPersistence>,
    events: broadcast::Sender<GraphEvent>,
) {
    while let Some(request) = rx.recv().await {
        let persistence = persistence.clone();
        let events = events.clone();
        tokio::spawn(async move {
            match persistence
                .update_connected_agents(&request.target_id, &request.update)
                .await
            {
                Ok(()) => {
                    tracing::debug!(target_id = %request.target_id, "connected agents write completed");
                    let _ = events.send(GraphEvent::SyncCompleted {
                        target_id: request.target_id,
                        op: request.op,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        target_id = %request.target_id,
                        parent = %request.parent,
                        child = %request.child,
                        %error,
                        "connected agents write failed, keeping local graph"
                    );
                    let _ = events.send(GraphEvent::SyncFailed {
                        target_id: request.target_id,
                        op: request.op,
                        error: error.to_string(),
                    });
                }
            }
        });
    }
    tracing::debug!("sync worker stopped");
}
