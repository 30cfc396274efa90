//! Top-level error types for bridgeflow.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of everything the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Duplicate root connection, duplicate edge, or another shape violation.
    StructuralViolation,
    /// Attempt to delete the master agent or the root node.
    ProtectedNodeViolation,
    /// A declared child reference could not be found.
    ResolutionFailure,
    /// A persistence write failed.
    SyncFailure,
    /// Expansion revisited an agent that is already on the current path.
    CycleGuardTripped,
    /// The edit referenced state that no longer exists.
    Stale,
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse config from {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Rejected graph edits. Nothing is mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("the bridge node already has a connection; only one agent may attach to it")]
    DuplicateRootConnection,

    #[error("edge {from} -> {to} already exists")]
    DuplicateEdge { from: String, to: String },

    #[error("node {id} cannot connect to itself")]
    SelfLoop { id: String },

    #[error("node {target} already has a parent")]
    MultipleParents { target: String },

    #[error("the bridge node cannot be the target of a connection")]
    RootAsTarget,

    #[error("node {id} not found")]
    NodeNotFound { id: String },

    #[error("agent {id} is the master agent and cannot be deleted")]
    MasterAgentProtected { id: String },

    #[error("the bridge node cannot be deleted")]
    RootProtected,

    #[error("result for graph generation {ticket} discarded, current generation is {current}")]
    StaleGeneration { ticket: u64, current: u64 },
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::DuplicateRootConnection
            | GraphError::DuplicateEdge { .. }
            | GraphError::SelfLoop { .. }
            | GraphError::MultipleParents { .. }
            | GraphError::RootAsTarget
            | GraphError::NodeNotFound { .. } => ErrorKind::StructuralViolation,
            GraphError::MasterAgentProtected { .. } | GraphError::RootProtected => {
                ErrorKind::ProtectedNodeViolation
            }
            GraphError::StaleGeneration { .. } => ErrorKind::Stale,
        }
    }
}

/// Persistence write failures.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },

    #[error("persistence API returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("sync worker is not running")]
    WorkerClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::SyncFailure
    }
}

/// Agent catalog and version lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("version {version_id} not found")]
    VersionNotFound { version_id: String },

    #[error("failed to fetch version {version_id}: {message}")]
    FetchFailed { version_id: String, message: String },

    #[error("failed to parse agent catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ResolutionFailure
    }
}
