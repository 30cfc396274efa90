//! Agent connection graph: one root bridge node feeding a tree of agents.

pub mod cascade;
pub mod expander;
pub mod layout;
pub mod store;
pub mod types;
pub mod validator;

pub use cascade::CascadeOutcome;
pub use expander::{Expansion, ExpansionContext, ExpansionSignal};
pub use store::{GraphStore, NodeInsert};
pub use types::{AgentRef, Edge, Graph, Node, NodeId, NodeKind, Position, ROOT_NODE_ID};
