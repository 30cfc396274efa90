//! Structural checks run before any edge is committed.

use super::types::{Graph, ROOT_NODE_ID};
use crate::error::GraphError;

/// Check whether `source -> target` may be added to `graph`.
///
/// Both endpoints must already be present; callers that add a node together
/// with its incoming edge validate against a graph that includes the node.
pub fn can_connect(source: &str, target: &str, graph: &Graph) -> Result<(), GraphError> {
    if target == ROOT_NODE_ID {
        return Err(GraphError::RootAsTarget);
    }
    if source == target {
        return Err(GraphError::SelfLoop { id: source.to_string() });
    }
    for id in [source, target] {
        if !graph.contains_node(id) {
            return Err(GraphError::NodeNotFound { id: id.to_string() });
        }
    }
    if graph.has_edge(source, target) {
        return Err(GraphError::DuplicateEdge {
            from: source.to_string(),
            to: target.to_string(),
        });
    }
    if source == ROOT_NODE_ID && graph.root_edge().is_some() {
        return Err(GraphError::DuplicateRootConnection);
    }
    if graph.parents(target).next().is_some() {
        return Err(GraphError::MultipleParents {
            target: target.to_string(),
        });
    }
    Ok(())
}
