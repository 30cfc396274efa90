//! Deterministic breadth-first layout.
//!
//! Level is BFS depth from the root and maps to x. Nodes sharing a level are
//! spread evenly and centered on the configured baseline. The result depends
//! only on the current nodes and edges, never on edit history.

use super::types::{Graph, NodeId, Position};
use crate::config::LayoutConfig;
use std::collections::{HashMap, HashSet, VecDeque};

pub fn layout(graph: &Graph, root_id: &str, config: &LayoutConfig) -> HashMap<NodeId, Position> {
    let levels = bfs_levels(graph, root_id);

    let mut positions = HashMap::new();
    for (level, ids) in levels.iter().enumerate() {
        let x = level as f64 * config.h_spacing + config.base_x;
        let center = (ids.len() as f64 - 1.0) / 2.0;
        for (order, id) in ids.iter().enumerate() {
            let y = config.base_y + (order as f64 - center) * config.v_spacing;
            positions.insert(id.clone(), Position::new(x, y));
        }
    }
    positions
}

/// Node ids grouped by BFS depth, in arrival order. Unreachable nodes are absent.
fn bfs_levels(graph: &Graph, root_id: &str) -> Vec<Vec<NodeId>> {
    let mut levels: Vec<Vec<NodeId>> = Vec::new();
    if !graph.contains_node(root_id) {
        return levels;
    }

    let mut seen: HashSet<&str> = HashSet::from([root_id]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(root_id, 0)]);

    while let Some((id, level)) = queue.pop_front() {
        if levels.len() <= level {
            levels.push(Vec::new());
        }
        levels[level].push(id.to_string());

        for child in graph.children(id) {
            if graph.contains_node(child) && seen.insert(child.as_str()) {
                queue.push_back((child.as_str(), level + 1));
            }
        }
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{AgentRef, Edge, Node, ROOT_NODE_ID};

    fn fan_out() -> Graph {
        let mut nodes = vec![Node::root()];
        for id in ["a", "b", "c", "d", "orphan"] {
            nodes.push(Node::agent(AgentRef {
                id: id.to_string(),
                ..Default::default()
            }));
        }
        Graph {
            nodes,
            edges: vec![
                Edge::new(ROOT_NODE_ID, "a"),
                Edge::new("a", "b"),
                Edge::new("a", "c"),
                Edge::new("a", "d"),
            ],
        }
    }

    #[test]
    fn levels_map_to_columns_and_center_on_baseline() {
        let config = LayoutConfig::default();
        let positions = layout(&fan_out(), ROOT_NODE_ID, &config);

        assert_eq!(positions[ROOT_NODE_ID], Position::new(config.base_x, config.base_y));
        assert_eq!(positions["a"].x, config.h_spacing + config.base_x);
        assert_eq!(positions["a"].y, config.base_y);

        let column: Vec<f64> = ["b", "c", "d"].iter().map(|id| positions[*id].y).collect();
        assert_eq!(column[0], config.base_y - config.v_spacing);
        assert_eq!(column[1], config.base_y);
        assert_eq!(column[2], config.base_y + config.v_spacing);
        assert!(positions.values().all(|p| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn even_level_is_symmetric() {
        let mut graph = fan_out();
        graph.edges.pop();
        let config = LayoutConfig::default();
        let positions = layout(&graph, ROOT_NODE_ID, &config);

        let upper = config.base_y - positions["b"].y;
        let lower = positions["c"].y - config.base_y;
        assert_eq!(upper, lower);
        assert_eq!(upper, config.v_spacing / 2.0);
    }

    #[test]
    fn pure_and_skips_unreachable() {
        let graph = fan_out();
        let config = LayoutConfig::default();
        let first = layout(&graph, ROOT_NODE_ID, &config);
        let second = layout(&graph, ROOT_NODE_ID, &config);

        assert_eq!(first, second);
        assert!(!first.contains_key("orphan"));
        assert_eq!(first.len(), 5);
    }
}
