//! Fan-out expansion: materialize the subgraph an agent's `connected_agents`
//! references describe.
//!
//! Expansion is a plain recursive function over owned state. Each call gets
//! the working graph and the accumulated expansion and hands both back, so
//! nothing is mutated through shared references. A branch sees a copy of the
//! visited set of its ancestors only, which keeps sibling branches
//! independent while making it impossible to re-enter an ancestor.

use super::types::{AgentRef, Edge, Graph, Node, NodeId};
use super::validator;
use crate::catalog::{AgentCatalog, AgentRecord, ConnectedAgentEntry, PinnedVersions};
use crate::error::{ErrorKind, GraphError};
use std::collections::HashSet;

/// Lookup tables and limits for one expansion.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionContext<'a> {
    pub catalog: &'a AgentCatalog,
    pub pinned: &'a PinnedVersions,
    pub max_depth: usize,
}

/// Something expansion skipped. None of these abort the expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionSignal {
    /// The agent is already on the path from the expansion root.
    CycleGuardTripped { agent: NodeId },
    /// A declared reference matched nothing in the catalog.
    Unresolved { parent: NodeId, reference: String },
    /// The child was already placed under another parent.
    SharedChildSkipped { parent: NodeId, child: NodeId },
    /// Children below the depth ceiling were not unrolled.
    DepthLimitReached { agent: NodeId },
    /// The validator refused the connecting edge.
    EdgeRejected {
        source: NodeId,
        target: NodeId,
        error: GraphError,
    },
}

impl ExpansionSignal {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExpansionSignal::CycleGuardTripped { .. } => ErrorKind::CycleGuardTripped,
            ExpansionSignal::Unresolved { .. } => ErrorKind::ResolutionFailure,
            ExpansionSignal::SharedChildSkipped { .. }
            | ExpansionSignal::DepthLimitReached { .. } => ErrorKind::StructuralViolation,
            ExpansionSignal::EdgeRejected { error, .. } => error.kind(),
        }
    }
}

/// Nodes and edges to commit, in creation order.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub signals: Vec<ExpansionSignal>,
}

impl Expansion {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Expand `agent` under `source_id`, along with every agent it transitively
/// references, against a snapshot of the current graph. `depth` is the level
/// `agent` itself sits at; callers start at zero.
pub fn expand(
    ctx: &ExpansionContext<'_>,
    base: &Graph,
    source_id: &str,
    agent: &AgentRecord,
    is_first_agent: bool,
    visited: &HashSet<NodeId>,
    depth: usize,
) -> Expansion {
    let (_, expansion) = grow(
        ctx,
        base.clone(),
        Expansion::default(),
        Step {
            source_id,
            agent,
            link: None,
            is_first_agent,
            depth,
        },
        visited.clone(),
    );
    expansion
}

struct Step<'s> {
    source_id: &'s str,
    agent: &'s AgentRecord,
    link: Option<&'s ConnectedAgentEntry>,
    is_first_agent: bool,
    depth: usize,
}

fn grow(
    ctx: &ExpansionContext<'_>,
    mut working: Graph,
    mut expansion: Expansion,
    step: Step<'_>,
    visited: HashSet<NodeId>,
) -> (Graph, Expansion) {
    let key = step.agent.key().to_string();

    if visited.contains(&key) {
        tracing::debug!(agent = %key, source = step.source_id, "cycle guard tripped");
        expansion
            .signals
            .push(ExpansionSignal::CycleGuardTripped { agent: key });
        return (working, expansion);
    }

    if working.contains_node(&key) {
        return link_existing(working, expansion, step.source_id, key);
    }

    let mut agent_ref = AgentRef::from_record(step.agent);
    if let Some(link) = step.link {
        if link.thread_id.is_some() {
            agent_ref.thread_id = link.thread_id.clone();
        }
        if link.version_id.is_some() {
            agent_ref.version_id = link.version_id.clone();
        }
    }
    let node = if step.is_first_agent {
        Node::master(agent_ref)
    } else {
        Node::agent(agent_ref)
    };

    working.nodes.push(node.clone());
    if let Err(error) = validator::can_connect(step.source_id, &key, &working) {
        working.nodes.pop();
        tracing::warn!(source = step.source_id, child = %key, %error, "expansion edge rejected");
        expansion.signals.push(ExpansionSignal::EdgeRejected {
            source: step.source_id.to_string(),
            target: key,
            error,
        });
        return (working, expansion);
    }

    let edge = Edge::new(step.source_id, key.clone());
    working.edges.push(edge.clone());
    expansion.nodes.push(node);
    expansion.edges.push(edge);

    if step.agent.connected_agents.is_empty() {
        return (working, expansion);
    }
    if step.depth + 1 >= ctx.max_depth {
        tracing::debug!(agent = %key, depth = step.depth, "expansion depth ceiling reached");
        expansion
            .signals
            .push(ExpansionSignal::DepthLimitReached { agent: key });
        return (working, expansion);
    }

    let mut branch_visited = visited;
    branch_visited.insert(key.clone());

    for (name, entry) in &step.agent.connected_agents {
        let Some(child) = ctx.catalog.resolve(name, entry, ctx.pinned) else {
            tracing::warn!(parent = %key, reference = %name, bridge_id = %entry.bridge_id, "connected agent not found");
            expansion.signals.push(ExpansionSignal::Unresolved {
                parent: key.clone(),
                reference: name.clone(),
            });
            continue;
        };

        (working, expansion) = grow(
            ctx,
            working,
            expansion,
            Step {
                source_id: &key,
                agent: child,
                link: Some(entry),
                is_first_agent: false,
                depth: step.depth + 1,
            },
            branch_visited.clone(),
        );
    }

    (working, expansion)
}

/// A second reference to an already placed agent becomes an edge only when
/// the agent has no parent yet. Its subtree was unrolled by the first writer.
fn link_existing(
    mut working: Graph,
    mut expansion: Expansion,
    source_id: &str,
    key: NodeId,
) -> (Graph, Expansion) {
    match validator::can_connect(source_id, &key, &working) {
        Ok(()) => {
            let edge = Edge::new(source_id, key);
            working.edges.push(edge.clone());
            expansion.edges.push(edge);
        }
        Err(GraphError::MultipleParents { .. }) | Err(GraphError::DuplicateEdge { .. }) => {
            tracing::warn!(parent = source_id, child = %key, "agent already placed under another parent, skipping");
            expansion.signals.push(ExpansionSignal::SharedChildSkipped {
                parent: source_id.to_string(),
                child: key,
            });
        }
        Err(error) => {
            tracing::warn!(source = source_id, child = %key, %error, "expansion edge rejected");
            expansion.signals.push(ExpansionSignal::EdgeRejected {
                source: source_id.to_string(),
                target: key,
                error,
            });
        }
    }
    (working, expansion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::ROOT_NODE_ID;

    fn root_graph() -> Graph {
        Graph {
            nodes: vec![Node::root()],
            edges: Vec::new(),
        }
    }

    fn run(catalog: &AgentCatalog, master: &str, max_depth: usize) -> Expansion {
        let pinned = PinnedVersions::default();
        let ctx = ExpansionContext {
            catalog,
            pinned: &pinned,
            max_depth,
        };
        let agent = catalog.get(master).expect("master in catalog").clone();
        expand(&ctx, &root_graph(), ROOT_NODE_ID, &agent, true, &HashSet::new(), 0)
    }

    fn ids(expansion: &Expansion) -> Vec<&str> {
        expansion.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn cycle_is_cut_at_back_edge() {
        let catalog = AgentCatalog::new(vec![
            AgentRecord::new("a", "A").with_connection("B", "b"),
            AgentRecord::new("b", "B").with_connection("C", "c"),
            AgentRecord::new("c", "C").with_connection("A", "a"),
        ]);

        let expansion = run(&catalog, "a", 4);

        assert_eq!(ids(&expansion), vec!["a", "b", "c"]);
        assert_eq!(
            expansion.edges,
            vec![
                Edge::new(ROOT_NODE_ID, "a"),
                Edge::new("a", "b"),
                Edge::new("b", "c"),
            ]
        );
        assert!(expansion.nodes[0].is_root_of_tree);
        assert!(!expansion.nodes[1].is_root_of_tree);
        assert_eq!(
            expansion.signals,
            vec![ExpansionSignal::CycleGuardTripped { agent: "a".into() }]
        );
        assert_eq!(expansion.signals[0].kind(), ErrorKind::CycleGuardTripped);
    }

    #[test]
    fn shared_child_keeps_first_parent() {
        let catalog = AgentCatalog::new(vec![
            AgentRecord::new("a", "A")
                .with_connection("B", "b")
                .with_connection("C", "c"),
            AgentRecord::new("b", "B").with_connection("D", "d"),
            AgentRecord::new("c", "C").with_connection("D", "d"),
            AgentRecord::new("d", "D"),
        ]);

        let expansion = run(&catalog, "a", 4);

        assert_eq!(ids(&expansion), vec!["a", "b", "d", "c"]);
        assert!(expansion.edges.contains(&Edge::new("b", "d")));
        assert!(!expansion.edges.contains(&Edge::new("c", "d")));
        assert!(expansion.signals.contains(&ExpansionSignal::SharedChildSkipped {
            parent: "c".into(),
            child: "d".into(),
        }));
    }

    #[test]
    fn unresolved_reference_is_skipped() {
        let catalog = AgentCatalog::new(vec![
            AgentRecord::new("a", "A")
                .with_connection("Ghost", "missing")
                .with_connection("B", "b"),
            AgentRecord::new("b", "B"),
        ]);

        let expansion = run(&catalog, "a", 4);

        assert_eq!(ids(&expansion), vec!["a", "b"]);
        assert_eq!(expansion.signals[0].kind(), ErrorKind::ResolutionFailure);
    }

    #[test]
    fn nesting_is_truncated_at_depth_ceiling() {
        let mut agents = Vec::new();
        for level in 0..8 {
            let id = format!("n{level}");
            let next = format!("n{}", level + 1);
            agents.push(AgentRecord::new(id.clone(), id.to_uppercase()).with_connection(next.to_uppercase(), next));
        }
        let catalog = AgentCatalog::new(agents);

        let expansion = run(&catalog, "n0", 4);

        assert_eq!(ids(&expansion), vec!["n0", "n1", "n2", "n3"]);
        assert_eq!(
            expansion.signals,
            vec![ExpansionSignal::DepthLimitReached { agent: "n3".into() }]
        );
    }

    #[test]
    fn dense_cyclic_catalog_terminates_without_duplicates() {
        let names = ["a", "b", "c", "d", "e", "f"];
        let agents = names
            .iter()
            .map(|id| {
                names.iter().fold(AgentRecord::new(*id, id.to_uppercase()), |record, other| {
                    record.with_connection(other.to_uppercase(), *other)
                })
            })
            .collect();
        let catalog = AgentCatalog::new(agents);

        let expansion = run(&catalog, "a", 4);

        let unique: HashSet<&str> = ids(&expansion).into_iter().collect();
        assert_eq!(unique.len(), expansion.nodes.len());
        assert_eq!(unique.len(), names.len());
        let targets: HashSet<&str> = expansion.edges.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets.len(), expansion.edges.len());
    }

    #[test]
    fn rejected_root_connection_adds_nothing() {
        let catalog = AgentCatalog::new(vec![AgentRecord::new("x", "X"), AgentRecord::new("y", "Y")]);
        let pinned = PinnedVersions::default();
        let ctx = ExpansionContext {
            catalog: &catalog,
            pinned: &pinned,
            max_depth: 4,
        };
        let mut graph = root_graph();
        graph.nodes.push(Node::master(AgentRef {
            id: "x".into(),
            ..Default::default()
        }));
        graph.edges.push(Edge::new(ROOT_NODE_ID, "x"));

        let agent = catalog.get("y").expect("y").clone();
        let expansion = expand(&ctx, &graph, ROOT_NODE_ID, &agent, true, &HashSet::new(), 0);

        assert!(expansion.is_empty());
        assert!(matches!(
            expansion.signals.as_slice(),
            [ExpansionSignal::EdgeRejected {
                error: GraphError::DuplicateRootConnection,
                ..
            }]
        ));
    }
}
