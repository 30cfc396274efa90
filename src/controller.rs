//! GraphController: the single owner of the flow being edited.
//!
//! Every user action goes through [`GraphController::dispatch`], which runs
//! validation, store mutation, expansion or cascade, layout and sync in that
//! order within one call. Only sync writes and pinned-version fetches leave the
//! call; both are tagged so late results cannot corrupt the current graph.

use crate::catalog::{AgentCatalog, AgentRecord, PinnedVersions, VersionSource, resolve_pinned_versions};
use crate::config::Config;
use crate::error::GraphError;
use crate::graph::{
    AgentRef, Edge, ExpansionContext, ExpansionSignal, Graph, GraphStore, Node, NodeId, NodeInsert,
    ROOT_NODE_ID, cascade, expander, layout, validator,
};
use crate::sync::{SyncBridge, SyncOp, build_request};
use crate::{BridgeContext, GraphEvent};

use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Edits the presentation layer can request.
#[derive(Debug, Clone)]
pub enum GraphAction {
    /// Attach an agent under `source`, expanding its declared connections.
    AddNode { source: NodeId, agent: AgentRecord },
    /// Refresh the snapshot of an agent already in the graph.
    UpdateNode { agent: AgentRecord },
    /// Remove a node and everything downstream of it.
    DeleteNode { id: NodeId },
    /// Draw an edge between two nodes already in the graph.
    ConnectEdge { source: NodeId, target: NodeId },
}

/// Summary of one committed edit.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub generation: u64,
    pub added: Vec<NodeId>,
    pub merged: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub edges_added: Vec<Edge>,
    pub signals: Vec<ExpansionSignal>,
    pub syncs_queued: usize,
}

/// A pending flow load. Completing a ticket whose generation has been
/// superseded is refused.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    master: Option<AgentRecord>,
}

/// An agent waiting on its pinned versions before it is added. Like a load,
/// it is refused once a newer flow has been loaded.
#[derive(Debug, Clone)]
pub struct AddTicket {
    generation: u64,
    source: NodeId,
    agent: AgentRecord,
}

impl AddTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn agent(&self) -> &AgentRecord {
        &self.agent
    }
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn master(&self) -> Option<&AgentRecord> {
        self.master.as_ref()
    }
}

pub struct GraphController {
    store: GraphStore,
    catalog: Arc<ArcSwap<AgentCatalog>>,
    config: Config,
    bridge: BridgeContext,
    sync: Option<SyncBridge>,
    events: broadcast::Sender<GraphEvent>,
    generation: u64,
}

impl GraphController {
    pub fn new(config: Config, catalog: AgentCatalog, bridge: BridgeContext) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store: GraphStore::new(),
            catalog: Arc::new(ArcSwap::from_pointee(catalog)),
            config,
            bridge,
            sync: None,
            events,
            generation: 0,
        }
    }

    /// Queue persistence writes through `sync`. Without one, edits stay local.
    pub fn with_sync(mut self, sync: SyncBridge) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn graph(&self) -> &Graph {
        self.store.graph()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn bridge(&self) -> &BridgeContext {
        &self.bridge
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    /// Sender for components that report on this controller's behalf, such as
    /// the sync worker.
    pub fn events(&self) -> broadcast::Sender<GraphEvent> {
        self.events.clone()
    }

    /// Shared handle so the catalog can be refreshed while editing.
    pub fn catalog(&self) -> Arc<ArcSwap<AgentCatalog>> {
        self.catalog.clone()
    }

    pub fn dispatch(&mut self, action: GraphAction) -> Result<Transaction, GraphError> {
        match action {
            GraphAction::AddNode { source, agent } => {
                self.add_node(&source, agent, &PinnedVersions::default())
            }
            GraphAction::UpdateNode { agent } => self.update_node(agent),
            GraphAction::DeleteNode { id } => self.delete_node(&id),
            GraphAction::ConnectEdge { source, target } => self.connect_edge(&source, &target),
        }
    }

    /// Replace the graph with the flow of `bridge`, expanded from `master`
    /// using catalog records only.
    pub fn load_flow(&mut self, bridge: BridgeContext, master: Option<AgentRecord>) -> Transaction {
        let ticket = self.begin_load(bridge, master);
        self.expand_master(ticket.master, &PinnedVersions::default())
    }

    /// Load a flow, fetching version-pinned connections first.
    pub async fn load_flow_resolved(
        &mut self,
        bridge: BridgeContext,
        master: Option<AgentRecord>,
        source: &dyn VersionSource,
    ) -> Result<Transaction, GraphError> {
        let ticket = self.begin_load(bridge, master);
        let pinned = match ticket.master() {
            Some(master) => {
                let catalog = self.catalog.load_full();
                resolve_pinned_versions(source, &catalog, master, self.config.expansion.max_depth)
                    .await
            }
            None => PinnedVersions::default(),
        };
        self.complete_load(ticket, &pinned)
    }

    /// Reset to an empty flow for `bridge` and start a new generation. The
    /// returned ticket is completed once pinned versions are available.
    pub fn begin_load(&mut self, bridge: BridgeContext, master: Option<AgentRecord>) -> LoadTicket {
        self.generation += 1;
        self.bridge = bridge;
        self.store = GraphStore::new();
        tracing::info!(
            generation = self.generation,
            bridge_id = %self.bridge.bridge_id,
            "loading flow"
        );
        LoadTicket {
            generation: self.generation,
            master,
        }
    }

    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        pinned: &PinnedVersions,
    ) -> Result<Transaction, GraphError> {
        self.ensure_current(ticket.generation, "load")?;
        Ok(self.expand_master(ticket.master, pinned))
    }

    /// Add `agent` under `source`, fetching its version-pinned connections
    /// first.
    pub async fn add_node_resolved(
        &mut self,
        source: &str,
        agent: AgentRecord,
        versions: &dyn VersionSource,
    ) -> Result<Transaction, GraphError> {
        let ticket = self.begin_add(source, agent);
        let catalog = self.catalog.load_full();
        let pinned = resolve_pinned_versions(
            versions,
            &catalog,
            &ticket.agent,
            self.config.expansion.max_depth,
        )
        .await;
        self.complete_add(ticket, &pinned)
    }

    /// Tag an add with the current generation so it can wait on version
    /// fetches.
    pub fn begin_add(&self, source: &str, agent: AgentRecord) -> AddTicket {
        AddTicket {
            generation: self.generation,
            source: source.to_string(),
            agent,
        }
    }

    pub fn complete_add(
        &mut self,
        ticket: AddTicket,
        pinned: &PinnedVersions,
    ) -> Result<Transaction, GraphError> {
        self.ensure_current(ticket.generation, "add")?;
        self.add_node(&ticket.source, ticket.agent, pinned)
    }

    fn ensure_current(&self, generation: u64, what: &'static str) -> Result<(), GraphError> {
        if generation == self.generation {
            return Ok(());
        }
        tracing::debug!(
            ticket = generation,
            current = self.generation,
            what,
            "discarding stale result"
        );
        Err(GraphError::StaleGeneration {
            ticket: generation,
            current: self.generation,
        })
    }

    fn expand_master(&mut self, master: Option<AgentRecord>, pinned: &PinnedVersions) -> Transaction {
        let mut transaction = self.transaction();
        if let Some(master) = master {
            let expansion = self.expansion_for(ROOT_NODE_ID, &master, pinned);
            self.commit_expansion(expansion, &mut transaction);
        }
        self.finish(transaction, Vec::new())
    }

    fn add_node(
        &mut self,
        source: &str,
        agent: AgentRecord,
        pinned: &PinnedVersions,
    ) -> Result<Transaction, GraphError> {
        if !self.graph().contains_node(source) {
            return Err(GraphError::NodeNotFound { id: source.to_string() });
        }

        let key = agent.key().to_string();
        let mut transaction = self.transaction();

        if self.graph().contains_node(&key) {
            let needs_edge = !self.graph().has_edge(source, &key);
            if needs_edge {
                validator::can_connect(source, &key, self.graph())?;
            }
            self.store.add_node(Node::agent(AgentRef::from_record(&agent)));
            transaction.merged.push(key.clone());
            if needs_edge {
                self.attach(source, &key, &mut transaction)?;
            }
        } else {
            let expansion = self.expansion_for(source, &agent, pinned);
            if let Some(error) = rejected_attachment(&expansion.signals, source, &key) {
                return Err(error);
            }
            self.commit_expansion(expansion, &mut transaction);
        }

        Ok(self.finish(transaction, vec![(source.to_string(), key, SyncOp::Add)]))
    }

    fn update_node(&mut self, agent: AgentRecord) -> Result<Transaction, GraphError> {
        let key = agent.key().to_string();
        if key == ROOT_NODE_ID {
            return Err(GraphError::RootProtected);
        }
        if !self.graph().contains_node(&key) {
            return Err(GraphError::NodeNotFound { id: key });
        }

        let mut transaction = self.transaction();
        if self.store.add_node(Node::agent(AgentRef::from_record(&agent))) == NodeInsert::Merged {
            transaction.merged.push(key.clone());
        }

        let syncs = self
            .graph()
            .parents(&key)
            .map(|parent| (parent.clone(), key.clone(), SyncOp::Update))
            .collect();
        Ok(self.finish(transaction, syncs))
    }

    fn delete_node(&mut self, id: &str) -> Result<Transaction, GraphError> {
        let node = self
            .graph()
            .node(id)
            .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() })?;
        if node.is_root() {
            return Err(GraphError::RootProtected);
        }
        if node.is_root_of_tree {
            tracing::info!(node_id = id, "refusing to delete master agent");
            return Err(GraphError::MasterAgentProtected { id: id.to_string() });
        }

        let mut transaction = self.transaction();
        let outcome = cascade::apply(&mut self.store, id);
        let mut removed: Vec<NodeId> = outcome.removed.into_iter().collect();
        removed.sort();
        transaction.removed = removed;

        let syncs = outcome
            .parents
            .into_iter()
            .map(|parent| (parent, id.to_string(), SyncOp::Remove))
            .collect();
        Ok(self.finish(transaction, syncs))
    }

    fn connect_edge(&mut self, source: &str, target: &str) -> Result<Transaction, GraphError> {
        validator::can_connect(source, target, self.graph())?;
        let mut transaction = self.transaction();
        self.attach(source, target, &mut transaction)?;
        Ok(self.finish(
            transaction,
            vec![(source.to_string(), target.to_string(), SyncOp::Add)],
        ))
    }

    fn attach(
        &mut self,
        source: &str,
        target: &str,
        transaction: &mut Transaction,
    ) -> Result<(), GraphError> {
        let edge = Edge::new(source, target);
        self.store.add_edge(edge.clone())?;
        if source == ROOT_NODE_ID {
            self.store.set_master(target);
        }
        transaction.edges_added.push(edge);
        Ok(())
    }

    fn expansion_for(
        &self,
        source: &str,
        agent: &AgentRecord,
        pinned: &PinnedVersions,
    ) -> expander::Expansion {
        let catalog = self.catalog.load();
        let ctx = ExpansionContext {
            catalog: &catalog,
            pinned,
            max_depth: self.config.expansion.max_depth,
        };
        expander::expand(
            &ctx,
            self.graph(),
            source,
            agent,
            source == ROOT_NODE_ID,
            &HashSet::new(),
            0,
        )
    }

    /// Nodes first, then edges.
    fn commit_expansion(&mut self, expansion: expander::Expansion, transaction: &mut Transaction) {
        for node in expansion.nodes {
            let id = node.id.clone();
            match self.store.add_node(node) {
                NodeInsert::Inserted => transaction.added.push(id),
                NodeInsert::Merged => transaction.merged.push(id),
            }
        }
        for edge in expansion.edges {
            match self.store.add_edge(edge.clone()) {
                Ok(()) => transaction.edges_added.push(edge),
                Err(error) => tracing::warn!(%error, "expansion edge already present"),
            }
        }
        transaction.signals.extend(expansion.signals);
    }

    fn transaction(&self) -> Transaction {
        Transaction {
            generation: self.generation,
            ..Default::default()
        }
    }

    /// Layout, then sync, then notify.
    fn finish(&mut self, mut transaction: Transaction, syncs: Vec<(NodeId, NodeId, SyncOp)>) -> Transaction {
        if self.store.take_dirty() {
            let positions = layout::layout(self.store.graph(), ROOT_NODE_ID, &self.config.layout);
            self.store.apply_positions(&positions);
        }

        for (parent, child, op) in syncs {
            if self.queue_sync(&parent, &child, op) {
                transaction.syncs_queued += 1;
            }
        }

        let graph = self.store.graph();
        let _ = self.events.send(GraphEvent::GraphChanged {
            generation: self.generation,
            nodes: graph.nodes.len(),
            edges: graph.edges.len(),
        });
        transaction
    }

    fn queue_sync(&self, parent: &str, child: &str, op: SyncOp) -> bool {
        let Some(sync) = &self.sync else {
            return false;
        };
        let Some(request) = build_request(
            self.graph(),
            &self.bridge,
            parent,
            child,
            op,
            self.config.expansion.max_depth,
        ) else {
            return false;
        };
        match sync.submit(request) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(%error, parent, child, "could not queue connected agents write");
                false
            }
        }
    }
}

/// The error that stopped `key` itself from attaching under `source`, if any.
fn rejected_attachment(signals: &[ExpansionSignal], source: &str, key: &str) -> Option<GraphError> {
    signals.iter().find_map(|signal| match signal {
        ExpansionSignal::EdgeRejected {
            source: from,
            target,
            error,
        } if from == source && target == key => Some(error.clone()),
        _ => None,
    })
}
