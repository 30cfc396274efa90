//! Agent catalog: the set of known agent records and how references resolve
//! against it.

pub mod resolver;
pub mod types;

pub use resolver::{PinnedVersions, VersionSource, resolve_pinned_versions};
pub use types::{AGENT_STATUS_ENABLED, AgentRecord, ConnectedAgentEntry};

use crate::error::CatalogError;
use std::collections::HashMap;

/// Agent records available to the current editing session.
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    agents: Vec<AgentRecord>,
    by_id: HashMap<String, usize>,
}

impl AgentCatalog {
    pub fn new(agents: Vec<AgentRecord>) -> Self {
        let by_id = agents
            .iter()
            .enumerate()
            .map(|(index, agent)| (agent.id.clone(), index))
            .collect();
        Self { agents, by_id }
    }

    /// Parse the JSON array returned by the agent listing API.
    pub fn from_json(source: &str) -> Result<Self, CatalogError> {
        let agents: Vec<AgentRecord> = serde_json::from_str(source)?;
        Ok(Self::new(agents))
    }

    pub fn get(&self, id: &str) -> Option<&AgentRecord> {
        self.by_id.get(id).map(|&index| &self.agents[index])
    }

    pub fn find_by_name(&self, name: &str) -> Option<&AgentRecord> {
        if name.is_empty() {
            return None;
        }
        self.agents.iter().find(|agent| agent.name == name)
    }

    /// Resolve a declared connection: a pinned version snapshot wins, then the
    /// bridge id, then the display name the connection is keyed under.
    pub fn resolve<'a>(
        &'a self,
        name: &str,
        entry: &ConnectedAgentEntry,
        pinned: &'a PinnedVersions,
    ) -> Option<&'a AgentRecord> {
        entry
            .version_id
            .as_deref()
            .and_then(|version_id| pinned.get(version_id))
            .or_else(|| self.get(&entry.bridge_id))
            .or_else(|| self.find_by_name(name))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_id_then_name() {
        let catalog = AgentCatalog::new(vec![
            AgentRecord::new("b1", "Planner"),
            AgentRecord::new("b2", "Writer"),
        ]);
        let pinned = PinnedVersions::default();

        let by_id = catalog.resolve("anything", &ConnectedAgentEntry::new("b2"), &pinned);
        assert_eq!(by_id.map(|a| a.id.as_str()), Some("b2"));

        let by_name = catalog.resolve("Planner", &ConnectedAgentEntry::new("gone"), &pinned);
        assert_eq!(by_name.map(|a| a.id.as_str()), Some("b1"));

        let missing = catalog.resolve("Nobody", &ConnectedAgentEntry::new("gone"), &pinned);
        assert!(missing.is_none());
    }

    #[test]
    fn pinned_version_wins_over_catalog() {
        let catalog = AgentCatalog::new(vec![AgentRecord::new("b2", "Writer")]);
        let mut snapshot = AgentRecord::new("v9", "Writer v9");
        snapshot.parent_id = Some("b2".into());
        let mut pinned = PinnedVersions::default();
        pinned.insert("v9", snapshot);

        let mut entry = ConnectedAgentEntry::new("b2");
        entry.version_id = Some("v9".into());

        let resolved = catalog.resolve("Writer", &entry, &pinned).expect("should resolve");
        assert_eq!(resolved.name, "Writer v9");
        assert_eq!(resolved.key(), "b2");
    }

    #[test]
    fn parses_listing_json() {
        let catalog = AgentCatalog::from_json(r#"[{"_id":"b1","name":"Planner"},{"_id":"b2"}]"#)
            .expect("listing should parse");
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("b1").is_some());
        assert!(catalog.find_by_name("").is_none());
    }
}
