//! Prefetching of version-pinned connections before expansion.

use super::{AgentCatalog, AgentRecord};
use crate::error::CatalogError;
use std::collections::{HashMap, HashSet};

/// Source of agent version snapshots.
#[async_trait::async_trait]
pub trait VersionSource: Send + Sync {
    async fn get_version_by_id(&self, version_id: &str) -> Result<AgentRecord, CatalogError>;
}

/// Version snapshots fetched for one load, keyed by version id.
#[derive(Debug, Clone, Default)]
pub struct PinnedVersions {
    records: HashMap<String, AgentRecord>,
    failed: Vec<String>,
}

impl PinnedVersions {
    pub fn get(&self, version_id: &str) -> Option<&AgentRecord> {
        self.records.get(version_id)
    }

    pub fn insert(&mut self, version_id: impl Into<String>, record: AgentRecord) {
        self.records.insert(version_id.into(), record);
    }

    /// Version ids whose fetch failed. Expansion falls back to the catalog for these.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fetch every version-pinned connection reachable from `root` within
/// `max_depth` levels. Fetches on one level run concurrently; failures are
/// recorded and logged, never returned.
pub async fn resolve_pinned_versions(
    source: &dyn VersionSource,
    catalog: &AgentCatalog,
    root: &AgentRecord,
    max_depth: usize,
) -> PinnedVersions {
    let mut pinned = PinnedVersions::default();
    let mut requested: HashSet<String> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::from([root.key().to_string()]);
    let mut frontier = vec![root.clone()];

    for depth in 0..max_depth {
        let wanted: Vec<String> = frontier
            .iter()
            .flat_map(|agent| agent.connected_agents.values())
            .filter_map(|entry| entry.version_id.clone())
            .filter(|version_id| requested.insert(version_id.clone()))
            .collect();

        if !wanted.is_empty() {
            tracing::debug!(depth, count = wanted.len(), "fetching pinned versions");
        }

        let fetches = wanted.iter().map(|version_id| source.get_version_by_id(version_id));
        let results = futures::future::join_all(fetches).await;

        for (version_id, result) in wanted.into_iter().zip(results) {
            match result {
                Ok(record) => pinned.insert(version_id, record),
                Err(error) => {
                    tracing::warn!(%version_id, %error, "failed to fetch pinned version");
                    pinned.failed.push(version_id);
                }
            }
        }

        let mut next = Vec::new();
        for agent in &frontier {
            for (name, entry) in &agent.connected_agents {
                let Some(child) = catalog.resolve(name, entry, &pinned) else {
                    continue;
                };
                if visited.insert(child.key().to_string()) {
                    next.push(child.clone());
                }
            }
        }

        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    pinned
}
