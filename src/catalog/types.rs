//! Persisted agent records and their connected-agent references.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `agent_status` value written when a connection is added.
pub const AGENT_STATUS_ENABLED: &str = "enabled";

/// An agent ("bridge") record as returned by the agent API.
///
/// Version snapshots share this shape; for those `parent_id` names the bridge
/// the version belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "thread_id_or_false")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub variables_path: BTreeMap<String, String>,
    #[serde(default)]
    pub connected_agents: BTreeMap<String, ConnectedAgentEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl AgentRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Declare a downstream connection to another bridge.
    pub fn with_connection(mut self, name: impl Into<String>, bridge_id: impl Into<String>) -> Self {
        self.connected_agents
            .insert(name.into(), ConnectedAgentEntry::new(bridge_id));
        self
    }

    /// Declare a downstream connection pinned to a concrete version.
    pub fn with_pinned_connection(
        mut self,
        name: impl Into<String>,
        bridge_id: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Self {
        let mut entry = ConnectedAgentEntry::new(bridge_id);
        entry.version_id = Some(version_id.into());
        self.connected_agents.insert(name.into(), entry);
        self
    }

    pub fn with_published_version(mut self, version_id: impl Into<String>) -> Self {
        self.published_version_id = Some(version_id.into());
        self
    }

    /// Stable identity of the bridge this record describes. Version snapshots
    /// resolve to their parent bridge so two versions of one agent share a key.
    pub fn key(&self) -> &str {
        self.parent_id.as_deref().unwrap_or(&self.id)
    }
}

/// One entry of a persisted `connected_agents` map, keyed by display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectedAgentEntry {
    pub bridge_id: String,
    #[serde(default, with = "thread_id_or_false")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    /// Nested children of this connection, present in payloads written by the
    /// sync bridge.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub connected_agents: BTreeMap<String, ConnectedAgentEntry>,
}

impl ConnectedAgentEntry {
    pub fn new(bridge_id: impl Into<String>) -> Self {
        Self {
            bridge_id: bridge_id.into(),
            ..Default::default()
        }
    }
}

/// Thread ids are persisted as a string, or `false` when the agent has none.
mod thread_id_or_false {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Id(String),
        Flag(bool),
    }

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => serializer.serialize_str(id),
            None => serializer.serialize_bool(false),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Id(id)) if !id.is_empty() => Some(id),
            Some(Raw::Flag(set)) => {
                if set {
                    tracing::debug!("thread_id is `true` without an id, treating as unset");
                }
                None
            }
            Some(Raw::Id(_)) | None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_api_record_with_false_thread_id() {
        let record: AgentRecord = serde_json::from_value(serde_json::json!({
            "_id": "b1",
            "name": "Planner",
            "thread_id": false,
            "connected_agents": {
                "Writer": { "bridge_id": "b2", "thread_id": "t-9", "version_id": "v2" }
            },
            "published_version_id": "v1"
        }))
        .expect("record should parse");

        assert_eq!(record.thread_id, None);
        let writer = &record.connected_agents["Writer"];
        assert_eq!(writer.thread_id.as_deref(), Some("t-9"));
        assert_eq!(writer.version_id.as_deref(), Some("v2"));
        assert_eq!(record.key(), "b1");
    }

    #[test]
    fn missing_thread_id_serializes_as_false() {
        let entry = ConnectedAgentEntry::new("b2");
        let value = serde_json::to_value(&entry).expect("entry should serialize");
        assert_eq!(value, serde_json::json!({ "bridge_id": "b2", "thread_id": false }));
    }

    #[test]
    fn unnamed_record_still_parses() {
        let record: AgentRecord =
            serde_json::from_str(r#"{ "_id": "b5", "thread_id": "t-1" }"#).expect("record");
        assert_eq!(record.name, "");
        assert_eq!(record.thread_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn version_snapshot_keys_on_parent() {
        let mut snapshot = AgentRecord::new("v7", "Writer");
        snapshot.parent_id = Some("b2".into());
        assert_eq!(snapshot.key(), "b2");
    }
}
