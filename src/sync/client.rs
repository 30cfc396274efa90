//! HTTP client for the agent API: version lookup and connected-agent writes.

use super::payload::ConnectedAgentsUpdate;
use crate::catalog::{AgentRecord, VersionSource};
use crate::config::SyncConfig;
use crate::error::{CatalogError, Result, SyncError};
use anyhow::Context as _;

/// Destination of connected-agent writes.
#[async_trait::async_trait]
pub trait AgentPersistence: Send + Sync {
    async fn update_connected_agents(
        &self,
        target_id: &str,
        update: &ConnectedAgentsUpdate,
    ) -> std::result::Result<(), SyncError>;
}

/// `reqwest`-backed client for the agent API.
#[derive(Debug, Clone)]
pub struct HttpAgentStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAgentStore {
    /// Build a client from config. Returns `None` when no base URL is set.
    pub fn from_config(config: &SyncConfig) -> Result<Option<Self>> {
        let Some(base_url) = config.base_url.as_deref() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Some(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }))
    }

    fn connected_agents_url(&self, target_id: &str) -> String {
        format!("{}/bridge/{target_id}/connected_agents", self.base_url)
    }

    fn version_url(&self, version_id: &str) -> String {
        format!("{}/bridge/versions/{version_id}", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait::async_trait]
impl AgentPersistence for HttpAgentStore {
    async fn update_connected_agents(
        &self,
        target_id: &str,
        update: &ConnectedAgentsUpdate,
    ) -> std::result::Result<(), SyncError> {
        let url = self.connected_agents_url(target_id);
        let response = self
            .authorize(self.http.put(&url))
            .json(update)
            .send()
            .await
            .map_err(|source| SyncError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VersionSource for HttpAgentStore {
    async fn get_version_by_id(&self, version_id: &str) -> std::result::Result<AgentRecord, CatalogError> {
        let url = self.version_url(version_id);
        let fetch_failed = |message: String| CatalogError::FetchFailed {
            version_id: version_id.to_string(),
            message,
        };

        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|error| fetch_failed(error.to_string()))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(CatalogError::VersionNotFound {
                version_id: version_id.to_string(),
            }),
            status if !status.is_success() => Err(fetch_failed(format!("status {status}"))),
            _ => response
                .json::<AgentRecord>()
                .await
                .map_err(|error| fetch_failed(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_base_url() {
        let store = HttpAgentStore::from_config(&SyncConfig::default()).expect("config is valid");
        assert!(store.is_none());
    }

    #[test]
    fn urls_strip_trailing_slash() {
        let config = SyncConfig {
            base_url: Some("http://localhost:7000/api/".into()),
            ..Default::default()
        };
        let store = HttpAgentStore::from_config(&config)
            .expect("config is valid")
            .expect("sync enabled");
        assert_eq!(
            store.connected_agents_url("v1"),
            "http://localhost:7000/api/bridge/v1/connected_agents"
        );
        assert_eq!(store.version_url("v2"), "http://localhost:7000/api/bridge/versions/v2");
    }
}
