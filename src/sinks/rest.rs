//! Realtime-database REST mirror.
//!
//! Speaks the JSON-over-HTTP convention of hosted realtime databases: a node
//! at `path` is addressed as `{base_url}/{path}.json` and replaced with `PUT`.
//! An optional token is passed as the `auth` query parameter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{KeyedHistory, RealtimeMirror, HISTORY_NODE, REALTIME_NODE};
use crate::error::{Result, VitalinkError};
use crate::types::{HistoryEntry, RealtimeSnapshot};

const SINK: &str = "rest_store";

pub struct RestStore {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VitalinkError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    /// URL of a node, without the auth parameter.
    pub fn node_url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    async fn put_node<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<()> {
        let mut request = self.client.put(self.node_url(path)).json(body);
        if let Some(token) = &self.auth_token {
            request = request.query(&[("auth", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VitalinkError::sink(SINK, format!("PUT {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VitalinkError::sink(
                SINK,
                format!("PUT {} returned {}: {}", path, status, detail.trim()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RealtimeMirror for RestStore {
    async fn overwrite(&self, snapshot: &RealtimeSnapshot) -> Result<()> {
        self.put_node(REALTIME_NODE, snapshot).await
    }

    fn name(&self) -> &'static str {
        "rest_realtime"
    }
}

#[async_trait]
impl KeyedHistory for RestStore {
    async fn put(&self, key: &str, entry: &HistoryEntry) -> Result<()> {
        self.put_node(&format!("{}/{}", HISTORY_NODE, key), entry).await
    }

    fn name(&self) -> &'static str {
        "rest_history"
    }
}
