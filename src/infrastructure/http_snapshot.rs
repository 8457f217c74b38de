// HTTP snapshot source
use crate::application::snapshot_source::{SnapshotRequest, SnapshotSource, WireRecord};
use crate::infrastructure::wire::decode_snapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSnapshotSource {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> Result<Vec<WireRecord>> {
        let url = self.build_url(&request.path);
        tracing::debug!("Fetching snapshot from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send snapshot request to {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Snapshot request failed with status {}: {}", status, body);
        }

        // read as text: the payload is JSON5, not JSON
        let text = response
            .text()
            .await
            .context("Failed to read snapshot response")?;

        let records = decode_snapshot(&text, request)?;
        tracing::debug!("Snapshot {} returned {} records", request.path, records.len());
        Ok(records)
    }
}
