// HTTP snapshot store - remote replica behind a JSON key/value API
use crate::application::snapshot_store::RemoteSnapshotStore;
use crate::domain::report::{ReportScope, Snapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpSnapshotStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSnapshotStore {
    pub fn new(base_url: String, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn snapshot_url(&self, scope: &ReportScope) -> String {
        format!(
            "{}/snapshots/{}",
            self.base_url,
            urlencoding::encode(&scope.storage_key())
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteSnapshotStore for HttpSnapshotStore {
    async fn fetch(&self, scope: &ReportScope) -> Result<Option<Snapshot>> {
        let url = self.snapshot_url(scope);
        let response = self
            .authorize(self.client.get(&url))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to snapshot store")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Snapshot fetch failed with status {}: {}", status, body);
        }

        let snapshot = response
            .json::<Snapshot>()
            .await
            .context("Failed to parse snapshot response")?;
        Ok(Some(snapshot))
    }

    async fn push(&self, scope: &ReportScope, snapshot: &Snapshot) -> Result<()> {
        let url = self.snapshot_url(scope);
        let response = self
            .authorize(self.client.put(&url))
            .json(snapshot)
            .send()
            .await
            .context("Failed to send snapshot to snapshot store")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Snapshot push failed with status {}: {}", status, body);
        }
        Ok(())
    }

    async fn delete(&self, scope: &ReportScope) -> Result<()> {
        let url = self.snapshot_url(scope);
        let response = self
            .authorize(self.client.delete(&url))
            .send()
            .await
            .context("Failed to send delete to snapshot store")?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Snapshot delete failed with status {}: {}", status, body);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_url_encodes_key() {
        let store = HttpSnapshotStore::new(
            "https://store.example.com/api/".into(),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        let scope = ReportScope::new("acme", 2024).unwrap();

        assert_eq!(
            store.snapshot_url(&scope),
            "https://store.example.com/api/snapshots/report-grid%3Aacme%3A2024"
        );
    }
}
