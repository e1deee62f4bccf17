//! Writer that PUTs each document to the regulations API.

use eregs_store::{StoreError, Writer};
use serde_json::Value;
use tracing::debug;

use crate::SyncError;

pub struct ApiWriter {
    client: reqwest::Client,
    base_url: String,
}

impl ApiWriter {
    /// `base_url` is the API root, e.g. `http://localhost:8000/api`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn put(&self, path: &str, value: &Value) -> Result<(), SyncError> {
        let url = self.url_for(path);
        debug!(url = %url, "PUT");
        let resp = self.client.put(&url).json(value).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Writer for ApiWriter {
    async fn write(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        self.put(path, value)
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))
    }
}
