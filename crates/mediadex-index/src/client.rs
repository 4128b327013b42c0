//! [`IndexApi`] over the authenticated RPC endpoint of a running index server.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use mediadex_core::IndexedDocument;

use crate::api::{Answer, IndexApi, InsertRequest, InsertResponse, QueryRequest};
use crate::error::IndexError;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Client for the index RPC routes. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RemoteIndex {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl RemoteIndex {
    pub fn new(base_url: &str, secret: &str, timeout: Duration) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rpc/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, IndexError> {
        let resp = req
            .bearer_auth(&self.secret)
            .send()
            .await
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| IndexError::Storage(format!("invalid response body: {}", e)));
        }

        let text = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(IndexError::Unauthorized(
                "index server rejected the shared secret".to_string(),
            ));
        }
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => Err(IndexError::from_code(&body.error, body.message)),
            Err(_) if status.is_server_error() => {
                Err(IndexError::Unavailable(format!("index server returned {}", status)))
            }
            Err(_) => Err(IndexError::Storage(format!("index server returned {}: {}", status, text))),
        }
    }
}

#[async_trait]
impl IndexApi for RemoteIndex {
    async fn query(&self, text: &str) -> Result<Answer, IndexError> {
        let body = QueryRequest {
            text: text.to_string(),
        };
        self.send(self.client.post(self.url("query")).json(&body)).await
    }

    async fn insert(&self, path: &Path, doc_id: Option<String>) -> Result<String, IndexError> {
        let body = InsertRequest {
            path: path.to_path_buf(),
            doc_id,
        };
        let resp: InsertResponse = self.send(self.client.post(self.url("insert")).json(&body)).await?;
        Ok(resp.id)
    }

    async fn list(&self) -> Result<Vec<IndexedDocument>, IndexError> {
        self.send(self.client.get(self.url("documents"))).await
    }
}
