//! Admin API client.
//!
//! # Endpoints
//! - `GET    {base}/api/configs`                   whole document
//! - `PUT    {base}/api/configs/{category}/{name}` upsert one resource
//! - `DELETE {base}/api/configs/{category}/{name}` delete one resource

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use super::{ConfigService, RemoteError};
use crate::document::{Category, ConfigurationDocument, Resource};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// `ConfigService` backed by the proxy's admin API.
pub struct HttpService {
    client: Client,
    base_url: Url,
}

impl HttpService {
    /// Create a client for `base_url`, authenticating with `api_key` when set.
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Transport(format!("invalid base url '{}': {}", base_url, e)))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| RemoteError::Transport(format!("invalid api key: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Transport(format!("base url '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("api")
            .push("configs")
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, op: &'static str, request: RequestBuilder) -> Result<Response, RemoteError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::debug!(op, request_id = %request_id, "Calling admin API");

        let res = request.header(REQUEST_ID_HEADER, &request_id).send().await?;
        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            tracing::warn!(op, request_id = %request_id, status = %status, "Admin API rejected request");
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(res)
    }
}

#[async_trait]
impl ConfigService for HttpService {
    async fn fetch(&self) -> Result<ConfigurationDocument, RemoteError> {
        let url = self.endpoint(&[])?;
        let res = self.send("fetch", self.client.get(url)).await?;
        let text = res.text().await?;
        serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn upsert(
        &self,
        category: Category,
        name: &str,
        resource: &Resource,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&[category.as_str(), name])?;
        self.send("upsert", self.client.put(url).json(resource)).await?;
        Ok(())
    }

    async fn delete(&self, category: Category, name: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(&[category.as_str(), name])?;
        self.send("delete", self.client.delete(url)).await?;
        Ok(())
    }
}
