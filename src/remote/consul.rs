//! Consul KV Client
//!
//! Talks to a Consul-compatible `/v1/kv` endpoint over HTTP. The client
//! timeout must exceed the longest blocking wait, otherwise every idle
//! long poll surfaces as a transport error.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, warn};

use super::{KeyValuePair, QueryOptions, RemoteStore};
use crate::config::RemoteSettings;
use crate::constants::network;
use crate::types::{CfgError, Result};

/// HTTP client for a Consul KV API
pub struct ConsulClient {
    address: String,
    token: Option<SecretString>,
    client: reqwest::Client,
}

impl ConsulClient {
    /// Create a client for `address`, e.g. `http://localhost:8500/v1/kv`
    pub fn new(address: &str, token: Option<SecretString>, timeout: Duration) -> Result<Self> {
        let address = Self::validate_address(address)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CfgError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            address,
            token,
            client,
        })
    }

    /// Create a client from remote settings; the URL must be set
    pub fn from_settings(settings: &RemoteSettings) -> Result<Self> {
        let address = settings
            .url
            .as_deref()
            .ok_or_else(|| CfgError::Config("Remote URL is not configured".to_string()))?;

        Self::new(address, settings.secret_token(), settings.request_timeout())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Only http/https are accepted; a trailing slash is dropped.
    fn validate_address(address: &str) -> Result<String> {
        let url = url::Url::parse(address).map_err(|e| {
            CfgError::Config(format!("Invalid remote URL '{}': {}", address, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CfgError::Config(format!(
                "Remote URL must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        let mut result = url.to_string();
        if result.ends_with('/') {
            result.pop();
        }
        Ok(result)
    }

    fn endpoint(&self, key: &str) -> String {
        format!("{}/{}", self.address, key.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, key: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.endpoint(key));
        match &self.token {
            Some(token) => builder.header(network::TOKEN_HEADER, token.expose_secret()),
            None => builder,
        }
    }

    fn send_error(&self, e: reqwest::Error) -> CfgError {
        if e.is_connect() {
            CfgError::transport(format!("failed to connect to {}: {}", self.address, e))
        } else if e.is_timeout() {
            CfgError::transport(format!("request to {} timed out", self.address))
        } else {
            CfgError::transport(format!("request failed: {}", e))
        }
    }

    async fn status_error(response: reqwest::Response) -> CfgError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        CfgError::transport(format!("unexpected response ({}): {}", status, body.trim()))
    }
}

#[async_trait]
impl RemoteStore for ConsulClient {
    async fn get(&self, key: &str, options: Option<QueryOptions>) -> Result<Option<KeyValuePair>> {
        let mut request = self.request(reqwest::Method::GET, key);
        if let Some(options) = options {
            request = request.query(&options.to_query());
        }

        debug!(key, ?options, "GET");

        let response = request.send().await.map_err(|e| self.send_error(e))?;

        match response.status() {
            StatusCode::OK => {
                let pairs: Vec<KeyValuePair> = response.json().await.map_err(|e| {
                    CfgError::transport(format!("failed to decode KV response: {}", e))
                })?;
                if pairs.len() > 1 {
                    warn!(key, count = pairs.len(), "GET returned several entries, using the first");
                }
                Ok(pairs.into_iter().next())
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::status_error(response).await),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        debug!(key, bytes = value.len(), "PUT");

        let response = self
            .request(reqwest::Method::PUT, key)
            .body(value.to_vec())
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        debug!(key, "DELETE");

        let response = self
            .request(reqwest::Method::DELETE, key)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "consul"
    }
}
