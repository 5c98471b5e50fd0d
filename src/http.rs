//! HTTP client wrapper for drive API requests.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tokio::time::timeout;

use crate::config::ClientConfig;
use crate::error::{DriveError, Result};

/// HTTP client for making requests to the drive backend.
///
/// Cookies are not stored by the client itself; the session token is
/// attached explicitly by [`crate::api::ApiClient`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(20),
        }
    }

    /// Create a new HTTP client with a proxy.
    pub fn with_proxy(proxy: &str) -> Result<Self> {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| DriveError::Custom(format!("Invalid proxy: {}", e)))?;

        let client = Client::builder()
            .proxy(proxy)
            .build()
            .map_err(|e| DriveError::Custom(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(20),
        })
    }

    /// Create a client from the proxy and timeout settings of `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let http = match config.proxy.as_deref() {
            Some(proxy) => Self::with_proxy(proxy)?,
            None => Self::new(),
        };
        Ok(http.with_timeout(config.request_timeout))
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.client.delete(url)
    }

    /// Send a request and wait for the response headers.
    ///
    /// The status code is not checked here; callers interpret it.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = timeout(self.timeout, request.send())
            .await
            .map_err(|_| DriveError::Timeout)??;
        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}
