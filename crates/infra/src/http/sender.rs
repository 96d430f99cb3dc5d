//! reqwest implementation of the bundle sender port.
//!
//! The transport owns retries; this adapter makes exactly one attempt per
//! call and classifies the outcome.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use tracelane_core::client::{BundleSender, SendError};
use tracelane_domain::{Result, TracelaneError, WireBundle};
use tracing::debug;

use crate::errors::InfraError;

/// POSTs bundles as JSON to a fixed ingest URL.
#[derive(Clone)]
pub struct HttpBundleSender {
    client: ReqwestClient,
    endpoint: String,
}

impl HttpBundleSender {
    /// Start building a sender for `endpoint`.
    pub fn builder(endpoint: impl Into<String>) -> HttpBundleSenderBuilder {
        HttpBundleSenderBuilder { endpoint: endpoint.into(), user_agent: None, no_proxy: false }
    }

    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::builder(endpoint).build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BundleSender for HttpBundleSender {
    async fn send(&self, bundle: &WireBundle, timeout: Duration) -> std::result::Result<(), SendError> {
        let body = serde_json::to_vec(bundle).map_err(|e| SendError::Encode(e.to_string()))?;
        debug!(endpoint = %self.endpoint, bytes = body.len(), "posting bundle");

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SendError::Timeout(timeout)
                } else {
                    SendError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(SendError::from_status(status.as_u16(), message))
    }
}

/// Builder for [`HttpBundleSender`].
#[derive(Debug)]
pub struct HttpBundleSenderBuilder {
    endpoint: String,
    user_agent: Option<String>,
    no_proxy: bool,
}

impl HttpBundleSenderBuilder {
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Bypass system proxies (useful against local test servers).
    pub fn no_proxy(mut self) -> Self {
        self.no_proxy = true;
        self
    }

    pub fn build(self) -> Result<HttpBundleSender> {
        if self.endpoint.trim().is_empty() {
            return Err(TracelaneError::Config("ingest endpoint must not be empty".into()));
        }

        let mut builder = ReqwestClient::builder();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        if self.no_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(|e| TracelaneError::from(InfraError::from(e)))?;

        Ok(HttpBundleSender { client, endpoint: self.endpoint })
    }
}
