//! reqwest-backed transport.

use super::{TransportClient, TransportReply};
use crate::{
    error::{NetworkError, NodeError},
    request::{Metadata, TransportRequest},
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// [`TransportClient`] over a shared `reqwest::Client`.
///
/// Cheap to clone; the underlying client pools connections internally.
///
/// ```
/// use netnode::transport::HttpTransport;
/// use std::time::Duration;
///
/// let transport = HttpTransport::builder()
///     .timeout(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder {
            client: None,
            timeout: None,
            user_agent: None,
        }
    }

    /// Wrap an existing client as-is.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    client: Option<Client>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl HttpTransportBuilder {
    /// Use a preconfigured client. Timeout and user agent are then ignored.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Per-request timeout. Default: 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpTransport, NodeError> {
        if let Some(client) = self.client {
            return Ok(HttpTransport { client });
        }

        let mut builder =
            Client::builder().timeout(self.timeout.unwrap_or(Duration::from_secs(60)));
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder
            .build()
            .map_err(|e| NodeError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(HttpTransport { client })
    }
}

#[async_trait]
impl TransportClient for HttpTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportReply, NetworkError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.clone());
        for (key, value) in request.headers.iter() {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: Metadata = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?;

        Ok(TransportReply {
            status,
            headers,
            body,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        assert!(HttpTransport::builder().build().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let transport = HttpTransport::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let request = TransportRequest::new(
            crate::request::Method::Get,
            "http://127.0.0.1:9/unreachable".parse().unwrap(),
        );
        let err = transport.send(&request).await.unwrap_err();
        assert!(matches!(
            err,
            NetworkError::CantConnectToHost(_) | NetworkError::Timeout | NetworkError::Transport(_)
        ));
    }
}
