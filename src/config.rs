//! File-based client configuration.
//!
//! [`ClientConfig`] collects the settings usually shared by every endpoint of
//! one service (timeout, default headers, query strategies, log filter) so
//! they can live in a JSON or YAML file instead of code.

use crate::{
    builder::ChainBuilder,
    error::{NodeError, Result},
    request::{
        query::{ArrayKeyEncoding, BoolEncoding},
        Metadata, ParametersEncoding,
    },
    transport::{HttpTransport, TransportClient},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Shared settings for a service's chains.
///
/// Every field is optional in the source document.
///
/// ```
/// use netnode::config::ClientConfig;
///
/// let config = ClientConfig::from_json(r#"{
///     "timeout_secs": 15,
///     "headers": { "Accept-Language": "en" },
///     "bool_encoding": "as_bool"
/// }"#).unwrap();
/// assert_eq!(config.timeout_secs, Some(15));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-request timeout in seconds. Default: 60.
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    /// Static headers added to every request.
    pub headers: BTreeMap<String, String>,
    /// Stage ids whose log entries are not emitted.
    pub log_filter: Vec<String>,
    pub bool_encoding: BoolEncoding,
    pub array_encoding: ArrayKeyEncoding,
    pub encoding: ParametersEncoding,
}

impl ClientConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source)
            .map_err(|e| NodeError::InvalidConfig(format!("Failed to parse JSON config: {e}")))
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml(source: &str) -> Result<Self> {
        serde_yaml::from_str(source)
            .map_err(|e| NodeError::InvalidConfig(format!("Failed to parse YAML config: {e}")))
    }

    /// Build the reqwest-backed transport described by this config.
    pub fn transport(&self) -> Result<HttpTransport> {
        let mut builder = HttpTransport::builder();
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }

    /// Apply the chain-level settings to `builder`.
    pub fn apply(&self, builder: ChainBuilder) -> ChainBuilder {
        builder
            .headers(Metadata::from(self.headers.clone()))
            .log_filter(self.log_filter.clone())
            .bool_encoding(self.bool_encoding)
            .array_encoding(self.array_encoding)
            .encode(self.encoding)
    }

    /// A [`ChainBuilder`] over a fresh [`HttpTransport`], with this config applied.
    pub fn builder(&self) -> Result<ChainBuilder> {
        let transport: Arc<dyn TransportClient> = Arc::new(self.transport()?);
        Ok(self.apply(ChainBuilder::new(transport)))
    }
}
