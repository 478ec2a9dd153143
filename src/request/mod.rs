//! Request-building layer.
//!
//! Turns a raw payload into a [`TransportRequest`] through a fixed sequence
//! of small nodes, each adding one piece of information:
//!
//! ```text
//! Json ──► MetadataConnectorNode ──► RequestRouterNode ──► QueryInjectorNode
//!      ──► RequestEncoderNode ──► RequestTransformerNode ──► RequestEncodingNode
//!      ──► RequestCreatorNode ──► (transport)
//! ```
//!
//! The intermediate models ([`RequestModel`], [`RoutableRequestModel`],
//! [`EncodableRequestModel`], [`RequestEncodingModel`]) only exist between
//! those nodes. Callers normally never build them by hand; the
//! [`ChainBuilder`](crate::builder::ChainBuilder) wires the nodes together.

pub mod encoding;
pub mod nodes;
pub mod query;
pub mod route;

pub use encoding::RequestEncodingNode;
pub use nodes::{
    HeaderInjectorNode, MetadataConnectorNode, QueryInjectorNode, RequestCreatorNode,
    RequestEncoderNode, RequestRouterNode, RequestTransformerNode,
};
pub use query::{
    ArrayKeyEncoding, ArrayKeyEncodingStrategy, BoolEncoding, BoolEncodingStrategy,
    DefaultDictKeyEncoding, DictKeyEncodingStrategy, QueryConfig,
};
pub use route::{Route, UrlRoute};

use crate::mapping::Json;
use bytes::Bytes;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }

    /// Methods that never carry a body. Their payload goes into the query.
    pub fn is_get_like(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Trace => reqwest::Method::TRACE,
            Method::Connect => reqwest::Method::CONNECT,
        }
    }
}

/// Header mapping. Keys are stored lowercased so lookups and merges are
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing value for the same key.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.as_ref().to_ascii_lowercase(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&key.to_ascii_lowercase())
    }

    /// Merge `other` into `self`. On collision the value from `other` wins.
    pub fn merge(&mut self, other: &Metadata) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// `self` merged over `base`: on collision `self` wins.
    pub fn merged_over(&self, base: &Metadata) -> Metadata {
        let mut out = base.clone();
        out.merge(self);
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for Metadata {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Metadata> for BTreeMap<String, String> {
    fn from(meta: Metadata) -> Self {
        meta.0
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut meta = Metadata::new();
        for (k, v) in iter {
            meta.insert(k, v);
        }
        meta
    }
}

impl<K: AsRef<str>, V: Into<String>, const N: usize> From<[(K, V); N]> for Metadata {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        f.write_str("}")
    }
}

/// Source of headers added to every outgoing request.
///
/// Providers are shared by all in-flight invocations of a chain and must not
/// hold invocation-specific state.
pub trait MetadataProvider: Send + Sync {
    fn metadata(&self) -> Metadata;
}

impl<F> MetadataProvider for F
where
    F: Fn() -> Metadata + Send + Sync,
{
    fn metadata(&self) -> Metadata {
        self()
    }
}

impl MetadataProvider for Metadata {
    fn metadata(&self) -> Metadata {
        self.clone()
    }
}

/// How the raw payload is placed into the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParametersEncoding {
    /// JSON body, `application/json`.
    #[default]
    Json,
    /// Payload folded into the URL query, no body.
    UrlQuery,
    /// `application/x-www-form-urlencoded` body.
    FormUrlEncoded,
    /// `multipart/form-data` body, one text part per top-level key.
    Multipart,
}

impl fmt::Display for ParametersEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParametersEncoding::Json => "json",
            ParametersEncoding::UrlQuery => "url_query",
            ParametersEncoding::FormUrlEncoded => "form_url_encoded",
            ParametersEncoding::Multipart => "multipart",
        };
        f.write_str(name)
    }
}

/// Raw payload with per-request metadata.
#[derive(Debug, Clone)]
pub struct RequestModel<R> {
    pub metadata: Metadata,
    pub raw: R,
}

/// [`RequestModel`] with its route attached.
#[derive(Clone)]
pub struct RoutableRequestModel<R> {
    pub metadata: Metadata,
    pub raw: R,
    pub route: Arc<dyn Route>,
}

impl<R: fmt::Debug> fmt::Debug for RoutableRequestModel<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutableRequestModel")
            .field("metadata", &self.metadata)
            .field("raw", &self.raw)
            .field("route", &self.route.describe())
            .finish()
    }
}

/// [`RoutableRequestModel`] with its encoding selected.
#[derive(Clone)]
pub struct EncodableRequestModel<R> {
    pub metadata: Metadata,
    pub raw: R,
    pub route: Arc<dyn Route>,
    pub encoding: ParametersEncoding,
}

impl<R: fmt::Debug> fmt::Debug for EncodableRequestModel<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodableRequestModel")
            .field("metadata", &self.metadata)
            .field("raw", &self.raw)
            .field("route", &self.route.describe())
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// Everything needed to encode the final request: the route is resolved
/// and the method is known.
#[derive(Debug, Clone)]
pub struct RequestEncodingModel {
    pub method: Method,
    pub url: Url,
    pub headers: Metadata,
    pub raw: Json,
    pub encoding: ParametersEncoding,
}

/// Fully built request handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Metadata,
    pub body: Option<Bytes>,
}

impl TransportRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Metadata::new(),
            body: None,
        }
    }

    /// Body as UTF-8 text, for logs.
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_is_case_insensitive() {
        let mut meta = Metadata::new();
        meta.insert("Content-Type", "text/plain");
        meta.insert("content-type", "application/json");
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.get("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_metadata_merge_later_wins() {
        let mut base = Metadata::from([("Accept", "a"), ("X-Base", "1")]);
        let overlay = Metadata::from([("accept", "b")]);
        base.merge(&overlay);
        assert_eq!(base.get("accept"), Some("b"));
        assert_eq!(base.get("x-base"), Some("1"));

        let kept = Metadata::from([("accept", "mine")]).merged_over(&base);
        assert_eq!(kept.get("accept"), Some("mine"));
    }

    #[test]
    fn test_method_get_like() {
        assert!(Method::Get.is_get_like());
        assert!(Method::Head.is_get_like());
        assert!(!Method::Post.is_get_like());
        assert_eq!(reqwest::Method::from(Method::Patch), reqwest::Method::PATCH);
    }

    #[test]
    fn test_closure_metadata_provider() {
        let provider = || Metadata::from([("Authorization", "Bearer t")]);
        assert_eq!(provider.metadata().get("authorization"), Some("Bearer t"));
    }
}
