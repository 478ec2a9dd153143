//! Fluent construction of request chains.
//!
//! [`ChainBuilder`] holds the per-endpoint configuration and assembles the
//! node graph in request order:
//!
//! ```text
//! LoggerNode
//!   └─ DtoMapperNode / RawEncoderNode
//!       └─ MetadataConnectorNode ─ RequestRouterNode ─ QueryInjectorNode
//!           └─ RequestEncoderNode ─ RequestTransformerNode ─ RequestEncodingNode
//!               └─ RequestCreatorNode ─ [HeaderInjectorNode] ─ [IfConnectionFailedFromCacheNode]
//!                   └─ RequestSenderNode
//!                       └─ ResponseProcessorNode ─ [NotModifiedTriggerNode]
//!                           └─ ResponseHttpErrorProcessorNode
//!                               └─ ResponseDataPreprocessorNode ─ ResponseDataParserNode
//! ```
//!
//! Bracketed nodes are only present when the matching option is set.

use crate::{
    cache::{CacheAdapter, CacheWriterNode, IfConnectionFailedFromCacheNode, NotModifiedTriggerNode},
    chain::Chain,
    dto::{DtoMapperNode, RawEncoderNode},
    error::{NodeError, Result},
    logging::LoggerNode,
    mapping::{Json, RawDecodable, RawEncodable},
    node::Node,
    request::{
        query::{ArrayKeyEncodingStrategy, BoolEncodingStrategy, DictKeyEncodingStrategy},
        HeaderInjectorNode, Metadata, MetadataConnectorNode, MetadataProvider, Method,
        ParametersEncoding, QueryConfig, QueryInjectorNode, RequestCreatorNode,
        RequestEncoderNode, RequestEncodingNode, RequestRouterNode, RequestTransformerNode, Route,
        TransportRequest,
    },
    response::{
        DataLoadingResponseProcessor, ErrorMapperAdapter, JsonCodec, PayloadCodec,
        ResponseDataParserNode, ResponseDataPreprocessorNode, ResponseHttpErrorProcessorNode,
        ResponseProcessorNode,
    },
    transport::{RawResponse, RequestSenderNode, TransportClient},
};
use bytes::Bytes;
use std::sync::Arc;

/// Configuration for one endpoint, turned into chains by
/// [`build`](Self::build) and [`build_data_loading`](Self::build_data_loading).
///
/// Defaults: JSON encoding, `GET`, no metadata, no providers, no query, no
/// log filter.
///
/// # Example
///
/// ```no_run
/// use netnode::builder::ChainBuilder;
/// use netnode::mapping::Json;
/// use netnode::request::{Method, UrlRoute};
/// use netnode::transport::HttpTransport;
/// use std::sync::Arc;
///
/// # async fn run() -> netnode::Result<()> {
/// let transport = Arc::new(HttpTransport::builder().build()?);
/// let chain = ChainBuilder::new(transport)
///     .route(Method::Get, UrlRoute::new("https://api.example.com", "users"))
///     .build::<(), Json>()?;
/// let users = chain.invoke(()).await.into_result()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChainBuilder {
    transport: Arc<dyn TransportClient>,
    route: Option<(Method, Arc<dyn Route>)>,
    encoding: ParametersEncoding,
    metadata: Metadata,
    headers: Metadata,
    providers: Vec<Arc<dyn MetadataProvider>>,
    query: QueryConfig,
    mappers: Vec<Arc<dyn ErrorMapperAdapter>>,
    codec: Arc<dyn PayloadCodec>,
    cache: Option<Arc<dyn CacheAdapter>>,
    log_filter: Vec<String>,
}

impl std::fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("transport", &self.transport.name())
            .field(
                "route",
                &self.route.as_ref().map(|(m, r)| format!("{m} {}", r.describe())),
            )
            .field("encoding", &self.encoding)
            .field("metadata", &self.metadata)
            .field("providers", &self.providers.len())
            .field("query", &self.query)
            .field("mappers", &self.mappers.len())
            .field("has_cache", &self.cache.is_some())
            .field("log_filter", &self.log_filter)
            .finish()
    }
}

impl ChainBuilder {
    pub fn new(transport: Arc<dyn TransportClient>) -> Self {
        Self {
            transport,
            route: None,
            encoding: ParametersEncoding::default(),
            metadata: Metadata::new(),
            headers: Metadata::new(),
            providers: Vec::new(),
            query: QueryConfig::default(),
            mappers: Vec::new(),
            codec: Arc::new(JsonCodec),
            cache: None,
            log_filter: Vec::new(),
        }
    }

    /// Set the HTTP method and route. Required.
    pub fn route(mut self, method: Method, route: impl Route + 'static) -> Self {
        let route: Arc<dyn Route> = Arc::new(route);
        self.route = Some((method, route));
        self
    }

    /// Set the parameters encoding. Default: [`ParametersEncoding::Json`].
    pub fn encode(mut self, encoding: ParametersEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Register a metadata provider, queried on every invocation.
    pub fn add_provider(mut self, provider: impl MetadataProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Per-request metadata attached before routing.
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Static headers added after the providers. Headers already on the
    /// request win.
    pub fn headers(mut self, headers: Metadata) -> Self {
        self.headers = headers;
        self
    }

    /// Static query parameters, encoded into every request URL.
    pub fn query(mut self, query: Json) -> Self {
        self.query.query = query;
        self
    }

    pub fn bool_encoding(mut self, strategy: impl BoolEncodingStrategy + 'static) -> Self {
        self.query = self.query.with_bool_encoding(strategy);
        self
    }

    pub fn array_encoding(mut self, strategy: impl ArrayKeyEncodingStrategy + 'static) -> Self {
        self.query = self.query.with_array_encoding(strategy);
        self
    }

    pub fn dict_encoding(mut self, strategy: impl DictKeyEncodingStrategy + 'static) -> Self {
        self.query = self.query.with_dict_encoding(strategy);
        self
    }

    /// Add an error-body mapper. Mappers are tried in registration order.
    pub fn add_error_mapper(mut self, mapper: impl ErrorMapperAdapter + 'static) -> Self {
        self.mappers.push(Arc::new(mapper));
        self
    }

    /// Response body codec. Default: [`JsonCodec`].
    pub fn codec(mut self, codec: impl PayloadCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Enable the cache nodes: read on `304` and on connection failure,
    /// write on success.
    pub fn cache(mut self, cache: Arc<dyn CacheAdapter>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Only emit log entries whose id is not in `filter`.
    pub fn log_filter<S: Into<String>>(mut self, filter: impl IntoIterator<Item = S>) -> Self {
        self.log_filter = filter.into_iter().map(Into::into).collect();
        self
    }

    fn configured_route(&self) -> Result<(Method, Arc<dyn Route>)> {
        self.route
            .clone()
            .ok_or_else(|| NodeError::InvalidConfig("Chain must have a route".to_string()))
    }

    fn chain_name(method: Method, route: &Arc<dyn Route>) -> String {
        format!("{method} {}", route.describe())
    }

    /// Request-building layer, from payload to transport.
    fn request_layer<O: Send + 'static>(
        &self,
        method: Method,
        route: Arc<dyn Route>,
        sender: Arc<dyn Node<TransportRequest, O>>,
    ) -> Arc<dyn Node<Json, O>> {
        let sender: Arc<dyn Node<TransportRequest, O>> = if self.headers.is_empty() {
            sender
        } else {
            Arc::new(HeaderInjectorNode::new(sender, self.headers.clone()))
        };
        let creator = Arc::new(RequestCreatorNode::<O>::new(sender, self.providers.clone()));
        let encoding =
            Arc::new(RequestEncodingNode::<O>::new(creator).with_query_strategies(self.query.clone()));
        let transformer = Arc::new(RequestTransformerNode::<O>::new(encoding, method));
        let encoder = Arc::new(RequestEncoderNode::<Json, O>::new(transformer, self.encoding));
        let query = Arc::new(QueryInjectorNode::<Json, O>::new(encoder, self.query.clone()));
        let router = Arc::new(RequestRouterNode::<Json, O>::new(query, route));
        Arc::new(MetadataConnectorNode::<Json, O>::new(router, self.metadata.clone()))
    }

    /// Build a chain mapping `I` to `O` through JSON payloads.
    ///
    /// Fails with [`NodeError::InvalidConfig`] when no route is set.
    pub fn build<I, O>(&self) -> Result<Chain<I, O>>
    where
        I: RawEncodable + Send + 'static,
        O: RawDecodable + Send + 'static,
    {
        let (method, route) = self.configured_route()?;
        let name = Self::chain_name(method, &route);

        let mut parser = ResponseDataParserNode::new().with_codec(Arc::clone(&self.codec));
        if let Some(cache) = &self.cache {
            parser = parser.with_post_processor(Arc::new(CacheWriterNode::new(Arc::clone(cache))));
        }
        let preprocessor = Arc::new(ResponseDataPreprocessorNode::new(Arc::new(parser)));
        let classifier: Arc<dyn Node<RawResponse, Json>> = Arc::new(
            ResponseHttpErrorProcessorNode::<Json>::new(preprocessor)
                .with_mappers(self.mappers.clone())
                .with_codec(Arc::clone(&self.codec)),
        );
        let status: Arc<dyn Node<RawResponse, Json>> = match &self.cache {
            Some(cache) => Arc::new(NotModifiedTriggerNode::new(classifier, Arc::clone(cache))),
            None => classifier,
        };
        let response = Arc::new(ResponseProcessorNode::<Json>::new(status));

        let sender: Arc<dyn Node<TransportRequest, Json>> =
            Arc::new(RequestSenderNode::<Json>::new(Arc::clone(&self.transport), response));
        let sender: Arc<dyn Node<TransportRequest, Json>> = match &self.cache {
            Some(cache) => Arc::new(IfConnectionFailedFromCacheNode::new(sender, Arc::clone(cache))),
            None => sender,
        };

        let raw = self.request_layer(method, route, sender);
        let mapper: Arc<dyn Node<I, O>> = Arc::new(DtoMapperNode::<I, O>::new(raw));
        let root = LoggerNode::new(mapper, self.log_filter.clone());

        tracing::debug!(chain = %name, cached = self.cache.is_some(), "built chain");
        Ok(Chain::new(name, Arc::new(root)))
    }

    /// Build a chain that returns the raw response body.
    ///
    /// Connection and status checks still apply; the body is never decoded.
    /// Cache nodes are not used.
    pub fn build_data_loading<I>(&self) -> Result<Chain<I, Bytes>>
    where
        I: RawEncodable + Send + 'static,
    {
        let (method, route) = self.configured_route()?;
        let name = Self::chain_name(method, &route);

        let loader = Arc::new(DataLoadingResponseProcessor::new());
        let classifier = Arc::new(
            ResponseHttpErrorProcessorNode::<Bytes>::new(loader)
                .with_mappers(self.mappers.clone())
                .with_codec(Arc::clone(&self.codec)),
        );
        let response = Arc::new(ResponseProcessorNode::<Bytes>::new(classifier));
        let sender: Arc<dyn Node<TransportRequest, Bytes>> =
            Arc::new(RequestSenderNode::<Bytes>::new(Arc::clone(&self.transport), response));

        let raw = self.request_layer(method, route, sender);
        let encoder: Arc<dyn Node<I, Bytes>> = Arc::new(RawEncoderNode::<I, Bytes>::new(raw));
        let root = LoggerNode::new(encoder, self.log_filter.clone());

        tracing::debug!(chain = %name, "built data-loading chain");
        Ok(Chain::new(name, Arc::new(root)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::MemoryCache;
    use crate::error::NetworkError;
    use crate::request::query::BoolEncoding;
    use crate::request::UrlRoute;
    use crate::transport::{MockReply, MockTransport};
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Json {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_build_without_route_fails() {
        let mock = Arc::new(MockTransport::fixed(MockReply::empty(200)));
        let err = ChainBuilder::new(mock).build::<Json, Json>().unwrap_err();
        assert!(matches!(err, NodeError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_get_folds_query_and_payload() {
        let mock = Arc::new(MockTransport::fixed(MockReply::json(200, r#"{"ok":true}"#)));
        let chain = ChainBuilder::new(mock.clone())
            .route(Method::Get, UrlRoute::new("http://api.test", "search"))
            .query(payload(json!({ "active": true })))
            .bool_encoding(BoolEncoding::AsBool)
            .build::<Json, Json>()
            .unwrap();

        let out = chain
            .process(payload(json!({ "q": "rust" })))
            .await
            .into_result()
            .unwrap();
        assert_eq!(out["ok"], true);

        let sent = &mock.requests()[0];
        assert_eq!(sent.method, Method::Get);
        assert!(sent.body.is_none());
        assert_eq!(sent.url.as_str(), "http://api.test/search?active=true&q=rust");
    }

    #[tokio::test]
    async fn test_bad_route_with_query_is_logged() {
        let mock = Arc::new(MockTransport::fixed(MockReply::json(200, "{}")));
        let chain = ChainBuilder::new(mock.clone())
            .route(Method::Get, UrlRoute::new("no-scheme", "x"))
            .query(payload(json!({ "page": 1 })))
            .build::<(), Json>()
            .unwrap();

        let done = chain.process(()).await;
        assert!(matches!(
            done.result,
            Err(NodeError::Route(crate::error::RouteError::CannotBuildUrl(_)))
        ));
        let entries = done.entries_for("QueryInjectorNode");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, crate::logging::LogKind::Error);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_headers_providers_and_static() {
        let mock = Arc::new(MockTransport::fixed(MockReply::empty(204)));
        let chain = ChainBuilder::new(mock.clone())
            .route(Method::Post, UrlRoute::new("http://api.test", "items"))
            .metadata(Metadata::from([("X-Trace", "meta")]))
            .add_provider(|| Metadata::from([("Authorization", "Bearer t")]))
            .headers(Metadata::from([("x-trace", "static"), ("x-app", "demo")]))
            .build::<Json, Json>()
            .unwrap();

        let out = chain.process(Json::new()).await.into_result().unwrap();
        assert!(out.is_empty());

        let sent = &mock.requests()[0];
        assert_eq!(sent.headers.get("authorization"), Some("Bearer t"));
        assert_eq!(sent.headers.get("x-trace"), Some("meta"));
        assert_eq!(sent.headers.get("x-app"), Some("demo"));
        assert_eq!(sent.body_text().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_log_filter_and_logger_root() {
        let mock = Arc::new(MockTransport::fixed(MockReply::json(200, "{}")));
        let chain = ChainBuilder::new(mock)
            .route(Method::Get, "http://api.test/ping")
            .log_filter(["RequestCreatorNode"])
            .build::<(), ()>()
            .unwrap();
        assert_eq!(chain.name(), "GET http://api.test/ping");
        assert_eq!(chain.root().name(), "LoggerNode");

        let done = chain.process(()).await;
        assert!(done.is_ok());
        assert!(!done.entries_for("RequestCreatorNode").is_empty());
    }

    #[tokio::test]
    async fn test_cache_serves_not_modified_and_offline() {
        let url = "http://api.test/feed";
        let cache = Arc::new(MemoryCache::default());
        let mock = Arc::new(MockTransport::new(vec![
            MockReply::json(200, r#"{"v":1}"#),
            MockReply::empty(304),
            MockReply::Fail(NetworkError::NoInternetConnection),
        ]));
        let chain = ChainBuilder::new(mock)
            .route(Method::Get, url)
            .cache(cache.clone())
            .build::<(), Json>()
            .unwrap();

        let first = chain.process(()).await.into_result().unwrap();
        assert_eq!(first["v"], 1);
        assert_eq!(cache.get(url), Some(first.clone()));

        let second = chain.process(()).await.into_result().unwrap();
        assert_eq!(second, first);

        let third = chain.process(()).await.into_result().unwrap();
        assert_eq!(third, first);
    }

    #[tokio::test]
    async fn test_not_modified_without_cache() {
        let mock = Arc::new(MockTransport::fixed(MockReply::empty(304)));
        let chain = ChainBuilder::new(mock)
            .route(Method::Get, "http://api.test/feed")
            .build::<(), Json>()
            .unwrap();
        let err = chain.process(()).await.into_result().unwrap_err();
        assert!(matches!(err, NodeError::NotModified(ref r) if r.status == 304));
    }

    #[tokio::test]
    async fn test_data_loading_returns_bytes() {
        let mock = Arc::new(MockTransport::new(vec![
            MockReply::json(200, "not json at all"),
            MockReply::empty(404),
        ]));
        let chain = ChainBuilder::new(mock)
            .route(Method::Get, "http://api.test/file")
            .build_data_loading::<()>()
            .unwrap();

        let body = chain.process(()).await.into_result().unwrap();
        assert_eq!(&body[..], b"not json at all");

        let err = chain.process(()).await.into_result().unwrap_err();
        assert!(matches!(err, NodeError::Http(_)));
    }
}
