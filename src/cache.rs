//! Cache boundary.
//!
//! Storage itself lives outside this crate: callers supply a
//! [`CacheAdapter`]. The nodes here only decide *when* the adapter is
//! consulted:
//!
//! - [`NotModifiedTriggerNode`] serves the cached payload on `304`.
//! - [`IfConnectionFailedFromCacheNode`] serves it when the transport fails.
//! - [`CacheWriterNode`] stores every successfully decoded response.

use crate::{
    error::{CacheError, NodeError, Result},
    logging::{LogEntry, LogOrder},
    mapping::Json,
    node::{BoxFut, Node, NodeCtx},
    request::TransportRequest,
    response::ProcessedResponse,
    transport::RawResponse,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Response store consulted around the transport.
///
/// Shared by all in-flight invocations; implementations must be safe for
/// concurrent use.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    /// Store the decoded payload of a successful response.
    async fn save(&self, response: &RawResponse, payload: &Json) -> std::result::Result<(), CacheError>;

    /// Load the payload stored for `request`.
    ///
    /// `fallback` is the live response that triggered the lookup, when
    /// there is one (the `304`).
    async fn load(
        &self,
        request: &TransportRequest,
        fallback: Option<&RawResponse>,
    ) -> std::result::Result<Json, CacheError>;
}

/// Serves the cached payload when the server answers `304 Not Modified`.
///
/// Any other status goes on to `next` untouched.
pub struct NotModifiedTriggerNode {
    next: Arc<dyn Node<RawResponse, Json>>,
    cache: Arc<dyn CacheAdapter>,
}

impl NotModifiedTriggerNode {
    pub fn new(next: Arc<dyn Node<RawResponse, Json>>, cache: Arc<dyn CacheAdapter>) -> Self {
        Self { next, cache }
    }
}

impl Node<RawResponse, Json> for NotModifiedTriggerNode {
    fn name(&self) -> &str {
        "NotModifiedTriggerNode"
    }

    fn process<'a>(&'a self, input: RawResponse, ctx: &'a NodeCtx) -> BoxFut<'a, Result<Json>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let order = LogOrder::NOT_MODIFIED_TRIGGER_NODE;

            if input.status != 304 {
                ctx.log(LogEntry::info(
                    self.name(),
                    order,
                    format!("Response status code = {} != 304 -> skip cache reading", input.status),
                ));
                return self.next.process(input, ctx).await;
            }

            ctx.log(LogEntry::info(
                self.name(),
                order,
                "Response status code == 304 -> read cache",
            ));
            let payload = self.cache.load(&input.request, Some(&input)).await?;
            ctx.check_cancelled()?;
            Ok(payload)
        })
    }
}

/// Serves the cached payload when the request fails at the transport.
///
/// Only [`NodeError::Network`] triggers the fallback; every other failure
/// passes through.
pub struct IfConnectionFailedFromCacheNode {
    next: Arc<dyn Node<TransportRequest, Json>>,
    cache: Arc<dyn CacheAdapter>,
}

impl IfConnectionFailedFromCacheNode {
    pub fn new(next: Arc<dyn Node<TransportRequest, Json>>, cache: Arc<dyn CacheAdapter>) -> Self {
        Self { next, cache }
    }
}

impl Node<TransportRequest, Json> for IfConnectionFailedFromCacheNode {
    fn name(&self) -> &str {
        "IfConnectionFailedFromCacheNode"
    }

    fn process<'a>(
        &'a self,
        input: TransportRequest,
        ctx: &'a NodeCtx,
    ) -> BoxFut<'a, Result<Json>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let request = input.clone();
            match self.next.process(input, ctx).await {
                Err(NodeError::Network(e)) => {
                    let mut entry = LogEntry::warning(
                        self.name(),
                        LogOrder::CACHE_FALLBACK_NODE,
                        format!("Catching {e}"),
                    );
                    entry.push_line("Start read cache");
                    ctx.log(entry);
                    Ok(self.cache.load(&request, None).await?)
                }
                other => other,
            }
        })
    }
}

/// Post-processor that stores successful responses.
pub struct CacheWriterNode {
    cache: Arc<dyn CacheAdapter>,
}

impl CacheWriterNode {
    pub fn new(cache: Arc<dyn CacheAdapter>) -> Self {
        Self { cache }
    }
}

impl Node<ProcessedResponse, ()> for CacheWriterNode {
    fn name(&self) -> &str {
        "CacheWriterNode"
    }

    fn process<'a>(&'a self, input: ProcessedResponse, ctx: &'a NodeCtx) -> BoxFut<'a, Result<()>> {
        Box::pin(async move {
            if !input.response.is_success() {
                return Ok(());
            }
            self.cache.save(&input.response, &input.json).await?;
            ctx.log(LogEntry::info(
                self.name(),
                LogOrder::CACHE_WRITER_NODE,
                format!("Saved response for {}", input.response.request.url),
            ));
            Ok(())
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::node::FnNode;
    use crate::request::Method;
    use crate::transport::TransportMetrics;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory adapter keyed by URL.
    #[derive(Default)]
    pub(crate) struct MemoryCache {
        entries: Mutex<HashMap<String, Json>>,
    }

    impl MemoryCache {
        pub(crate) fn with(url: &str, payload: Json) -> Self {
            let cache = Self::default();
            cache.entries.lock().unwrap().insert(url.to_string(), payload);
            cache
        }

        pub(crate) fn get(&self, url: &str) -> Option<Json> {
            self.entries.lock().unwrap().get(url).cloned()
        }
    }

    #[async_trait]
    impl CacheAdapter for MemoryCache {
        async fn save(&self, response: &RawResponse, payload: &Json) -> std::result::Result<(), CacheError> {
            self.entries
                .lock()
                .unwrap()
                .insert(response.request.url.to_string(), payload.clone());
            Ok(())
        }

        async fn load(
            &self,
            request: &TransportRequest,
            _fallback: Option<&RawResponse>,
        ) -> std::result::Result<Json, CacheError> {
            self.get(request.url.as_str()).ok_or(CacheError::CantFindInCache)
        }
    }

    const URL: &str = "http://h/users";

    fn cached() -> Json {
        let mut json = Json::new();
        json.insert("cached".into(), true.into());
        json
    }

    fn request() -> TransportRequest {
        TransportRequest::new(Method::Get, URL.parse().unwrap())
    }

    fn response(status: u16) -> RawResponse {
        RawResponse {
            request: request(),
            status,
            headers: Default::default(),
            body: Bytes::new(),
            metrics: TransportMetrics {
                duration: Duration::ZERO,
            },
        }
    }

    fn live() -> Arc<dyn Node<RawResponse, Json>> {
        Arc::new(FnNode::new("live", |_: RawResponse| async move { Ok(Json::new()) }))
    }

    #[tokio::test]
    async fn test_not_modified_reads_cache() {
        let node = NotModifiedTriggerNode::new(live(), Arc::new(MemoryCache::with(URL, cached())));
        let out = node.process(response(304), &NodeCtx::new()).await.unwrap();
        assert_eq!(out, cached());

        let out = node.process(response(200), &NodeCtx::new()).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_not_modified_without_entry_fails() {
        let node = NotModifiedTriggerNode::new(live(), Arc::new(MemoryCache::default()));
        let err = node.process(response(304), &NodeCtx::new()).await.unwrap_err();
        assert!(matches!(err, NodeError::Cache(CacheError::CantFindInCache)));
    }

    #[tokio::test]
    async fn test_connection_failure_reads_cache() {
        let failing: Arc<dyn Node<TransportRequest, Json>> =
            Arc::new(FnNode::new("send", |_: TransportRequest| async move {
                Err::<Json, _>(NodeError::from(NetworkError::NoInternetConnection))
            }));
        let node = IfConnectionFailedFromCacheNode::new(
            failing,
            Arc::new(MemoryCache::with(URL, cached())),
        );
        let ctx = NodeCtx::new();
        let out = node.process(request(), &ctx).await.unwrap();
        assert_eq!(out, cached());
        assert_eq!(ctx.logging().entries()[0].id, "IfConnectionFailedFromCacheNode");
    }

    #[tokio::test]
    async fn test_other_failures_pass_through() {
        let failing: Arc<dyn Node<TransportRequest, Json>> =
            Arc::new(FnNode::new("send", |_: TransportRequest| async move {
                Err::<Json, _>(NodeError::Other("boom".into()))
            }));
        let node = IfConnectionFailedFromCacheNode::new(
            failing,
            Arc::new(MemoryCache::with(URL, cached())),
        );
        let err = node.process(request(), &NodeCtx::new()).await.unwrap_err();
        assert!(matches!(err, NodeError::Other(_)));
    }

    #[tokio::test]
    async fn test_writer_saves_success_only() {
        let cache = Arc::new(MemoryCache::default());
        let writer = CacheWriterNode::new(cache.clone());

        let failed = ProcessedResponse {
            response: response(500),
            json: cached(),
        };
        writer.process(failed, &NodeCtx::new()).await.unwrap();
        assert!(cache.get(URL).is_none());

        let ok = ProcessedResponse {
            response: response(200),
            json: cached(),
        };
        writer.process(ok, &NodeCtx::new()).await.unwrap();
        assert_eq!(cache.get(URL), Some(cached()));
    }
}
