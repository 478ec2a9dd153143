//! Request-building nodes.
//!
//! Each node adds one piece of the outgoing request and forwards to `next`.
//! All of them short-circuit with
//! [`NodeError::Cancelled`](crate::error::NodeError::Cancelled) once the
//! invocation is cancelled.

use super::{
    EncodableRequestModel, Metadata, MetadataProvider, Method, ParametersEncoding, QueryConfig,
    RequestEncodingModel, RequestModel, Route, RoutableRequestModel, TransportRequest,
};
use crate::{
    error::Result,
    logging::{LogEntry, LogOrder},
    mapping::Json,
    node::{BoxFut, Node, NodeCtx},
};
use std::sync::Arc;

/// Attaches static per-request metadata to the raw payload.
pub struct MetadataConnectorNode<R, O> {
    next: Arc<dyn Node<RequestModel<R>, O>>,
    metadata: Metadata,
}

impl<R, O> MetadataConnectorNode<R, O> {
    pub fn new(next: Arc<dyn Node<RequestModel<R>, O>>, metadata: Metadata) -> Self {
        Self { next, metadata }
    }
}

impl<R, O> Node<R, O> for MetadataConnectorNode<R, O>
where
    R: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "MetadataConnectorNode"
    }

    fn process<'a>(&'a self, input: R, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let model = RequestModel {
                metadata: self.metadata.clone(),
                raw: input,
            };
            self.next.process(model, ctx).await
        })
    }
}

/// Attaches the route.
pub struct RequestRouterNode<R, O> {
    next: Arc<dyn Node<RoutableRequestModel<R>, O>>,
    route: Arc<dyn Route>,
}

impl<R, O> RequestRouterNode<R, O> {
    pub fn new(next: Arc<dyn Node<RoutableRequestModel<R>, O>>, route: Arc<dyn Route>) -> Self {
        Self { next, route }
    }
}

impl<R, O> Node<RequestModel<R>, O> for RequestRouterNode<R, O>
where
    R: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "RequestRouterNode"
    }

    fn process<'a>(&'a self, input: RequestModel<R>, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let model = RoutableRequestModel {
                metadata: input.metadata,
                raw: input.raw,
                route: Arc::clone(&self.route),
            };
            self.next.process(model, ctx).await
        })
    }
}

/// Writes the configured static query into the route's URL.
///
/// When the config carries no parameters the route is forwarded untouched
/// and never resolved here.
pub struct QueryInjectorNode<R, O> {
    next: Arc<dyn Node<RoutableRequestModel<R>, O>>,
    config: QueryConfig,
}

impl<R, O> QueryInjectorNode<R, O> {
    pub fn new(next: Arc<dyn Node<RoutableRequestModel<R>, O>>, config: QueryConfig) -> Self {
        Self { next, config }
    }
}

impl<R, O> Node<RoutableRequestModel<R>, O> for QueryInjectorNode<R, O>
where
    R: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "QueryInjectorNode"
    }

    fn process<'a>(
        &'a self,
        input: RoutableRequestModel<R>,
        ctx: &'a NodeCtx,
    ) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            if self.config.query.is_empty() {
                return self.next.process(input, ctx).await;
            }

            let mut url = match input.route.url() {
                Ok(url) => url,
                Err(e) => {
                    ctx.log(LogEntry::error(
                        self.name(),
                        LogOrder::QUERY_INJECTOR_NODE,
                        e.to_string(),
                    ));
                    return Err(e.into());
                }
            };
            self.config.apply_to(&mut url);
            tracing::trace!(url = %url, "query injected");

            let model = RoutableRequestModel {
                metadata: input.metadata,
                raw: input.raw,
                route: Arc::new(url),
            };
            self.next.process(model, ctx).await
        })
    }
}

/// Selects the parameters encoding.
pub struct RequestEncoderNode<R, O> {
    next: Arc<dyn Node<EncodableRequestModel<R>, O>>,
    encoding: ParametersEncoding,
}

impl<R, O> RequestEncoderNode<R, O> {
    pub fn new(
        next: Arc<dyn Node<EncodableRequestModel<R>, O>>,
        encoding: ParametersEncoding,
    ) -> Self {
        Self { next, encoding }
    }
}

impl<R, O> Node<RoutableRequestModel<R>, O> for RequestEncoderNode<R, O>
where
    R: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "RequestEncoderNode"
    }

    fn process<'a>(
        &'a self,
        input: RoutableRequestModel<R>,
        ctx: &'a NodeCtx,
    ) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let model = EncodableRequestModel {
                metadata: input.metadata,
                raw: input.raw,
                route: input.route,
                encoding: self.encoding,
            };
            self.next.process(model, ctx).await
        })
    }
}

/// Resolves the route into a URL and fixes the HTTP method.
///
/// Fails with [`RouteError::CannotBuildUrl`](crate::error::RouteError::CannotBuildUrl)
/// when the route does not resolve.
pub struct RequestTransformerNode<O> {
    next: Arc<dyn Node<RequestEncodingModel, O>>,
    method: Method,
}

impl<O> RequestTransformerNode<O> {
    pub fn new(next: Arc<dyn Node<RequestEncodingModel, O>>, method: Method) -> Self {
        Self { next, method }
    }
}

impl<O> Node<EncodableRequestModel<Json>, O> for RequestTransformerNode<O>
where
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "RequestTransformerNode"
    }

    fn process<'a>(
        &'a self,
        input: EncodableRequestModel<Json>,
        ctx: &'a NodeCtx,
    ) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            let url = match input.route.url() {
                Ok(url) => url,
                Err(e) => {
                    ctx.log(LogEntry::error(
                        self.name(),
                        LogOrder::REQUEST_TRANSFORMER_NODE,
                        e.to_string(),
                    ));
                    return Err(e.into());
                }
            };
            ctx.check_cancelled()?;

            let model = RequestEncodingModel {
                method: self.method,
                url,
                headers: input.metadata,
                raw: input.raw,
                encoding: input.encoding,
            };
            self.next.process(model, ctx).await
        })
    }
}

/// Merges headers from the metadata providers into the request.
///
/// Provider values override headers already on the request. Providers are
/// queried on every invocation, in registration order.
pub struct RequestCreatorNode<O> {
    next: Arc<dyn Node<TransportRequest, O>>,
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl<O> RequestCreatorNode<O> {
    pub fn new(
        next: Arc<dyn Node<TransportRequest, O>>,
        providers: Vec<Arc<dyn MetadataProvider>>,
    ) -> Self {
        Self { next, providers }
    }
}

impl<O> Node<TransportRequest, O> for RequestCreatorNode<O>
where
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "RequestCreatorNode"
    }

    fn process<'a>(
        &'a self,
        mut input: TransportRequest,
        ctx: &'a NodeCtx,
    ) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            for provider in &self.providers {
                input.headers.merge(&provider.metadata());
            }

            let mut entry = LogEntry::info(
                self.name(),
                LogOrder::REQUEST_CREATOR_NODE,
                "input: TransportRequest",
            );
            entry.push_line(format!("method: {}", input.method));
            entry.push_line(format!("url: {}", input.url));
            entry.push_line(format!("headers: {}", input.headers));
            entry.push_line(format!(
                "raw: {}",
                input.body_text().unwrap_or_else(|| "none".into())
            ));
            ctx.log(entry);

            self.next.process(input, ctx).await
        })
    }
}

/// Adds static headers. Headers already on the request win.
pub struct HeaderInjectorNode<O> {
    next: Arc<dyn Node<TransportRequest, O>>,
    headers: Metadata,
}

impl<O> HeaderInjectorNode<O> {
    pub fn new(next: Arc<dyn Node<TransportRequest, O>>, headers: Metadata) -> Self {
        Self { next, headers }
    }
}

impl<O> Node<TransportRequest, O> for HeaderInjectorNode<O>
where
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "HeaderInjectorNode"
    }

    fn process<'a>(
        &'a self,
        mut input: TransportRequest,
        ctx: &'a NodeCtx,
    ) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let merged = input.headers.merged_over(&self.headers);

            let mut entry = LogEntry::info(
                self.name(),
                LogOrder::HEADER_INJECTOR_NODE,
                format!("Add headers {}", self.headers),
            );
            entry.push_line(format!("To headers {}", input.headers));
            entry.push_line(format!("Result headers: {}", merged));
            ctx.log(entry);

            input.headers = merged;
            self.next.process(input, ctx).await
        })
    }
}
