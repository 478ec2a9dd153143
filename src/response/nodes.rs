//! Response-processing nodes.

use super::{ErrorMapperAdapter, JsonCodec, PayloadCodec, ProcessedResponse};
use crate::{
    error::{DecodeError, HttpStatusError, NodeError, Result, ServerMappedError},
    logging::{LogEntry, LogKind, LogOrder},
    mapping::Json,
    node::{BoxFut, Node, NodeCtx},
    transport::{RawResponse, TransportOutcome},
};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;

/// Connection check: turns a [`TransportOutcome`] into a [`RawResponse`].
///
/// A transport failure stops the chain with
/// [`NodeError::Network`](crate::error::NodeError::Network).
pub struct ResponseProcessorNode<O> {
    next: Arc<dyn Node<RawResponse, O>>,
}

impl<O> ResponseProcessorNode<O> {
    pub fn new(next: Arc<dyn Node<RawResponse, O>>) -> Self {
        Self { next }
    }
}

impl<O> Node<TransportOutcome, O> for ResponseProcessorNode<O>
where
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "ResponseProcessorNode"
    }

    fn process<'a>(&'a self, input: TransportOutcome, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let TransportOutcome {
                request,
                result,
                metrics,
            } = input;

            let reply = match result {
                Ok(reply) => reply,
                Err(e) => {
                    ctx.log(LogEntry::error(
                        self.name(),
                        LogOrder::RESPONSE_PROCESSOR_NODE,
                        format!("Catch transport error: {e}"),
                    ));
                    return Err(e.into());
                }
            };

            let response = RawResponse {
                request,
                status: reply.status,
                headers: reply.headers,
                body: reply.body,
                metrics,
            };

            let mut entry = LogEntry::info(
                self.name(),
                LogOrder::RESPONSE_PROCESSOR_NODE,
                format!(
                    "{} {} --> {} ({} ms)",
                    response.request.method,
                    response.request.url,
                    response.status,
                    response.metrics.duration.as_millis()
                ),
            );
            entry.push_line(if response.body.is_empty() {
                "EMPTY".to_string()
            } else {
                response.body_text()
            });
            ctx.log(entry);

            self.next.process(response, ctx).await
        })
    }
}

/// HTTP status classification.
///
/// * 304 fails with [`NodeError::NotModified`] carrying the response.
/// * Statuses in `200..400` continue.
/// * Anything else: the error body is offered to each [`ErrorMapperAdapter`]
///   in registration order and the first match becomes a
///   [`ServerMappedError`]. Without a match, 400/401/403/404/500 map to their
///   [`HttpStatusError`] variant; other statuses give
///   [`DecodeError::BadJsonFormat`] when the body is not decodable and
///   [`HttpStatusError::Undefined`] otherwise.
pub struct ResponseHttpErrorProcessorNode<O> {
    next: Arc<dyn Node<RawResponse, O>>,
    mappers: Vec<Arc<dyn ErrorMapperAdapter>>,
    codec: Arc<dyn PayloadCodec>,
}

impl<O> ResponseHttpErrorProcessorNode<O> {
    pub fn new(next: Arc<dyn Node<RawResponse, O>>) -> Self {
        Self {
            next,
            mappers: Vec::new(),
            codec: Arc::new(JsonCodec),
        }
    }

    pub fn with_mappers(mut self, mappers: Vec<Arc<dyn ErrorMapperAdapter>>) -> Self {
        self.mappers = mappers;
        self
    }

    /// Codec used to decode error bodies for the mappers.
    pub fn with_codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }

    fn classify(&self, response: &RawResponse) -> (NodeError, String) {
        let status = response.status;
        let decoded = self.codec.decode_payload(&response.body);

        if let Ok(payload) = &decoded {
            for mapper in &self.mappers {
                if let Some(source) = mapper.map(payload, Some(status)) {
                    let message = format!("Error body mapped by adapter: {source}");
                    let err = ServerMappedError {
                        status,
                        payload: payload.clone(),
                        source,
                    };
                    return (err.into(), message);
                }
            }
        }

        let body = response.body.to_vec();
        let (err, label): (NodeError, &str) = match status {
            s if s < 200 => (HttpStatusError::Undefined { status, body }.into(), "undefined"),
            400 => (HttpStatusError::BadRequest { body }.into(), "badRequest"),
            401 => (HttpStatusError::Unauthorized { body }.into(), "unauthorized"),
            403 => (HttpStatusError::Forbidden { body }.into(), "forbidden"),
            404 => (HttpStatusError::NotFound.into(), "notFound"),
            500 => (
                HttpStatusError::InternalServerError { body }.into(),
                "internalServerError",
            ),
            _ => match decoded {
                Err(e) => (e.into(), "badJsonFormat"),
                Ok(_) => (HttpStatusError::Undefined { status, body }.into(), "undefined"),
            },
        };
        (err, format!("Match with {status} status code ({label})"))
    }
}

impl<O> Node<RawResponse, O> for ResponseHttpErrorProcessorNode<O>
where
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "ResponseHttpErrorProcessorNode"
    }

    fn process<'a>(&'a self, input: RawResponse, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let order = LogOrder::HTTP_ERROR_PROCESSOR_NODE;

            if input.status == 304 {
                ctx.log(LogEntry::warning(
                    self.name(),
                    order,
                    "Match with 304 status code (notModified)",
                ));
                return Err(NodeError::NotModified(Box::new(input)));
            }

            if (200..400).contains(&input.status) {
                ctx.log(LogEntry::info(
                    self.name(),
                    order,
                    "Cant match status code -> call next",
                ));
                return self.next.process(input, ctx).await;
            }

            let (err, message) = self.classify(&input);
            ctx.log(LogEntry::error(self.name(), order, message));
            Err(err)
        })
    }
}

/// Short-circuits status 204 to the empty payload without reaching the
/// parser. A literal `null` body is left to the parser, whose codec already
/// decodes it as the empty payload.
pub struct ResponseDataPreprocessorNode {
    next: Arc<dyn Node<RawResponse, Json>>,
}

impl ResponseDataPreprocessorNode {
    pub fn new(next: Arc<dyn Node<RawResponse, Json>>) -> Self {
        Self { next }
    }
}

impl Node<RawResponse, Json> for ResponseDataPreprocessorNode {
    fn name(&self) -> &str {
        "ResponseDataPreprocessorNode"
    }

    fn process<'a>(&'a self, input: RawResponse, ctx: &'a NodeCtx) -> BoxFut<'a, Result<Json>> {
        Box::pin(async move {
            ctx.check_cancelled()?;

            if input.status == 204 {
                ctx.log(LogEntry::info(
                    self.name(),
                    LogOrder::DATA_PREPROCESSOR_NODE,
                    "Status code is 204 -> response data is empty -> terminate process with empty json",
                ));
                return Ok(Json::new());
            }

            self.next.process(input, ctx).await
        })
    }
}

/// Decodes the body into a [`Json`] payload.
///
/// An empty body is the empty payload. A top-level array is wrapped under
/// [`ARRAY_KEY`](crate::mapping::ARRAY_KEY). An undecodable body fails with
/// [`DecodeError::BadJsonFormat`].
///
/// When a post-processor is set it receives the decoded response after a
/// successful parse. Its outcome does not affect the chain result.
pub struct ResponseDataParserNode {
    codec: Arc<dyn PayloadCodec>,
    post: Option<Arc<dyn Node<ProcessedResponse, ()>>>,
}

impl Default for ResponseDataParserNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseDataParserNode {
    pub fn new() -> Self {
        Self {
            codec: Arc::new(JsonCodec),
            post: None,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_post_processor(mut self, post: Arc<dyn Node<ProcessedResponse, ()>>) -> Self {
        self.post = Some(post);
        self
    }
}

impl Node<RawResponse, Json> for ResponseDataParserNode {
    fn name(&self) -> &str {
        "ResponseDataParserNode"
    }

    fn process<'a>(&'a self, input: RawResponse, ctx: &'a NodeCtx) -> BoxFut<'a, Result<Json>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let order = LogOrder::DATA_PARSER_NODE;

            let json = match self.codec.decode_payload(&input.body) {
                Ok(json) => json,
                Err(e) => {
                    ctx.log(LogEntry::error(self.name(), order, format!("Cant deserialize: {e}")));
                    return Err(e.into());
                }
            };

            let mut entry = LogEntry::new(self.name(), LogKind::Info, order);
            if input.body.is_empty() {
                entry.push_line("Response data is empty -> returns empty json");
            } else {
                entry.push_line(format!("Result ({}):", self.codec.content_type()));
                entry.push_line(Value::Object(json.clone()).to_string());
            }
            ctx.log(entry);

            if let Some(post) = &self.post {
                let processed = ProcessedResponse {
                    response: input,
                    json: json.clone(),
                };
                if let Err(e) = post.process(processed, ctx).await {
                    tracing::warn!(post = post.name(), error = %e, "post-processor failed");
                }
            }

            Ok(json)
        })
    }
}

/// Terminal node of data-loading chains: returns the body bytes as-is.
pub struct DataLoadingResponseProcessor {
    post: Option<Arc<dyn Node<RawResponse, ()>>>,
}

impl Default for DataLoadingResponseProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoadingResponseProcessor {
    pub fn new() -> Self {
        Self { post: None }
    }

    /// Run `post` on the response first. Its failure fails the chain.
    pub fn with_post_processor(mut self, post: Arc<dyn Node<RawResponse, ()>>) -> Self {
        self.post = Some(post);
        self
    }
}

impl Node<RawResponse, Bytes> for DataLoadingResponseProcessor {
    fn name(&self) -> &str {
        "DataLoadingResponseProcessor"
    }

    fn process<'a>(&'a self, input: RawResponse, ctx: &'a NodeCtx) -> BoxFut<'a, Result<Bytes>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let body = input.body.clone();
            if let Some(post) = &self.post {
                post.process(input, ctx).await?;
            }
            ctx.log(LogEntry::info(
                self.name(),
                LogOrder::DATA_LOADING_PROCESSOR_NODE,
                format!("Loaded {} bytes", body.len()),
            ));
            Ok(body)
        })
    }
}
