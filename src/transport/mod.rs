//! Transport boundary.
//!
//! The [`TransportClient`] trait abstracts the HTTP client. The chain only
//! ever talks to it through [`RequestSenderNode`], which makes exactly one
//! call per invocation, races it against the invocation's cancel token, and
//! hands the result to the response-processing chain.
//!
//! Built-in clients: [`HttpTransport`] (reqwest) and [`MockTransport`]
//! (canned replies, for tests).

pub mod http;
pub mod mock;

pub use http::{HttpTransport, HttpTransportBuilder};
pub use mock::{MockReply, MockTransport};

use crate::{
    error::{NetworkError, NodeError, Result},
    logging::LogOrder,
    node::{BoxFut, Node, NodeCtx},
    request::{Metadata, TransportRequest},
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What the HTTP client hands back for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportReply {
    pub status: u16,
    pub headers: Metadata,
    pub body: Bytes,
}

impl TransportReply {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Metadata::new(),
            body: body.into(),
        }
    }
}

/// Abstraction over the HTTP client.
///
/// Implementations are shared by every in-flight invocation of every chain
/// built with them, so they must be safe for concurrent use. Failures are
/// reported as [`NetworkError`]; HTTP error statuses are not failures at
/// this level.
///
/// Cancellation is handled by the caller dropping the returned future, so
/// implementations must not rely on being polled to completion.
#[async_trait]
pub trait TransportClient: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> std::result::Result<TransportReply, NetworkError>;

    /// Name for logs.
    fn name(&self) -> &'static str;
}

/// Timing recorded around the transport call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportMetrics {
    pub duration: Duration,
}

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// The request that produced this response.
    pub request: TransportRequest,
    pub status: u16,
    pub headers: Metadata,
    pub body: Bytes,
    pub metrics: TransportMetrics,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status) && self.status != 304
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport result handed to the response chain, before the connection
/// check.
#[derive(Debug, Clone)]
pub struct TransportOutcome {
    pub request: TransportRequest,
    pub result: std::result::Result<TransportReply, NetworkError>,
    pub metrics: TransportMetrics,
}

/// Sends the request and feeds the outcome to the response chain.
///
/// Cancellation aborts the transport call: the pending future is dropped,
/// the cancellation point is logged and the node resolves with
/// [`NodeError::Cancelled`] without running the response chain.
pub struct RequestSenderNode<O> {
    client: Arc<dyn TransportClient>,
    response: Arc<dyn Node<TransportOutcome, O>>,
}

impl<O> RequestSenderNode<O> {
    pub fn new(client: Arc<dyn TransportClient>, response: Arc<dyn Node<TransportOutcome, O>>) -> Self {
        Self { client, response }
    }
}

impl<O> Node<TransportRequest, O> for RequestSenderNode<O>
where
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "RequestSenderNode"
    }

    fn process<'a>(&'a self, input: TransportRequest, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            tracing::debug!(
                client = self.client.name(),
                method = %input.method,
                url = %input.url,
                "sending request"
            );

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = ctx.cancel_token().cancelled() => {
                    ctx.mark_cancelled(self.name(), LogOrder::REQUEST_SENDER_NODE);
                    tracing::debug!(url = %input.url, "request cancelled");
                    return Err(NodeError::Cancelled);
                }
                result = self.client.send(&input) => result,
            };
            let metrics = TransportMetrics {
                duration: started.elapsed(),
            };
            ctx.check_cancelled()?;

            let outcome = TransportOutcome {
                request: input,
                result,
                metrics,
            };
            self.response.process(outcome, ctx).await
        })
    }
}
