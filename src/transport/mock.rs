//! Mock transport for testing without a network.
//!
//! [`MockTransport`] returns pre-configured replies in order, cycling back to
//! the first once all have been used, and records every request it receives.
//!
//! # Example
//!
//! ```
//! use netnode::transport::{MockReply, MockTransport};
//!
//! let mock = MockTransport::new(vec![MockReply::json(200, r#"{"ok":true}"#)]);
//! ```

use super::{TransportClient, TransportReply};
use crate::{error::NetworkError, request::TransportRequest};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};
use std::time::Duration;

/// One canned outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    Reply(TransportReply),
    Fail(NetworkError),
}

impl MockReply {
    /// Reply with a JSON body and `content-type: application/json`.
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        let mut reply = TransportReply::new(status, body.into());
        reply.headers.insert("content-type", "application/json");
        MockReply::Reply(reply)
    }

    /// Reply with no body.
    pub fn empty(status: u16) -> Self {
        MockReply::Reply(TransportReply::new(status, Vec::new()))
    }

    pub fn with_header(self, key: &str, value: &str) -> Self {
        match self {
            MockReply::Reply(mut reply) => {
                reply.headers.insert(key, value);
                MockReply::Reply(reply)
            }
            other => other,
        }
    }
}

/// A test transport that returns canned replies in order.
#[derive(Debug)]
pub struct MockTransport {
    replies: Vec<MockReply>,
    index: AtomicUsize,
    delay: Option<Duration>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    /// Create a mock with the given replies.
    ///
    /// # Panics
    ///
    /// Panics if `replies` is empty.
    pub fn new(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockTransport requires at least one reply");
        Self {
            replies,
            index: AtomicUsize::new(0),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same reply.
    pub fn fixed(reply: MockReply) -> Self {
        Self::new(vec![reply])
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn next_reply(&self) -> MockReply {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl TransportClient for MockTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportReply, NetworkError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply() {
            MockReply::Reply(reply) => Ok(reply),
            MockReply::Fail(err) => Err(err),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;

    fn request() -> TransportRequest {
        TransportRequest::new(Method::Get, "http://unused/".parse().unwrap())
    }

    #[tokio::test]
    async fn test_mock_cycles_replies() {
        let mock = MockTransport::new(vec![MockReply::empty(200), MockReply::empty(404)]);
        let r1 = mock.send(&request()).await.unwrap();
        let r2 = mock.send(&request()).await.unwrap();
        let r3 = mock.send(&request()).await.unwrap();
        assert_eq!(r1.status, 200);
        assert_eq!(r2.status, 404);
        assert_eq!(r3.status, 200); // cycles
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockTransport::fixed(MockReply::Fail(NetworkError::NoInternetConnection));
        let err = mock.send(&request()).await.unwrap_err();
        assert_eq!(err, NetworkError::NoInternetConnection);
    }

    #[test]
    fn test_json_reply_sets_content_type() {
        match MockReply::json(200, "{}") {
            MockReply::Reply(r) => assert_eq!(r.headers.get("Content-Type"), Some("application/json")),
            MockReply::Fail(_) => panic!("expected reply"),
        }
    }
}
