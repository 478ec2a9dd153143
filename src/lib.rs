//! # netnode
//!
//! Composable request/response node chains for client-side HTTP calls.
//!
//! A call to a remote endpoint is modelled as a linear chain of small,
//! single-purpose [`Node`]s: one maps the domain model to a JSON payload,
//! others resolve the route, attach headers and query parameters, encode the
//! body, send it, classify the status code, decode the body, and map the
//! payload back into a domain model. Every stage either hands its output to
//! the next one or fails the whole call with a typed [`NodeError`].
//!
//! ## Core Concepts
//!
//! - **[`Node`]**: object-safe async stage `I -> Result<O>` holding its
//!   successor.
//! - **[`ChainBuilder`]**: assembles the standard request/response chain for
//!   one endpoint.
//! - **[`Chain`]**: a built chain. [`Chain::invoke`] spawns the call and
//!   returns a [`Call`] that can be cancelled and awaited for a
//!   [`Completion`] (result plus the sorted per-call log).
//! - **[`RawEncodable`] / [`RawDecodable`]**: conversion between domain models
//!   and the JSON payload every chain works with.
//! - **[`TransportClient`]**: the HTTP boundary. [`HttpTransport`] uses
//!   reqwest; [`MockTransport`] serves canned replies for tests.
//! - **[`Pager`]**: offset pagination over any chain.
//!
//! ## Quick Start
//!
//! ```no_run
//! use netnode::{ChainBuilder, HttpTransport, Method, UrlRoute};
//! use netnode::mapping::{from_raw_via_serde, Json, RawDecodable};
//! use netnode::error::MappingError;
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct User { id: String, first_name: String }
//!
//! impl RawDecodable for User {
//!     fn from_raw(raw: Json) -> Result<Self, MappingError> {
//!         from_raw_via_serde(raw)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(HttpTransport::builder().build()?);
//!     let users = ChainBuilder::new(transport)
//!         .route(Method::Get, UrlRoute::new("https://api.example.com", "users"))
//!         .build::<(), Vec<User>>()?;
//!
//!     let done = users.invoke(()).await;
//!     println!("{}", done.render_log());
//!     for user in done.into_result()? {
//!         println!("{} {}", user.id, user.first_name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod cache;
pub mod cancel;
pub mod chain;
pub mod config;
pub mod dto;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod node;
pub mod outcome;
pub mod pagination;
pub mod request;
pub mod response;
pub mod transport;

pub use builder::ChainBuilder;
pub use cache::CacheAdapter;
pub use cancel::{CancelHandle, CancelToken};
pub use chain::{Call, Chain, Completion};
pub use config::ClientConfig;
pub use error::{NodeError, Result};
pub use logging::{LogEntry, LogKind, LogOrder, LoggingContext};
pub use mapping::{Json, RawDecodable, RawEncodable};
pub use node::{BoxFut, FnNode, JoinNode, Node, NodeCtx, Then, TryFnNode};
pub use outcome::{Outcome, OutcomeExt};
pub use pagination::{ChainPageProvider, OffsetPage, Page, PageProvider, Pager};
pub use request::{Metadata, MetadataProvider, Method, ParametersEncoding, Route, UrlRoute};
pub use response::{ErrorMapperAdapter, JsonCodec, PayloadCodec};
pub use transport::{HttpTransport, MockReply, MockTransport, TransportClient};
