//! Structured per-invocation log.
//!
//! Every node may attach one [`LogEntry`] to the invocation's
//! [`LoggingContext`]. Entries carry an `order` taken from [`LogOrder`], so
//! the collected log renders in chain-declaration order no matter when each
//! entry was appended. [`LoggerNode`] sits at the root of built chains and
//! forwards the sorted log to `tracing` once the invocation completes.

use crate::{
    error::Result,
    node::{BoxFut, Node, NodeCtx},
};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Warning,
    Error,
}

/// One stage's diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Position of the stage in the static chain. Used for sorting only.
    pub order: f64,
    /// Stage identifier (the node's name).
    pub id: String,
    /// Free-form diagnostic text.
    pub message: String,
    pub kind: LogKind,
}

impl LogEntry {
    pub fn new(id: impl Into<String>, kind: LogKind, order: f64) -> Self {
        Self {
            order,
            id: id.into(),
            message: String::new(),
            kind,
        }
    }

    pub fn info(id: impl Into<String>, order: f64, message: impl Into<String>) -> Self {
        Self::new(id, LogKind::Info, order).with_message(message)
    }

    pub fn warning(id: impl Into<String>, order: f64, message: impl Into<String>) -> Self {
        Self::new(id, LogKind::Warning, order).with_message(message)
    }

    pub fn error(id: impl Into<String>, order: f64, message: impl Into<String>) -> Self {
        Self::new(id, LogKind::Error, order).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Append a line to the message.
    pub fn push_line(&mut self, line: impl AsRef<str>) {
        if !self.message.is_empty() {
            self.message.push_str("\n\t");
        }
        self.message.push_str(line.as_ref());
    }

    pub fn set_kind(&mut self, kind: LogKind) {
        self.kind = kind;
    }

    /// Human-readable block: `<<<===id===>>>` followed by the message.
    pub fn render(&self) -> String {
        format!("<<<==={}===>>>\n\t{}", self.id, self.message)
    }
}

/// Order constants, one per stage, in the order stages appear in a built chain.
///
/// A custom stage can use a fractional order to sit between two built-ins.
pub struct LogOrder;

impl LogOrder {
    pub const LOGGER_NODE: f64 = 0.0;
    pub const DTO_MAPPER_NODE: f64 = 1.0;
    pub const RAW_ENCODER_NODE: f64 = 1.5;
    pub const METADATA_CONNECTOR_NODE: f64 = 2.0;
    pub const REQUEST_ROUTER_NODE: f64 = 3.0;
    pub const QUERY_INJECTOR_NODE: f64 = 4.0;
    pub const REQUEST_ENCODER_NODE: f64 = 5.0;
    pub const REQUEST_TRANSFORMER_NODE: f64 = 6.0;
    pub const REQUEST_ENCODING_NODE: f64 = 7.0;
    pub const REQUEST_CREATOR_NODE: f64 = 8.0;
    pub const HEADER_INJECTOR_NODE: f64 = 8.5;
    pub const CACHE_FALLBACK_NODE: f64 = 8.8;
    pub const REQUEST_SENDER_NODE: f64 = 9.0;
    pub const RESPONSE_PROCESSOR_NODE: f64 = 10.0;
    pub const NOT_MODIFIED_TRIGGER_NODE: f64 = 10.5;
    pub const HTTP_ERROR_PROCESSOR_NODE: f64 = 11.0;
    pub const DATA_PREPROCESSOR_NODE: f64 = 12.0;
    pub const DATA_PARSER_NODE: f64 = 13.0;
    pub const DATA_LOADING_PROCESSOR_NODE: f64 = 13.0;
    pub const CACHE_WRITER_NODE: f64 = 14.0;
}

/// Append-only log shared by all stages of one invocation.
///
/// Cloning shares the underlying storage. Stages can only append; sorting
/// happens on read.
#[derive(Debug, Clone, Default)]
pub struct LoggingContext {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LoggingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, entry: LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    /// All entries sorted by `order`. Ties keep insertion order.
    pub fn entries(&self) -> Vec<LogEntry> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        entries.sort_by(|a, b| a.order.total_cmp(&b.order));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted entries whose id is not in `filters`.
    pub fn filtered(&self, filters: &[String]) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| !filters.iter().any(|f| f == &e.id))
            .collect()
    }

    /// Render the sorted, filtered log as one block of text.
    pub fn render(&self, filters: &[String]) -> String {
        self.filtered(filters)
            .iter()
            .map(LogEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Forward entries to `tracing`, one event per entry.
pub fn emit(entries: &[LogEntry]) {
    for entry in entries {
        match entry.kind {
            LogKind::Info => {
                tracing::info!(stage = %entry.id, order = entry.order, "{}", entry.message)
            }
            LogKind::Warning => {
                tracing::warn!(stage = %entry.id, order = entry.order, "{}", entry.message)
            }
            LogKind::Error => {
                tracing::error!(stage = %entry.id, order = entry.order, "{}", entry.message)
            }
        }
    }
}

/// Root node that runs the rest of the chain, then emits the sorted log.
pub struct LoggerNode<I, O> {
    next: Arc<dyn Node<I, O>>,
    filters: Vec<String>,
}

impl<I, O> LoggerNode<I, O> {
    pub fn new(next: Arc<dyn Node<I, O>>, filters: Vec<String>) -> Self {
        Self { next, filters }
    }
}

impl<I, O> Node<I, O> for LoggerNode<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "LoggerNode"
    }

    fn process<'a>(&'a self, input: I, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            let result = self.next.process(input, ctx).await;
            emit(&ctx.logging().filtered(&self.filters));
            result
        })
    }
}
