//! Built chains and their invocations.
//!
//! [`Chain`] wraps the root node produced by the
//! [`ChainBuilder`](crate::builder::ChainBuilder). Invoking it spawns the
//! whole pipeline as one tokio task and immediately returns a [`Call`], which
//! carries the [`CancelHandle`] and resolves to a [`Completion`]: the final
//! outcome plus the invocation's sorted log.

use crate::{
    cancel::CancelHandle,
    error::{NodeError, Result},
    logging::{LogEntry, LoggingContext},
    node::{BoxFut, Node, NodeCtx},
};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A ready-to-run pipeline from `I` to `O`.
///
/// Cloning is cheap; clones share the same nodes. Each invocation gets its
/// own [`NodeCtx`], so concurrent invocations never share mutable state
/// beyond what the nodes themselves hold (transport client, providers).
///
/// `Chain` itself implements [`Node`], so chains can be nested.
pub struct Chain<I, O> {
    name: String,
    root: Arc<dyn Node<I, O>>,
}

impl<I, O> Clone for Chain<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            root: Arc::clone(&self.root),
        }
    }
}

impl<I, O> std::fmt::Debug for Chain<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field("root", &self.root.name())
            .finish()
    }
}

impl<I, O> Chain<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new(name: impl Into<String>, root: Arc<dyn Node<I, O>>) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// Wrap a single node as a chain.
    pub fn from_node(name: impl Into<String>, node: impl Node<I, O> + 'static) -> Self {
        Self::new(name, Arc::new(node))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root node.
    pub fn root(&self) -> Arc<dyn Node<I, O>> {
        Arc::clone(&self.root)
    }

    /// Start an invocation on the current tokio runtime.
    ///
    /// Returns immediately. Await the returned [`Call`] for the result, or
    /// cancel it through [`Call::handle`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn invoke(&self, input: I) -> Call<O> {
        let ctx = NodeCtx::new();
        let handle = ctx.cancel_token().handle();
        let log = ctx.logging().clone();
        let root = Arc::clone(&self.root);

        tracing::trace!(chain = %self.name, "invoking chain");
        let task = tokio::spawn(async move { root.process(input, &ctx).await });

        Call { handle, task, log }
    }

    /// Run an invocation to completion on the calling task.
    pub async fn process(&self, input: I) -> Completion<O> {
        let ctx = NodeCtx::new();
        let result = self.root.process(input, &ctx).await;
        Completion {
            result,
            log: ctx.logging().entries(),
        }
    }
}

impl<I, O> Node<I, O> for Chain<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(&'a self, input: I, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        self.root.process(input, ctx)
    }
}

/// An in-flight invocation.
///
/// Resolves exactly once. Awaiting consumes the call.
pub struct Call<O> {
    handle: CancelHandle,
    task: JoinHandle<Result<O>>,
    log: LoggingContext,
}

impl<O> std::fmt::Debug for Call<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("cancelled", &self.handle.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl<O> Call<O> {
    /// Cancellation handle for this invocation.
    pub fn handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// Shorthand for `self.handle().cancel()`.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Wait for the invocation to finish.
    pub async fn outcome(self) -> Completion<O> {
        let result = match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(NodeError::Cancelled),
            Err(e) => Err(NodeError::Other(format!("Chain task failed: {}", e))),
        };
        Completion {
            result,
            log: self.log.entries(),
        }
    }
}

impl<O: Send + 'static> IntoFuture for Call<O> {
    type Output = Completion<O>;
    type IntoFuture = BoxFut<'static, Completion<O>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.outcome())
    }
}

/// Final outcome of an invocation with its collected log.
#[derive(Debug)]
pub struct Completion<O> {
    pub result: Result<O>,
    /// Entries sorted in chain order.
    pub log: Vec<LogEntry>,
}

impl<O> Completion<O> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<O> {
        self.result
    }

    /// Log entries with the given stage id.
    pub fn entries_for(&self, id: &str) -> Vec<&LogEntry> {
        self.log.iter().filter(|e| e.id == id).collect()
    }

    /// Render the log as text, in chain order.
    pub fn render_log(&self) -> String {
        self.log
            .iter()
            .map(LogEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogOrder;
    use crate::node::FnNode;
    use std::time::Duration;

    struct SlowNode;

    impl Node<u32, u32> for SlowNode {
        fn name(&self) -> &str {
            "SlowNode"
        }

        fn process<'a>(&'a self, input: u32, ctx: &'a NodeCtx) -> BoxFut<'a, Result<u32>> {
            Box::pin(async move {
                tokio::select! {
                    _ = ctx.cancel_token().cancelled() => {
                        ctx.mark_cancelled(self.name(), LogOrder::REQUEST_SENDER_NODE);
                        Err(NodeError::Cancelled)
                    }
                    _ = tokio::time::sleep(Duration::from_secs(5)) => {
                        ctx.log(LogEntry::info(self.name(), LogOrder::REQUEST_SENDER_NODE, "done"));
                        Ok(input)
                    }
                }
            })
        }
    }

    #[tokio::test]
    async fn test_invoke_resolves() {
        let chain = Chain::from_node("inc", FnNode::new("inc", |x: u32| async move { Ok(x + 1) }));
        let done = chain.invoke(1).await;
        assert_eq!(done.into_result().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invoke_cancel_yields_cancelled() {
        let chain = Chain::from_node("slow", SlowNode);
        let call = chain.invoke(1);
        let handle = call.handle();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        let done = tokio::time::timeout(Duration::from_secs(1), call.outcome())
            .await
            .expect("cancel should resolve quickly");
        assert!(matches!(done.result, Err(NodeError::Cancelled)));
        assert_eq!(done.log.len(), 1);
        assert_eq!(done.log[0].message, "Request was cancelled");
    }

    #[tokio::test]
    async fn test_process_collects_log() {
        struct Logging;
        impl Node<u32, u32> for Logging {
            fn name(&self) -> &str {
                "Logging"
            }
            fn process<'a>(&'a self, input: u32, ctx: &'a NodeCtx) -> BoxFut<'a, Result<u32>> {
                Box::pin(async move {
                    ctx.log(LogEntry::info(self.name(), 1.0, "seen"));
                    Ok(input)
                })
            }
        }

        let chain = Chain::from_node("logging", Logging);
        let done = chain.process(5).await;
        assert!(done.is_ok());
        assert_eq!(done.entries_for("Logging").len(), 1);
        assert!(done.render_log().contains("seen"));
    }

    #[tokio::test]
    async fn test_chain_nests_as_node() {
        let inner = Chain::from_node("inner", FnNode::new("x2", |x: u32| async move { Ok(x * 2) }));
        let outer = Chain::from_node("outer", inner);
        let done = outer.process(4).await;
        assert_eq!(done.into_result().unwrap(), 8);
    }
}
