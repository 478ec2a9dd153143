//! Core node trait and combinators.
//!
//! A [`Node`] turns an input of type `I` into an asynchronous outcome of type
//! `O`. Most nodes hold exactly one `next` node and delegate to it, so a built
//! chain is a strictly linear, type-changing sequence of stages. Fan-out is
//! expressed inside a node ([`JoinNode`]), never by the chain shape.

use crate::{
    cancel::CancelToken,
    error::{NodeError, Result},
    logging::{LogEntry, LoggingContext},
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, pinned, Send future -- the return type of [`Node::process`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe processing stage.
///
/// The trait is object-safe so nodes can be held as `Arc<dyn Node<I, O>>`
/// and wired together at build time without naming every concrete type.
pub trait Node<I, O>: Send + Sync {
    /// Stage identifier, used as the log entry id.
    fn name(&self) -> &str;

    /// Process one input.
    fn process<'a>(&'a self, input: I, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>>;
}

impl<I, O, N> Node<I, O> for Arc<N>
where
    N: Node<I, O> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn process<'a>(&'a self, input: I, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        (**self).process(input, ctx)
    }
}

/// Per-invocation context threaded through every stage.
///
/// Holds the invocation's [`LoggingContext`] and [`CancelToken`]. A fresh
/// context is created for every invocation; nothing in it is shared between
/// invocations.
#[derive(Debug, Clone, Default)]
pub struct NodeCtx {
    log: LoggingContext,
    cancel: CancelToken,
}

impl NodeCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logging(&self) -> &LoggingContext {
        &self.log
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Attach a stage's entry. Dropped once the invocation is cancelled.
    pub fn log(&self, entry: LogEntry) {
        if !self.cancel.is_cancelled() {
            self.log.add(entry);
        }
    }

    /// Record the cancellation point. This is the only entry accepted after
    /// cancellation.
    pub fn mark_cancelled(&self, id: &str, order: f64) {
        self.log
            .add(LogEntry::warning(id, order, "Request was cancelled"));
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Return an error if cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(NodeError::Cancelled);
        }
        Ok(())
    }
}

/// A node backed by an async closure.
///
/// ```
/// use netnode::node::{FnNode, Node, NodeCtx};
///
/// # tokio_test::block_on(async {
/// let double = FnNode::new("double", |x: u32| async move { Ok(x * 2) });
/// let out = double.process(21, &NodeCtx::new()).await.unwrap();
/// assert_eq!(out, 42);
/// # });
/// ```
pub struct FnNode<F> {
    name: String,
    f: F,
}

impl<F> FnNode<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<I, O, F, Fut> Node<I, O> for FnNode<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(&'a self, input: I, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            (self.f)(input).await
        })
    }
}

/// A node backed by an async closure returning [`anyhow::Result`].
///
/// Lets application code use `?` on arbitrary error types inside a stage.
/// Failures surface as [`NodeError::Other`](crate::error::NodeError::Other).
///
/// ```
/// use netnode::node::{Node, NodeCtx, TryFnNode};
///
/// # tokio_test::block_on(async {
/// let parse = TryFnNode::new("parse", |s: String| async move {
///     Ok::<_, anyhow::Error>(s.trim().parse::<u32>()?)
/// });
/// assert_eq!(parse.process(" 7 ".into(), &NodeCtx::new()).await.unwrap(), 7);
/// assert!(parse.process("x".into(), &NodeCtx::new()).await.is_err());
/// # });
/// ```
pub struct TryFnNode<F> {
    name: String,
    f: F,
}

impl<F> TryFnNode<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<I, O, F, Fut> Node<I, O> for TryFnNode<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(&'a self, input: I, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            Ok((self.f)(input).await?)
        })
    }
}

/// Sequential composition: `I -> M` followed by `M -> O`.
pub struct Then<I, M, O> {
    first: Arc<dyn Node<I, M>>,
    second: Arc<dyn Node<M, O>>,
}

impl<I, M, O> Then<I, M, O> {
    pub fn new(
        first: impl Node<I, M> + 'static,
        second: impl Node<M, O> + 'static,
    ) -> Self {
        Self {
            first: Arc::new(first),
            second: Arc::new(second),
        }
    }
}

impl<I, M, O> Node<I, O> for Then<I, M, O>
where
    I: Send + 'static,
    M: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        self.first.name()
    }

    fn process<'a>(&'a self, input: I, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let mid = self.first.process(input, ctx).await?;
            ctx.check_cancelled()?;
            self.second.process(mid, ctx).await
        })
    }
}

type Combine<A, B, O> = Arc<dyn Fn(A, B) -> O + Send + Sync>;

/// Fan-out over two independent chains fed the same input.
///
/// Both chains run concurrently against the same context; the outcomes are
/// combined once both complete. If either fails, the left failure wins.
pub struct JoinNode<I, A, B, O> {
    name: String,
    left: Arc<dyn Node<I, A>>,
    right: Arc<dyn Node<I, B>>,
    combine: Combine<A, B, O>,
}

impl<I, A, B, O> JoinNode<I, A, B, O> {
    pub fn new(
        name: impl Into<String>,
        left: Arc<dyn Node<I, A>>,
        right: Arc<dyn Node<I, B>>,
        combine: impl Fn(A, B) -> O + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            left,
            right,
            combine: Arc::new(combine),
        }
    }
}

impl<I, A, B, O> Node<I, O> for JoinNode<I, A, B, O>
where
    I: Clone + Send + 'static,
    A: Send + 'static,
    B: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(&'a self, input: I, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let (left, right) = futures::future::join(
                self.left.process(input.clone(), ctx),
                self.right.process(input, ctx),
            )
            .await;
            Ok((self.combine)(left?, right?))
        })
    }
}
