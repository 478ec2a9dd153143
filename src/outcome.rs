//! Composition helpers for node outcomes.
//!
//! A node outcome is a plain [`Result`](crate::error::Result): `Ok` is the
//! success value, `Err` the typed [`NodeError`]. The standard `map` and
//! `map_err` already give the short-circuit laws; this module adds the
//! asynchronous and fallible variants nodes use to chain stages.

use crate::error::{NodeError, Result};
use std::future::Future;

/// The result of one node or a whole chain.
pub type Outcome<T> = Result<T>;

/// Extension operations on [`Outcome`].
pub trait OutcomeExt<T> {
    /// Apply a fallible transform to the success value.
    ///
    /// An error returned by `f` becomes the failure. A failure input is
    /// returned unchanged and `f` is never called.
    fn try_map<U, E, F>(self, f: F) -> Outcome<U>
    where
        E: Into<NodeError>,
        F: FnOnce(T) -> std::result::Result<U, E>;

    /// Sequence an asynchronous continuation on success only.
    fn flat_map_async<U, F, Fut>(self, f: F) -> impl Future<Output = Outcome<U>> + Send
    where
        U: Send,
        F: FnOnce(T) -> Fut + Send,
        Fut: Future<Output = Outcome<U>> + Send;

    /// Sequence an asynchronous recovery on failure only.
    fn flat_map_err_async<F, Fut>(self, f: F) -> impl Future<Output = Outcome<T>> + Send
    where
        F: FnOnce(NodeError) -> Fut + Send,
        Fut: Future<Output = Outcome<T>> + Send;
}

impl<T: Send> OutcomeExt<T> for Outcome<T> {
    fn try_map<U, E, F>(self, f: F) -> Outcome<U>
    where
        E: Into<NodeError>,
        F: FnOnce(T) -> std::result::Result<U, E>,
    {
        match self {
            Ok(value) => f(value).map_err(Into::into),
            Err(e) => Err(e),
        }
    }

    fn flat_map_async<U, F, Fut>(self, f: F) -> impl Future<Output = Outcome<U>> + Send
    where
        U: Send,
        F: FnOnce(T) -> Fut + Send,
        Fut: Future<Output = Outcome<U>> + Send,
    {
        async move {
            match self {
                Ok(value) => f(value).await,
                Err(e) => Err(e),
            }
        }
    }

    fn flat_map_err_async<F, Fut>(self, f: F) -> impl Future<Output = Outcome<T>> + Send
    where
        F: FnOnce(NodeError) -> Fut + Send,
        Fut: Future<Output = Outcome<T>> + Send,
    {
        async move {
            match self {
                Ok(value) => Ok(value),
                Err(e) => f(e).await,
            }
        }
    }
}
