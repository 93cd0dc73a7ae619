//! Assertion operands that may still be resolving

use futures::future::{FutureExt, LocalBoxFuture};
use std::fmt;
use std::future::Future;

/// A value, or a future that will produce it
pub enum Operand<T> {
    Ready(T),
    Pending(LocalBoxFuture<'static, anyhow::Result<T>>),
}

impl<T: 'static> Operand<T> {
    pub fn ready(value: T) -> Self {
        Operand::Ready(value)
    }

    /// A fallible future; its error fails the assertion
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        Operand::Pending(future.boxed_local())
    }

    /// A future that cannot fail
    pub fn resolved<F>(future: F) -> Self
    where
        F: Future<Output = T> + 'static,
    {
        Operand::Pending(future.map(Ok).boxed_local())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Operand::Pending(_))
    }

    pub async fn resolve(self) -> anyhow::Result<T> {
        match self {
            Operand::Ready(value) => Ok(value),
            Operand::Pending(future) => future.await,
        }
    }
}

impl<T> From<T> for Operand<T> {
    fn from(value: T) -> Self {
        Operand::Ready(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Operand<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Operand::Pending(_) => write!(f, "Pending(..)"),
        }
    }
}
