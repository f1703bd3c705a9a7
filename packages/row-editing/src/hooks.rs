//! # Hooks
//!
//! Externally supplied callbacks may answer synchronously or hand back a
//! future. [`MaybeDeferred`] carries either form so the controller can settle
//! synchronous answers in place and drive asynchronous ones on the runtime.

use crate::row::Row;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// A hook result that is either available now or still pending
pub enum MaybeDeferred<T> {
    Ready(T),
    Deferred(BoxFuture<'static, T>),
}

impl<T> MaybeDeferred<T> {
    /// Wrap a future as a deferred result
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        MaybeDeferred::Deferred(Box::pin(future))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, MaybeDeferred::Ready(_))
    }
}

impl<T> From<T> for MaybeDeferred<T> {
    fn from(value: T) -> Self {
        MaybeDeferred::Ready(value)
    }
}

impl<T> std::fmt::Debug for MaybeDeferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaybeDeferred::Ready(_) => f.write_str("MaybeDeferred::Ready(..)"),
            MaybeDeferred::Deferred(_) => f.write_str("MaybeDeferred::Deferred(..)"),
        }
    }
}

/// Drive a future to completion without awaiting it.
///
/// Spawns on the current tokio runtime; outside of one the future runs on a
/// helper thread.
pub(crate) fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(future);
        }
        Err(_) => {
            tracing::debug!("No tokio runtime, settling deferred hook on a helper thread");
            std::thread::spawn(move || futures::executor::block_on(future));
        }
    }
}

/// Commit hook: receives `(new_row, old_row)` and returns the row to persist
pub type ProcessRowUpdate =
    Arc<dyn Fn(Row, Row) -> MaybeDeferred<anyhow::Result<Row>> + Send + Sync>;

/// Receives the error of a failed commit hook
pub type OnProcessRowUpdateError = Arc<dyn Fn(anyhow::Error) + Send + Sync>;

/// The pair of commit callbacks a grid may be configured with
#[derive(Clone, Default)]
pub struct CommitHooks {
    pub process_row_update: Option<ProcessRowUpdate>,
    pub on_process_row_update_error: Option<OnProcessRowUpdateError>,
}

impl std::fmt::Debug for CommitHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitHooks")
            .field("process_row_update", &self.process_row_update.is_some())
            .field(
                "on_process_row_update_error",
                &self.on_process_row_update_error.is_some(),
            )
            .finish()
    }
}
