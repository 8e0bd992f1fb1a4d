//! Cancellable timers
//!
//! Every wait in the sequence races a `tokio::time::sleep` against a
//! [`CancellationToken`]. Spawned work is tracked by a [`TaskHandle`] that
//! cancels its task when dropped, so tearing down an owner tears down its
//! timers.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Sleeps for `delay` unless `cancel` fires first.
///
/// Returns `true` if the full delay elapsed, `false` if cancelled.
pub async fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

/// Owning handle to a spawned, cancellable task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct TaskHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawns `make(token)` on the current runtime with a child token of
    /// `parent`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<F, Fut>(parent: &CancellationToken, make: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let handle = tokio::spawn(make(token.clone()));
        Self { token, handle }
    }

    /// Runs `action` once after `delay` unless cancelled first.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn schedule<F>(parent: &CancellationToken, delay: Duration, label: &'static str, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn(parent, move |token| async move {
            if sleep_unless_cancelled(delay, &token).await {
                trace!(label, ?delay, "timer fired");
                action();
            } else {
                trace!(label, "timer cancelled");
            }
        })
    }

    /// Cancels the task. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns whether the task has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns whether the task has run to completion (or was cancelled and
    /// has observed it).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
