//! Cancellation utilities
//!
//! A first-class cancellation handle shared by providers and the
//! orchestrator. Cancelling the handle aborts in-flight HTTP requests and
//! retry backoff sleeps; aborted I/O surfaces as `network_error`.

use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cooperative cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation. Any suspended request or backoff sleep
    /// observing this handle stops as soon as possible.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_pending_waiters() {
        let handle = CancelHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle.cancelled().await;
                true
            })
        };

        tokio::task::yield_now().await;
        handle.cancel();

        let woke = tokio::time::timeout(std::time::Duration::from_millis(200), waiter)
            .await
            .expect("cancel should wake the waiting task")
            .expect("task ok");
        assert!(woke);
        assert!(handle.is_cancelled());
    }
}
