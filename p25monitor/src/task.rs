use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

/// Downstream task owning a lease.
pub trait LeaseTask: Send + Sync {
    /// Requests cancellation. Returns `false` when the task had already
    /// finished or been cancelled; never fails.
    fn cancel(&self) -> bool;
}

impl LeaseTask for CancellationToken {
    fn cancel(&self) -> bool {
        let was_cancelled = self.is_cancelled();
        CancellationToken::cancel(self);
        !was_cancelled
    }
}

impl LeaseTask for AbortHandle {
    fn cancel(&self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.abort();
        true
    }
}
