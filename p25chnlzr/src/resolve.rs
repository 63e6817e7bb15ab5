use std::future::pending;
use tokio::sync::oneshot;

/// Write side of a result cell that can be set at most once.
///
/// [`Resolver::resolve`] hands the value back when the cell was already set
/// or when nobody waits for it anymore, so the caller can dispose of it.
pub(crate) struct Resolver<T> {
    tx: Option<oneshot::Sender<T>>,
}

pub(crate) fn resolve_once<T>() -> (Resolver<T>, oneshot::Receiver<T>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx: Some(tx) }, rx)
}

impl<T> Resolver<T> {
    pub(crate) fn resolve(&mut self, value: T) -> Result<(), T> {
        match self.tx.take() {
            Some(tx) => tx.send(value),
            None => Err(value),
        }
    }

    /// Completes once the waiting side is gone. Never completes after a
    /// successful resolution.
    pub(crate) async fn abandoned(&mut self) {
        match self.tx.as_mut() {
            Some(tx) => tx.closed().await,
            None => pending().await,
        }
    }
}
