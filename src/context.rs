use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::select_all;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::{TransactionError, TransactionResult};

/// Cancellation and deadline carried through every database call.
///
/// A `Context` is cheap to clone. Children created with [`Context::with_timeout`],
/// [`Context::with_deadline`] or [`Context::with_cancel`] observe their parent's
/// cancellation and never extend its deadline.
#[derive(Clone, Debug, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Vec<watch::Receiver<bool>>,
}

/// Cancels the [`Context`] it was created with, and all of its children.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Cancels the context. Calling it again has no further effect.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Child context whose deadline is `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child context that expires at `deadline`, or at the parent's deadline if that is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            cancel: self.cancel.clone(),
        }
    }

    /// Child context plus the handle that cancels it.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut cancel = self.cancel.clone();
        cancel.push(rx);
        let ctx = Self {
            deadline: self.deadline,
            cancel,
        };
        (ctx, CancelHandle { tx: Arc::new(tx) })
    }

    /// The effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reports why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<TransactionError> {
        if self.cancel.iter().any(|rx| *rx.borrow()) {
            return Some(TransactionError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(TransactionError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drives `fut` until it finishes or the context is done, whichever comes first.
    pub async fn run<F, T>(&self, fut: F) -> TransactionResult<T>
    where
        F: Future<Output = TransactionResult<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            res = fut => res,
            _ = self.cancelled() => Err(TransactionError::Cancelled),
            _ = expired(self.deadline) => Err(TransactionError::DeadlineExceeded),
        }
    }

    async fn cancelled(&self) {
        if self.cancel.is_empty() {
            return std::future::pending().await;
        }
        let waits = self
            .cancel
            .iter()
            .cloned()
            .map(|rx| Box::pin(wait_cancelled(rx)));
        select_all(waits).await;
    }
}

async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    // A dropped handle can no longer cancel.
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
