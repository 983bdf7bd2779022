//! Cancellable background fetches.
//!
//! Page state is owned by one controller task. Network calls run as
//! separate tasks that hand their output back, either through a
//! [`FetchTask`] the owner polls or through the owner's message channel
//! ([`spawn_fetch`]). Both are tied to a child of the owner's cancellation
//! token, so tearing a page down drops every pending fetch.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// One in-flight fetch whose result is collected by polling
pub struct FetchTask<T> {
    rx: oneshot::Receiver<T>,
    cancel: CancellationToken,
    finished: bool,
}

impl<T: Send + 'static> FetchTask<T> {
    pub fn spawn<F>(parent: &CancellationToken, fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let cancel = parent.child_token();
        let token = cancel.clone();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                output = fut => {
                    let _ = tx.send(output);
                }
            }
        });

        Self {
            rx,
            cancel,
            finished: false,
        }
    }
}

impl<T> FetchTask<T> {
    /// Take the result if the fetch has finished. Never blocks.
    pub fn poll_ready(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }
        match self.rx.try_recv() {
            Ok(output) => {
                self.finished = true;
                Some(output)
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.finished = true;
                None
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.finished && !self.cancel.is_cancelled()
    }

    pub fn cancel(&mut self) {
        self.cancel.cancel();
    }
}

/// Awaiting a task yields its output, or `None` if it was cancelled
impl<T> Future for FetchTask<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.finished {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(result) => {
                self.finished = true;
                Poll::Ready(result.ok())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for FetchTask<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run `fut` under a child of `parent` and send its message to the owner.
/// Nothing is sent when the owner went away or the page was cancelled.
pub fn spawn_fetch<M, F>(parent: &CancellationToken, tx: &mpsc::Sender<M>, fut: F)
where
    M: Send + 'static,
    F: Future<Output = M> + Send + 'static,
{
    let token = parent.child_token();
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            message = fut => {
                let _ = tx.send(message).await;
            }
        }
    });
}
