//! Delivery handle for population results.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// The eventual result of a population call.
///
/// Resolves to `None` when the value could not be produced, or when the
/// worker pool shut down before the job ran.
#[derive(Debug)]
pub struct Delivery<T> {
    rx: oneshot::Receiver<Option<T>>,
}

impl<T> Delivery<T> {
    pub(crate) fn channel() -> (oneshot::Sender<Option<T>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Blocks the current thread until the value is delivered.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context; await
    /// the delivery there instead.
    pub fn wait(self) -> Option<T> {
        self.rx.blocking_recv().ok().flatten()
    }
}

impl<T> Future for Delivery<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|delivered| delivered.ok().flatten())
    }
}
