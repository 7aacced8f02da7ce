//! Observing a store through a channel instead of a callback.
//!
//! [`StateStream`] is an observer whose callback just forwards each snapshot
//! into an unbounded channel. The store's worker never waits on the consumer,
//! so a slow reader only grows its own backlog.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::dispose::DisposalHandle;

/// Stream of state snapshots, starting with the state current at subscription.
///
/// Dropping the stream disposes its subscription. The stream ends once the
/// store's ordering domain stops.
pub struct StateStream<S> {
    receiver: mpsc::UnboundedReceiver<Arc<S>>,
    disposal: DisposalHandle,
}

impl<S> StateStream<S> {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<Arc<S>>, disposal: DisposalHandle) -> Self {
        Self { receiver, disposal }
    }

    /// Wait for the next snapshot.
    pub async fn recv(&mut self) -> Option<Arc<S>> {
        self.receiver.recv().await
    }

    /// Take the next snapshot if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Arc<S>> {
        self.receiver.try_recv().ok()
    }

    /// Handle for the underlying subscription.
    pub fn disposal(&self) -> &DisposalHandle {
        &self.disposal
    }
}

impl<S> Stream for StateStream<S> {
    type Item = Arc<S>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Arc<S>>> {
        self.receiver.poll_recv(cx)
    }
}

impl<S> Drop for StateStream<S> {
    fn drop(&mut self) {
        self.disposal.dispose();
    }
}

impl<S> std::fmt::Debug for StateStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStream")
            .field("disposal", &self.disposal)
            .finish_non_exhaustive()
    }
}
