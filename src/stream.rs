//! Bridge from signals to async streams.
//!
//! Values are forwarded through an unbounded channel, so a subscriber that
//! polls from an executor never runs inside the dispatch itself.

use crate::connection::Connection;
use crate::signal::Signal;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream of the values passed to a single-value signal.
///
/// The stream ends once the signal is dropped. Dropping the stream
/// disconnects its subscription.
pub struct Changes<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    connection: Connection,
}

impl<T: Clone + 'static> Changes<T> {
    pub fn new(signal: &Signal<dyn Fn(&T)>) -> Self {
        let (tx, receiver) = mpsc::unbounded();
        let connection = signal.subscribe(move |value: &T| {
            // The receiver going away disconnects us from Drop.
            let _ = tx.unbounded_send(value.clone());
        });
        Self {
            receiver,
            connection,
        }
    }
}

impl<T> Changes<T> {
    /// The subscription feeding this stream.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl<T> Stream for Changes<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().receiver.poll_next_unpin(cx)
    }
}

impl<T> Drop for Changes<T> {
    fn drop(&mut self) {
        self.connection.disconnect();
    }
}
