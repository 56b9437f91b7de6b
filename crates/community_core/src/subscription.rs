//! Live subscription handle shared by the store and identity boundaries.
//!
//! # Invariants
//! - A subscription closes exactly once: on `close()` or on drop.
//! - Events are yielded in the order the producer sent them.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

type CloseHook = Box<dyn FnOnce() + Send>;

/// Receiving half of one registered listener.
pub struct Subscription<T> {
    events: UnboundedReceiver<T>,
    on_close: Option<CloseHook>,
}

impl<T> Subscription<T> {
    /// Wraps `events`; `on_close` runs once when the subscription is closed.
    pub fn new(events: UnboundedReceiver<T>, on_close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            events,
            on_close: Some(Box::new(on_close)),
        }
    }

    /// Creates a connected sender/subscription pair.
    pub fn channel(on_close: impl FnOnce() + Send + 'static) -> (UnboundedSender<T>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self::new(receiver, on_close))
    }

    /// Waits for the next event; `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<T> {
        self.events.recv().await
    }

    /// Returns an already-queued event without waiting.
    pub fn try_next(&mut self) -> Option<T> {
        self.events.try_recv().ok()
    }

    /// Unregisters the listener.
    pub fn close(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.events.close();
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}
