//! Change notification bus
//!
//! A zero-payload broadcast: every signal means "the stored record may have
//! changed, go re-read it". Writers in this context call [`ChangeBus::publish`]
//! after each write; store watchers publish on behalf of other contexts.

use tokio::sync::broadcast;
use tracing::debug;

/// Broadcast channel capacity. Signals carry no data, so a lagging
/// subscriber loses nothing by skipping old ones.
pub const CHANNEL_CAPACITY: usize = 64;

/// Fan-out of "state may have changed" signals to every listener of one
/// instance.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<()>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Signal every current subscriber.
    pub fn publish(&self) {
        if self.tx.send(()).is_err() {
            debug!("Change signal dropped, no subscribers");
        }
    }

    /// Start listening. Dropping the returned subscription unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One listener's end of the bus.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<()>,
}

impl Subscription {
    /// Wait for the next signal. Returns `None` once the bus is gone.
    ///
    /// Missed signals collapse into one: listeners re-read the whole record,
    /// so one signal covers any number of writes.
    pub async fn recv(&mut self) -> Option<()> {
        match self.rx.recv().await {
            Ok(()) => Some(()),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Subscriber lagged by {} signals, coalescing", skipped);
                Some(())
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Drain pending signals without waiting. Returns whether any arrived.
    pub fn try_drain(&mut self) -> bool {
        let mut seen = false;
        loop {
            match self.rx.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_)) => seen = true,
                Err(_) => return seen,
            }
        }
    }
}
