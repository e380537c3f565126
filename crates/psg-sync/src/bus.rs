//! In-process fan-out of accepted records to attached observers.

use parking_lot::RwLock;
use psg_core::PanelRecord;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use ulid::Ulid;

/// Opaque identity of one observer connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(Ulid);

impl ObserverId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The receiving side of one subscription.
pub struct Subscription {
    id: ObserverId,
    rx: mpsc::Receiver<PanelRecord>,
}

impl Subscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Wait for the next record. `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<PanelRecord> {
        self.rx.recv().await
    }

    /// Take a pending record without waiting.
    pub fn try_recv(&mut self) -> Option<PanelRecord> {
        self.rx.try_recv().ok()
    }
}

/// Broadcast channel for record changes.
///
/// Each observer gets its own bounded queue. Publishing never waits: a full
/// queue loses that delivery, a closed one is removed.
pub struct ChangeBus {
    observers: RwLock<HashMap<ObserverId, mpsc::Sender<PanelRecord>>>,
    buffer: usize,
}

impl ChangeBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let id = ObserverId::new();
        let (tx, rx) = mpsc::channel(self.buffer);
        self.observers.write().insert(id, tx);
        debug!(observer = %id, "Observer subscribed");
        Subscription { id, rx }
    }

    /// Remove an observer. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.observers.write().remove(&id).is_some();
        if removed {
            debug!(observer = %id, "Observer unsubscribed");
        }
        removed
    }

    /// Deliver `record` to every observer except `origin`.
    ///
    /// Returns the number of observers the record was queued for.
    pub fn publish(&self, record: &PanelRecord, origin: Option<ObserverId>) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let observers = self.observers.read();
            for (id, tx) in observers.iter() {
                if Some(*id) == origin {
                    continue;
                }
                match tx.try_send(record.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(observer = %id, "Observer queue full, dropping update")
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut observers = self.observers.write();
            for id in closed {
                observers.remove(&id);
                debug!(observer = %id, "Removed closed observer");
            }
        }

        delivered
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(64)
    }
}
