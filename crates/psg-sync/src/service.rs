//! Orchestration of the state store and the change bus.

use crate::bus::{ChangeBus, ObserverId, Subscription};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::protocol::{self, Inbound};
use psg_core::PanelRecord;
use psg_store::StateStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Applies accepted changes to the store and fans them out.
///
/// Writes and their broadcast happen under one lock so observers see
/// changes in the order they were persisted. Each write and its broadcast
/// run as one detached task, so a caller dropped mid-update cannot leave
/// the file changed without observers hearing about it.
pub struct SyncService {
    store: Arc<StateStore>,
    bus: Arc<ChangeBus>,
    config: SyncConfig,
    apply_lock: Arc<Mutex<()>>,
}

impl SyncService {
    pub fn new(store: Arc<StateStore>, config: SyncConfig) -> Self {
        Self {
            bus: Arc::new(ChangeBus::new(config.observer_buffer)),
            store,
            config,
            apply_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn observer_count(&self) -> usize {
        self.bus.observer_count()
    }

    /// Current record, repaired or defaulted if needed.
    pub async fn current(&self) -> Result<PanelRecord> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.load()).await?)
    }

    /// Register a new observer and fetch the record it should see first.
    ///
    /// The subscription is taken before the load so no change published in
    /// between is missed.
    pub async fn attach(&self) -> Result<(Subscription, PanelRecord)> {
        let subscription = self.bus.subscribe();
        match self.current().await {
            Ok(record) => {
                info!(observer = %subscription.id(), observers = self.observer_count(), "Observer attached");
                Ok((subscription, record))
            }
            Err(e) => {
                self.bus.unsubscribe(subscription.id());
                Err(e)
            }
        }
    }

    /// Remove an observer. Safe to call more than once.
    pub fn detach(&self, id: ObserverId) {
        if self.bus.unsubscribe(id) {
            info!(observer = %id, observers = self.observer_count(), "Observer detached");
        }
    }

    /// Handle one streaming message from `origin`.
    ///
    /// Rejected messages are logged and dropped. Returns the record when an
    /// update was persisted and broadcast.
    pub async fn handle_message(&self, origin: ObserverId, text: &str) -> Option<PanelRecord> {
        let inbound = match protocol::parse_message(text, self.config.max_stream_message_bytes) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(observer = %origin, error = %e, "Dropped inbound message");
                return None;
            }
        };

        match inbound {
            Inbound::Update(record) => match self.apply(record, Some(origin)).await {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(observer = %origin, error = %e, "Discarded update");
                    None
                }
            },
            other => {
                debug!(observer = %origin, kind = %other.kind(), "Accepted message without state effect");
                None
            }
        }
    }

    /// Handle a one-shot request body. Every observer receives the change.
    pub async fn submit(&self, body: &[u8]) -> Result<PanelRecord> {
        let record = protocol::parse_record(body, self.config.max_request_bytes)?;
        self.apply(record, None).await
    }

    async fn apply(&self, record: PanelRecord, origin: Option<ObserverId>) -> Result<PanelRecord> {
        let store = self.store.clone();
        let bus = self.bus.clone();
        let lock = self.apply_lock.clone();

        tokio::spawn(async move {
            let _guard = lock.lock_owned().await;
            let record =
                tokio::task::spawn_blocking(move || store.write(&record).map(|()| record)).await??;

            let delivered = bus.publish(&record, origin);
            debug!(delivered, "Update broadcast");
            Ok::<_, SyncError>(record)
        })
        .await?
    }
}
