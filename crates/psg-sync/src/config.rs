//! Network-facing configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the sync service and its HTTP/WebSocket surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Address the server listens on.
    pub bind_addr: String,
    /// Largest accepted streaming message (in bytes).
    pub max_stream_message_bytes: usize,
    /// Largest accepted request body (in bytes).
    pub max_request_bytes: usize,
    /// Pending updates buffered per observer before deliveries are dropped.
    pub observer_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_stream_message_bytes: 5_000,
            max_request_bytes: 10_000,
            observer_buffer: 64,
        }
    }
}

/// Builder for sync configuration.
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn max_stream_message_bytes(mut self, bytes: usize) -> Self {
        self.config.max_stream_message_bytes = bytes;
        self
    }

    pub fn max_request_bytes(mut self, bytes: usize) -> Self {
        self.config.max_request_bytes = bytes;
        self
    }

    pub fn observer_buffer(mut self, size: usize) -> Self {
        self.config.observer_buffer = size;
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
