//! # psg-sync
//!
//! Real-time synchronization of the panel record across observers.
//!
//! - [`ChangeBus`] - per-observer queues, origin excluded on publish
//! - [`protocol`] - the `{type, data}` envelope and its limits
//! - [`SyncService`] - attach, handle inbound messages, submit, detach
//! - [`server`] - the axum router exposing HTTP and WebSocket access
//!
//! ## Conflict policy
//!
//! Last writer wins. An accepted update replaces the whole record and is
//! sent to every other observer; nothing is merged.

pub mod bus;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod service;

pub use bus::{ChangeBus, ObserverId, Subscription};
pub use config::{SyncConfig, SyncConfigBuilder};
pub use error::{ProtocolError, SyncError};
pub use protocol::{Inbound, MessageKind};
pub use server::{router, serve};
pub use service::SyncService;
