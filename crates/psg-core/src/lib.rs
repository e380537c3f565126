//! # psg-core
//!
//! The state model shared by every Panel State Guard crate.
//!
//! - [`PanelRecord`] - the single authoritative record of balances and driver metadata
//! - [`validator`] - structural and type checks applied before anything is persisted or broadcast
//! - [`error`] - validation and corruption error types

pub mod error;
pub mod record;
pub mod validator;

pub use error::{CorruptionError, ValidationError};
pub use record::{PanelRecord, MONETARY_FIELDS, REQUIRED_FIELDS};
pub use validator::{check, check_record, validate};
