//! Error types for record validation and on-disk corruption.

use thiserror::Error;

/// Reasons a candidate record is rejected by the validator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Record is not an object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {0} is not a number")]
    NotANumber(&'static str),

    #[error("Field {field} is negative: {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("Field {0} is not a boolean")]
    NotABoolean(&'static str),

    #[error("Field {0} is not a string")]
    NotAString(&'static str),
}

/// Reasons a persisted file is considered corrupted.
#[derive(Error, Debug)]
pub enum CorruptionError {
    #[error("File could not be read: {0}")]
    Unreadable(#[from] std::io::Error),

    #[error("File is not valid JSON: {0}")]
    Unparsable(String),

    #[error("Record failed validation: {0}")]
    Invalid(#[from] ValidationError),

    #[error("File is missing required marker: {0}")]
    MissingMarker(&'static str),
}

impl From<serde_json::Error> for CorruptionError {
    fn from(err: serde_json::Error) -> Self {
        CorruptionError::Unparsable(err.to_string())
    }
}
