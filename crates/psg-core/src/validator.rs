//! Structural and type checks for panel records.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. the value is a JSON object
//! 2. every required field is present
//! 3. every monetary field is a number and not negative
//! 4. `isActive` is a boolean
//! 5. text fields, when present and non-null, are strings
//!
//! A rejected record must never be persisted or broadcast.

use crate::error::ValidationError;
use crate::record::{PanelRecord, MONETARY_FIELDS, REQUIRED_FIELDS, TEXT_FIELDS};
use serde_json::{Map, Value};

/// Returns `true` if the value is an acceptable panel record.
pub fn validate(value: &Value) -> bool {
    check(value).is_ok()
}

/// Runs every check and returns the object map on success.
pub fn check(value: &Value) -> Result<&Map<String, Value>, ValidationError> {
    let map = value.as_object().ok_or(ValidationError::NotAnObject)?;

    for field in REQUIRED_FIELDS {
        if !map.contains_key(field) {
            return Err(ValidationError::MissingField(field));
        }
    }

    for field in MONETARY_FIELDS {
        let amount = map
            .get(field)
            .and_then(Value::as_f64)
            .ok_or(ValidationError::NotANumber(field))?;
        check_amount(field, amount)?;
    }

    if !map.get("isActive").is_some_and(Value::is_boolean) {
        return Err(ValidationError::NotABoolean("isActive"));
    }

    for field in TEXT_FIELDS {
        match map.get(field) {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(_) => return Err(ValidationError::NotAString(field)),
        }
    }

    Ok(map)
}

/// Checks an already typed record. Only the amounts can be wrong here.
pub fn check_record(record: &PanelRecord) -> Result<(), ValidationError> {
    check_amount("availableBalance", record.available_balance)?;
    check_amount("receivableBalance", record.receivable_balance)?;
    check_amount("feeDue", record.fee_due)?;
    Ok(())
}

fn check_amount(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotANumber(field));
    }
    if value < 0.0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}
