//! The panel record: balances and driver metadata.
//!
//! Accepted JSON is normalised into the typed record before it is stored or
//! broadcast. Keys outside the record are dropped, null or absent text
//! fields become `""`, and amounts are held as `f64`, so integer amounts
//! come back out as floats. Observers always see the normalised record, not
//! the text that was sent.

use crate::error::ValidationError;
use crate::validator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields that must be present in every record.
pub const REQUIRED_FIELDS: [&str; 4] = ["availableBalance", "receivableBalance", "feeDue", "isActive"];

/// Fields holding non-negative amounts.
pub const MONETARY_FIELDS: [&str; 3] = ["availableBalance", "receivableBalance", "feeDue"];

/// Optional free-text fields. Absent or null reads as empty.
pub const TEXT_FIELDS: [&str; 3] = ["driverName", "plate", "driverModel"];

/// The single shared state record.
///
/// The on-disk and on-wire representation uses camelCase keys:
///
/// ```json
/// {
///   "availableBalance": 0,
///   "receivableBalance": 0,
///   "feeDue": 0,
///   "driverName": "",
///   "plate": "",
///   "driverModel": "",
///   "isActive": false
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelRecord {
    pub available_balance: f64,
    pub receivable_balance: f64,
    pub fee_due: f64,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub driver_model: String,
    pub is_active: bool,
}

impl PanelRecord {
    /// Build a record from untyped JSON, running the validator first.
    ///
    /// Unknown keys are discarded and null text reads as empty.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let map = validator::check(value)?;

        Ok(PanelRecord {
            available_balance: number(map, "availableBalance"),
            receivable_balance: number(map, "receivableBalance"),
            fee_due: number(map, "feeDue"),
            driver_name: text(map, "driverName"),
            plate: text(map, "plate"),
            driver_model: text(map, "driverModel"),
            is_active: map.get("isActive").and_then(Value::as_bool).unwrap_or_default(),
        })
    }

    /// Parse and validate a JSON document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, crate::CorruptionError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_value(&value)?)
    }

    /// Convert to untyped JSON.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("availableBalance".into(), Value::from(self.available_balance));
        map.insert("receivableBalance".into(), Value::from(self.receivable_balance));
        map.insert("feeDue".into(), Value::from(self.fee_due));
        map.insert("driverName".into(), Value::from(self.driver_name.clone()));
        map.insert("plate".into(), Value::from(self.plate.clone()));
        map.insert("driverModel".into(), Value::from(self.driver_model.clone()));
        map.insert("isActive".into(), Value::from(self.is_active));
        Value::Object(map)
    }
}

fn number(map: &Map<String, Value>, field: &str) -> f64 {
    map.get(field).and_then(Value::as_f64).unwrap_or_default()
}

fn text(map: &Map<String, Value>, field: &str) -> String {
    map.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}
