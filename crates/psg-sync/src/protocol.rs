//! Wire format for the streaming channel and request bodies.
//!
//! Every streaming message is a JSON envelope:
//!
//! ```json
//! { "type": "update", "data": { "availableBalance": 10, ... } }
//! ```
//!
//! The server only ever sends `update` envelopes.

use crate::error::ProtocolError;
use psg_core::PanelRecord;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Recognized envelope types. [`MessageKind::as_str`] is the wire name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Update,
    Status,
    Notification,
    Ping,
}

impl MessageKind {
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Update,
        MessageKind::Status,
        MessageKind::Notification,
        MessageKind::Ping,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Update => "update",
            MessageKind::Status => "status",
            MessageKind::Notification => "notification",
            MessageKind::Ping => "ping",
        }
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed inbound message. Only updates carry a typed payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Update(PanelRecord),
    Status(Value),
    Notification(Value),
    Ping(Value),
}

impl Inbound {
    pub fn kind(&self) -> MessageKind {
        match self {
            Inbound::Update(_) => MessageKind::Update,
            Inbound::Status(_) => MessageKind::Status,
            Inbound::Notification(_) => MessageKind::Notification,
            Inbound::Ping(_) => MessageKind::Ping,
        }
    }
}

#[derive(Serialize)]
struct Outbound<'a> {
    #[serde(rename = "type")]
    kind: MessageKind,
    data: &'a PanelRecord,
}

/// Parse one streaming message, enforcing the size ceiling first.
pub fn parse_message(text: &str, limit: usize) -> Result<Inbound, ProtocolError> {
    check_size(text.len(), limit)?;

    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let Value::Object(mut envelope) = value else {
        return Err(ProtocolError::Malformed("envelope is not an object".into()));
    };

    let kind = match envelope.get("type") {
        Some(Value::String(s)) => {
            MessageKind::parse(s).ok_or_else(|| ProtocolError::UnknownType(s.clone()))?
        }
        Some(other) => return Err(ProtocolError::UnknownType(other.to_string())),
        None => return Err(ProtocolError::Malformed("missing type".into())),
    };

    let data = match envelope.remove("data") {
        None | Some(Value::Null) => return Err(ProtocolError::MissingData),
        Some(data) => data,
    };

    Ok(match kind {
        MessageKind::Update => Inbound::Update(PanelRecord::from_value(&data)?),
        MessageKind::Status => Inbound::Status(data),
        MessageKind::Notification => Inbound::Notification(data),
        MessageKind::Ping => Inbound::Ping(data),
    })
}

/// Parse a request body holding a bare record.
pub fn parse_record(body: &[u8], limit: usize) -> Result<PanelRecord, ProtocolError> {
    check_size(body.len(), limit)?;

    let value: Value =
        serde_json::from_slice(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    Ok(PanelRecord::from_value(&value)?)
}

/// Encode an outbound `update` envelope.
pub fn encode_update(record: &PanelRecord) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Outbound {
        kind: MessageKind::Update,
        data: record,
    })
}

fn check_size(size: usize, limit: usize) -> Result<(), ProtocolError> {
    if size > limit {
        Err(ProtocolError::TooLarge { size, limit })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psg_core::ValidationError;
    use serde_json::json;

    const LIMIT: usize = 5_000;

    fn record_json() -> Value {
        json!({
            "availableBalance": 10.5,
            "receivableBalance": 0,
            "feeDue": 1,
            "driverName": "Ana",
            "isActive": true
        })
    }

    #[test]
    fn test_parse_update() {
        let text = json!({ "type": "update", "data": record_json() }).to_string();

        let Inbound::Update(record) = parse_message(&text, LIMIT).unwrap() else {
            panic!("expected update");
        };
        assert_eq!(record.available_balance, 10.5);
        assert_eq!(record.driver_name, "Ana");
        assert_eq!(record.plate, "");
    }

    #[test]
    fn test_parse_other_kinds() {
        for kind in ["status", "notification", "ping"] {
            let text = json!({ "type": kind, "data": { "anything": 1 } }).to_string();
            let inbound = parse_message(&text, LIMIT).unwrap();
            assert_eq!(inbound.kind().as_str(), kind);
        }
    }

    #[test]
    fn test_reject_oversized() {
        let text = " ".repeat(LIMIT + 1);
        assert_eq!(
            parse_message(&text, LIMIT),
            Err(ProtocolError::TooLarge {
                size: LIMIT + 1,
                limit: LIMIT
            })
        );
    }

    #[test]
    fn test_reject_unknown_type() {
        let text = json!({ "type": "delete", "data": {} }).to_string();
        assert_eq!(
            parse_message(&text, LIMIT),
            Err(ProtocolError::UnknownType("delete".into()))
        );

        let text = json!({ "type": 7, "data": {} }).to_string();
        assert!(matches!(
            parse_message(&text, LIMIT),
            Err(ProtocolError::UnknownType(_))
        ));
    }

    #[test]
    fn test_reject_shape() {
        assert!(matches!(
            parse_message("not json", LIMIT),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            parse_message("[1,2]", LIMIT),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            parse_message(r#"{"data":{}}"#, LIMIT),
            Err(ProtocolError::Malformed(_))
        ));
        assert_eq!(
            parse_message(r#"{"type":"ping"}"#, LIMIT),
            Err(ProtocolError::MissingData)
        );
        assert_eq!(
            parse_message(r#"{"type":"update","data":null}"#, LIMIT),
            Err(ProtocolError::MissingData)
        );
    }

    #[test]
    fn test_reject_invalid_update() {
        let mut data = record_json();
        data["feeDue"] = json!(-1);
        let text = json!({ "type": "update", "data": data }).to_string();

        assert!(matches!(
            parse_message(&text, LIMIT),
            Err(ProtocolError::InvalidRecord(ValidationError::Negative { .. }))
        ));
    }

    #[test]
    fn test_parse_record_body() {
        let body = record_json().to_string();
        assert!(parse_record(body.as_bytes(), 10_000).is_ok());
        assert!(matches!(
            parse_record(body.as_bytes(), 10),
            Err(ProtocolError::TooLarge { .. })
        ));
        assert!(matches!(
            parse_record(b"{", 10_000),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            parse_record(b"{\"feeDue\":0}", 10_000),
            Err(ProtocolError::InvalidRecord(ValidationError::MissingField(_)))
        ));
    }

    #[test]
    fn test_encode_update() {
        let record = PanelRecord {
            fee_due: 3.0,
            is_active: true,
            ..Default::default()
        };
        let encoded: Value = serde_json::from_str(&encode_update(&record).unwrap()).unwrap();

        assert_eq!(encoded["type"], "update");
        assert_eq!(encoded["data"]["feeDue"], 3.0);
        assert_eq!(encoded["data"]["isActive"], true);

        let reparsed = parse_message(&encoded.to_string(), LIMIT).unwrap();
        assert_eq!(reparsed, Inbound::Update(record));
    }

    #[test]
    fn test_kind_names_agree() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::parse(kind.as_str()), Some(kind));
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
        assert_eq!(MessageKind::parse("Update"), None);
    }
}
