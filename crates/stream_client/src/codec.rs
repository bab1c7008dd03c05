use graphview::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StreamError;

/// Control event asking the server for its current state.
pub const REQUEST_DATA: &str = "request_data";
const WIFI_DATA: &str = "wifi_data";
const STATUS: &str = "status";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Viewers currently attached to the server.
    #[serde(default, alias = "connectedClientCount")]
    pub clients: u64,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Snapshot(Snapshot),
    Status(StatusReport),
    /// A data event without an `aps` field.
    Discarded { event: String },
    Unknown { event: String },
}

pub fn encode_request_data() -> Result<String, StreamError> {
    let envelope = Envelope {
        event: REQUEST_DATA.to_string(),
        data: Value::Null,
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn decode(text: &str) -> Result<Inbound, StreamError> {
    let Envelope { event, data } = serde_json::from_str(text)?;
    match event.as_str() {
        WIFI_DATA => {
            if data.get("aps").is_none() {
                return Ok(Inbound::Discarded { event });
            }
            serde_json::from_value(data)
                .map(Inbound::Snapshot)
                .map_err(|source| StreamError::Malformed { event, source })
        }
        STATUS => {
            if data.is_null() {
                return Ok(Inbound::Status(StatusReport::default()));
            }
            serde_json::from_value(data)
                .map(Inbound::Status)
                .map_err(|source| StreamError::Malformed { event, source })
        }
        _ => Ok(Inbound::Unknown { event }),
    }
}
