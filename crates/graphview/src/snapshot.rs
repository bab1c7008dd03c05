//! Wire-level data model of one network reading.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Signal strength assumed for an entity that reports none.
pub const MISSING_POWER_DBM: i32 = -80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDevice {
    pub mac: String,
    #[serde(default)]
    pub power: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub bssid: String,
    #[serde(default)]
    pub essid: Option<String>,
    #[serde(default)]
    pub power: Option<i32>,
    #[serde(default, deserialize_with = "channel_string")]
    pub channel: Option<String>,
    #[serde(default)]
    pub privacy: Option<String>,
    #[serde(default)]
    pub clients: Vec<ClientDevice>,
    /// Data frames seen for this network.
    #[serde(default, rename = "data")]
    pub data_frames: u64,
}

impl AccessPoint {
    pub fn new(bssid: impl Into<String>) -> Self {
        Self {
            bssid: bssid.into(),
            essid: None,
            power: None,
            channel: None,
            privacy: None,
            clients: Vec::new(),
            data_frames: 0,
        }
    }
}

/// Channels arrive either as numbers or as strings such as `"6"` or `"36,+1"`.
fn channel_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Channel {
        Number(i64),
        Text(String),
    }

    Ok(
        Option::<Channel>::deserialize(deserializer)?.map(|c| match c {
            Channel::Number(n) => n.to_string(),
            Channel::Text(s) => s,
        }),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertKind {
    HighTraffic,
    SuspiciousTraffic,
    Other(String),
}

impl From<String> for AlertKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "high_traffic" => AlertKind::HighTraffic,
            "suspicious_traffic" => AlertKind::SuspiciousTraffic,
            _ => AlertKind::Other(s),
        }
    }
}

impl From<AlertKind> for String {
    fn from(kind: AlertKind) -> Self {
        match kind {
            AlertKind::HighTraffic => "high_traffic".to_string(),
            AlertKind::SuspiciousTraffic => "suspicious_traffic".to_string(),
            AlertKind::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub bssid: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    #[serde(default)]
    pub message: String,
}

/// One complete reading of the network, applied as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub aps: Vec<AccessPoint>,
    #[serde(default)]
    pub total_clients: u64,
    #[serde(default)]
    pub total_traffic: u64,
    #[serde(default)]
    pub alerts: Vec<AlertEvent>,
}

impl Snapshot {
    /// Alert kind per flagged id. When several alerts name the same id the
    /// first one wins.
    pub fn alert_kinds(&self) -> HashMap<String, AlertKind> {
        let mut kinds = HashMap::with_capacity(self.alerts.len());
        for alert in &self.alerts {
            kinds
                .entry(alert.bssid.clone())
                .or_insert_with(|| alert.kind.clone());
        }
        kinds
    }
}
