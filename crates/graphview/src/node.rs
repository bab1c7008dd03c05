use serde::{Deserialize, Serialize};
use swanradar_layout::{LayoutNode, NodeRole, Position};
use tokio::time::Instant;

use crate::snapshot::MISSING_POWER_DBM;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    AccessPoint,
    Client,
}

/// Radial band a node belongs to, by signal strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    One,
    Two,
    Three,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::One, Tier::Two, Tier::Three];

    pub fn from_power(power: Option<i32>) -> Self {
        let power = power.unwrap_or(MISSING_POWER_DBM);
        if power >= -50 {
            Tier::One
        } else if power >= -70 {
            Tier::Two
        } else {
            Tier::Three
        }
    }

    /// Zero-based band index, innermost first.
    pub fn band(self) -> usize {
        match self {
            Tier::One => 0,
            Tier::Two => 1,
            Tier::Three => 2,
        }
    }

    pub fn number(self) -> u8 {
        self.band() as u8 + 1
    }
}

/// Color key used by renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalQuality {
    Excellent,
    Good,
    Fair,
    Weak,
}

impl SignalQuality {
    pub fn from_power(power: Option<i32>) -> Self {
        match power.unwrap_or(MISSING_POWER_DBM) {
            p if p >= -30 => SignalQuality::Excellent,
            p if p >= -50 => SignalQuality::Good,
            p if p >= -70 => SignalQuality::Fair,
            _ => SignalQuality::Weak,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalQuality::Excellent => "excellent",
            SignalQuality::Good => "good",
            SignalQuality::Fair => "fair",
            SignalQuality::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    Normal,
    Moderate,
    High,
}

impl TrafficLevel {
    pub fn from_frames(frames: u64) -> Self {
        match frames {
            0..=300 => TrafficLevel::Normal,
            301..=800 => TrafficLevel::Moderate,
            _ => TrafficLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficLevel::Normal => "normal",
            TrafficLevel::Moderate => "moderate",
            TrafficLevel::High => "high",
        }
    }
}

/// Who currently owns a node's position.
///
/// Anything other than `Floating` carries the fixed position the layout
/// must respect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinState {
    Floating,
    Dragging { fixed: Position },
    /// Released from a drag under an auto-release policy; floats again at `release_at`.
    Held { fixed: Position, release_at: Instant },
    Pinned { fixed: Position },
}

impl PinState {
    pub fn fixed(&self) -> Option<Position> {
        match *self {
            PinState::Floating => None,
            PinState::Dragging { fixed }
            | PinState::Held { fixed, .. }
            | PinState::Pinned { fixed } => Some(fixed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// BSSID for access points, MAC for clients.
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub power: Option<i32>,
    pub tier: Tier,
    /// Owning access point, set only for clients.
    pub parent_id: Option<String>,
    pub channel: Option<String>,
    pub privacy: Option<String>,
    pub data_frames: u64,
    pub client_count: usize,
    pub x: f64,
    pub y: f64,
    pub pin: PinState,
}

impl GraphNode {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn fixed(&self) -> Option<Position> {
        self.pin.fixed()
    }

    /// Whether the node rests at a user-chosen position.
    pub fn pinned(&self) -> bool {
        matches!(self.pin, PinState::Pinned { .. } | PinState::Held { .. })
    }

    pub fn signal_quality(&self) -> SignalQuality {
        SignalQuality::from_power(self.power)
    }

    /// Traffic bucket of an access point; clients carry no frame count.
    pub fn traffic_level(&self) -> Option<TrafficLevel> {
        match self.kind {
            NodeKind::AccessPoint => Some(TrafficLevel::from_frames(self.data_frames)),
            NodeKind::Client => None,
        }
    }
}

impl LayoutNode for GraphNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> NodeRole {
        match self.kind {
            NodeKind::AccessPoint => NodeRole::Hub,
            NodeKind::Client => NodeRole::Leaf,
        }
    }

    fn band(&self) -> usize {
        self.tier.band()
    }

    fn position(&self) -> Position {
        GraphNode::position(self)
    }

    fn set_position(&mut self, pos: Position) {
        self.x = pos.x;
        self.y = pos.y;
    }

    fn fixed(&self) -> Option<Position> {
        self.pin.fixed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(Tier::from_power(Some(-50)), Tier::One);
        assert_eq!(Tier::from_power(Some(-51)), Tier::Two);
        assert_eq!(Tier::from_power(Some(-70)), Tier::Two);
        assert_eq!(Tier::from_power(Some(-71)), Tier::Three);
        assert_eq!(Tier::from_power(None), Tier::Three);
        assert_eq!(Tier::Three.number(), 3);
    }

    #[test]
    fn test_signal_quality() {
        assert_eq!(SignalQuality::from_power(Some(-30)), SignalQuality::Excellent);
        assert_eq!(SignalQuality::from_power(Some(-45)), SignalQuality::Good);
        assert_eq!(SignalQuality::from_power(Some(-70)), SignalQuality::Fair);
        assert_eq!(SignalQuality::from_power(None), SignalQuality::Weak);
    }

    #[test]
    fn test_traffic_level() {
        assert_eq!(TrafficLevel::from_frames(300), TrafficLevel::Normal);
        assert_eq!(TrafficLevel::from_frames(301), TrafficLevel::Moderate);
        assert_eq!(TrafficLevel::from_frames(801), TrafficLevel::High);
    }
}
