//! Per-frame output handed to renderers.

use serde::Serialize;
use swanradar_layout::Canvas;

use crate::node::{NodeKind, SignalQuality, TrafficLevel};

/// Longest label drawn before truncation.
pub const LABEL_MAX_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: String,
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub tier: u8,
    pub color_key: SignalQuality,
    /// Set for access points only.
    pub traffic_level: Option<TrafficLevel>,
    pub label: String,
    pub pinned: bool,
    pub alert_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkSegment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkSegment>,
    pub canvas: Canvas,
    pub alpha: f64,
}

/// Consumer of the per-frame state, such as a window or a file writer.
pub trait RenderAdapter {
    fn present(&mut self, frame: &RenderFrame);
}

/// Visual radius of a node of the given kind.
pub fn node_radius(kind: NodeKind) -> f64 {
    match kind {
        NodeKind::AccessPoint => 16.0,
        NodeKind::Client => 8.0,
    }
}

pub fn truncate_label(label: &str) -> String {
    if label.chars().count() <= LABEL_MAX_CHARS {
        return label.to_string();
    }
    let mut out: String = label.chars().take(LABEL_MAX_CHARS).collect();
    out.push('…');
    out
}
