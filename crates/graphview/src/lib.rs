//! Live access point topology: snapshot reconciliation, pinning, alert
//! highlighting and the scene that ties them to the force layout.

mod alert;
mod edge;
mod frame;
mod graph;
mod node;
mod pin;
mod scene;
mod snapshot;

pub use alert::{AlertAnimator, AlertConfig};
pub use edge::GraphLink;
pub use frame::{
    LABEL_MAX_CHARS, LinkSegment, NodeRecord, RenderAdapter, RenderFrame, node_radius,
    truncate_label,
};
pub use graph::{GraphModel, PlacementConfig, ReconcileStats, Reconciled, link_indices};
pub use node::{GraphNode, NodeKind, PinState, SignalQuality, Tier, TrafficLevel};
pub use pin::{PinError, PinPolicy, PinningController};
pub use scene::{Scene, SceneConfig};
pub use snapshot::{
    AccessPoint, AlertEvent, AlertKind, ClientDevice, MISSING_POWER_DBM, Snapshot,
};
