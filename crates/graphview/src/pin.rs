use std::collections::HashSet;
use std::time::Duration;

use swanradar_layout::Position;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::node::{GraphNode, PinState};

/// What happens to a node when the user lets go of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PinPolicy {
    /// Stay where dropped until explicitly unpinned.
    #[default]
    UntilUnpinned,
    /// Hold the drop position for `after`, then rejoin the layout.
    AutoRelease { after: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("no node with id {0:?}")]
    UnknownNode(String),
    #[error("node {0:?} is not being dragged")]
    NotDragging(String),
    #[error("node {active:?} is already being dragged")]
    DragInProgress { active: String },
}

/// Drives the `Floating -> Dragging -> Pinned -> Floating` gesture cycle.
///
/// Only one node can be dragged at a time.
#[derive(Debug, Default)]
pub struct PinningController {
    policy: PinPolicy,
    dragging: Option<String>,
}

impl PinningController {
    pub fn new(policy: PinPolicy) -> Self {
        Self {
            policy,
            dragging: None,
        }
    }

    pub fn policy(&self) -> PinPolicy {
        self.policy
    }

    pub fn dragging(&self) -> Option<&str> {
        self.dragging.as_deref()
    }

    /// Fix the node where it currently is and start following input.
    pub fn begin_drag(&mut self, node: &mut GraphNode) -> Result<(), PinError> {
        if let Some(active) = &self.dragging {
            return Err(PinError::DragInProgress {
                active: active.clone(),
            });
        }
        node.pin = PinState::Dragging {
            fixed: node.position(),
        };
        self.dragging = Some(node.id.clone());
        debug!(id = %node.id, x = node.x, y = node.y, "drag started");
        Ok(())
    }

    pub fn drag_to(&mut self, node: &mut GraphNode, pos: Position) -> Result<(), PinError> {
        self.check_dragging(node)?;
        node.pin = PinState::Dragging { fixed: pos };
        node.x = pos.x;
        node.y = pos.y;
        Ok(())
    }

    /// Drop the node at its last dragged position.
    pub fn end_drag(&mut self, node: &mut GraphNode, now: Instant) -> Result<PinState, PinError> {
        self.check_dragging(node)?;
        let fixed = node.fixed().unwrap_or_else(|| node.position());
        node.pin = match self.policy {
            PinPolicy::UntilUnpinned => PinState::Pinned { fixed },
            PinPolicy::AutoRelease { after } => PinState::Held {
                fixed,
                release_at: now + after,
            },
        };
        self.dragging = None;
        debug!(id = %node.id, x = fixed.x, y = fixed.y, state = ?node.pin, "drag ended");
        Ok(node.pin)
    }

    /// Return the node to the layout. Returns whether anything changed.
    pub fn unpin(&mut self, node: &mut GraphNode) -> bool {
        if self.dragging.as_deref() == Some(node.id.as_str()) {
            self.dragging = None;
        }
        if node.pin == PinState::Floating {
            return false;
        }
        node.pin = PinState::Floating;
        debug!(id = %node.id, "unpinned");
        true
    }

    /// Release every temporarily held node. Pinned nodes are left alone.
    pub fn release_all(&mut self, nodes: &mut [GraphNode]) -> usize {
        self.release_where(nodes, |_| true)
    }

    /// Release held nodes whose deadline has passed.
    pub fn release_expired(&mut self, nodes: &mut [GraphNode], now: Instant) -> usize {
        self.release_where(nodes, |release_at| release_at <= now)
    }

    /// Drop the drag if the dragged node is no longer in `nodes`.
    pub fn forget_missing(&mut self, nodes: &[GraphNode]) {
        let Some(active) = &self.dragging else {
            return;
        };
        let live: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        if !live.contains(active.as_str()) {
            debug!(id = %active, "dragged node disappeared");
            self.dragging = None;
        }
    }

    fn release_where(
        &mut self,
        nodes: &mut [GraphNode],
        due: impl Fn(Instant) -> bool,
    ) -> usize {
        let mut released = 0;
        for node in nodes.iter_mut() {
            if let PinState::Held { release_at, .. } = node.pin {
                if due(release_at) {
                    node.pin = PinState::Floating;
                    released += 1;
                    debug!(id = %node.id, "released held node");
                }
            }
        }
        released
    }

    fn check_dragging(&self, node: &GraphNode) -> Result<(), PinError> {
        if self.dragging.as_deref() == Some(node.id.as_str()) {
            Ok(())
        } else {
            Err(PinError::NotDragging(node.id.clone()))
        }
    }
}
