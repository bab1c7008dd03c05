use std::collections::HashMap;

use swanradar_layout::{Canvas, ForceConfig, LayoutError, Position, Simulation, TickReport};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::alert::{AlertAnimator, AlertConfig};
use crate::edge::GraphLink;
use crate::frame::{LinkSegment, NodeRecord, RenderFrame, node_radius, truncate_label};
use crate::graph::{GraphModel, PlacementConfig, ReconcileStats, link_indices};
use crate::node::{GraphNode, PinState};
use crate::pin::{PinError, PinPolicy, PinningController};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Default)]
pub struct SceneConfig {
    pub canvas: Canvas,
    pub forces: ForceConfig,
    pub placement: PlacementConfig,
    pub pin_policy: PinPolicy,
    pub alerts: AlertConfig,
}

/// Owner of the live node registry.
///
/// Snapshots replace the registry in one step; the simulation only sees the
/// new set on the next [`Scene::tick`], so several snapshots arriving between
/// two frames collapse into the latest one.
pub struct Scene {
    model: GraphModel,
    simulation: Simulation,
    pins: PinningController,
    alerts: AlertAnimator,
    nodes: Vec<GraphNode>,
    links: Vec<GraphLink>,
    index: HashMap<String, usize>,
    dirty: bool,
    closed: bool,
}

impl Scene {
    pub fn new(config: SceneConfig) -> Result<Self, LayoutError> {
        config.canvas.validate()?;
        config.forces.validate()?;
        config.placement.validate()?;
        Ok(Self {
            model: GraphModel::new(config.canvas, config.placement),
            simulation: Simulation::new(config.forces, config.canvas),
            pins: PinningController::new(config.pin_policy),
            alerts: AlertAnimator::new(config.alerts),
            nodes: Vec::new(),
            links: Vec::new(),
            index: HashMap::new(),
            dirty: false,
            closed: false,
        })
    }

    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> ReconcileStats {
        if self.closed {
            return ReconcileStats::default();
        }
        let out = self.model.reconcile(&self.nodes, &self.links, snapshot);
        self.nodes = out.nodes;
        self.links = out.links;
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        self.pins.forget_missing(&self.nodes);

        let mut flagged = snapshot.alert_kinds();
        flagged.retain(|id, _| self.index.contains_key(id));
        let (started, stopped) = self.alerts.sync(&flagged);
        self.dirty = true;

        let stats = out.stats;
        debug!(
            nodes = self.nodes.len(),
            links = self.links.len(),
            created = stats.created,
            updated = stats.updated,
            removed = stats.removed,
            alerts_started = started,
            alerts_stopped = stopped,
            "snapshot applied"
        );
        if stats.duplicates > 0 {
            info!(count = stats.duplicates, "skipped duplicate ids in snapshot");
        }
        stats
    }

    /// Advance one frame: release expired holds, pick up the latest
    /// reconciled set, then run one simulation step.
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, LayoutError> {
        if self.closed {
            return Ok(TickReport::default());
        }
        if self.pins.release_expired(&mut self.nodes, now) > 0 {
            self.simulation.reheat();
        }
        if self.dirty {
            let edges = link_indices(&self.nodes, &self.links);
            self.simulation.reseed(&self.nodes, &edges)?;
            self.dirty = false;
        }
        self.simulation.tick(&mut self.nodes)
    }

    pub fn frame(&self) -> RenderFrame {
        let nodes = self
            .nodes
            .iter()
            .map(|n| NodeRecord {
                id: n.id.clone(),
                kind: n.kind,
                x: n.x,
                y: n.y,
                radius: node_radius(n.kind),
                tier: n.tier.number(),
                color_key: n.signal_quality(),
                traffic_level: n.traffic_level(),
                label: truncate_label(&n.label),
                pinned: n.pinned(),
                alert_active: self.alerts.is_highlighted(&n.id),
            })
            .collect();
        let links = link_indices(&self.nodes, &self.links)
            .into_iter()
            .map(|(s, t)| LinkSegment {
                x1: self.nodes[s].x,
                y1: self.nodes[s].y,
                x2: self.nodes[t].x,
                y2: self.nodes[t].y,
            })
            .collect();
        RenderFrame {
            nodes,
            links,
            canvas: *self.simulation.canvas(),
            alpha: self.simulation.alpha(),
        }
    }

    /// Resize the drawing surface. New entities are placed on the new bands
    /// and the simulation is reheated so existing ones drift toward them.
    pub fn set_canvas(&mut self, canvas: Canvas) -> Result<(), LayoutError> {
        self.simulation.set_canvas(canvas)?;
        self.model.canvas = canvas;
        debug!(width = canvas.width, height = canvas.height, "canvas resized");
        Ok(())
    }

    pub fn begin_drag(&mut self, id: &str) -> Result<(), PinError> {
        let i = self.lookup(id)?;
        self.pins.begin_drag(&mut self.nodes[i])?;
        let warm = self.simulation.config().reheat_alpha;
        self.simulation.set_alpha_target(warm);
        self.simulation.reheat();
        Ok(())
    }

    pub fn drag_to(&mut self, id: &str, pos: Position) -> Result<(), PinError> {
        let i = self.lookup(id)?;
        self.pins.drag_to(&mut self.nodes[i], pos)
    }

    pub fn end_drag(&mut self, id: &str, now: Instant) -> Result<PinState, PinError> {
        let i = self.lookup(id)?;
        let state = self.pins.end_drag(&mut self.nodes[i], now)?;
        self.simulation.set_alpha_target(0.0);
        Ok(state)
    }

    pub fn unpin(&mut self, id: &str) -> Result<bool, PinError> {
        let i = self.lookup(id)?;
        let changed = self.pins.unpin(&mut self.nodes[i]);
        if changed {
            self.simulation.set_alpha_target(0.0);
            self.simulation.reheat();
        }
        Ok(changed)
    }

    /// Release temporarily held nodes; pinned ones stay.
    pub fn release_all(&mut self) -> usize {
        let released = self.pins.release_all(&mut self.nodes);
        if released > 0 {
            self.simulation.reheat();
        }
        released
    }

    /// Stop the simulation and every alert cycle. Further snapshots and
    /// ticks are ignored.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.simulation.stop();
        self.alerts.cancel_all();
        self.closed = true;
        debug!(nodes = self.nodes.len(), "scene shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[GraphLink] {
        &self.links
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn alerts(&self) -> &AlertAnimator {
        &self.alerts
    }

    fn lookup(&self, id: &str) -> Result<usize, PinError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| PinError::UnknownNode(id.to_string()))
    }
}
