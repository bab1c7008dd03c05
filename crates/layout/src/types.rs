use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Point at `radius` from `self` along `angle` (radians, clockwise in screen space).
    pub fn offset_polar(&self, angle: f64, radius: f64) -> Position {
        Position {
            x: self.x + angle.cos() * radius,
            y: self.y + angle.sin() * radius,
        }
    }
}

/// Drawing surface the layout is centred on, with three concentric bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    /// Band radii as fractions of the smaller canvas side, innermost first.
    pub band_fractions: [f64; 3],
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            band_fractions: [0.15, 0.25, 0.35],
        }
    }
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Result<Self, LayoutError> {
        let canvas = Self {
            width,
            height,
            ..Default::default()
        };
        canvas.validate()?;
        Ok(canvas)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let sides_ok = self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0;
        let bands_ok = self
            .band_fractions
            .iter()
            .all(|f| f.is_finite() && *f > 0.0);
        if sides_ok && bands_ok {
            Ok(())
        } else {
            Err(LayoutError::InvalidCanvas {
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn center(&self) -> Position {
        Position::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn min_side(&self) -> f64 {
        self.width.min(self.height)
    }

    /// Radius of band `band`; indices past the outermost band clamp to it.
    pub fn band_radius(&self, band: usize) -> f64 {
        let band = band.min(self.band_fractions.len() - 1);
        self.min_side() * self.band_fractions[band]
    }
}

/// Whether a node anchors a cluster or hangs off one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Hub,
    Leaf,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("node set changed since the last reseed: expected {expected} nodes, got {actual}")]
    NodeCountMismatch { expected: usize, actual: usize },
    #[error("node {index} is {actual:?}, simulation was seeded with {expected:?}")]
    StaleNode {
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("edge {index} references node {node} outside the node set")]
    InvalidEdgeIndex { index: usize, node: usize },
    #[error("invalid canvas {width}x{height}")]
    InvalidCanvas { width: f64, height: f64 },
    #[error("{name} = {value} is outside {lo}..={hi}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        lo: f64,
        hi: f64,
    },
}

/// Check that `value` is finite and within `lo..=hi`.
pub fn check_range(name: &'static str, value: f64, lo: f64, hi: f64) -> Result<(), LayoutError> {
    if value.is_finite() && (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(LayoutError::OutOfRange {
            name,
            value,
            lo,
            hi,
        })
    }
}

/// Trait for nodes the force simulation can move
pub trait LayoutNode {
    fn id(&self) -> &str;
    fn role(&self) -> NodeRole;
    /// Radial band the node is pulled toward (0 = innermost).
    fn band(&self) -> usize;
    fn position(&self) -> Position;
    fn set_position(&mut self, pos: Position);
    /// Where the node is held, if anywhere. Held nodes are never moved by forces.
    fn fixed(&self) -> Option<Position>;
}

/// Trait for edges between nodes, by index into the node slice
pub trait LayoutEdge {
    fn source(&self) -> usize;
    fn target(&self) -> usize;
}

impl LayoutEdge for (usize, usize) {
    fn source(&self) -> usize {
        self.0
    }

    fn target(&self) -> usize {
        self.1
    }
}

/// Force parameters that differ between hubs and leaves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleForces {
    /// Many-body strength; negative repels.
    pub charge: f64,
    pub collide_radius: f64,
    pub radial_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceConfig {
    pub hub: RoleForces,
    pub leaf: RoleForces,
    /// Pairs further apart than this do not repel each other.
    pub charge_distance_max: f64,
    pub charge_distance_min: f64,
    /// Rest length of hub-leaf links.
    pub hub_leaf_distance: f64,
    /// Rest length of any other link.
    pub link_distance: f64,
    pub link_strength: f64,
    pub center_strength: f64,
    pub collide_strength: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
    /// Energy a reseed, unpin or release brings the simulation back up to.
    pub reheat_alpha: f64,
    /// Largest distance a node may travel in one tick.
    pub max_step: f64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            hub: RoleForces {
                charge: -80.0,
                collide_radius: 20.0,
                radial_strength: 0.1,
            },
            leaf: RoleForces {
                charge: -40.0,
                collide_radius: 12.0,
                radial_strength: 0.03,
            },
            charge_distance_max: 200.0,
            charge_distance_min: 1.0,
            hub_leaf_distance: 60.0,
            link_distance: 100.0,
            link_strength: 0.1,
            center_strength: 0.05,
            collide_strength: 0.7,
            alpha_min: 0.001,
            alpha_decay: 0.02,
            velocity_decay: 0.4,
            reheat_alpha: 0.3,
            max_step: 25.0,
        }
    }
}

impl ForceConfig {
    pub fn role(&self, role: NodeRole) -> &RoleForces {
        match role {
            NodeRole::Hub => &self.hub,
            NodeRole::Leaf => &self.leaf,
        }
    }

    /// Reject parameters that would panic or turn positions into NaN.
    pub fn validate(&self) -> Result<(), LayoutError> {
        const ANY: f64 = f64::INFINITY;
        check_range("hub.charge", self.hub.charge, -ANY, ANY)?;
        check_range("hub.collide_radius", self.hub.collide_radius, 0.0, ANY)?;
        check_range("hub.radial_strength", self.hub.radial_strength, 0.0, 1.0)?;
        check_range("leaf.charge", self.leaf.charge, -ANY, ANY)?;
        check_range("leaf.collide_radius", self.leaf.collide_radius, 0.0, ANY)?;
        check_range("leaf.radial_strength", self.leaf.radial_strength, 0.0, 1.0)?;
        check_range("charge_distance_min", self.charge_distance_min, 0.0, ANY)?;
        check_range(
            "charge_distance_max",
            self.charge_distance_max,
            self.charge_distance_min,
            ANY,
        )?;
        check_range("hub_leaf_distance", self.hub_leaf_distance, 0.0, ANY)?;
        check_range("link_distance", self.link_distance, 0.0, ANY)?;
        check_range("link_strength", self.link_strength, 0.0, 1.0)?;
        check_range("center_strength", self.center_strength, 0.0, 1.0)?;
        check_range("collide_strength", self.collide_strength, 0.0, 1.0)?;
        check_range("alpha_min", self.alpha_min, 0.0, 1.0)?;
        check_range("alpha_decay", self.alpha_decay, 0.0, 1.0)?;
        check_range("velocity_decay", self.velocity_decay, 0.0, 1.0)?;
        check_range("reheat_alpha", self.reheat_alpha, 0.0, 1.0)?;
        check_range("max_step", self.max_step, 0.0, ANY)?;
        Ok(())
    }

    /// Rest length of a link between nodes of the given roles.
    pub fn rest_length(&self, a: NodeRole, b: NodeRole) -> f64 {
        match (a, b) {
            (NodeRole::Hub, NodeRole::Leaf) | (NodeRole::Leaf, NodeRole::Hub) => {
                self.hub_leaf_distance
            }
            _ => self.link_distance,
        }
    }
}

/// Outcome of a single simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub alpha: f64,
    /// Largest distance any node moved during the step.
    pub max_displacement: f64,
    pub settled: bool,
}
