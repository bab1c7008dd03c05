//! Headless force-directed layout with radial banding.
//!
//! The simulation moves nodes it does not own: callers implement
//! [`LayoutNode`] and [`LayoutEdge`] for their own types, [`Simulation::reseed`]
//! whenever the node set changes and [`Simulation::tick`] once per frame.

mod grid;
mod layout;
mod types;

pub use layout::Simulation;
pub use types::*;
