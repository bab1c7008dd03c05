use std::collections::HashMap;

use tracing::trace;

use crate::grid::Grid;
use crate::types::*;

/// Tiny deterministic offset used when two points coincide.
const JIGGLE: f64 = 1e-6;

#[derive(Debug, Clone)]
struct Body {
    id: String,
    role: NodeRole,
    band: usize,
    vx: f64,
    vy: f64,
}

#[derive(Debug, Clone)]
struct Spring {
    source: usize,
    target: usize,
    rest_length: f64,
    /// Share of the correction applied to the target.
    bias: f64,
}

/// Iterative force simulation over an externally owned node set.
///
/// Positions live on the nodes themselves; the simulation only keeps
/// velocities, keyed by node id so they survive a reseed. Each tick applies
/// link springs, many-body repulsion, centering, collision and radial banding,
/// then integrates with velocity decay while alpha decays toward its target.
pub struct Simulation {
    config: ForceConfig,
    canvas: Canvas,
    alpha: f64,
    alpha_target: f64,
    bodies: Vec<Body>,
    springs: Vec<Spring>,
    running: bool,
}

impl Simulation {
    pub fn new(config: ForceConfig, canvas: Canvas) -> Self {
        Self {
            config,
            canvas,
            alpha: 1.0,
            alpha_target: 0.0,
            bodies: Vec::new(),
            springs: Vec::new(),
            running: true,
        }
    }

    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn set_canvas(&mut self, canvas: Canvas) -> Result<(), LayoutError> {
        canvas.validate()?;
        self.canvas = canvas;
        self.reheat();
        Ok(())
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    /// Level alpha decays toward. Raised while the user drags a node.
    pub fn set_alpha_target(&mut self, target: f64) {
        self.alpha_target = target.clamp(0.0, 1.0);
    }

    /// Bring the energy back up so recently changed nodes can settle.
    pub fn reheat(&mut self) {
        self.alpha = self.alpha.max(self.config.reheat_alpha);
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_settled(&self) -> bool {
        self.alpha < self.config.alpha_min && self.alpha_target < self.config.alpha_min
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn velocity(&self, id: &str) -> Option<(f64, f64)> {
        self.bodies
            .iter()
            .find(|b| b.id == id)
            .map(|b| (b.vx, b.vy))
    }

    /// Replace the node and edge set, keeping the velocity of every node
    /// whose id was already present. New nodes start at rest.
    pub fn reseed<N: LayoutNode, E: LayoutEdge>(
        &mut self,
        nodes: &[N],
        edges: &[E],
    ) -> Result<(), LayoutError> {
        let n = nodes.len();
        for (index, edge) in edges.iter().enumerate() {
            for node in [edge.source(), edge.target()] {
                if node >= n {
                    return Err(LayoutError::InvalidEdgeIndex { index, node });
                }
            }
        }

        let previous: HashMap<&str, (f64, f64)> = self
            .bodies
            .iter()
            .map(|b| (b.id.as_str(), (b.vx, b.vy)))
            .collect();

        let bodies: Vec<Body> = nodes
            .iter()
            .map(|node| {
                let (vx, vy) = previous.get(node.id()).copied().unwrap_or((0.0, 0.0));
                Body {
                    id: node.id().to_string(),
                    role: node.role(),
                    band: node.band(),
                    vx,
                    vy,
                }
            })
            .collect();
        let retained = bodies
            .iter()
            .filter(|b| previous.contains_key(b.id.as_str()))
            .count();

        let mut degree = vec![0usize; n];
        for edge in edges {
            degree[edge.source()] += 1;
            degree[edge.target()] += 1;
        }
        let springs = edges
            .iter()
            .filter(|e| e.source() != e.target())
            .map(|e| {
                let (s, t) = (e.source(), e.target());
                Spring {
                    source: s,
                    target: t,
                    rest_length: self.config.rest_length(bodies[s].role, bodies[t].role),
                    bias: degree[s] as f64 / (degree[s] + degree[t]) as f64,
                }
            })
            .collect();

        trace!(nodes = n, retained, edges = edges.len(), "reseeded simulation");
        self.bodies = bodies;
        self.springs = springs;
        self.reheat();
        Ok(())
    }

    /// Advance the simulation one step, writing new positions onto `nodes`.
    ///
    /// `nodes` must be the same set, in the same order, as the last reseed.
    pub fn tick<N: LayoutNode>(&mut self, nodes: &mut [N]) -> Result<TickReport, LayoutError> {
        if nodes.len() != self.bodies.len() {
            return Err(LayoutError::NodeCountMismatch {
                expected: self.bodies.len(),
                actual: nodes.len(),
            });
        }
        for (index, (node, body)) in nodes.iter().zip(&self.bodies).enumerate() {
            if node.id() != body.id {
                return Err(LayoutError::StaleNode {
                    index,
                    expected: body.id.clone(),
                    actual: node.id().to_string(),
                });
            }
        }
        if !self.running || nodes.is_empty() {
            return Ok(self.report(0.0));
        }

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        let alpha = self.alpha;

        let start: Vec<Position> = nodes.iter().map(|n| n.position()).collect();
        let fixed: Vec<Option<Position>> = nodes.iter().map(|n| n.fixed()).collect();
        let mut xs: Vec<f64> = start.iter().map(|p| p.x).collect();
        let mut ys: Vec<f64> = start.iter().map(|p| p.y).collect();

        self.apply_links(&xs, &ys, alpha);
        self.apply_charge(&xs, &ys, alpha);
        self.apply_center(&mut xs, &mut ys, &fixed);
        self.apply_collide(&xs, &ys);
        self.apply_radial(&xs, &ys, alpha);

        // Integrate
        let keep = 1.0 - self.config.velocity_decay;
        let max_step = self.config.max_step;
        let mut max_displacement = 0.0f64;
        for (i, node) in nodes.iter_mut().enumerate() {
            let body = &mut self.bodies[i];
            let next = match fixed[i] {
                Some(pos) => {
                    body.vx = 0.0;
                    body.vy = 0.0;
                    pos
                }
                None => {
                    body.vx *= keep;
                    body.vy *= keep;
                    let speed = (body.vx * body.vx + body.vy * body.vy).sqrt();
                    if max_step > 0.0 && speed > max_step {
                        let s = max_step / speed;
                        body.vx *= s;
                        body.vy *= s;
                    }
                    Position::new(xs[i] + body.vx, ys[i] + body.vy)
                }
            };
            max_displacement = max_displacement.max(next.distance(&start[i]));
            node.set_position(next);
        }

        Ok(self.report(max_displacement))
    }

    fn report(&self, max_displacement: f64) -> TickReport {
        TickReport {
            alpha: self.alpha,
            max_displacement,
            settled: self.is_settled(),
        }
    }

    fn apply_links(&mut self, xs: &[f64], ys: &[f64], alpha: f64) {
        let strength = self.config.link_strength;
        for spring in &self.springs {
            let (s, t) = (spring.source, spring.target);
            let mut dx = xs[t] + self.bodies[t].vx - xs[s] - self.bodies[s].vx;
            let mut dy = ys[t] + self.bodies[t].vy - ys[s] - self.bodies[s].vy;
            if dx == 0.0 && dy == 0.0 {
                dx = JIGGLE;
            }
            let l = (dx * dx + dy * dy).sqrt();
            let k = (l - spring.rest_length) / l * alpha * strength;
            dx *= k;
            dy *= k;
            self.bodies[t].vx -= dx * spring.bias;
            self.bodies[t].vy -= dy * spring.bias;
            self.bodies[s].vx += dx * (1.0 - spring.bias);
            self.bodies[s].vy += dy * (1.0 - spring.bias);
        }
    }

    fn apply_charge(&mut self, xs: &[f64], ys: &[f64], alpha: f64) {
        let max2 = self.config.charge_distance_max.powi(2);
        let min2 = self.config.charge_distance_min.powi(2);
        let grid = Grid::build(xs, ys, self.config.charge_distance_max);
        let charges: Vec<f64> = self
            .bodies
            .iter()
            .map(|b| self.config.role(b.role).charge)
            .collect();

        for i in 0..xs.len() {
            let (mut fx, mut fy) = (0.0, 0.0);
            for j in grid.near(xs[i], ys[i]) {
                if j == i {
                    continue;
                }
                let mut dx = xs[j] - xs[i];
                let dy = ys[j] - ys[i];
                let mut l = dx * dx + dy * dy;
                if l >= max2 {
                    continue;
                }
                if l == 0.0 {
                    dx = if j > i { JIGGLE } else { -JIGGLE };
                    l = dx * dx;
                }
                if l < min2 {
                    l = (min2 * l).sqrt();
                }
                let w = charges[j] * alpha / l;
                fx += dx * w;
                fy += dy * w;
            }
            self.bodies[i].vx += fx;
            self.bodies[i].vy += fy;
        }
    }

    /// Shift free nodes so their centroid drifts toward the canvas centre.
    fn apply_center(&self, xs: &mut [f64], ys: &mut [f64], fixed: &[Option<Position>]) {
        let free: Vec<usize> = (0..xs.len()).filter(|&i| fixed[i].is_none()).collect();
        if free.is_empty() {
            return;
        }
        let n = free.len() as f64;
        let center = self.canvas.center();
        let strength = self.config.center_strength;
        let sx = (free.iter().map(|&i| xs[i]).sum::<f64>() / n - center.x) * strength;
        let sy = (free.iter().map(|&i| ys[i]).sum::<f64>() / n - center.y) * strength;
        for i in free {
            xs[i] -= sx;
            ys[i] -= sy;
        }
    }

    fn apply_collide(&mut self, xs: &[f64], ys: &[f64]) {
        let strength = self.config.collide_strength;
        let radii: Vec<f64> = self
            .bodies
            .iter()
            .map(|b| self.config.role(b.role).collide_radius)
            .collect();
        let largest = radii.iter().copied().fold(0.0f64, f64::max);
        let grid = Grid::build(xs, ys, largest * 2.0);

        for i in 0..xs.len() {
            let ri = radii[i];
            let ri2 = ri * ri;
            let xi = xs[i] + self.bodies[i].vx;
            let yi = ys[i] + self.bodies[i].vy;
            for j in grid.near(xs[i], ys[i]) {
                if j <= i {
                    continue;
                }
                let rj = radii[j];
                let r = ri + rj;
                let mut dx = xi - xs[j] - self.bodies[j].vx;
                let dy = yi - ys[j] - self.bodies[j].vy;
                let mut l = dx * dx + dy * dy;
                if l >= r * r {
                    continue;
                }
                if l == 0.0 {
                    dx = JIGGLE;
                    l = dx * dx;
                }
                let l = l.sqrt();
                let k = (r - l) / l * strength;
                let (px, py) = (dx * k, dy * k);
                let share = (rj * rj) / (ri2 + rj * rj);
                self.bodies[i].vx += px * share;
                self.bodies[i].vy += py * share;
                self.bodies[j].vx -= px * (1.0 - share);
                self.bodies[j].vy -= py * (1.0 - share);
            }
        }
    }

    fn apply_radial(&mut self, xs: &[f64], ys: &[f64], alpha: f64) {
        let center = self.canvas.center();
        for (i, body) in self.bodies.iter_mut().enumerate() {
            let dx = xs[i] - center.x;
            let dy = ys[i] - center.y;
            let r = (dx * dx + dy * dy).sqrt().max(JIGGLE);
            let target = self.canvas.band_radius(body.band);
            let k = (target - r) * self.config.role(body.role).radial_strength * alpha / r;
            body.vx += dx * k;
            body.vy += dy * k;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Dot {
        id: String,
        role: NodeRole,
        band: usize,
        pos: Position,
        fixed: Option<Position>,
    }

    impl LayoutNode for Dot {
        fn id(&self) -> &str {
            &self.id
        }
        fn role(&self) -> NodeRole {
            self.role
        }
        fn band(&self) -> usize {
            self.band
        }
        fn position(&self) -> Position {
            self.pos
        }
        fn set_position(&mut self, pos: Position) {
            self.pos = pos;
        }
        fn fixed(&self) -> Option<Position> {
            self.fixed
        }
    }

    fn dot(id: &str, role: NodeRole, x: f64, y: f64) -> Dot {
        Dot {
            id: id.to_string(),
            role,
            band: 0,
            pos: Position::new(x, y),
            fixed: None,
        }
    }

    #[test]
    fn test_alpha_decays_toward_target() {
        let mut sim = Simulation::new(ForceConfig::default(), Canvas::default());
        let mut nodes = vec![dot("a", NodeRole::Hub, 640.0, 280.0)];
        sim.reseed(&nodes, &[] as &[(usize, usize)]).unwrap();

        let report = sim.tick(&mut nodes).unwrap();
        assert!((report.alpha - 0.98).abs() < 1e-9);
        assert!(!report.settled);
    }

    #[test]
    fn test_fixed_node_does_not_move() {
        let mut sim = Simulation::new(ForceConfig::default(), Canvas::default());
        let mut nodes = vec![
            dot("a", NodeRole::Hub, 600.0, 400.0),
            dot("b", NodeRole::Leaf, 605.0, 400.0),
        ];
        nodes[0].fixed = Some(Position::new(600.0, 400.0));
        sim.reseed(&nodes, &[(0usize, 1usize)]).unwrap();

        for _ in 0..50 {
            sim.tick(&mut nodes).unwrap();
        }
        assert_eq!(nodes[0].pos, Position::new(600.0, 400.0));
        assert_eq!(sim.velocity("a"), Some((0.0, 0.0)));
        assert!(nodes[1].pos.distance(&nodes[0].pos) > 5.0);
    }

    #[test]
    fn test_reseed_keeps_velocity_of_retained_nodes() {
        let mut sim = Simulation::new(ForceConfig::default(), Canvas::default());
        let mut nodes = vec![
            dot("a", NodeRole::Hub, 500.0, 400.0),
            dot("b", NodeRole::Hub, 510.0, 400.0),
        ];
        sim.reseed(&nodes, &[] as &[(usize, usize)]).unwrap();
        sim.tick(&mut nodes).unwrap();
        let before = sim.velocity("a").unwrap();
        assert_ne!(before, (0.0, 0.0));

        nodes.push(dot("c", NodeRole::Leaf, 700.0, 400.0));
        sim.reseed(&nodes, &[(0usize, 2usize)]).unwrap();
        assert_eq!(sim.velocity("a"), Some(before));
        assert_eq!(sim.velocity("c"), Some((0.0, 0.0)));
    }

    #[test]
    fn test_reseed_rejects_dangling_edge() {
        let mut sim = Simulation::new(ForceConfig::default(), Canvas::default());
        let nodes = vec![dot("a", NodeRole::Hub, 0.0, 0.0)];
        let err = sim.reseed(&nodes, &[(0usize, 3usize)]).unwrap_err();
        assert_eq!(err, LayoutError::InvalidEdgeIndex { index: 0, node: 3 });
    }

    #[test]
    fn test_tick_rejects_stale_node_set() {
        let mut sim = Simulation::new(ForceConfig::default(), Canvas::default());
        let nodes = vec![dot("a", NodeRole::Hub, 0.0, 0.0)];
        sim.reseed(&nodes, &[] as &[(usize, usize)]).unwrap();

        let mut other = vec![dot("z", NodeRole::Hub, 0.0, 0.0)];
        assert!(matches!(
            sim.tick(&mut other),
            Err(LayoutError::StaleNode { index: 0, .. })
        ));
        let mut longer = vec![dot("a", NodeRole::Hub, 0.0, 0.0), dot("b", NodeRole::Hub, 1.0, 0.0)];
        assert!(matches!(
            sim.tick(&mut longer),
            Err(LayoutError::NodeCountMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_stopped_simulation_is_inert() {
        let mut sim = Simulation::new(ForceConfig::default(), Canvas::default());
        let mut nodes = vec![dot("a", NodeRole::Hub, 10.0, 10.0)];
        sim.reseed(&nodes, &[] as &[(usize, usize)]).unwrap();
        assert!(sim.is_running());
        sim.stop();
        assert!(!sim.is_running());

        let report = sim.tick(&mut nodes).unwrap();
        assert_eq!(report.max_displacement, 0.0);
        assert_eq!(nodes[0].pos, Position::new(10.0, 10.0));
    }

    #[test]
    fn test_step_is_clamped() {
        let config = ForceConfig {
            max_step: 2.0,
            ..Default::default()
        };
        let mut sim = Simulation::new(config, Canvas::default());
        let mut nodes = vec![
            dot("a", NodeRole::Hub, 640.0, 400.0),
            dot("b", NodeRole::Hub, 640.5, 400.0),
        ];
        sim.reseed(&nodes, &[] as &[(usize, usize)]).unwrap();
        let start = nodes[0].pos;
        sim.tick(&mut nodes).unwrap();
        // Centering shifts positions before the velocity step.
        assert!(nodes[0].pos.distance(&start) <= 2.0 + 1.0);
    }
}
