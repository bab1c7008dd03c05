use std::collections::HashMap;

const NEIGHBORS: [(i32, i32); 9] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (0, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Uniform spatial hash over node positions.
///
/// Any two points closer than `cell` land in the same or adjacent cells, so
/// pair forces with a cutoff no larger than `cell` only need the 3x3 block
/// around each node.
pub(crate) struct Grid {
    cell: f64,
    bins: HashMap<(i32, i32), Vec<usize>>,
}

impl Grid {
    pub(crate) fn build(xs: &[f64], ys: &[f64], cell: f64) -> Self {
        let cell = if cell.is_finite() && cell > 0.0 { cell } else { 1.0 };
        let mut bins: HashMap<(i32, i32), Vec<usize>> = HashMap::with_capacity(xs.len() * 2);
        for (i, (&x, &y)) in xs.iter().zip(ys).enumerate() {
            bins.entry(key(x, y, cell)).or_default().push(i);
        }
        Grid { cell, bins }
    }

    /// Indices in the cells around `(x, y)`, including the node's own cell.
    pub(crate) fn near(&self, x: f64, y: f64) -> impl Iterator<Item = usize> + '_ {
        let (gx, gy) = key(x, y, self.cell);
        NEIGHBORS.iter().flat_map(move |(dx, dy)| {
            self.bins
                .get(&(gx.saturating_add(*dx), gy.saturating_add(*dy)))
                .into_iter()
                .flatten()
                .copied()
        })
    }
}

fn key(x: f64, y: f64, cell: f64) -> (i32, i32) {
    ((x / cell).floor() as i32, (y / cell).floor() as i32)
}
