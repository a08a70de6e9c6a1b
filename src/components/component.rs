/*!
# Connected Components

A `Component` is one connected subgraph of the similarity graph, viewed
through its footprint on the k-point grid: the set of k-points it touches, the
band offset it selects at each of them, a boolean occupancy mask, and the
boundary ring of that mask. The boundary is the component's contact surface —
merge scores only ever compare boundary k-points.

Each component also carries the merge-score cache: scores of candidate
samples keyed by their identity, invalidated wholesale whenever the component
absorbs a sample.
*/

use std::collections::{HashMap, HashSet};

use ndarray::Array2;

use crate::core::types::{Grid, Kpoint, Node};

/// Reflect indexing, matching `scipy.ndimage` boundary mode `reflect`.
fn reflect(idx: isize, len: usize) -> usize {
    let len = len as isize;
    let r = if idx < 0 {
        -idx - 1
    } else if idx >= len {
        2 * len - idx - 1
    } else {
        idx
    };
    r.clamp(0, len - 1) as usize
}

/// One connected component of the similarity graph.
#[derive(Debug, Clone)]
pub struct Component {
    nodes: Vec<Node>,
    id: Node,
    k_points: Vec<Kpoint>,
    k_set: HashSet<Kpoint>,
    band_offsets: HashMap<Kpoint, usize>,
    mask: Array2<bool>,
    boundary: Vec<Kpoint>,
    boundary_set: HashSet<Kpoint>,
    scores: HashMap<Node, f64>,
}

impl Component {
    /// Builds a component from its (sorted) node list.
    pub fn new(nodes: Vec<Node>, grid: &Grid) -> Self {
        let id = nodes.first().copied().unwrap_or(0);
        let mut component = Self {
            nodes,
            id,
            k_points: Vec::new(),
            k_set: HashSet::new(),
            band_offsets: HashMap::new(),
            mask: Array2::from_elem((grid.nkx(), grid.nky()), false),
            boundary: Vec::new(),
            boundary_set: HashSet::new(),
            scores: HashMap::new(),
        };
        component.recompute(grid);
        component
    }

    /// Identity used as the score-cache key: the smallest node id.
    pub fn id(&self) -> Node {
        self.id
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// K-points covered by this component, in node order.
    pub fn k_points(&self) -> &[Kpoint] {
        &self.k_points
    }

    pub fn contains_k(&self, k: Kpoint) -> bool {
        self.k_set.contains(&k)
    }

    /// Band offset selected at k-point `k`.
    pub fn band_offset(&self, k: Kpoint) -> Option<usize> {
        self.band_offsets.get(&k).copied()
    }

    /// Boundary k-points of the occupancy mask.
    pub fn boundary(&self) -> &[Kpoint] {
        &self.boundary
    }

    pub fn on_boundary(&self, k: Kpoint) -> bool {
        self.boundary_set.contains(&k)
    }

    /// True when the component covers the whole grid, fully specifying one
    /// physical band.
    pub fn is_solved(&self, grid: &Grid) -> bool {
        self.len() == grid.nks()
    }

    /// Merge-compatibility test: `other` fits into this component's k-mask
    /// complement and the two masks are disjoint.
    pub fn validate(&self, other: &Component, grid: &Grid) -> bool {
        // A fused component can hold more nodes than the grid has k-points.
        if other.len() as i64 > grid.nks() as i64 - self.len() as i64 {
            return false;
        }
        let xor = self
            .mask
            .iter()
            .zip(other.mask.iter())
            .filter(|(a, b)| a != b)
            .count();
        xor == self.len() + other.len()
    }

    /// Absorbs `other`: union of node sets and k-masks, boundary recomputed.
    /// The score cache is invalidated.
    pub fn join(&mut self, other: Component, grid: &Grid) {
        self.nodes.extend(other.nodes);
        self.scores.clear();
        self.recompute(grid);
    }

    /// Window band offsets present in the component, most common first.
    pub fn ranked_offsets(&self) -> Vec<usize> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for &offset in self.band_offsets.values() {
            *counts.entry(offset).or_insert(0) += 1;
        }
        let mut ranked: Vec<(usize, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.into_iter().map(|(offset, _)| offset).collect()
    }

    /// Cached merge score of the sample identified by `sample_id`.
    pub fn cached_score(&self, sample_id: Node) -> Option<f64> {
        self.scores.get(&sample_id).copied()
    }

    pub fn store_score(&mut self, sample_id: Node, score: f64) {
        self.scores.insert(sample_id, score);
    }

    fn recompute(&mut self, grid: &Grid) {
        let nks = grid.nks();
        self.k_points = self.nodes.iter().map(|&n| n % nks).collect();
        self.k_set = self.k_points.iter().copied().collect();
        self.band_offsets = self
            .nodes
            .iter()
            .map(|&n| (n % nks, n / nks))
            .collect();
        self.mask.fill(false);
        for &k in &self.k_points {
            let (i, j) = grid.coords(k);
            self.mask[[i, j]] = true;
        }
        self.calc_boundary(grid);
    }

    /// Marks the k-points whose occupancy-mask gradient is nonzero. An empty
    /// ring (fully interior mask) falls back to every covered k-point.
    fn calc_boundary(&mut self, grid: &Grid) {
        let (nkx, nky) = (grid.nkx(), grid.nky());
        self.boundary.clear();
        for j in 0..nky {
            for i in 0..nkx {
                if !self.mask[[i, j]] {
                    continue;
                }
                let mut gx = 0i32;
                let mut gy = 0i32;
                for d in -1..=1isize {
                    let row = reflect(i as isize + d, nkx);
                    let col = reflect(j as isize + d, nky);
                    gx += self.mask[[row, reflect(j as isize + 1, nky)]] as i32
                        - self.mask[[row, reflect(j as isize - 1, nky)]] as i32;
                    gy += self.mask[[reflect(i as isize + 1, nkx), col]] as i32
                        - self.mask[[reflect(i as isize - 1, nkx), col]] as i32;
                }
                if gx != 0 || gy != 0 {
                    self.boundary.push(grid.kid(i, j));
                }
            }
        }
        if self.boundary.is_empty() {
            self.boundary = self.k_points.clone();
        }
        self.boundary_set = self.boundary.iter().copied().collect();
    }
}
