/*!
# Material State

`Material` owns everything the engine knows about one physical system: the
input arrays, the k-point grid, and the derived tables the pipeline stages
share — the per-band energy tensor, the vector representation of every
(k-point, band) node, and the list of degenerate node pairs.

The intended call order mirrors the pipeline: [`Material::new`] validates the
inputs, [`Material::make_vectors`] builds the node set and finds degenerate
pairs, [`Material::make_connections`] builds the similarity graph, and
`Material::solve` (in [`crate::solver`]) runs the outer loop.
*/

use ndarray::{Array2, Array3, Array4};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::core::error::{BandtangleError, Result};
use crate::core::io::InputBundle;
use crate::core::parallel::fan_out;
use crate::core::types::{Band, Grid, Kpoint, Node};
use crate::core::validation::check_band_window;
use crate::graph::builder;
use crate::graph::types::BandGraph;
use crate::solver::SolverOptions;

/// Numpy-compatible closeness test, used to detect degenerate nodes.
fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// The physical system under analysis and the engine's working state.
#[derive(Debug)]
pub struct Material {
    grid: Grid,
    total_bands: usize,
    eigenvalues: Array2<f64>,
    connections: Array4<f64>,
    neighbors: Array2<i32>,
    options: SolverOptions,
    rng: StdRng,

    // Derived by make_vectors.
    min_band: usize,
    max_band: usize,
    band_energies: Array3<f64>,
    vectors: Vec<[f64; 3]>,
    degenerates: Vec<(Node, Node)>,

    // Derived by make_connections.
    graph: Option<BandGraph>,
    degenerates_unresolved: Vec<(Node, Node)>,
}

impl Material {
    /// Creates the engine state from a validated input bundle.
    pub fn new(nkx: usize, nky: usize, bundle: InputBundle, options: SolverOptions) -> Self {
        let rng = match options.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::seed_from_u64(rand::random::<u64>()),
        };
        Self {
            grid: Grid::new(nkx, nky),
            total_bands: bundle.eigenvalues.ncols(),
            eigenvalues: bundle.eigenvalues,
            connections: bundle.connections,
            neighbors: bundle.neighbors,
            options,
            rng,
            min_band: 0,
            max_band: 0,
            band_energies: Array3::zeros((0, 0, 0)),
            vectors: Vec::new(),
            degenerates: Vec::new(),
            graph: None,
            degenerates_unresolved: Vec::new(),
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Number of bands present in the input files.
    pub fn total_bands(&self) -> usize {
        self.total_bands
    }

    /// Lowest band of the clustering window.
    pub fn min_band(&self) -> usize {
        self.min_band
    }

    /// Highest band of the clustering window (inclusive).
    pub fn max_band(&self) -> usize {
        self.max_band
    }

    /// Width of the clustering window.
    pub fn window_bands(&self) -> usize {
        self.max_band - self.min_band + 1
    }

    /// Number of graph nodes.
    pub fn node_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn eigenvalue(&self, k: Kpoint, band: Band) -> f64 {
        self.eigenvalues[[k, band]]
    }

    /// Energy of `band` at grid coordinates `(i, j)`.
    pub fn band_energy(&self, band: Band, i: usize, j: usize) -> f64 {
        self.band_energies[[band, i, j]]
    }

    /// Overlap magnitude between `(k, b1)` and its `dir`-th neighbor at `b2`.
    pub fn connection(&self, k: Kpoint, dir: usize, b1: Band, b2: Band) -> f64 {
        self.connections[[k, dir, b1, b2]]
    }

    /// The `dir`-th cardinal neighbor of `k`, or `None` when missing.
    pub fn neighbor(&self, k: Kpoint, dir: usize) -> Option<Kpoint> {
        let n = self.neighbors[[k, dir]];
        (n >= 0).then_some(n as usize)
    }

    /// All degenerate node pairs found by the vectorizer.
    pub fn degenerate_pairs(&self) -> &[(Node, Node)] {
        &self.degenerates
    }

    /// Degenerate pairs the graph repair could not separate.
    pub fn unresolved_pairs(&self) -> &[(Node, Node)] {
        &self.degenerates_unresolved
    }

    pub fn graph(&self) -> Option<&BandGraph> {
        self.graph.as_ref()
    }

    pub(crate) fn replace_graph(&mut self, graph: BandGraph) {
        self.graph = Some(graph);
    }

    /// Builds the per-band energy tensor `[total_bands, nkx, nky]`.
    fn make_band_energies(&self) -> Array3<f64> {
        let (nkx, nky) = (self.grid.nkx(), self.grid.nky());
        Array3::from_shape_fn((self.total_bands, nkx, nky), |(bn, i, j)| {
            self.eigenvalues[[self.grid.kid(i, j), bn]]
        })
    }

    /// Builds the node set for the requested band window and detects
    /// degenerate pairs.
    ///
    /// Each node `n = offset * nks + kid` is represented by the vector
    /// `(i, j, E)`; two nodes whose vectors agree componentwise (within
    /// floating-point closeness) are recorded as a degenerate pair.
    pub fn make_vectors(&mut self) -> Result<()> {
        let min_band = self.options.min_band;
        let max_band = self.options.max_band.unwrap_or(self.total_bands - 1);
        check_band_window(min_band, max_band, self.total_bands)?;
        self.min_band = min_band;
        self.max_band = max_band;
        self.band_energies = self.make_band_energies();

        let nks = self.grid.nks();
        let n_vectors = (max_band - min_band + 1) * nks;
        self.vectors = (0..n_vectors)
            .map(|n| {
                let (offset, k) = self.grid.split_node(n);
                let (i, j) = self.grid.coords(k);
                (i as f64, j as f64, self.eigenvalues[[k, min_band + offset]])
            })
            .map(|(i, j, e)| [i, j, e])
            .collect();

        // Pairwise scan, fanned out over contiguous node ranges.
        let vectors = &self.vectors;
        self.degenerates = fan_out(n_vectors, |range| {
            let mut found = Vec::new();
            for n1 in range {
                let v1 = vectors[n1];
                for (offset, v2) in vectors[n1 + 1..].iter().enumerate() {
                    if is_close(v1[0], v2[0]) && is_close(v1[1], v2[1]) && is_close(v1[2], v2[2]) {
                        found.push((n1, n1 + 1 + offset));
                    }
                }
            }
            found
        });

        if !self.degenerates.is_empty() {
            info!("found {} degenerate node pairs", self.degenerates.len());
            for &(d1, d2) in &self.degenerates {
                debug!("degenerate pair: ({}, {})", d1, d2);
            }
        }
        Ok(())
    }

    /// Builds the similarity graph: one edge per neighbor bond whose overlap
    /// magnitude exceeds the tolerance, followed by the local repair of the
    /// topology around degenerate pairs.
    pub fn make_connections(&mut self) -> Result<()> {
        if self.vectors.is_empty() {
            return Err(BandtangleError::invalid_argument(
                "make_vectors must run before make_connections",
            ));
        }
        let mut graph = builder::enumerate_edges(self, self.options.tol);
        let nks = self.grid.nks();
        let degenerates = self.degenerates.clone();
        let unresolved = builder::repair_degenerates(&mut graph, nks, &degenerates, &mut self.rng);
        self.degenerates_unresolved = unresolved;
        info!(
            "similarity graph: {} nodes, {} edges, {} unresolved degeneracies",
            graph.node_count(),
            graph.edge_count(),
            self.degenerates_unresolved.len()
        );
        self.graph = Some(graph);
        Ok(())
    }
}
