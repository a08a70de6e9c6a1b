/*!
# Outer Solver

The outer loop drives the whole engine. Starting from an even mix of overlap
and energy continuity (tolerance 0.5), each iteration partitions the
similarity graph, merges every sample into a cluster, compiles the output
arrays, and re-grades them with the directional continuity test — which also
rebuilds the graph around whatever still looks wrong, so the next iteration
re-clusters exactly those regions with a lower mixing tolerance.

After every iteration the leading run of healthy bands is counted: scanning
from band 0, a band stays healthy while its score has not regressed below
the best seen and its unsolved count has not grown. The best result by that
measure is memoized and restored whenever an iteration makes things worse,
and again when the loop terminates.
*/

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::components::merge::merge_samples;
use crate::components::partition::partition_components;
use crate::core::error::{BandtangleError, Result};
use crate::core::io::Outcome;
use crate::core::types::signal;
use crate::material::Material;
use crate::output::compile_output;
use crate::report;
use crate::signal::correct_signals;

/// Tunables of one clustering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Lowest band of the clustering window.
    pub min_band: usize,
    /// Highest band of the clustering window (inclusive); `None` keeps all.
    pub max_band: Option<usize>,
    /// Overlap tolerance for similarity-graph edges.
    pub tol: f64,
    /// Amount by which each outer iteration relaxes the mixing tolerance.
    pub step: f64,
    /// Mixing tolerance below which the outer loop stops.
    pub min_tol: f64,
    /// Seed for the degenerate-repair RNG; `None` draws one from entropy.
    pub seed: Option<u64>,
    /// Fraction of the grid above which a band's error mask is dilated.
    pub mask_density: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            min_band: 0,
            max_band: None,
            tol: 0.95,
            step: 0.1,
            min_tol: 0.0,
            seed: Some(42),
            mask_density: 0.05,
        }
    }
}

/// Mutable output arrays threaded through the outer iterations.
///
/// `bands_final` and `signal_final` persist across iterations; a looser
/// iteration's assignments survive until something overwrites them.
#[derive(Debug, Clone)]
pub struct SolverState {
    pub bands_final: Array2<i32>,
    pub signal_final: Array2<i8>,
    pub correct_signal: Array2<i8>,
    pub correct_signal_prev: Array2<i8>,
    pub final_score: Array1<f64>,
    pub degenerate_final: Vec<[usize; 3]>,
}

impl SolverState {
    fn new(nks: usize, total_bands: usize) -> Self {
        Self {
            bands_final: Array2::from_elem((nks, total_bands), -1),
            signal_final: Array2::zeros((nks, total_bands)),
            correct_signal: Array2::zeros((nks, total_bands)),
            correct_signal_prev: Array2::from_elem((nks, total_bands), -1),
            final_score: Array1::zeros(total_bands),
            degenerate_final: Vec::new(),
        }
    }
}

fn column_count(signals: &Array2<i8>, bn: usize, value: i8) -> usize {
    signals.column(bn).iter().filter(|&&s| s == value).count()
}

impl Material {
    /// Runs the tolerance-relaxing outer loop and returns the best result.
    pub fn solve(&mut self) -> Result<Outcome> {
        if self.graph().is_none() {
            return Err(BandtangleError::invalid_argument(
                "make_connections must run before solve",
            ));
        }
        let nks = self.grid().nks();
        let total_bands = self.total_bands();
        let step = self.options().step;
        let min_tol = self.options().min_tol;

        let mut state = SolverState::new(nks, total_bands);
        let mut best_bands = state.bands_final.clone();
        let mut best_signal = state.signal_final.clone();
        let mut best_score = Array1::<f64>::zeros(total_bands);
        let mut best_degenerate = state.degenerate_final.clone();
        let mut max_solved = 0usize;

        let mut prev_bands = state.bands_final.clone();
        let mut tol = 0.5;
        let mut changed = true;

        while changed && tol >= min_tol {
            info!("clustering samples for tolerance {:.2}", tol);
            let mut partition = partition_components(self.graph().expect("graph is set"), self);
            merge_samples(&mut partition, self, tol);
            info!(
                "phase 2: {}/{} solved",
                partition.solved.len(),
                self.window_bands()
            );

            state.degenerate_final = compile_output(
                &partition,
                self,
                &mut state.bands_final,
                &mut state.signal_final,
                &mut state.final_score,
            );
            report::log_band_grids(&state.bands_final, self);

            // Unsolved counts of the previous iteration's corrected signal.
            let prev_unsolved: Vec<usize> = (0..total_bands)
                .map(|bn| column_count(&state.correct_signal, bn, signal::NOT_SOLVED))
                .collect();
            let graph = correct_signals(&mut state, self);
            self.replace_graph(graph);

            changed = state.bands_final != prev_bands;
            prev_bands.assign(&state.bands_final);

            let mut solved = 0usize;
            for bn in 0..total_bands {
                let unsolved = column_count(&state.correct_signal, bn, signal::NOT_SOLVED);
                if state.final_score[bn] >= best_score[bn] && unsolved <= prev_unsolved[bn] {
                    solved += 1;
                } else {
                    break;
                }
            }

            if solved >= max_solved {
                best_bands.assign(&state.bands_final);
                best_signal.assign(&state.signal_final);
                best_score.assign(&state.final_score);
                best_degenerate = state.degenerate_final.clone();
                max_solved = solved;
                debug!("snapshot kept: {} leading bands healthy", solved);
            } else {
                debug!("result regressed; restoring best and re-grading");
                state.bands_final.assign(&best_bands);
                state.signal_final.assign(&best_signal);
                state.final_score.assign(&best_score);
                state.degenerate_final = best_degenerate.clone();
                let graph = correct_signals(&mut state, self);
                self.replace_graph(graph);
            }
            tol -= step;
        }

        state.bands_final.assign(&best_bands);
        state.signal_final.assign(&best_signal);
        state.final_score.assign(&best_score);
        state.degenerate_final = best_degenerate;

        let report = report::signaling_report(&state.correct_signal, &state.final_score, self);
        info!("{}", report);

        let mut degenerate_final = Array2::<i32>::zeros((state.degenerate_final.len(), 3));
        for (row, entry) in state.degenerate_final.iter().enumerate() {
            for (col, &value) in entry.iter().enumerate() {
                degenerate_final[[row, col]] = value as i32;
            }
        }

        Ok(Outcome {
            bands_final: state.bands_final,
            signal_final: state.signal_final,
            correct_signal: state.correct_signal,
            degenerate_final,
            final_score: state.final_score,
            report,
        })
    }
}
