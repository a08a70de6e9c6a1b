/*!
# Signal Correction

Re-grades ambiguous assignments with a directional energy-continuity test and
rebuilds the similarity graph around the regions that still look wrong, so
the next outer-loop iteration can repair them.

For each point graded `POTENTIAL_CORRECT` or `POTENTIAL_MISTAKE`, a quadratic
is fitted through the already-assigned points along each cardinal direction;
a direction whose extrapolation singles out the point's own energy counts as
continuous. Four continuous directions upgrade the point, zero condemn it.

Points graded `MISTAKE`, and points stuck at `OTHER` for two consecutive
iterations, form the error mask. Dense masks are dilated with a 3x3 window.
The rebuilt graph connects the unmasked region along forward bonds only and
leaves masked nodes isolated, turning them into samples for the next merge
pass.
*/

use std::collections::HashSet;

use ndarray::Array2;
use tracing::debug;

use crate::core::types::{FORWARD_STEPS, Kpoint, N_NEIGS, NEIGHBOR_STEPS, signal};
use crate::fit::{closeness_ratio, fit_quadratic};
use crate::graph::types::BandGraph;
use crate::material::Material;
use crate::solver::SolverState;

/// Tolerance above which a direction counts as energy-continuous.
const CONTINUITY_TOL: f64 = 0.9;

/// Points per direction used for the continuity fit.
const N_FIT: usize = 4;

/// Directional energy-continuity grade of one assigned point.
///
/// Returns the corrected signal and the per-direction continuity flags in
/// the (Down, Right, Up, Left) order.
pub fn evaluate_point(
    material: &Material,
    bands_final: &Array2<i32>,
    k: Kpoint,
    bn: usize,
) -> (i8, [u8; N_NEIGS]) {
    let grid = material.grid();
    let total_bands = material.total_bands();
    let original = bands_final[[k, bn]].max(0) as usize;
    let e_k = material.eigenvalue(k, original);
    let (ik, jk) = grid.coords(k);

    let mut flags = [0u8; N_NEIGS];
    for (d, &(di, dj)) in NEIGHBOR_STEPS.iter().enumerate() {
        // Up to four assigned points along this direction.
        let mut points: Vec<(usize, usize, Kpoint)> = Vec::with_capacity(N_FIT);
        for t in 1..=N_FIT as isize {
            let Some(kp) = grid.kid_checked(ik as isize + t * di, jk as isize + t * dj) else {
                continue;
            };
            if bands_final[[kp, bn]] >= 0 {
                let (i, j) = grid.coords(kp);
                points.push((i, j, kp));
            }
        }

        let candidates = || (0..total_bands).map(|b| material.eigenvalue(k, b));
        let nearest = |points: &[(usize, usize, Kpoint)]| {
            let kp = points[0].2;
            let e_neig = material.eigenvalue(kp, bands_final[[kp, bn]] as usize);
            closeness_ratio(e_neig, e_k, candidates())
        };

        let value = if points.is_empty() {
            // Nothing to contradict the assignment in this direction.
            1.0
        } else if points.len() <= 3 {
            nearest(&points)
        } else {
            let along_i = di != 0;
            let xs: Vec<f64> = points
                .iter()
                .map(|&(i, j, _)| if along_i { i as f64 } else { j as f64 })
                .collect();
            let ys: Vec<f64> = points
                .iter()
                .map(|&(_, _, kp)| material.eigenvalue(kp, bands_final[[kp, bn]] as usize))
                .collect();
            let new_x = if along_i { ik as f64 } else { jk as f64 };
            match fit_quadratic(&xs, &ys) {
                Some(q) => closeness_ratio(q.eval(new_x), e_k, candidates()),
                None => nearest(&points),
            }
        };
        flags[d] = (value > CONTINUITY_TOL) as u8;
    }

    let continuous: u8 = flags.iter().sum();
    let graded = if continuous as usize == N_NEIGS {
        signal::FIT_CORRECT
    } else if continuous == 0 {
        signal::MISTAKE
    } else {
        signal::FIT_OTHER
    };
    (graded, flags)
}

/// Dilates a boolean grid mask with a 3x3 any-neighbor window.
fn dilate(mask: &Array2<bool>) -> Array2<bool> {
    let (nkx, nky) = mask.dim();
    Array2::from_shape_fn((nkx, nky), |(i, j)| {
        (-1..=1isize).any(|di| {
            (-1..=1isize).any(|dj| {
                let (ii, jj) = (i as isize + di, j as isize + dj);
                ii >= 0
                    && jj >= 0
                    && (ii as usize) < nkx
                    && (jj as usize) < nky
                    && mask[[ii as usize, jj as usize]]
            })
        })
    })
}

/// Re-grades the current signals and rebuilds the graph around the error
/// regions. Returns the filtered graph for the next partitioning pass.
pub fn correct_signals(state: &mut SolverState, material: &Material) -> BandGraph {
    let grid = material.grid();
    let (nkx, nky) = (grid.nkx(), grid.nky());
    let nks = grid.nks();
    let total_bands = material.total_bands();
    let min_band = material.min_band();
    let max_band = material.max_band();

    // Unify the scale: plain CORRECT becomes the corrected maximum.
    let mut corrected = state.signal_final.clone();
    corrected.mapv_inplace(|s| if s == signal::CORRECT { signal::FIT_CORRECT } else { s });

    for k in 0..nks {
        for bn in 0..total_bands {
            let current = state.signal_final[[k, bn]];
            if current != signal::POTENTIAL_CORRECT && current != signal::POTENTIAL_MISTAKE {
                continue;
            }
            if state.bands_final[[k, bn]] < 0 {
                continue;
            }
            let (graded, flags) = evaluate_point(material, &state.bands_final, k, bn);
            corrected[[k, bn]] = graded;
            debug!(
                "k point {} band {}: new signal {} directions {:?}",
                k, bn, graded, flags
            );
        }
    }

    // Error mask: confirmed mistakes plus points stuck at OTHER since the
    // previous iteration.
    let mut masked: Vec<(Kpoint, usize)> = Vec::new();
    for k in 0..nks {
        for bn in 0..total_bands {
            let value = corrected[[k, bn]];
            if value == signal::MISTAKE
                || (value == signal::FIT_OTHER
                    && state.correct_signal_prev[[k, bn]] == signal::FIT_OTHER)
            {
                masked.push((k, bn));
            }
        }
    }

    let degenerate_ks: HashSet<Kpoint> =
        state.degenerate_final.iter().map(|row| row[0]).collect();
    let density_limit = nks as f64 * material.options().mask_density;

    let mut graph = BandGraph::new(material.node_count());
    for bn in min_band..=max_band {
        let mut mask = Array2::from_elem((nkx, nky), false);
        let mut count = 0usize;
        for &(k, mbn) in &masked {
            if mbn == bn {
                let (i, j) = grid.coords(k);
                mask[[i, j]] = true;
                count += 1;
            }
        }
        let identify = if count as f64 > density_limit {
            dilate(&mask)
        } else {
            mask
        };

        for j in 0..nky {
            for i in 0..nkx {
                let kp = grid.kid(i, j);
                if identify[[i, j]] && !degenerate_ks.contains(&kp) {
                    continue;
                }
                for &(di, dj) in &FORWARD_STEPS {
                    let (ii, jj) = (i as isize + di, j as isize + dj);
                    let Some(kn) = grid.kid_checked(ii, jj) else {
                        continue;
                    };
                    if identify[[ii as usize, jj as usize]] {
                        continue;
                    }
                    let o1 = state.bands_final[[kp, bn]];
                    let o2 = state.bands_final[[kn, bn]];
                    if o1 < (min_band as i32)
                        || o1 > (max_band as i32)
                        || o2 < (min_band as i32)
                        || o2 > (max_band as i32)
                    {
                        continue;
                    }
                    graph.add_edge(
                        grid.node(o1 as usize - min_band, kp),
                        grid.node(o2 as usize - min_band, kn),
                    );
                }
            }
        }
    }

    state.correct_signal_prev = corrected.clone();
    state.correct_signal = corrected;
    graph
}
