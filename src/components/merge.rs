/*!
# Sample Absorption

The merger empties the sample list one component at a time. Every sample is
scored against every cluster that could absorb it; the best-scoring
(sample, cluster) pair merges, and a cluster that ends up covering the whole
grid is promoted to solved.

The score mixes the wavefunction overlap across the contact bonds with a
polynomial energy-continuity term: along the grid line through each boundary
bond, a quadratic fitted to the sample's energies should extrapolate to the
cluster's energy at the far side better than to any other band's. The mixing
weight is the outer-loop tolerance.
*/

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use tracing::{debug, info, warn};

use crate::components::component::Component;
use crate::components::partition::Partition;
use crate::core::types::{Band, Kpoint, N_NEIGS};
use crate::fit::{closeness_ratio, fit_quadratic};
use crate::material::Material;

/// Number of grid points used for the continuity fit.
const N_FIT: usize = 4;

/// Scores how close an (extrapolated) energy is to the cluster's band energy
/// at the target k-point, relative to every other band in the window.
fn difference_energy(
    material: &Material,
    bn1: Band,
    bn2: Band,
    from: (usize, usize),
    to: (usize, usize),
    extrapolated: Option<f64>,
) -> f64 {
    let e_i = extrapolated.unwrap_or_else(|| material.band_energy(bn1, from.0, from.1));
    let actual = material.band_energy(bn2, to.0, to.1);
    let candidates =
        (material.min_band()..=material.max_band()).map(|bn| material.band_energy(bn, to.0, to.1));
    closeness_ratio(e_i, actual, candidates)
}

/// Energy-continuity term for the bond `from -> to`.
///
/// Fits a quadratic through up to `N_FIT + 1` sample points on the straight
/// grid line through `from`, extending away from `to`, and evaluates it at
/// `to`. With fewer than four usable points the nearest-neighbor energy
/// ratio is used instead.
fn fit_energy(
    sample: &Component,
    material: &Material,
    bn1: Band,
    bn2: Band,
    from: (usize, usize),
    to: (usize, usize),
) -> f64 {
    let grid = material.grid();
    let (ik1, jk1) = from;
    let (ikn, jkn) = to;
    let vertical = ik1 == ikn;
    let step_i = (ik1 as isize - ikn as isize).signum();
    let step_j = (jk1 as isize - jkn as isize).signum();

    let mut points: Vec<(usize, usize, Kpoint)> = Vec::with_capacity(N_FIT + 1);
    for t in 0..=N_FIT as isize {
        let (i, j) = if vertical {
            (ik1 as isize, jk1 as isize + t * step_j)
        } else {
            (ik1 as isize + t * step_i, jk1 as isize)
        };
        let Some(k) = grid.kid_checked(i, j) else {
            continue;
        };
        if sample.contains_k(k) {
            points.push((i as usize, j as usize, k));
        }
    }
    if points.len() <= 3 {
        return difference_energy(material, bn1, bn2, from, to, None);
    }

    let min_band = material.min_band();
    let xs: Vec<f64> = points
        .iter()
        .map(|&(i, j, _)| if vertical { j as f64 } else { i as f64 })
        .collect();
    let ys: Vec<f64> = points
        .iter()
        .map(|&(i, j, k)| {
            let bn = sample.band_offset(k).unwrap_or(0) + min_band;
            material.band_energy(bn, i, j)
        })
        .collect();
    let new_x = if vertical { jkn as f64 } else { ikn as f64 };
    let extrapolated = fit_quadratic(&xs, &ys).map(|q| q.eval(new_x));
    difference_energy(material, bn1, bn2, from, to, extrapolated)
}

/// Similarity between a sample and a cluster: the mean, over the sample's
/// boundary bonds into the cluster's boundary, of
/// `tol * <psi_k|psi_k'> + (1 - tol) * fit_energy(k, k')`. The divisor is
/// the full bond count `|boundary| * 4`, missing bonds count as zero.
pub fn cluster_score(
    sample: &Component,
    cluster: &mut Component,
    material: &Material,
    tol: f64,
) -> f64 {
    if let Some(score) = cluster.cached_score(sample.id()) {
        return score;
    }
    let grid = material.grid();
    let min_band = material.min_band();
    let mut score = 0.0;
    for &k in sample.boundary() {
        let Some(offset) = sample.band_offset(k) else {
            continue;
        };
        let bn1 = offset + min_band;
        let from = grid.coords(k);
        for dir in 0..N_NEIGS {
            let Some(kn) = material.neighbor(k, dir) else {
                continue;
            };
            if !cluster.on_boundary(kn) {
                continue;
            }
            let Some(offset2) = cluster.band_offset(kn) else {
                continue;
            };
            let bn2 = offset2 + min_band;
            let connection = material.connection(k, dir, bn1, bn2);
            let energy = fit_energy(sample, material, bn1, bn2, from, grid.coords(kn));
            score += tol * connection + (1.0 - tol) * energy;
        }
    }
    score /= (sample.boundary().len() * N_NEIGS) as f64;
    cluster.store_score(sample.id(), score);
    score
}

/// Absorbs every sample into its best cluster, promoting clusters that cover
/// the whole grid to solved.
pub fn merge_samples(partition: &mut Partition, material: &Material, tol: f64) {
    let grid = material.grid();
    let total = partition.samples.len();
    let mut merged = 0usize;

    while !partition.samples.is_empty() {
        if partition.clusters.is_empty() {
            warn!("{} samples left but no clusters to absorb them", partition.samples.len());
            break;
        }

        // Best (score, cluster) per sample; scores are cached on the cluster
        // and survive until that cluster absorbs something.
        let samples = &partition.samples;
        let clusters = &mut partition.clusters;
        let evaluations: Vec<(f64, usize)> = samples
            .iter()
            .map(|sample| {
                let mut best = (0.0f64, 0usize);
                for (ci, cluster) in clusters.iter_mut().enumerate() {
                    if !cluster.validate(sample, &grid) {
                        continue;
                    }
                    let score = cluster_score(sample, cluster, material, tol);
                    if score > best.0 {
                        best = (score, ci);
                    }
                }
                best
            })
            .collect();

        // Highest score first; equal scores resolve to the lowest sample id.
        let pick = (0..partition.samples.len())
            .max_by_key(|&idx| {
                (
                    OrderedFloat(evaluations[idx].0),
                    Reverse(partition.samples[idx].id()),
                )
            })
            .expect("samples is non-empty");
        let (score, ci) = evaluations[pick];
        let sample = partition.samples.remove(pick);
        merged += 1;
        debug!(
            "{}/{} sample {} -> cluster {} (score {:.4})",
            merged,
            total,
            sample.id(),
            partition.clusters[ci].id(),
            score
        );
        partition.clusters[ci].join(sample, &grid);

        if partition.clusters[ci].is_solved(&grid) {
            info!("cluster {} solved", partition.clusters[ci].id());
            let solved = partition.clusters.remove(ci);
            partition.solved.push(solved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::partition::partition_components;
    use crate::core::io::InputBundle;
    use crate::material::Material;
    use crate::solver::SolverOptions;
    use ndarray::{Array2, Array4};

    /// 4x1 chain with two bands and identity overlaps, broken between kid 1
    /// and kid 2 on band 0.
    fn chain_material() -> Material {
        let nks = 4;
        let eigenvalues = Array2::from_shape_fn((nks, 2), |(k, b)| b as f64 + 0.01 * k as f64);
        let mut connections = Array4::zeros((nks, 4, 2, 2));
        // Down/Up along the chain (nkx = 4, nky = 1): dirs 0 and 2.
        let mut neighbors = Array2::from_elem((nks, 4), -1);
        for k in 0..nks as i32 {
            if k + 1 < nks as i32 {
                neighbors[[k as usize, 0]] = k + 1;
            }
            if k - 1 >= 0 {
                neighbors[[k as usize, 2]] = k - 1;
            }
        }
        for k in 0..nks {
            for dir in [0, 2] {
                if neighbors[[k, dir]] >= 0 {
                    connections[[k, dir, 0, 0]] = 1.0;
                    connections[[k, dir, 1, 1]] = 1.0;
                }
            }
        }
        // Weaken the 1 -> 2 bond on band 0 below the graph tolerance.
        connections[[1, 0, 0, 0]] = 0.5;
        connections[[2, 2, 0, 0]] = 0.5;
        let bundle = InputBundle::new(4, 1, eigenvalues, connections, neighbors).unwrap();
        let mut material = Material::new(4, 1, bundle, SolverOptions::default());
        material.make_vectors().unwrap();
        material.make_connections().unwrap();
        material
    }

    #[test]
    fn fragments_reunite_into_a_solved_band() {
        let material = chain_material();
        let mut partition = partition_components(material.graph().unwrap(), &material);
        assert_eq!(partition.solved.len(), 1);
        assert_eq!(partition.samples.len(), 1);
        merge_samples(&mut partition, &material, 0.5);
        assert!(partition.samples.is_empty());
        assert_eq!(partition.solved.len(), 2);
        assert!(partition.clusters.is_empty());
    }

    #[test]
    fn score_prefers_the_matching_band_cluster() {
        let material = chain_material();
        let mut partition = partition_components(material.graph().unwrap(), &material);
        let sample = partition.samples.pop().unwrap();
        let grid = material.grid();
        let compatible: Vec<f64> = partition
            .clusters
            .iter_mut()
            .filter(|c| c.validate(&sample, &grid))
            .map(|c| cluster_score(&sample, c, &material, 0.5))
            .collect();
        assert!(!compatible.is_empty());
        // One contact bond out of four: 0.5 * <i|j> plus the energy term,
        // averaged over |boundary| * 4.
        let best = compatible.iter().cloned().fold(0.0, f64::max);
        assert!(best > 0.15 && best < 0.5);
    }

    #[test]
    fn scores_are_cached_until_join() {
        let material = chain_material();
        let mut partition = partition_components(material.graph().unwrap(), &material);
        let sample = partition.samples.pop().unwrap();
        let cluster = &mut partition.clusters[0];
        let score = cluster_score(&sample, cluster, &material, 0.5);
        assert_eq!(cluster.cached_score(sample.id()), Some(score));
        let again = cluster_score(&sample, cluster, &material, 0.9);
        // Cached: the changed tolerance is not observed.
        assert_eq!(again, score);
    }
}
