/*!
# Output Compilation

Maps the partitioned components onto the final data structures: which
original band sits at each (k-point, physical band) slot, how trustworthy
each assignment looks from its realized neighbor overlaps, which loci carry
basis-rotation degeneracies, and the per-band quality score.

Solved components claim physical bands first, in discovery order; clusters
follow in descending size. Each component asks for its most common band
offset and walks down its offset ranking when the slot is taken. A cluster
with no offset left is discarded and its k-points stay unassigned.
*/

use std::collections::{HashMap, HashSet};

use ndarray::{Array1, Array2};
use tracing::{debug, warn};

use crate::components::Partition;
use crate::components::component::Component;
use crate::core::types::{Band, Kpoint, N_NEIGS, signal};
use crate::material::Material;

/// Grades an assignment from the overlap magnitudes realized against its
/// neighbors.
///
/// - mean above 0.9: [`signal::CORRECT`]
/// - mean in (0.8, 0.9]: [`signal::POTENTIAL_CORRECT`]
/// - mean in (0.2, 0.8]: [`signal::POTENTIAL_MISTAKE`]
/// - otherwise: [`signal::MISTAKE`]
pub fn evaluate_result(values: &[f64]) -> i8 {
    if values.is_empty() {
        return signal::MISTAKE;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean > 0.9 {
        signal::CORRECT
    } else if mean > 0.8 {
        signal::POTENTIAL_CORRECT
    } else if mean > 0.2 {
        signal::POTENTIAL_MISTAKE
    } else {
        signal::MISTAKE
    }
}

/// One basis-rotation locus: a k-point whose bonds toward `neighbor_ks` show
/// several target bands in the rotation range for the same physical band.
#[derive(Debug, Clone)]
struct RotationLocus {
    k: Kpoint,
    neighbor_ks: Vec<Kpoint>,
    band: usize,
    neighbor_bands: Vec<Vec<Band>>,
}

/// Writes a component's nodes and signals into the output arrays under the
/// claimed physical band.
fn emit_component(
    component: &Component,
    physical: usize,
    full_cover: bool,
    material: &Material,
    bands_final: &mut Array2<i32>,
    signal_final: &mut Array2<i8>,
) {
    let min_band = material.min_band();
    for &k in component.k_points() {
        let Some(offset) = component.band_offset(k) else {
            continue;
        };
        bands_final[[k, physical]] = (offset + min_band) as i32;
    }
    for &k in component.k_points() {
        let Some(offset) = component.band_offset(k) else {
            continue;
        };
        let bn1 = offset + min_band;
        let mut overlaps = Vec::with_capacity(N_NEIGS);
        for dir in 0..N_NEIGS {
            let Some(kn) = material.neighbor(k, dir) else {
                continue;
            };
            match component.band_offset(kn) {
                Some(offset2) => {
                    overlaps.push(material.connection(k, dir, bn1, offset2 + min_band));
                }
                // A bond leaving a partial cover counts as a dead bond; a
                // solved component simply has no such bonds to grade.
                None if !full_cover => overlaps.push(0.0),
                None => {}
            }
        }
        signal_final[[k, physical]] = evaluate_result(&overlaps);
    }
}

/// Claims the first free physical band from the component's offset ranking.
fn claim_slot(component: &Component, min_band: usize, used: &mut HashSet<usize>) -> Option<usize> {
    for offset in component.ranked_offsets() {
        let candidate = offset + min_band;
        if used.insert(candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Energy gap between the two physical bands of a degenerate candidate at
/// its k-point; infinite when either slot is unassigned.
fn rotation_gap(material: &Material, bands_final: &Array2<i32>, k: Kpoint, b1: usize, b2: usize) -> f64 {
    let o1 = bands_final[[k, b1]];
    let o2 = bands_final[[k, b2]];
    if o1 < 0 || o2 < 0 {
        return f64::INFINITY;
    }
    (material.eigenvalue(k, o1 as usize) - material.eigenvalue(k, o2 as usize)).abs()
}

/// Compiles `bands_final`, `signal_final`, the degenerate output rows, and
/// the per-band score from the current partition.
pub fn compile_output(
    partition: &Partition,
    material: &Material,
    bands_final: &mut Array2<i32>,
    signal_final: &mut Array2<i8>,
    final_score: &mut Array1<f64>,
) -> Vec<[usize; 3]> {
    let min_band = material.min_band();
    let mut used_bands: HashSet<usize> = HashSet::new();

    for component in &partition.solved {
        match claim_slot(component, min_band, &mut used_bands) {
            Some(physical) => {
                emit_component(component, physical, true, material, bands_final, signal_final);
            }
            None => warn!(
                "solved component {} found no free physical band",
                component.id()
            ),
        }
    }

    // Clusters claim slots in descending size.
    let mut cluster_order: Vec<usize> = (0..partition.clusters.len()).collect();
    cluster_order.sort_by(|&a, &b| partition.clusters[b].len().cmp(&partition.clusters[a].len()));
    for ci in cluster_order {
        let cluster = &partition.clusters[ci];
        match claim_slot(cluster, min_band, &mut used_bands) {
            Some(physical) => {
                emit_component(cluster, physical, false, material, bands_final, signal_final);
            }
            None => warn!(
                "cluster {} discarded: no physical band slot left",
                cluster.id()
            ),
        }
    }

    // Degenerate pairs keep their own signal, under whichever physical band
    // their original band landed in.
    let grid = material.grid();
    let nks = grid.nks();
    let total_bands = material.total_bands();
    let locate = |bands_final: &Array2<i32>, k: Kpoint, original: usize| -> usize {
        (0..total_bands)
            .find(|&bn| bands_final[[k, bn]] == original as i32)
            .unwrap_or(original)
    };
    for &(d1, d2) in material.degenerate_pairs() {
        for node in [d1, d2] {
            let (offset, k) = grid.split_node(node);
            let column = locate(bands_final, k, offset + min_band);
            signal_final[[k, column]] = signal::DEGENERATE;
        }
    }

    // Per-band score and basis-rotation scan.
    let mut loci: Vec<RotationLocus> = Vec::new();
    for bn in 0..total_bands {
        let mut score = 0.0;
        for k in 0..nks {
            if signal_final[[k, bn]] == signal::NOT_SOLVED {
                continue;
            }
            let original = bands_final[[k, bn]];
            if original < 0 {
                continue;
            }
            let original = original as usize;
            let bonds: Vec<(usize, Kpoint)> = (0..N_NEIGS)
                .filter_map(|dir| material.neighbor(k, dir).map(|kn| (dir, kn)))
                .filter(|&(_, kn)| {
                    signal_final[[kn, bn]] != signal::NOT_SOLVED && bands_final[[kn, bn]] >= 0
                })
                .collect();
            if bonds.is_empty() {
                continue;
            }
            let dps: Vec<f64> = bonds
                .iter()
                .map(|&(dir, kn)| {
                    material.connection(k, dir, original, bands_final[[kn, bn]] as usize)
                })
                .collect();
            if dps.iter().any(|&dp| (0.5..=0.8).contains(&dp)) {
                if let Some(locus) = detect_rotation(material, k, bn, original, &bonds) {
                    loci.push(locus);
                }
            }
            score += dps.iter().sum::<f64>() / dps.len() as f64;
        }
        final_score[bn] = score / nks as f64;
    }

    // Rotation loci first, then the unresolvable degenerate pairs mapped to
    // the physical columns their original bands landed in.
    let mut rows = fold_rotation_loci(material, bands_final, loci);
    let mut seen: HashSet<[usize; 3]> = rows.iter().copied().collect();
    for &(d1, d2) in material.unresolved_pairs() {
        let (o1, k) = grid.split_node(d1);
        let (o2, _) = grid.split_node(d2);
        let row = [
            k,
            locate(bands_final, k, o1 + min_band),
            locate(bands_final, k, o2 + min_band),
        ];
        if seen.insert(row) {
            rows.push(row);
        }
    }
    rows
}

/// Checks whether the bonds out of `(k, bn)` hit several target bands inside
/// the rotation range `[0.5, 0.8]` at the same neighbor k-point.
fn detect_rotation(
    material: &Material,
    k: Kpoint,
    bn: usize,
    original: Band,
    bonds: &[(usize, Kpoint)],
) -> Option<RotationLocus> {
    let total_bands = material.total_bands();
    let mut per_neighbor: HashMap<Kpoint, Vec<Band>> = HashMap::new();
    for &(dir, kn) in bonds {
        for b2 in 0..total_bands {
            if (0.5..=0.8).contains(&material.connection(k, dir, original, b2)) {
                per_neighbor.entry(kn).or_default().push(b2);
            }
        }
    }
    let mut rotated: Vec<(Kpoint, Vec<Band>)> = per_neighbor
        .into_iter()
        .filter(|(_, bands)| bands.len() > 1)
        .collect();
    if rotated.is_empty() {
        return None;
    }
    rotated.sort_by_key(|&(kn, _)| kn);
    let (neighbor_ks, neighbor_bands) = rotated.into_iter().unzip();
    Some(RotationLocus {
        k,
        neighbor_ks,
        band: bn,
        neighbor_bands,
    })
}

/// Folds loci that agree on the k-point and neighbor pattern into degenerate
/// rows `(kid, band1, band2)`, keeping the candidate with the smaller energy
/// gap when several band pairs compete for the same k-point.
fn fold_rotation_loci(
    material: &Material,
    bands_final: &Array2<i32>,
    loci: Vec<RotationLocus>,
) -> Vec<[usize; 3]> {
    let mut degenerates: Vec<[usize; 3]> = Vec::new();
    for (idx, a) in loci.iter().enumerate() {
        for b in loci.iter().skip(idx + 1) {
            if a.k != b.k || a.neighbor_ks != b.neighbor_ks {
                continue;
            }
            let contained = a
                .neighbor_bands
                .iter()
                .zip(&b.neighbor_bands)
                .all(|(ba, bb)| ba.iter().all(|band| bb.contains(band)));
            if !contained {
                continue;
            }
            let mut fresh = true;
            for entry in degenerates.iter_mut() {
                let same_pair = entry[0] == a.k
                    && (entry[1] == a.band || entry[2] == a.band)
                    && (entry[1] == b.band || entry[2] == b.band);
                if !same_pair {
                    continue;
                }
                fresh = false;
                let old_gap = rotation_gap(material, bands_final, entry[0], entry[1], entry[2]);
                let new_gap = rotation_gap(material, bands_final, a.k, a.band, b.band);
                if new_gap < old_gap {
                    debug!(
                        "rotation tiebreak at k {}: ({}, {}) replaces ({}, {})",
                        a.k, a.band, b.band, entry[1], entry[2]
                    );
                    *entry = [a.k, a.band, b.band];
                }
            }
            if fresh {
                degenerates.push([a.k, a.band, b.band]);
            }
        }
    }
    degenerates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::signal;

    #[test]
    fn evaluate_result_thresholds() {
        assert_eq!(evaluate_result(&[1.0, 1.0]), signal::CORRECT);
        assert_eq!(evaluate_result(&[0.85, 0.85]), signal::POTENTIAL_CORRECT);
        assert_eq!(evaluate_result(&[0.9]), signal::POTENTIAL_CORRECT);
        assert_eq!(evaluate_result(&[0.5]), signal::POTENTIAL_MISTAKE);
        assert_eq!(evaluate_result(&[0.8]), signal::POTENTIAL_MISTAKE);
        assert_eq!(evaluate_result(&[0.1, 0.2]), signal::MISTAKE);
        assert_eq!(evaluate_result(&[]), signal::MISTAKE);
    }
}
