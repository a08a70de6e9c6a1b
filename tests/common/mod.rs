//! Shared fixtures: small synthetic materials with known band structure.

use ndarray::{Array2, Array4};

use bandtangle::core::io::InputBundle;
use bandtangle::core::types::NEIGHBOR_STEPS;
use bandtangle::material::Material;
use bandtangle::solver::SolverOptions;

/// Open-boundary neighbor table in the (Down, Right, Up, Left) slot order.
pub fn neighbor_table(nkx: usize, nky: usize) -> Array2<i32> {
    let nks = nkx * nky;
    let mut table = Array2::from_elem((nks, 4), -1);
    for k in 0..nks {
        let (i, j) = (k % nkx, k / nkx);
        for (dir, &(di, dj)) in NEIGHBOR_STEPS.iter().enumerate() {
            let (ii, jj) = (i as isize + di, j as isize + dj);
            if ii >= 0 && jj >= 0 && (ii as usize) < nkx && (jj as usize) < nky {
                table[[k, dir]] = (jj as usize * nkx + ii as usize) as i32;
            }
        }
    }
    table
}

/// Overlaps of `strength` along a per-k-point physical-to-original band map;
/// everything else stays zero.
///
/// `band_map[k][p]` is the original band realizing physical band `p` at `k`.
pub fn mapped_connections(
    neighbors: &Array2<i32>,
    band_map: &[Vec<usize>],
    strength: f64,
) -> Array4<f64> {
    let nks = neighbors.nrows();
    let nbnd = band_map[0].len();
    let mut connections = Array4::zeros((nks, 4, nbnd, nbnd));
    for k in 0..nks {
        for dir in 0..4 {
            let kn = neighbors[[k, dir]];
            if kn < 0 {
                continue;
            }
            let kn = kn as usize;
            for p in 0..nbnd {
                connections[[k, dir, band_map[k][p], band_map[kn][p]]] = strength;
            }
        }
    }
    connections
}

/// Identity band map: physical band `p` is original band `p` everywhere.
pub fn identity_map(nks: usize, nbnd: usize) -> Vec<Vec<usize>> {
    vec![(0..nbnd).collect(); nks]
}

/// Assembles a material with vectors and connections already made.
pub fn prepared_material(
    nkx: usize,
    nky: usize,
    eigenvalues: Array2<f64>,
    connections: Array4<f64>,
    neighbors: Array2<i32>,
    options: SolverOptions,
) -> Material {
    let bundle = InputBundle::new(nkx, nky, eigenvalues, connections, neighbors).unwrap();
    let mut material = Material::new(nkx, nky, bundle, options);
    material.make_vectors().unwrap();
    material.make_connections().unwrap();
    material
}
