/*!
# Property-Based Tests

Property tests over the engine's structural invariants: index arithmetic
round-trips, graph symmetry, component merge-compatibility, output coverage,
and signaling idempotence.
*/

mod common;

use common::{identity_map, mapped_connections, neighbor_table, prepared_material};
use ndarray::{Array1, Array2};
use proptest::prelude::*;

use bandtangle::components::Component;
use bandtangle::components::merge::merge_samples;
use bandtangle::components::partition::partition_components;
use bandtangle::core::types::Grid;
use bandtangle::output::compile_output;
use bandtangle::solver::SolverOptions;

fn grid_dim() -> impl Strategy<Value = usize> {
    2usize..6usize
}

proptest! {
    /// Property: k-point ids and grid coordinates round-trip.
    #[test]
    fn prop_grid_round_trip(nkx in grid_dim(), nky in grid_dim()) {
        let grid = Grid::new(nkx, nky);
        for k in 0..grid.nks() {
            let (i, j) = grid.coords(k);
            prop_assert_eq!(grid.kid(i, j), k);
            prop_assert_eq!(grid.kid_checked(i as isize, j as isize), Some(k));
        }
    }

    /// Property: node ids and (offset, k-point) pairs round-trip.
    #[test]
    fn prop_node_round_trip(nkx in grid_dim(), nky in grid_dim(), offset in 0usize..4) {
        let grid = Grid::new(nkx, nky);
        for k in 0..grid.nks() {
            prop_assert_eq!(grid.split_node(grid.node(offset, k)), (offset, k));
        }
    }

    /// Property: components over disjoint k-sets of the same band validate
    /// symmetrically when both fit the other's complement.
    #[test]
    fn prop_validate_is_symmetric_for_disjoint_halves(nkx in 2usize..5, nky in 2usize..5) {
        let grid = Grid::new(nkx, nky);
        let nks = grid.nks();
        let left: Vec<usize> = (0..nks / 2).collect();
        let right: Vec<usize> = (nks / 2..nks).collect();
        let a = Component::new(left, &grid);
        let b = Component::new(right, &grid);
        prop_assert_eq!(a.validate(&b, &grid), b.validate(&a, &grid));
        prop_assert!(a.validate(&b, &grid));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: the similarity graph is undirected — every neighbor
    /// relation holds in both directions.
    #[test]
    fn prop_graph_is_symmetric(nkx in grid_dim(), nky in grid_dim(), strength in 0.96f64..1.0) {
        let nks = nkx * nky;
        let neighbors = neighbor_table(nkx, nky);
        let connections = mapped_connections(&neighbors, &identity_map(nks, 2), strength);
        let eigenvalues = Array2::from_shape_fn((nks, 2), |(k, b)| b as f64 + 0.001 * k as f64);
        let material = prepared_material(
            nkx, nky, eigenvalues, connections, neighbors, SolverOptions::default(),
        );
        let graph = material.graph().unwrap();
        for n in 0..material.node_count() {
            for m in graph.neighbors(n) {
                prop_assert!(graph.neighbors(m).contains(&n));
            }
        }
    }

    /// Property: every assignment is -1 or inside the band window, and the
    /// assigned original bands at one k-point never repeat.
    #[test]
    fn prop_output_coverage(nkx in grid_dim(), nky in grid_dim(), strength in 0.96f64..1.0) {
        let nks = nkx * nky;
        let neighbors = neighbor_table(nkx, nky);
        let connections = mapped_connections(&neighbors, &identity_map(nks, 3), strength);
        let eigenvalues = Array2::from_shape_fn((nks, 3), |(k, b)| {
            b as f64 + 0.002 * (k % nkx) as f64 + 0.001 * (k / nkx) as f64
        });
        let mut material = prepared_material(
            nkx, nky, eigenvalues, connections, neighbors, SolverOptions::default(),
        );
        let outcome = material.solve().unwrap();
        for k in 0..nks {
            let mut used = Vec::new();
            for bn in 0..3 {
                let b = outcome.bands_final[[k, bn]];
                prop_assert!(b == -1 || (0..3).contains(&b));
                if b >= 0 {
                    prop_assert!(!used.contains(&b));
                    used.push(b);
                }
            }
        }
    }

    /// Property: compiling the output twice over the same partition yields
    /// identical signals.
    #[test]
    fn prop_signaling_is_idempotent(nkx in grid_dim(), nky in grid_dim(), strength in 0.96f64..1.0) {
        let nks = nkx * nky;
        let neighbors = neighbor_table(nkx, nky);
        let connections = mapped_connections(&neighbors, &identity_map(nks, 2), strength);
        let eigenvalues = Array2::from_shape_fn((nks, 2), |(k, b)| b as f64 + 0.001 * k as f64);
        let material = prepared_material(
            nkx, nky, eigenvalues, connections, neighbors, SolverOptions::default(),
        );
        let mut partition = partition_components(material.graph().unwrap(), &material);
        merge_samples(&mut partition, &material, 0.5);

        let total = material.total_bands();
        let mut bands = Array2::from_elem((nks, total), -1);
        let mut signals = Array2::zeros((nks, total));
        let mut score = Array1::zeros(total);
        let first_rows = compile_output(&partition, &material, &mut bands, &mut signals, &mut score);
        let first_signals = signals.clone();
        let first_bands = bands.clone();
        let second_rows = compile_output(&partition, &material, &mut bands, &mut signals, &mut score);
        prop_assert_eq!(first_signals, signals);
        prop_assert_eq!(first_bands, bands);
        prop_assert_eq!(first_rows, second_rows);
    }
}
