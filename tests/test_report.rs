//! Report formatting tests.

mod common;

use common::{identity_map, mapped_connections, neighbor_table, prepared_material};
use ndarray::{Array1, Array2};

use bandtangle::report::signaling_report;
use bandtangle::solver::SolverOptions;

#[test]
fn report_has_one_row_per_band_and_a_score_column() {
    let neighbors = neighbor_table(2, 2);
    let connections = mapped_connections(&neighbors, &identity_map(4, 2), 1.0);
    let eigenvalues = Array2::from_shape_fn((4, 2), |(_, b)| b as f64);
    let material = prepared_material(
        2,
        2,
        eigenvalues,
        connections,
        neighbors,
        SolverOptions::default(),
    );

    let mut signals = Array2::<i8>::zeros((4, 2));
    signals.column_mut(0).fill(4);
    signals[[0, 1]] = 1;
    signals[[1, 1]] = 3;
    signals[[2, 1]] = 4;
    signals[[3, 1]] = 4;
    let score = Array1::from_vec(vec![0.9876, 0.5]);

    let report = signaling_report(&signals, &score, &material);

    assert!(report.contains("====== REPORT ======"));
    assert!(report.contains("Signaling: how many events in each band signaled."));
    assert!(report.contains(" Band | "));
    // Band 0: four events at level 4 and its rounded score.
    assert!(report.contains("0.9876"));
    assert!(report.contains("0.5000"));
    let band_rows: Vec<&str> = report
        .lines()
        .filter(|l| l.starts_with(" 0 ") || l.starts_with(" 1 "))
        .collect();
    assert_eq!(band_rows.len(), 2);
}

#[test]
fn report_column_counts_match_signals() {
    let neighbors = neighbor_table(2, 2);
    let connections = mapped_connections(&neighbors, &identity_map(4, 2), 1.0);
    let eigenvalues = Array2::from_shape_fn((4, 2), |(_, b)| b as f64);
    let material = prepared_material(
        2,
        2,
        eigenvalues,
        connections,
        neighbors,
        SolverOptions::default(),
    );

    // Four k-points on both bands, all graded level 2.
    let signals = Array2::<i8>::from_elem((4, 2), 2);
    let score = Array1::zeros(2);
    let report = signaling_report(&signals, &score, &material);

    // Levels 0, 1, and 2 appear as columns; each band counts 4 at level 2.
    for line in report.lines().filter(|l| l.contains('|') && !l.contains("Band")) {
        let cells: Vec<&str> = line.split('|').collect();
        assert_eq!(cells.len(), 2);
        let values: Vec<&str> = cells[1].split_whitespace().collect();
        assert_eq!(values[0], "0");
        assert_eq!(values[1], "0");
        assert_eq!(values[2], "4");
    }
}
