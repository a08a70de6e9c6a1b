//! Report formatting.
//!
//! Builds the `final.report` signaling table: one row per band in the
//! clustering window, one aligned column per signal level, and a trailing
//! per-band score column. Also dumps each band's assignment grid to the
//! debug log for visual inspection.

use ndarray::{Array1, Array2};
use tracing::debug;

use crate::material::Material;

/// Formats the signaling table over the corrected signal scale.
pub fn signaling_report(
    signals: &Array2<i8>,
    final_score: &Array1<f64>,
    material: &Material,
) -> String {
    let nks = material.grid().nks();
    let levels = signals.iter().copied().max().unwrap_or(0).max(0) as usize + 1;
    let bands: Vec<usize> = (material.min_band()..=material.max_band()).collect();

    // Per-band counts of each signal level, plus the rounded score.
    let mut counts: Vec<Vec<usize>> = Vec::with_capacity(bands.len());
    let mut scores: Vec<String> = Vec::with_capacity(bands.len());
    for &bn in &bands {
        let mut row = vec![0usize; levels];
        for k in 0..nks {
            let s = signals[[k, bn]];
            if s >= 0 {
                row[s as usize] += 1;
            }
        }
        counts.push(row);
        scores.push(format!("{:.4}", final_score[bn]));
    }

    let widths: Vec<usize> = (0..levels)
        .map(|s| {
            counts
                .iter()
                .map(|row| row[s].to_string().len())
                .max()
                .unwrap_or(1)
                .max(1)
        })
        .collect();
    let score_width = scores.iter().map(String::len).max().unwrap_or(1);

    let mut report = String::from("\n\t====== REPORT ======\n\n");
    report.push_str("\n Signaling: how many events in each band signaled.\n");
    let mut header = String::from("\n Band | ");
    for (s, w) in widths.iter().enumerate() {
        header.push_str(&format!("{:>width$}   ", s, width = w));
    }
    header.push_str(&" ".repeat(score_width));
    report.push_str(&header);
    report.push('\n');
    report.push_str(&"-".repeat(header.trim_end_matches('\n').len()));

    for (idx, &bn) in bands.iter().enumerate() {
        report.push_str(&format!("\n {:<4} | ", bn));
        for (s, w) in widths.iter().enumerate() {
            report.push_str(&format!("{:>width$}   ", counts[idx][s], width = w));
        }
        report.push_str(&format!("{:>width$}", scores[idx], width = score_width));
    }
    report.push('\n');
    report
}

/// Dumps each band's k-grid of assigned original bands to the debug log.
pub fn log_band_grids(bands_final: &Array2<i32>, material: &Material) {
    let grid = material.grid();
    for bn in material.min_band()..=material.max_band() {
        debug!("band {} assignment grid:", bn);
        for j in 0..grid.nky() {
            let row: Vec<String> = (0..grid.nkx())
                .map(|i| format!("{:>3}", bands_final[[grid.kid(i, j), bn]]))
                .collect();
            debug!("  {}", row.join(" "));
        }
    }
}
