/*!
# Input/Output Routines

This module reads the input bundle consumed by the solver and writes the
output bundle it produces. All array files use the NumPy `.npy` format:

- **Inputs** (read once at start): `eigenvalues.npy` (`[nks, nbnd]` f64),
  `dp.npy` (`[nks, 4, nbnd, nbnd]` f64 overlap magnitudes), and
  `neighbors.npy` (`[nks, 4]` i32).
- **Outputs** (written at the end): `bandsfinal.npy`, `signalfinal.npy`,
  `correct_signalfinal.npy`, `degeneratefinal.npy`, `final_score.npy`, and
  the human-readable `final.report`.

Reading validates shapes and ranges through [`crate::core::validation`], so a
bundle obtained from [`InputBundle::read`] is structurally sound.
*/

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, Array4};
use ndarray_npy::{read_npy, write_npy};

use crate::core::error::Result;
use crate::core::validation::{check_ranges, check_shapes};

/// Input file holding the energy eigenvalues.
pub const EIGENVALUES_FILE: &str = "eigenvalues.npy";
/// Input file holding the wavefunction overlap magnitudes.
pub const CONNECTIONS_FILE: &str = "dp.npy";
/// Input file holding the neighbor table.
pub const NEIGHBORS_FILE: &str = "neighbors.npy";

/// The arrays the engine consumes, as loaded from a working directory.
#[derive(Debug, Clone)]
pub struct InputBundle {
    /// Energy per (k-point, original band), `[nks, nbnd]`.
    pub eigenvalues: Array2<f64>,
    /// Overlap magnitudes per (k-point, direction, band, band), `[nks, 4, nbnd, nbnd]`.
    pub connections: Array4<f64>,
    /// Cardinal neighbors per k-point, `[nks, 4]`, `-1` marks a missing neighbor.
    pub neighbors: Array2<i32>,
}

impl InputBundle {
    /// Builds a bundle from in-memory arrays, validating shapes and ranges.
    pub fn new(
        nkx: usize,
        nky: usize,
        eigenvalues: Array2<f64>,
        connections: Array4<f64>,
        neighbors: Array2<i32>,
    ) -> Result<Self> {
        check_shapes(nkx, nky, &eigenvalues, &connections, &neighbors)?;
        check_ranges(nkx * nky, &connections, &neighbors)?;
        Ok(Self {
            eigenvalues,
            connections,
            neighbors,
        })
    }

    /// Reads and validates the three input files from `dir`.
    pub fn read<P: AsRef<Path>>(dir: P, nkx: usize, nky: usize) -> Result<Self> {
        let dir = dir.as_ref();
        let eigenvalues: Array2<f64> = read_npy(dir.join(EIGENVALUES_FILE))?;
        let connections: Array4<f64> = read_npy(dir.join(CONNECTIONS_FILE))?;
        let neighbors: Array2<i32> = read_npy(dir.join(NEIGHBORS_FILE))?;
        Self::new(nkx, nky, eigenvalues, connections, neighbors)
    }

    /// Number of bands in the input files.
    pub fn nbnd(&self) -> usize {
        self.eigenvalues.ncols()
    }
}

/// The solver's final result, ready to be persisted.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Original band assigned to each (k-point, physical band), `-1` when unassigned.
    pub bands_final: Array2<i32>,
    /// Signal per (k-point, physical band) on the 0..=5 scale.
    pub signal_final: Array2<i8>,
    /// Signal per (k-point, physical band) on the corrected 0..=4 scale.
    pub correct_signal: Array2<i8>,
    /// Rows `(kid, band1, band2)` flagging degenerate assignments.
    pub degenerate_final: Array2<i32>,
    /// Mean neighbor-overlap score per physical band.
    pub final_score: Array1<f64>,
    /// The signaling table, one row per band.
    pub report: String,
}

impl Outcome {
    /// Writes the five output arrays and the report into `dir`.
    pub fn write<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        write_npy(dir.join("bandsfinal.npy"), &self.bands_final)?;
        write_npy(dir.join("signalfinal.npy"), &self.signal_final)?;
        write_npy(dir.join("correct_signalfinal.npy"), &self.correct_signal)?;
        write_npy(dir.join("degeneratefinal.npy"), &self.degenerate_final)?;
        write_npy(dir.join("final_score.npy"), &self.final_score)?;
        fs::write(dir.join("final.report"), &self.report)?;
        Ok(())
    }
}
