/*!
# Input Validation Utilities

Structural checks over the input bundle, run once before the solver starts.
These centralize the fatal error cases of the I/O contract: array shapes that
disagree with each other or with the grid dimensions, overlaps outside
`[0, 1]`, neighbor ids outside `{-1, 0..nks-1}`, and band windows outside the
available bands.
*/

use ndarray::{Array2, Array4};

use crate::core::error::{BandtangleError, Result};
use crate::core::types::N_NEIGS;

/// Validates the mutual consistency of the input arrays against the grid.
pub fn check_shapes(
    nkx: usize,
    nky: usize,
    eigenvalues: &Array2<f64>,
    connections: &Array4<f64>,
    neighbors: &Array2<i32>,
) -> Result<()> {
    let nks = nkx * nky;
    let (e_nks, nbnd) = eigenvalues.dim();
    if e_nks != nks {
        return Err(BandtangleError::input_shape(format!(
            "eigenvalues has {} k-points but the grid is {}x{} = {}",
            e_nks, nkx, nky, nks
        )));
    }
    if neighbors.dim() != (nks, N_NEIGS) {
        return Err(BandtangleError::input_shape(format!(
            "neighbors has shape {:?}, expected ({}, {})",
            neighbors.dim(),
            nks,
            N_NEIGS
        )));
    }
    if connections.dim() != (nks, N_NEIGS, nbnd, nbnd) {
        return Err(BandtangleError::input_shape(format!(
            "connections has shape {:?}, expected ({}, {}, {}, {})",
            connections.dim(),
            nks,
            N_NEIGS,
            nbnd,
            nbnd
        )));
    }
    Ok(())
}

/// Validates that every value lies inside its documented range.
pub fn check_ranges(
    nks: usize,
    connections: &Array4<f64>,
    neighbors: &Array2<i32>,
) -> Result<()> {
    if let Some(bad) = connections.iter().find(|&&c| !(0.0..=1.0).contains(&c)) {
        return Err(BandtangleError::input_range(format!(
            "overlap magnitude {} outside [0, 1]",
            bad
        )));
    }
    if let Some(bad) = neighbors.iter().find(|&&n| n < -1 || n as i64 >= nks as i64) {
        return Err(BandtangleError::input_range(format!(
            "neighbor id {} outside {{-1, 0..{}}}",
            bad,
            nks - 1
        )));
    }
    Ok(())
}

/// Validates the requested band window against the available bands.
pub fn check_band_window(min_band: usize, max_band: usize, nbnd: usize) -> Result<()> {
    if max_band >= nbnd {
        return Err(BandtangleError::input_range(format!(
            "max_band {} outside the {} available bands",
            max_band, nbnd
        )));
    }
    if min_band > max_band {
        return Err(BandtangleError::invalid_argument(format!(
            "min_band {} greater than max_band {}",
            min_band, max_band
        )));
    }
    Ok(())
}
