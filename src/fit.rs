//! Quadratic energy extrapolation.
//!
//! Both the merge score and the directional signal corrector decide whether an
//! energy surface continues smoothly across a bond by fitting a second-order
//! polynomial through a handful of collinear grid points and comparing the
//! extrapolated energy against the candidate band energies at the target
//! k-point. This module holds the fit and the comparison ratio they share.

use nalgebra::{DMatrix, DVector, linalg::SVD};

/// Coefficients of `E(x) = a*x^2 + b*x + c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadratic {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Quadratic {
    /// Evaluates the polynomial at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        self.a * x * x + self.b * x + self.c
    }
}

/// Least-squares fit of a quadratic through `(xs, ys)`.
///
/// Returns `None` when fewer than three points are given or the design matrix
/// is too ill-conditioned to solve; callers fall back to the nearest-neighbor
/// energy ratio in that case.
pub fn fit_quadratic(xs: &[f64], ys: &[f64]) -> Option<Quadratic> {
    if xs.len() < 3 || xs.len() != ys.len() {
        return None;
    }
    let design = DMatrix::from_fn(xs.len(), 3, |r, c| match c {
        0 => xs[r] * xs[r],
        1 => xs[r],
        _ => 1.0,
    });
    let rhs = DVector::from_row_slice(ys);
    let svd = SVD::new(design, true, true);
    let solution = svd.solve(&rhs, 1e-12).ok()?;
    Some(Quadratic {
        a: solution[0],
        b: solution[1],
        c: solution[2],
    })
}

/// Scores how well `predicted` singles out `actual` among `candidates`.
///
/// The score is `min_c |predicted - c| / |predicted - actual|`, clipped to
/// `[0, 1]`; a perfect continuation predicts the actual band energy better
/// than any other candidate and scores 1. A zero denominator (the prediction
/// hits the actual energy exactly) also scores 1.
pub fn closeness_ratio<I>(predicted: f64, actual: f64, candidates: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let delta = (predicted - actual).abs();
    if delta == 0.0 {
        return 1.0;
    }
    let nearest = candidates
        .into_iter()
        .map(|c| (predicted - c).abs())
        .fold(f64::INFINITY, f64::min);
    (nearest / delta).clamp(0.0, 1.0)
}
