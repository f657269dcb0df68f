//! Damped pseudo-inverse of task Jacobians.

extern crate nalgebra as na;
use na::{DMatrix, DVector};

use crate::parameters::{DampingMethod, DampingParams};

/// Iteration limit for the SVD. A Jacobian that does not converge within it
/// is treated as fully singular.
const SVD_MAX_ITERATIONS: usize = 1000;

/// Computes the (damped) pseudo-inverse of a Jacobian.
///
/// Implementations must always return a finite matrix of shape `cols x rows`, whatever
/// the conditioning of the input. Ill-conditioning is handled by damping, never reported.
pub trait PseudoInverseCalculator {
    fn calculate(&self, damping: &DampingParams, jacobian: &DMatrix<f64>) -> DMatrix<f64>;
}

/// Pseudo-inverse through singular value decomposition, with the singular values
/// damped (or truncated) according to [`DampingParams`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PInvBySvd;

impl PseudoInverseCalculator for PInvBySvd {
    fn calculate(&self, damping: &DampingParams, jacobian: &DMatrix<f64>) -> DMatrix<f64> {
        let (rows, cols) = jacobian.shape();
        if rows == 0 || cols == 0 || jacobian.iter().any(|v| !v.is_finite()) {
            return DMatrix::zeros(cols, rows);
        }

        let svd = match jacobian
            .clone()
            .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        {
            Some(svd) => svd,
            None => return DMatrix::zeros(cols, rows),
        };
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => return DMatrix::zeros(cols, rows),
        };

        let lambda = damping_factor(damping, jacobian, &svd.singular_values);
        let lambda_sq = lambda * lambda;
        let inverted = svd.singular_values.map(|sigma| {
            if damping.numerical_filtering {
                let eps_sq = damping.eps_damping * damping.eps_damping;
                let denominator = sigma * sigma + eps_sq + lambda_sq;
                if denominator > 0.0 { sigma / denominator } else { 0.0 }
            } else if sigma < damping.eps_truncation {
                0.0
            } else {
                sigma / (sigma * sigma + lambda_sq)
            }
        });

        v_t.transpose() * DMatrix::from_diagonal(&inverted) * u.transpose()
    }
}

/// Damping factor (lambda) of the pseudo-inverse for the given Jacobian.
pub fn damping_factor(
    damping: &DampingParams,
    jacobian: &DMatrix<f64>,
    singular_values: &DVector<f64>,
) -> f64 {
    match damping.method {
        DampingMethod::None => 0.0,
        DampingMethod::Constant => damping.damping_factor,
        DampingMethod::Manipulability => {
            let w = manipulability(jacobian);
            if w < damping.w_threshold {
                let ratio = 1.0 - w / damping.w_threshold;
                damping.lambda_max * ratio * ratio
            } else {
                0.0
            }
        }
        DampingMethod::LeastSingularValue => {
            let least = singular_values.iter().cloned().fold(f64::INFINITY, f64::min);
            if least < damping.w_threshold {
                let ratio = least / damping.w_threshold;
                damping.lambda_max * (1.0 - ratio * ratio).max(0.0).sqrt()
            } else {
                0.0
            }
        }
    }
}

/// Yoshikawa manipulability measure sqrt(det(J * J^T)).
pub fn manipulability(jacobian: &DMatrix<f64>) -> f64 {
    let jjt = jacobian * jacobian.transpose();
    let det = jjt.determinant();
    if det > 0.0 { det.sqrt() } else { 0.0 }
}
