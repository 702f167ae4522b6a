// src/services/black_litterman.rs
use log::debug;
use nalgebra::{DMatrix, DVector};

use super::error::ModelError;
use super::views::View;

/// Additive floor on per-view uncertainty so Omega is always invertible even
/// at full confidence.
pub const UNCERTAINTY_FLOOR: f64 = 0.05;

/// Blended expected returns and covariance; recomputed per request, never
/// persisted.
#[derive(Debug, Clone)]
pub struct PosteriorEstimate {
    pub mean: DVector<f64>,
    pub cov: DMatrix<f64>,
}

/// Closed-form Black-Litterman update:
///
///   posterior_mean = [(tau S)^-1 + P' Omega^-1 P]^-1
///                    [(tau S)^-1 pi + P' Omega^-1 Q]
///   posterior_cov  = S + [(tau S)^-1 + P' Omega^-1 P]^-1
///
/// with Omega = diag(1 - confidence + UNCERTAINTY_FLOOR) per view. Each call
/// blends one scenario; independent scenarios are never combined.
pub fn blend(
    cov: &DMatrix<f64>,
    prior: &DVector<f64>,
    views: &[View],
    tau: f64,
) -> Result<PosteriorEstimate, ModelError> {
    let n = cov.nrows();
    let k = views.len();
    if k == 0 {
        return Err(ModelError::InvalidView(
            "at least one view is required to blend".to_string(),
        ));
    }

    let mut picking = DMatrix::zeros(k, n);
    let mut view_returns = DVector::zeros(k);
    let mut omega_inv_diag = DVector::zeros(k);
    for (row, view) in views.iter().enumerate() {
        if view.weights.len() != n {
            return Err(ModelError::InvalidView(format!(
                "view {} has {} picking weights for a {}-asset universe",
                row,
                view.weights.len(),
                n
            )));
        }
        for (col, weight) in view.weights.iter().enumerate() {
            picking[(row, col)] = *weight;
        }
        view_returns[row] = view.expected_return;
        // Confidence <= 1 and the floor keep this strictly positive.
        omega_inv_diag[row] = 1.0 / (1.0 - view.confidence + UNCERTAINTY_FLOOR);
    }
    let omega_inv = DMatrix::from_diagonal(&omega_inv_diag);

    let tau_s = cov * tau;
    let tau_s_inv = tau_s.try_inverse().ok_or_else(|| {
        ModelError::SingularMatrix(
            "tau-scaled covariance matrix is not invertible".to_string(),
        )
    })?;

    let picking_t_omega_inv = picking.transpose() * omega_inv;
    let update = &tau_s_inv + &picking_t_omega_inv * &picking;
    let update_inv = update.try_inverse().ok_or_else(|| {
        ModelError::SingularMatrix(
            "Black-Litterman update term is not invertible".to_string(),
        )
    })?;

    let mean = &update_inv * (&tau_s_inv * prior + &picking_t_omega_inv * &view_returns);
    let posterior_cov = cov + &update_inv;

    debug!(
        "Blended {} view(s) over {} assets, tau={}",
        k, n, tau
    );
    Ok(PosteriorEstimate {
        mean,
        cov: posterior_cov,
    })
}
