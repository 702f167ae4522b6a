// src/services/optimizer.rs
use log::debug;
use nalgebra::DVector;

use super::black_litterman::PosteriorEstimate;
use super::error::ModelError;

/// Weights below this magnitude are economically meaningless dust.
pub const DUST_THRESHOLD: f64 = 1e-4;

/// Maximize return per unit of risk: tangency weights w proportional to
/// S^-1 (mu - r_f), normalized to sum to 1. With `long_only` (the default
/// constraint set) negative raw weights are snapped to zero before
/// normalization.
pub fn max_risk_adjusted_weights(
    posterior: &PosteriorEstimate,
    risk_free_rate: f64,
    long_only: bool,
) -> Result<DVector<f64>, ModelError> {
    let n = posterior.mean.len();
    let excess = &posterior.mean - DVector::from_element(n, risk_free_rate);

    let cov_inv = posterior.cov.clone().try_inverse().ok_or_else(|| {
        ModelError::SingularMatrix("posterior covariance matrix is not invertible".to_string())
    })?;
    let mut raw = cov_inv * excess;

    if raw.iter().any(|w| !w.is_finite()) {
        return Err(ModelError::InfeasibleOptimization(
            "optimization produced non-finite weights".to_string(),
        ));
    }

    if long_only {
        for weight in raw.iter_mut() {
            if *weight < 0.0 {
                *weight = 0.0;
            }
        }
    }

    let total = raw.sum();
    if !(total.abs() > DUST_THRESHOLD * DUST_THRESHOLD) {
        return Err(ModelError::InfeasibleOptimization(
            "no feasible weight vector: total raw weight is zero".to_string(),
        ));
    }
    // Normalizing by a negative total would invert every position.
    if total < 0.0 {
        return Err(ModelError::InfeasibleOptimization(
            "raw tangency weights sum to a negative total".to_string(),
        ));
    }

    debug!("Raw tangency weights sum to {}", total);
    Ok(raw / total)
}

/// Snap dust weights to zero and renormalize the rest to sum to 1.
///
/// Renormalization by a total above 1 can push a marginal weight back under
/// the threshold, so cleaning repeats until the vector is stable. Each pass
/// zeroes at least one more weight, bounding the loop by the vector length.
pub fn clean_weights(weights: &DVector<f64>) -> Result<Vec<f64>, ModelError> {
    let mut cleaned: Vec<f64> = weights
        .iter()
        .map(|w| if w.abs() < DUST_THRESHOLD { 0.0 } else { *w })
        .collect();

    loop {
        let total: f64 = cleaned.iter().sum();
        if !total.is_finite() || total.abs() < DUST_THRESHOLD {
            return Err(ModelError::InfeasibleOptimization(
                "every weight fell below the dust threshold during cleaning".to_string(),
            ));
        }
        for weight in &mut cleaned {
            *weight /= total;
        }

        let mut stable = true;
        for weight in &mut cleaned {
            if *weight != 0.0 && weight.abs() < DUST_THRESHOLD {
                *weight = 0.0;
                stable = false;
            }
        }
        if stable {
            return Ok(cleaned);
        }
    }
}
