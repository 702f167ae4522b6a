// src/services/equilibrium.rs
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use super::error::ModelError;
use super::market_data::MarketSnapshot;

/// Daily crypto data, so annualization uses the full calendar year.
pub const ANNUALIZATION_DAYS: f64 = 365.0;

/// Fallback risk aversion when the market-implied estimate is unusable.
pub const DEFAULT_RISK_AVERSION: f64 = 2.5;

/// Annualized sample covariance of daily simple returns.
pub fn sample_covariance(snapshot: &MarketSnapshot) -> Result<DMatrix<f64>, ModelError> {
    let returns = snapshot.daily_returns()?;
    let t = returns.nrows();
    if t < 2 {
        return Err(ModelError::InsufficientHistory(format!(
            "need at least 2 return observations for a covariance estimate, have {}",
            t
        )));
    }

    let n = returns.ncols();
    let means: Vec<f64> = (0..n).map(|col| returns.column(col).mean()).collect();

    let mut cov = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let mut acc = 0.0;
            for row in 0..t {
                acc += (returns[(row, i)] - means[i]) * (returns[(row, j)] - means[j]);
            }
            let value = acc / (t as f64 - 1.0) * ANNUALIZATION_DAYS;
            cov[(i, j)] = value;
            cov[(j, i)] = value;
        }
    }
    Ok(cov)
}

/// Annualized arithmetic mean of daily returns per asset.
pub fn mean_historical_returns(snapshot: &MarketSnapshot) -> Result<DVector<f64>, ModelError> {
    let returns = snapshot.daily_returns()?;
    let n = returns.ncols();
    Ok(DVector::from_fn(n, |col, _| {
        returns.column(col).mean() * ANNUALIZATION_DAYS
    }))
}

/// Market-implied risk aversion over the TVL-weighted market series:
/// delta = (mean market excess return) / (market variance).
///
/// A non-positive or non-finite estimate falls back to
/// `DEFAULT_RISK_AVERSION`; zero total TVL is a hard error since the market
/// series itself would be undefined.
pub fn market_implied_risk_aversion(
    snapshot: &MarketSnapshot,
    risk_free_rate: f64,
) -> Result<f64, ModelError> {
    let tvl = snapshot.latest_tvl();
    let total = tvl.sum();
    if !(total > 0.0) {
        return Err(ModelError::DegenerateWeights(format!(
            "total TVL across the universe is {}, cannot form market weights",
            total
        )));
    }
    let weights = tvl / total;

    let returns = snapshot.daily_returns()?;
    let market: DVector<f64> = &returns * &weights;
    let t = market.len();
    if t < 2 {
        warn!("Not enough market observations for implied risk aversion, using default");
        return Ok(DEFAULT_RISK_AVERSION);
    }

    let mean = market.mean();
    let variance = market
        .iter()
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / (t as f64 - 1.0);

    let mean_annualized = mean * ANNUALIZATION_DAYS;
    let variance_annualized = variance * ANNUALIZATION_DAYS;
    let delta = (mean_annualized - risk_free_rate) / variance_annualized;

    if !delta.is_finite() || delta <= 0.0 {
        warn!(
            "Market-implied risk aversion {} is unusable, falling back to {}",
            delta, DEFAULT_RISK_AVERSION
        );
        return Ok(DEFAULT_RISK_AVERSION);
    }
    debug!("Market-implied risk aversion: {}", delta);
    Ok(delta)
}

/// Equilibrium prior pi = delta * S * (w / sum(w)) with TVL as the
/// capitalization proxy.
pub fn equilibrium_prior(
    cov: &DMatrix<f64>,
    latest_tvl: &DVector<f64>,
    delta: f64,
) -> Result<DVector<f64>, ModelError> {
    let total = latest_tvl.sum();
    if !(total > 0.0) {
        return Err(ModelError::DegenerateWeights(format!(
            "total TVL across the universe is {}, cannot form market weights",
            total
        )));
    }
    let weights = latest_tvl / total;
    Ok(cov * weights * delta)
}
