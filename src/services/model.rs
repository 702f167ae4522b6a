// src/services/model.rs
use log::info;

use super::black_litterman::blend;
use super::equilibrium::{
    equilibrium_prior, market_implied_risk_aversion, sample_covariance,
};
use super::error::ModelError;
use super::market_data::MarketSnapshot;
use super::optimizer::{clean_weights, max_risk_adjusted_weights};
use super::views::{generate_scenarios, View, ViewSource};

pub const DEFAULT_UNCERTAINTY_IN_PRIOR: f64 = 0.05;
pub const DEFAULT_LOOKBACK_DAYS: usize = 365;
pub const DEFAULT_MOMENTUM_WINDOW_DAYS: usize = 30;

/// Closed model configuration with explicit defaults; no ad hoc presence
/// checks downstream of construction.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// When set, overrides the market-implied risk aversion entirely.
    pub risk_aversion: Option<f64>,
    pub uncertainty_in_prior: f64,
    pub lookback_days: usize,
    pub momentum_window_days: usize,
    pub risk_free_rate: f64,
    pub long_only: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            risk_aversion: None,
            uncertainty_in_prior: DEFAULT_UNCERTAINTY_IN_PRIOR,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            momentum_window_days: DEFAULT_MOMENTUM_WINDOW_DAYS,
            risk_free_rate: 0.0,
            long_only: true,
        }
    }
}

/// One independently evaluated scenario: the views that produced it and the
/// cleaned allocation over the universe.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub views: Vec<View>,
    pub allocation: Vec<(String, f64)>,
}

/// Run the full Black-Litterman pipeline over an aligned snapshot.
///
/// Prior and covariance are computed once; each scenario is blended and
/// optimized separately and results are never combined across scenarios.
pub fn run_allocation(
    snapshot: &MarketSnapshot,
    source: &ViewSource,
    config: &ModelConfig,
) -> Result<Vec<ScenarioOutcome>, ModelError> {
    let cov = sample_covariance(snapshot)?;

    let delta = match config.risk_aversion {
        Some(delta) => delta,
        None => market_implied_risk_aversion(snapshot, config.risk_free_rate)?,
    };
    let prior = equilibrium_prior(&cov, &snapshot.latest_tvl(), delta)?;

    let scenarios = generate_scenarios(source, snapshot)?;
    info!(
        "Running {} scenario(s) over {} assets with delta={}",
        scenarios.len(),
        snapshot.n_assets(),
        delta
    );

    let mut outcomes = Vec::with_capacity(scenarios.len());
    for views in scenarios {
        let posterior = blend(&cov, &prior, &views, config.uncertainty_in_prior)?;
        let raw = max_risk_adjusted_weights(&posterior, config.risk_free_rate, config.long_only)?;
        let cleaned = clean_weights(&raw)?;

        let allocation = snapshot
            .symbols()
            .iter()
            .cloned()
            .zip(cleaned)
            .collect();
        outcomes.push(ScenarioOutcome { views, allocation });
    }
    Ok(outcomes)
}
