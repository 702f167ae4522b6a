// src/models.rs
use serde::{Deserialize, Serialize};

use crate::services::model::{
    ModelConfig, ScenarioOutcome, DEFAULT_LOOKBACK_DAYS, DEFAULT_MOMENTUM_WINDOW_DAYS,
    DEFAULT_UNCERTAINTY_IN_PRIOR,
};
use crate::services::views::{ExplicitView, ViewSource, DEFAULT_BLEND_WEIGHTS};

// Wire shapes keep the upstream PascalCase field names (`asset`/`weight` on
// allocations and `term`/`rate` on risk-free rates stay lowercase).

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelParametersPayload {
    #[serde(default)]
    pub risk_aversion: Option<f64>,
    #[serde(default)]
    pub uncertainty_in_prior: Option<f64>,
    #[serde(default)]
    pub lookback_days: Option<usize>,
    #[serde(default)]
    pub momentum_window_days: Option<usize>,
    #[serde(default)]
    pub allow_short_positions: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFreeRate {
    pub term: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExplicitViewPayload {
    pub assets: Vec<String>,
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelRequest {
    pub model: String,
    #[serde(default)]
    pub submodel: Option<String>,
    pub asset_symbols: Vec<String>,
    #[serde(default)]
    pub model_parameters: Option<ModelParametersPayload>,
    #[serde(default)]
    pub risk_free_rates: Option<Vec<RiskFreeRate>>,
    #[serde(default)]
    pub portfolio_views: Option<Vec<ExplicitViewPayload>>,
}

impl ModelRequest {
    /// Resolve the loose wire parameters into the closed model config.
    pub fn resolve_config(&self) -> Result<ModelConfig, String> {
        let params = self.model_parameters.clone().unwrap_or_default();
        let config = ModelConfig {
            risk_aversion: params.risk_aversion,
            uncertainty_in_prior: params
                .uncertainty_in_prior
                .unwrap_or(DEFAULT_UNCERTAINTY_IN_PRIOR),
            lookback_days: params.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            momentum_window_days: params
                .momentum_window_days
                .unwrap_or(DEFAULT_MOMENTUM_WINDOW_DAYS),
            risk_free_rate: self
                .risk_free_rates
                .as_deref()
                .and_then(shortest_term_rate)
                .unwrap_or(0.0),
            long_only: !params.allow_short_positions.unwrap_or(false),
        };

        if let Some(delta) = config.risk_aversion {
            if !(delta > 0.0) {
                return Err(format!("RiskAversion must be positive, got {}", delta));
            }
        }
        if !(config.uncertainty_in_prior > 0.0) {
            return Err(format!(
                "UncertaintyInPrior must be positive, got {}",
                config.uncertainty_in_prior
            ));
        }
        if config.lookback_days < 2 {
            return Err(format!(
                "LookbackDays must be at least 2, got {}",
                config.lookback_days
            ));
        }
        if config.momentum_window_days == 0 {
            return Err("MomentumWindowDays must be at least 1".to_string());
        }
        Ok(config)
    }

    /// Explicit caller views win; otherwise views are derived from momentum
    /// and valuation signals. Decided once, here.
    pub fn view_source(&self, config: &ModelConfig) -> ViewSource {
        match &self.portfolio_views {
            Some(views) if !views.is_empty() => ViewSource::Explicit(
                views
                    .iter()
                    .map(|v| ExplicitView {
                        assets: v.assets.clone(),
                        weights: v.weights.clone(),
                        expected_return: v.expected_return,
                        confidence: v.confidence,
                    })
                    .collect(),
            ),
            _ => ViewSource::Derived {
                momentum_window_days: config.momentum_window_days,
                blend_weights: DEFAULT_BLEND_WEIGHTS.to_vec(),
            },
        }
    }
}

/// Term like "1D", "2W", "3M", "1Y" to days, for picking the shortest rate.
fn term_days(term: &str) -> Option<u32> {
    if term.len() < 2 || !term.is_ascii() {
        return None;
    }
    let (count, unit) = term.split_at(term.len() - 1);
    let count: u32 = count.parse().ok()?;
    match unit {
        "D" | "d" => Some(count),
        "W" | "w" => Some(count * 7),
        "M" | "m" => Some(count * 30),
        "Y" | "y" => Some(count * 365),
        _ => None,
    }
}

fn shortest_term_rate(rates: &[RiskFreeRate]) -> Option<f64> {
    rates
        .iter()
        .min_by_key(|r| term_days(&r.term).unwrap_or(u32::MAX))
        .map(|r| r.rate)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetViewWeights {
    #[serde(rename = "Asset")]
    pub assets: Vec<String>,
    #[serde(rename = "Weights")]
    pub weights: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewResult {
    #[serde(rename = "Weights")]
    pub weights: Vec<AssetViewWeights>,
    #[serde(rename = "Confidence")]
    pub confidence: f64,
    #[serde(rename = "Return")]
    pub view_return: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    pub asset: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelResultPayload {
    pub views: Vec<ViewResult>,
    pub allocations: Vec<AllocationResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelResponse {
    pub model: String,
    pub submodel: String,
    pub model_results: Vec<ModelResultPayload>,
}

impl ModelResponse {
    pub fn from_outcomes(request: &ModelRequest, outcomes: Vec<ScenarioOutcome>) -> Self {
        let model_results = outcomes
            .into_iter()
            .map(|outcome| {
                let universe: Vec<String> = outcome
                    .allocation
                    .iter()
                    .map(|(symbol, _)| symbol.clone())
                    .collect();
                let views = outcome
                    .views
                    .iter()
                    .map(|view| ViewResult {
                        weights: vec![AssetViewWeights {
                            assets: universe.clone(),
                            weights: view.weights.clone(),
                        }],
                        confidence: view.confidence,
                        view_return: view.expected_return,
                    })
                    .collect();
                let allocations = outcome
                    .allocation
                    .into_iter()
                    .map(|(asset, weight)| AllocationResult { asset, weight })
                    .collect();
                ModelResultPayload {
                    views,
                    allocations,
                }
            })
            .collect();

        ModelResponse {
            model: request.model.clone(),
            submodel: request.submodel.clone().unwrap_or_default(),
            model_results,
        }
    }
}
