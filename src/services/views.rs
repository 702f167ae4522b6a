// src/services/views.rs
use log::debug;
use nalgebra::DVector;

use super::equilibrium::{mean_historical_returns, ANNUALIZATION_DAYS};
use super::error::ModelError;
use super::market_data::MarketSnapshot;

/// Target rate for the crude valuation proxy (target / mean historical return).
pub const TARGET_RATE: f64 = 0.03;

/// Derived view vectors are rescaled to this L2 norm so views stay comparable
/// across assets and blend weights.
pub const VIEW_NORM_TARGET: f64 = 0.05;

/// Momentum/valuation blend weights evaluated per request, one independent
/// scenario each.
pub const DEFAULT_BLEND_WEIGHTS: [f64; 3] = [0.25, 0.5, 0.75];

/// Lower bound on derived confidence; a blend component that cancels to zero
/// still carries a confidence in (0, 1].
const MIN_CONFIDENCE: f64 = 1e-6;

/// One expected-return belief: a picking row over the asset universe, the
/// return it asserts, and a confidence in (0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub confidence: f64,
}

/// Caller-supplied view prior to resolution against the universe.
#[derive(Debug, Clone)]
pub struct ExplicitView {
    pub assets: Vec<String>,
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub confidence: f64,
}

/// How views are obtained, resolved once at construction rather than
/// re-checked ad hoc (explicit caller views win over derivation).
#[derive(Debug, Clone)]
pub enum ViewSource {
    Explicit(Vec<ExplicitView>),
    Derived {
        momentum_window_days: usize,
        blend_weights: Vec<f64>,
    },
}

/// Produce the independent view scenarios for one request.
///
/// Explicit views form a single jointly-blended scenario; derived mode yields
/// one scenario per blend weight, each a set of absolute per-asset views.
pub fn generate_scenarios(
    source: &ViewSource,
    snapshot: &MarketSnapshot,
) -> Result<Vec<Vec<View>>, ModelError> {
    match source {
        ViewSource::Explicit(views) => {
            let resolved = resolve_explicit_views(views, snapshot)?;
            Ok(vec![resolved])
        }
        ViewSource::Derived {
            momentum_window_days,
            blend_weights,
        } => derive_scenarios(snapshot, *momentum_window_days, blend_weights),
    }
}

fn resolve_explicit_views(
    views: &[ExplicitView],
    snapshot: &MarketSnapshot,
) -> Result<Vec<View>, ModelError> {
    if views.is_empty() {
        return Err(ModelError::InvalidView(
            "explicit mode requires at least one view".to_string(),
        ));
    }

    let symbols = snapshot.symbols();
    let mut resolved = Vec::with_capacity(views.len());
    for (index, view) in views.iter().enumerate() {
        if view.assets.len() != view.weights.len() {
            return Err(ModelError::InvalidView(format!(
                "view {} has {} assets but {} weights",
                index,
                view.assets.len(),
                view.weights.len()
            )));
        }
        if !(view.confidence > 0.0 && view.confidence <= 1.0) {
            return Err(ModelError::InvalidView(format!(
                "view {} confidence {} is outside (0, 1]",
                index, view.confidence
            )));
        }

        let mut picking = vec![0.0; symbols.len()];
        for (asset, weight) in view.assets.iter().zip(view.weights.iter()) {
            let col = symbols
                .iter()
                .position(|s| s.eq_ignore_ascii_case(asset))
                .ok_or_else(|| {
                    ModelError::InvalidView(format!(
                        "view {} references asset '{}' outside the universe",
                        index, asset
                    ))
                })?;
            picking[col] += weight;
        }

        if picking.iter().map(|w| w.abs()).sum::<f64>() == 0.0 {
            return Err(ModelError::InvalidView(format!(
                "view {} has all-zero picking weights",
                index
            )));
        }

        resolved.push(View {
            weights: picking,
            expected_return: view.expected_return,
            confidence: view.confidence,
        });
    }
    Ok(resolved)
}

fn derived_confidence(component: f64, max_component: f64) -> f64 {
    (component.abs() / max_component).max(MIN_CONFIDENCE)
}

/// Momentum + valuation scenarios over the snapshot.
///
/// Momentum is the annualized simple return over the window
/// P = min(momentum_window_days, T-1); valuation is TARGET_RATE over the mean
/// historical return, with the cross-sectional mean substituted wherever the
/// mean return is exactly zero.
fn derive_scenarios(
    snapshot: &MarketSnapshot,
    momentum_window_days: usize,
    blend_weights: &[f64],
) -> Result<Vec<Vec<View>>, ModelError> {
    let t = snapshot.n_observations();
    if t < 2 {
        return Err(ModelError::InsufficientHistory(format!(
            "need at least 2 observations for a momentum view, have {}",
            t
        )));
    }
    let n = snapshot.n_assets();
    let window = momentum_window_days.min(t - 1);

    let momentum = DVector::from_fn(n, |col, _| {
        let latest = snapshot.apy_at(0, col);
        let oldest = snapshot.apy_at(window, col);
        if oldest == 0.0 {
            0.0
        } else {
            2.0 * (latest / oldest - 1.0) * ANNUALIZATION_DAYS / window as f64
        }
    });

    let mu = mean_historical_returns(snapshot)?;
    let nonzero: Vec<f64> = mu.iter().copied().filter(|m| *m != 0.0).collect();
    if nonzero.is_empty() {
        return Err(ModelError::InsufficientHistory(
            "mean historical return is zero for every asset, no valuation signal".to_string(),
        ));
    }
    let cross_sectional_mean = nonzero.iter().sum::<f64>() / nonzero.len() as f64;
    let valuation = DVector::from_fn(n, |col, _| {
        let base = if mu[col] == 0.0 {
            cross_sectional_mean
        } else {
            mu[col]
        };
        TARGET_RATE / base
    });

    let mut scenarios = Vec::with_capacity(blend_weights.len());
    for &m in blend_weights {
        let blended = &momentum * m + &valuation * (1.0 - m);
        let norm = blended.norm();
        if norm == 0.0 {
            return Err(ModelError::InvalidView(format!(
                "derived view collapsed to zero for blend weight {}",
                m
            )));
        }
        let scaled = blended * (VIEW_NORM_TARGET / norm);
        let max_component = scaled.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));

        debug!(
            "Derived scenario m={}: window={} components={:?}",
            m,
            window,
            scaled.as_slice()
        );

        let views = (0..n)
            .map(|i| {
                let mut weights = vec![0.0; n];
                weights[i] = 1.0;
                View {
                    weights,
                    expected_return: scaled[i],
                    confidence: derived_confidence(scaled[i], max_component),
                }
            })
            .collect();
        scenarios.push(views);
    }
    Ok(scenarios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::defi_llama::PoolObservation;
    use crate::services::market_data::build_snapshot;
    use chrono::{Duration, TimeZone, Utc};

    fn snapshot_from(series: &[(&str, Vec<f64>, f64)]) -> MarketSnapshot {
        let raw: Vec<(String, Vec<PoolObservation>)> = series
            .iter()
            .map(|(symbol, apys, tvl)| {
                let observations = apys
                    .iter()
                    .enumerate()
                    .map(|(i, apy)| PoolObservation {
                        timestamp: Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap()
                            + Duration::days(i as i64),
                        apy: Some(*apy),
                        tvl_usd: Some(*tvl),
                    })
                    .collect();
                (symbol.to_string(), observations)
            })
            .collect();
        build_snapshot(&raw, 365).unwrap()
    }

    fn rising(seed: f64, len: usize) -> Vec<f64> {
        (0..len).map(|i| seed + 0.05 * seed * i as f64).collect()
    }

    #[test]
    fn explicit_view_resolves_to_universe_order() {
        let snapshot = snapshot_from(&[
            ("STETH", rising(2.0, 5), 100.0),
            ("USDC", rising(4.0, 5), 200.0),
            ("WBTC", rising(1.0, 5), 300.0),
        ]);
        let source = ViewSource::Explicit(vec![ExplicitView {
            assets: vec!["USDC".to_string()],
            weights: vec![1.0],
            expected_return: 0.03,
            confidence: 0.8,
        }]);
        let scenarios = generate_scenarios(&source, &snapshot).unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].len(), 1);
        assert_eq!(scenarios[0][0].weights, vec![0.0, 1.0, 0.0]);
        assert_eq!(scenarios[0][0].expected_return, 0.03);
    }

    #[test]
    fn explicit_view_on_unknown_asset_is_invalid() {
        let snapshot = snapshot_from(&[("USDC", rising(4.0, 5), 200.0)]);
        let source = ViewSource::Explicit(vec![ExplicitView {
            assets: vec!["DOGE".to_string()],
            weights: vec![1.0],
            expected_return: 0.03,
            confidence: 0.8,
        }]);
        let err = generate_scenarios(&source, &snapshot).unwrap_err();
        assert!(matches!(err, ModelError::InvalidView(_)));
    }

    #[test]
    fn explicit_view_confidence_must_be_in_unit_interval() {
        let snapshot = snapshot_from(&[("USDC", rising(4.0, 5), 200.0)]);
        for confidence in [0.0, -0.2, 1.5] {
            let source = ViewSource::Explicit(vec![ExplicitView {
                assets: vec!["USDC".to_string()],
                weights: vec![1.0],
                expected_return: 0.03,
                confidence,
            }]);
            let err = generate_scenarios(&source, &snapshot).unwrap_err();
            assert!(matches!(err, ModelError::InvalidView(_)));
        }
    }

    #[test]
    fn explicit_all_zero_picking_weights_are_invalid() {
        let snapshot = snapshot_from(&[("USDC", rising(4.0, 5), 200.0)]);
        let source = ViewSource::Explicit(vec![ExplicitView {
            assets: vec!["USDC".to_string()],
            weights: vec![0.0],
            expected_return: 0.03,
            confidence: 0.8,
        }]);
        let err = generate_scenarios(&source, &snapshot).unwrap_err();
        assert!(matches!(err, ModelError::InvalidView(_)));
    }

    #[test]
    fn explicit_length_mismatch_is_invalid() {
        let snapshot = snapshot_from(&[
            ("USDC", rising(4.0, 5), 200.0),
            ("WBTC", rising(1.0, 5), 300.0),
        ]);
        let source = ViewSource::Explicit(vec![ExplicitView {
            assets: vec!["USDC".to_string(), "WBTC".to_string()],
            weights: vec![1.0],
            expected_return: 0.02,
            confidence: 0.5,
        }]);
        let err = generate_scenarios(&source, &snapshot).unwrap_err();
        assert!(matches!(err, ModelError::InvalidView(_)));
    }

    #[test]
    fn derived_mode_yields_one_scenario_per_blend_weight() {
        let snapshot = snapshot_from(&[
            ("A", rising(2.0, 40), 100.0),
            ("B", rising(5.0, 40), 200.0),
        ]);
        let source = ViewSource::Derived {
            momentum_window_days: 30,
            blend_weights: DEFAULT_BLEND_WEIGHTS.to_vec(),
        };
        let scenarios = generate_scenarios(&source, &snapshot).unwrap();
        assert_eq!(scenarios.len(), 3);
        for views in &scenarios {
            assert_eq!(views.len(), 2);
        }
    }

    #[test]
    fn derived_views_are_normalized_and_confident() {
        let snapshot = snapshot_from(&[
            ("A", rising(2.0, 40), 100.0),
            ("B", rising(5.0, 40), 200.0),
            ("C", rising(0.5, 40), 300.0),
        ]);
        let source = ViewSource::Derived {
            momentum_window_days: 30,
            blend_weights: vec![0.5],
        };
        let scenarios = generate_scenarios(&source, &snapshot).unwrap();
        let views = &scenarios[0];

        let norm: f64 = views
            .iter()
            .map(|v| v.expected_return * v.expected_return)
            .sum::<f64>()
            .sqrt();
        assert!((norm - VIEW_NORM_TARGET).abs() < 1e-12);

        let max_confidence = views.iter().fold(0.0f64, |acc, v| acc.max(v.confidence));
        assert!((max_confidence - 1.0).abs() < 1e-12);
        for view in views {
            assert!(view.confidence > 0.0 && view.confidence <= 1.0);
            // The floored uncertainty used for Omega must stay positive.
            assert!(1.0 - view.confidence + 0.05 > 0.0);
        }
    }

    #[test]
    fn cancelled_blend_component_keeps_positive_confidence() {
        assert_eq!(derived_confidence(0.0, 0.05), MIN_CONFIDENCE);
        assert!((derived_confidence(0.05, 0.05) - 1.0).abs() < 1e-12);
        assert!(derived_confidence(-0.03, 0.05) > 0.0);
        assert!(derived_confidence(-0.03, 0.05) <= 1.0);
    }

    #[test]
    fn identical_series_produce_identical_signals() {
        let snapshot = snapshot_from(&[
            ("A", rising(3.0, 40), 150.0),
            ("B", rising(3.0, 40), 150.0),
        ]);
        let source = ViewSource::Derived {
            momentum_window_days: 30,
            blend_weights: vec![0.25, 0.75],
        };
        let scenarios = generate_scenarios(&source, &snapshot).unwrap();
        for views in &scenarios {
            assert_eq!(views[0].expected_return, views[1].expected_return);
            assert_eq!(views[0].confidence, views[1].confidence);
        }
    }

    #[test]
    fn momentum_window_is_capped_by_history() {
        // 5 observations cap the window at 4; this must not panic or read
        // past the oldest row.
        let snapshot = snapshot_from(&[("A", rising(2.0, 5), 100.0)]);
        let source = ViewSource::Derived {
            momentum_window_days: 30,
            blend_weights: vec![0.5],
        };
        let scenarios = generate_scenarios(&source, &snapshot).unwrap();
        assert_eq!(scenarios[0].len(), 1);
        assert!(scenarios[0][0].expected_return.is_finite());
    }

    #[test]
    fn single_observation_is_insufficient_history() {
        let snapshot = snapshot_from(&[("A", vec![2.0], 100.0)]);
        let source = ViewSource::Derived {
            momentum_window_days: 30,
            blend_weights: vec![0.5],
        };
        let err = generate_scenarios(&source, &snapshot).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientHistory(_)));
    }

    #[test]
    fn flat_history_has_no_valuation_signal() {
        let snapshot = snapshot_from(&[("A", vec![2.0, 2.0, 2.0, 2.0], 100.0)]);
        let source = ViewSource::Derived {
            momentum_window_days: 30,
            blend_weights: vec![0.5],
        };
        let err = generate_scenarios(&source, &snapshot).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientHistory(_)));
    }

    #[test]
    fn zero_mean_asset_uses_cross_sectional_substitute() {
        // Asset B is flat (zero mean return) while A rises; B's valuation
        // must borrow the cross-sectional mean rather than divide by zero.
        let snapshot = snapshot_from(&[
            ("A", rising(2.0, 10), 100.0),
            ("B", vec![3.0; 10], 200.0),
        ]);
        let source = ViewSource::Derived {
            momentum_window_days: 30,
            blend_weights: vec![0.5],
        };
        let scenarios = generate_scenarios(&source, &snapshot).unwrap();
        for view in &scenarios[0] {
            assert!(view.expected_return.is_finite());
        }
    }
}
