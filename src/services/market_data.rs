// src/services/market_data.rs
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::debug;
use nalgebra::{DMatrix, DVector};

use super::defi_llama::PoolObservation;
use super::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyMetrics {
    /// Fractional yield (upstream percentage already divided by 100).
    pub apy: f64,
    pub tvl_usd: f64,
}

/// Per-asset daily series, deduplicated and bounded to the lookback window.
/// Keyed by calendar date so alignment is explicit rather than positional.
#[derive(Debug, Clone)]
pub struct AssetSeries {
    pub symbol: String,
    points: BTreeMap<NaiveDate, DailyMetrics>,
}

impl AssetSeries {
    /// Normalize raw upstream observations into one point per calendar day.
    ///
    /// When a date has several intraday observations the last one wins.
    /// Observations with a null APY or TVL are dropped here and left to the
    /// back-fill pass during alignment. At most the most recent
    /// `lookback_days` days are retained.
    pub fn from_observations(
        symbol: &str,
        observations: &[PoolObservation],
        lookback_days: usize,
    ) -> Result<Self, ModelError> {
        let mut ordered: Vec<&PoolObservation> = observations.iter().collect();
        ordered.sort_by_key(|obs| obs.timestamp);

        let mut points = BTreeMap::new();
        for obs in ordered {
            if let (Some(apy), Some(tvl_usd)) = (obs.apy, obs.tvl_usd) {
                points.insert(
                    obs.timestamp.date_naive(),
                    DailyMetrics {
                        apy: apy / 100.0,
                        tvl_usd,
                    },
                );
            }
        }

        if points.is_empty() {
            return Err(ModelError::DataUnavailable(format!(
                "no usable observations for {}",
                symbol
            )));
        }

        while points.len() > lookback_days {
            points.pop_first();
        }

        debug!(
            "Normalized {} into {} daily observations",
            symbol,
            points.len()
        );
        Ok(AssetSeries {
            symbol: symbol.to_string(),
            points,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, date: &NaiveDate) -> Option<&DailyMetrics> {
        self.points.get(date)
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.points.keys()
    }

    /// Most recent observed value at or before `date`, the back-fill source.
    fn latest_at_or_before(&self, date: &NaiveDate) -> Option<&DailyMetrics> {
        self.points.range(..=*date).next_back().map(|(_, m)| m)
    }
}

/// Cross-sectional join of asset series on a shared date axis, newest first.
///
/// Alignment takes the union of per-asset dates, back-fills each series from
/// its nearest older observation, then drops any date some series still
/// cannot cover. The retained window therefore has no missing values.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    apy: DMatrix<f64>,
    tvl: DMatrix<f64>,
}

impl MarketSnapshot {
    pub fn align(series: &[AssetSeries]) -> Result<Self, ModelError> {
        if series.is_empty() {
            return Err(ModelError::DataUnavailable(
                "no asset series to align".to_string(),
            ));
        }

        let mut axis = BTreeSet::new();
        for s in series {
            axis.extend(s.dates().copied());
        }

        // Keep the dates every series can cover once back-filled, i.e. those
        // not older than the youngest first observation across assets.
        let mut dates: Vec<NaiveDate> = axis
            .into_iter()
            .filter(|date| series.iter().all(|s| s.latest_at_or_before(date).is_some()))
            .collect();
        dates.reverse();

        if dates.is_empty() {
            return Err(ModelError::DataUnavailable(
                "asset series share no overlapping history".to_string(),
            ));
        }

        let n_dates = dates.len();
        let n_assets = series.len();
        let mut apy = DMatrix::zeros(n_dates, n_assets);
        let mut tvl = DMatrix::zeros(n_dates, n_assets);
        for (col, s) in series.iter().enumerate() {
            for (row, date) in dates.iter().enumerate() {
                // Covered dates always have an older-or-equal observation.
                let metrics = s.latest_at_or_before(date).ok_or_else(|| {
                    ModelError::DataUnavailable(format!(
                        "missing observation for {} on {}",
                        s.symbol, date
                    ))
                })?;
                apy[(row, col)] = metrics.apy;
                tvl[(row, col)] = metrics.tvl_usd;
            }
        }

        debug!(
            "Aligned {} assets on {} shared dates ({} .. {})",
            n_assets,
            n_dates,
            dates[n_dates - 1],
            dates[0]
        );

        Ok(MarketSnapshot {
            symbols: series.iter().map(|s| s.symbol.clone()).collect(),
            dates,
            apy,
            tvl,
        })
    }

    pub fn n_assets(&self) -> usize {
        self.symbols.len()
    }

    pub fn n_observations(&self) -> usize {
        self.dates.len()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// APY at the given date row (0 = newest) for the given asset column.
    pub fn apy_at(&self, row: usize, col: usize) -> f64 {
        self.apy[(row, col)]
    }

    pub fn latest_tvl(&self) -> DVector<f64> {
        self.tvl.row(0).transpose()
    }

    /// Daily simple returns per asset in chronological order; row `t` holds
    /// the return from the (t+1)-oldest date to the t-oldest one. A zero base
    /// yields a flat (zero) return rather than poisoning the matrix.
    pub fn daily_returns(&self) -> Result<DMatrix<f64>, ModelError> {
        let t = self.n_observations();
        if t < 2 {
            return Err(ModelError::InsufficientHistory(format!(
                "need at least 2 observations to compute returns, have {}",
                t
            )));
        }

        let n = self.n_assets();
        let mut returns = DMatrix::zeros(t - 1, n);
        for j in 0..(t - 1) {
            // Rows are newest-first, so chronological step j goes from row
            // t-1-j to row t-2-j.
            let older = t - 1 - j;
            let newer = t - 2 - j;
            for col in 0..n {
                let base = self.apy[(older, col)];
                returns[(j, col)] = if base == 0.0 {
                    0.0
                } else {
                    self.apy[(newer, col)] / base - 1.0
                };
            }
        }
        Ok(returns)
    }
}

/// Build an aligned snapshot from raw per-symbol observations.
pub fn build_snapshot(
    raw: &[(String, Vec<PoolObservation>)],
    lookback_days: usize,
) -> Result<MarketSnapshot, ModelError> {
    let mut series = Vec::with_capacity(raw.len());
    for (symbol, observations) in raw {
        series.push(AssetSeries::from_observations(
            symbol,
            observations,
            lookback_days,
        )?);
    }
    MarketSnapshot::align(&series)
}
