// src/services/defi_llama.rs
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

use super::error::ModelError;

/// Symbols with a known DeFiLlama pool mapping.
pub const SUPPORTED_SYMBOLS: [&str; 5] = ["STETH", "GHO", "USDC", "WBTC", "JITOSOL"];

const POOL_IDS: [(&str, &str); 5] = [
    ("STETH", "747c1d2a-c668-4682-b9f9-296708a3dd90"),
    ("GHO", "ff2a68af-030c-4697-b0a1-b62a738eaef0"),
    ("USDC", "aa70268e-4b52-42bf-a116-608b370f9501"),
    ("WBTC", "d4b3c522-6127-4b89-bedf-83641cdcd2eb"),
    ("JITOSOL", "0e7d0722-9054-4907-8593-567b353c0900"),
];

/// One raw upstream observation. APY arrives as a percentage and is only
/// divided by 100 when the series is normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolObservation {
    pub timestamp: DateTime<Utc>,
    pub apy: Option<f64>,
    #[serde(rename = "tvlUsd")]
    pub tvl_usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    status: String,
    #[serde(default)]
    data: Vec<PoolObservation>,
}

pub fn pool_id_for_symbol(symbol: &str) -> Result<&'static str, ModelError> {
    let normalized = symbol.to_uppercase();
    POOL_IDS
        .iter()
        .find(|(sym, _)| *sym == normalized)
        .map(|(_, id)| *id)
        .ok_or_else(|| {
            ModelError::DataUnavailable(format!(
                "symbol '{}' not found in pool mapping, available symbols: {}",
                symbol,
                SUPPORTED_SYMBOLS.join(", ")
            ))
        })
}

/// Fetch the full historic TVL/APY series for one symbol.
///
/// Any upstream failure (unknown symbol, non-success status, empty series)
/// aborts with DataUnavailable so a multi-asset request never continues with
/// an inconsistent asset universe.
pub async fn fetch_tvl_and_apy(symbol: &str) -> Result<Vec<PoolObservation>, ModelError> {
    let pool_id = pool_id_for_symbol(symbol)?;
    let url = format!("https://yields.llama.fi/chart/{}", pool_id);
    info!("Fetching TVL/APY history for {} from {}", symbol, url);

    let response = reqwest::get(&url).await.map_err(|e| {
        error!("Request to DeFiLlama failed for {}: {}", symbol, e);
        ModelError::DataUnavailable(format!("request to DeFiLlama failed for {}: {}", symbol, e))
    })?;

    let status = response.status();
    if !status.is_success() {
        error!("DeFiLlama returned {} for {}", status, symbol);
        return Err(ModelError::DataUnavailable(format!(
            "DeFiLlama returned HTTP {} for {}",
            status, symbol
        )));
    }

    let chart: ChartResponse = response.json().await.map_err(|e| {
        ModelError::DataUnavailable(format!("malformed DeFiLlama response for {}: {}", symbol, e))
    })?;

    if chart.status != "success" {
        return Err(ModelError::DataUnavailable(format!(
            "DeFiLlama returned status '{}' for {}",
            chart.status, symbol
        )));
    }
    if chart.data.is_empty() {
        return Err(ModelError::DataUnavailable(format!(
            "DeFiLlama returned an empty series for {}",
            symbol
        )));
    }

    info!("Fetched {} observations for {}", chart.data.len(), symbol);
    Ok(chart.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_mapping_is_case_insensitive() {
        assert_eq!(
            pool_id_for_symbol("usdc").unwrap(),
            "aa70268e-4b52-42bf-a116-608b370f9501"
        );
        assert_eq!(
            pool_id_for_symbol("StEth").unwrap(),
            "747c1d2a-c668-4682-b9f9-296708a3dd90"
        );
    }

    #[test]
    fn unknown_symbol_is_data_unavailable() {
        let err = pool_id_for_symbol("DOGE").unwrap_err();
        assert!(matches!(err, ModelError::DataUnavailable(_)));
        assert!(err.to_string().contains("DOGE"));
    }

    #[test]
    fn chart_response_parses_upstream_shape() {
        let body = r#"{
            "status": "success",
            "data": [
                {"timestamp": "2025-05-01T23:01:14.069Z", "apy": 3.2, "tvlUsd": 1200000.0},
                {"timestamp": "2025-05-02T23:01:14.069Z", "apy": null, "tvlUsd": null}
            ]
        }"#;
        let chart: ChartResponse = serde_json::from_str(body).unwrap();
        assert_eq!(chart.status, "success");
        assert_eq!(chart.data.len(), 2);
        assert_eq!(chart.data[0].apy, Some(3.2));
        assert!(chart.data[1].apy.is_none());
    }
}
