// src/handlers/market_data.rs
use log::{error, info};
use serde_json::json;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::services::defi_llama::{self, SUPPORTED_SYMBOLS};

/// GET /api/v1/market_data/symbols
pub async fn get_supported_symbols() -> Result<Json, Rejection> {
    Ok(warp::reply::json(&json!({ "symbols": SUPPORTED_SYMBOLS })))
}

/// GET /api/v1/market_data/metrics/{provider}/{metric_set}/{symbol}
///
/// Raw passthrough of the upstream series, useful for inspecting what the
/// model actually consumed.
pub async fn get_metrics(
    provider: String,
    metric_set: String,
    symbol: String,
) -> Result<Json, Rejection> {
    info!(
        "Handling market data request: provider={} metric_set={} symbol={}",
        provider, metric_set, symbol
    );

    if provider.to_lowercase() != "defillama" {
        return Err(warp::reject::custom(ApiError::not_found(
            "only the DefiLlama market data provider is supported",
        )));
    }
    if metric_set.to_lowercase() != "tvl_and_apy" {
        return Err(warp::reject::custom(ApiError::not_found(
            "only the tvl_and_apy metric set is supported",
        )));
    }

    let symbol = symbol.to_uppercase();
    if !SUPPORTED_SYMBOLS.contains(&symbol.as_str()) {
        return Err(warp::reject::custom(ApiError::not_found(format!(
            "symbol '{}' is not supported, available symbols: {}",
            symbol,
            SUPPORTED_SYMBOLS.join(", ")
        ))));
    }

    let observations = defi_llama::fetch_tvl_and_apy(&symbol)
        .await
        .map_err(|e| {
            error!("Market data fetch failed for {}: {}", symbol, e);
            warp::reject::custom(ApiError::from(e))
        })?;
    Ok(warp::reply::json(&observations))
}
