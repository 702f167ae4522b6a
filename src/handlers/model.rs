// src/handlers/model.rs
use log::{error, info};
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::models::{ModelRequest, ModelResponse};
use crate::services::error::ModelError;
use crate::services::{defi_llama, market_data, model};

fn reject_model_error(err: ModelError) -> Rejection {
    error!("Model computation failed: {}", err);
    warp::reject::custom(ApiError::from(err))
}

/// POST /api/v1/run_model/{model_name}
pub async fn run_model(model_name: String, request: ModelRequest) -> Result<Json, Rejection> {
    info!(
        "Handling run_model request for '{}' over {} symbol(s)",
        model_name,
        request.asset_symbols.len()
    );

    if model_name.to_lowercase() != "blacklitterman" {
        return Err(warp::reject::custom(ApiError::bad_request(format!(
            "only the BlackLitterman model is supported, got '{}'",
            model_name
        ))));
    }
    if request.asset_symbols.is_empty() {
        return Err(warp::reject::custom(ApiError::bad_request(
            "AssetSymbols must contain at least one symbol",
        )));
    }

    let symbols: Vec<String> = request
        .asset_symbols
        .iter()
        .map(|s| s.to_uppercase())
        .collect();
    for (index, symbol) in symbols.iter().enumerate() {
        if symbols[..index].contains(symbol) {
            return Err(warp::reject::custom(ApiError::bad_request(format!(
                "duplicate asset symbol '{}'",
                symbol
            ))));
        }
    }

    let config = request
        .resolve_config()
        .map_err(|message| warp::reject::custom(ApiError::bad_request(message)))?;
    let source = request.view_source(&config);

    // Sequential fetch per symbol; one failure aborts the whole request so
    // the covariance universe stays consistent.
    let mut raw = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let observations = defi_llama::fetch_tvl_and_apy(symbol)
            .await
            .map_err(reject_model_error)?;
        raw.push((symbol.clone(), observations));
    }

    let snapshot =
        market_data::build_snapshot(&raw, config.lookback_days).map_err(reject_model_error)?;
    let outcomes =
        model::run_allocation(&snapshot, &source, &config).map_err(reject_model_error)?;

    info!(
        "run_model produced {} scenario result(s) for '{}'",
        outcomes.len(),
        model_name
    );
    Ok(warp::reply::json(&ModelResponse::from_outcomes(
        &request, outcomes,
    )))
}
