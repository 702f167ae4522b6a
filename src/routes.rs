// src/routes.rs
use std::convert::Infallible;

use log::info;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::error::ApiError;
use crate::handlers::market_data::{get_metrics, get_supported_symbols};
use crate::handlers::model::run_model;

// Map our custom rejections (and warp's own) to JSON error responses.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, kind, message) = if err.is_not_found() {
        (
            warp::http::StatusCode::NOT_FOUND,
            "NotFound",
            "Not Found".to_string(),
        )
    } else if let Some(api_error) = err.find::<ApiError>() {
        (api_error.status, api_error.kind, api_error.message.clone())
    } else if let Some(body_error) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            warp::http::StatusCode::BAD_REQUEST,
            "BadRequest",
            body_error.to_string(),
        )
    } else {
        (
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal",
            "Internal Server Error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": {
                "kind": kind,
                "message": message,
            }
        })),
        code,
    ))
}

pub fn routes() -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let run_model_route = warp::path!("api" / "v1" / "run_model" / String)
        .and(warp::post())
        .and(warp::body::json())
        .and_then(run_model);

    let symbols_route = warp::path!("api" / "v1" / "market_data" / "symbols")
        .and(warp::get())
        .and_then(get_supported_symbols);

    let metrics_route =
        warp::path!("api" / "v1" / "market_data" / "metrics" / String / String / String)
            .and(warp::get())
            .and_then(get_metrics);

    info!("All routes configured successfully.");

    run_model_route
        .or(symbols_route)
        .or(metrics_route)
        .recover(handle_rejection)
}
