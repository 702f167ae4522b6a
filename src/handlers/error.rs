// src/handlers/error.rs
use std::fmt;

use warp::http::StatusCode;
use warp::reject::Reject;

use crate::services::error::ModelError;

/// Boundary error: a symbolic kind plus message, never internal matrix
/// algebra detail.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: &'static str,
    pub message: String,
    pub status: StatusCode,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            kind: "BadRequest",
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            kind: "NotFound",
            message: message.into(),
            status: StatusCode::NOT_FOUND,
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        let status = match &err {
            ModelError::DataUnavailable(_) => StatusCode::BAD_GATEWAY,
            ModelError::InvalidView(_) => StatusCode::BAD_REQUEST,
            ModelError::InsufficientHistory(_)
            | ModelError::DegenerateWeights(_)
            | ModelError::SingularMatrix(_)
            | ModelError::InfeasibleOptimization(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        ApiError {
            kind: err.kind(),
            message: err.to_string(),
            status,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_map_to_status_codes() {
        let data = ApiError::from(ModelError::DataUnavailable("gone".to_string()));
        assert_eq!(data.status, StatusCode::BAD_GATEWAY);
        assert_eq!(data.kind, "DataUnavailable");

        let view = ApiError::from(ModelError::InvalidView("bad".to_string()));
        assert_eq!(view.status, StatusCode::BAD_REQUEST);

        let singular = ApiError::from(ModelError::SingularMatrix("S".to_string()));
        assert_eq!(singular.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(singular.kind, "SingularMatrix");
    }
}
