use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Validation failures raised by the matching core.
///
/// Every variant is fatal to the call that raised it and nothing else: a
/// failed map edit leaves the map untouched, a failed score never yields a
/// partial report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid normalization mapping: {0}")]
    InvalidMapping(String),

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),
}

impl ScoringError {
    pub fn config(msg: impl Into<String>) -> Self {
        ScoringError::InvalidConfig(msg.into())
    }

    pub fn mapping(msg: impl Into<String>) -> Self {
        ScoringError::InvalidMapping(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        ScoringError::InvalidQuery(msg.into())
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Scoring(err) => {
                let code = match err {
                    ScoringError::InvalidConfig(_) => "INVALID_CONFIG",
                    ScoringError::InvalidMapping(_) => "INVALID_MAPPING",
                    ScoringError::InvalidQuery(_) => "INVALID_QUERY",
                };
                tracing::warn!("Rejected request: {err}");
                (StatusCode::UNPROCESSABLE_ENTITY, code, err.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_error_messages_are_actionable() {
        let err = ScoringError::config("channel weights must sum to 1.0 (got 0.9)");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: channel weights must sum to 1.0 (got 0.9)"
        );
    }

    #[test]
    fn test_scoring_error_maps_to_unprocessable_entity() {
        let response = AppError::from(ScoringError::mapping("empty term")).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::NotFound("variant 'py'".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
