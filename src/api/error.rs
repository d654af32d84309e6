//! API error types and conversions

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    actors::{actuator::ControlError, aggregator::AggregationError},
    catalog::CatalogError,
};

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Catalog operation failed
    CatalogError(String),

    /// Invalid request parameters
    InvalidRequest(String),

    /// Resource not found
    NotFound(String),

    /// Request refused in the current state (e.g. manual command in auto mode)
    Conflict(String),

    /// Internal server error
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::CatalogError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::CatalogError(other.to_string()),
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::UnknownCluster(_) => ApiError::NotFound(err.to_string()),
            ControlError::Catalog(e) => e.into(),
        }
    }
}

impl From<AggregationError> for ApiError {
    fn from(err: AggregationError) -> Self {
        match err {
            AggregationError::Catalog(e) => e.into(),
            AggregationError::Control(e) => e.into(),
            AggregationError::AmbiguousMembership { .. } => ApiError::Conflict(err.to_string()),
            AggregationError::Unavailable(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_ambiguous_membership_is_a_conflict() {
        let err = ApiError::from(AggregationError::AmbiguousMembership {
            rack_id: "R1".into(),
            clusters: vec!["C1".into(), "C2".into()],
        });

        let message = assert_matches!(err, ApiError::Conflict(message) => message);
        assert!(message.contains("R1"));
        assert!(message.contains("C2"));

        let response = ApiError::Conflict(message).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_unknown_cluster_is_not_found() {
        let err = ApiError::from(AggregationError::Control(ControlError::UnknownCluster("C9".into())));

        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
