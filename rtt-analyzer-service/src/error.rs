//! Mapping of service errors to HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rtt_analyzer_core::protocol::ErrorResponse;
use rtt_analyzer_core::sample::FormatError;
use thiserror::Error;
use tracing::{error, warn};

use crate::analysis::AnalysisError;
use crate::config_store::ConfigStoreError;
use crate::store::StoreError;

/// Any error a route can return. Rendered as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigStoreError),

    #[error("Invalid request body: {}", .0.body_text())]
    Rejected(#[from] JsonRejection),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Analysis(err) => match err {
                AnalysisError::Format(FormatError::NotFound(_)) => StatusCode::NOT_FOUND,
                AnalysisError::Format(FormatError::Io { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
                AnalysisError::Format(_) | AnalysisError::EmptySample(_) => StatusCode::BAD_REQUEST,
                AnalysisError::OutputDir { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                AnalysisError::Store(err) => store_status(err),
            },
            ApiError::Store(err) => store_status(err),
            ApiError::Config(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Rejected(rejection) => rejection.status(),
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        StoreError::InvalidMerge(_)
        | StoreError::InvalidIndex { .. }
        | StoreError::EmptySelection => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            ApiError::Analysis(err) if status.is_server_error() => {
                format!("Failed while {}: {}", err.stage(), err)
            }
            other => other.to_string(),
        };

        if status.is_server_error() {
            error!("{detail}");
        } else {
            warn!("{detail}");
        }

        (status, Json(ErrorResponse::new(detail))).into_response()
    }
}
