use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::{AppState, ServiceError, ValidationFailure};

pub mod exports;
pub mod leaderboard;
pub mod submissions;

/// Carriers accepted by the access guard, in the order they are checked.
pub const CREDENTIAL_CARRIERS: [&str; 3] = [
    "Authorization: Bearer <token>",
    "X-API-Key: <token>",
    "?token=<token>",
];

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let liveness = state.results().liveness().await;
    let status_code = if liveness.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(liveness))
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(ValidationFailure),
    Unauthorized(String),
    StoreUnavailable(String),
    StoreOperation(String),
    ExportGeneration(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    fn category(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::StoreUnavailable(_) => "store_unavailable",
            ApiError::StoreOperation(_) => "store_error",
            ApiError::ExportGeneration(_) => "export_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::StoreOperation(_) | ApiError::ExportGeneration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(failure) => ApiError::Validation(failure),
            ServiceError::StoreUnavailable(message) => ApiError::StoreUnavailable(message),
            ServiceError::StoreOperation(e) => {
                tracing::error!(error = %e, "Record store operation failed");
                ApiError::StoreOperation(e.to_string())
            }
            ServiceError::ExportGeneration(message) => {
                tracing::error!(error = %message, "Export generation failed");
                ApiError::ExportGeneration(message)
            }
            ServiceError::BadRequest(message) => ApiError::BadRequest(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({ "error": self.category() });

        match self {
            ApiError::Validation(failure) => {
                body["message"] = json!(failure.to_string());
                match failure {
                    ValidationFailure::MissingFields(fields) => {
                        body["missing_fields"] = json!(fields);
                    }
                    ValidationFailure::InvalidEmail(field) => {
                        body["field"] = json!(field);
                    }
                }
            }
            ApiError::Unauthorized(message) => {
                body["message"] = json!(message);
                body["hint"] = json!({ "accepted_credentials": CREDENTIAL_CARRIERS });
            }
            ApiError::BadRequest(message)
            | ApiError::StoreUnavailable(message)
            | ApiError::StoreOperation(message)
            | ApiError::ExportGeneration(message) => {
                body["message"] = json!(message);
            }
        }

        (status, Json(body)).into_response()
    }
}
