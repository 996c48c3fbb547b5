//! HTTP error mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chairside_core::{ClinicError, DbError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Clinic(#[from] ClinicError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        ApiError::Clinic(e.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Clinic(e) => match e {
                ClinicError::Validation(_) => StatusCode::BAD_REQUEST,
                ClinicError::NotFound(_) => StatusCode::NOT_FOUND,
                ClinicError::InvalidTransition { .. } => StatusCode::CONFLICT,
                ClinicError::DayLocked { .. } => StatusCode::LOCKED,
                ClinicError::AlreadyClosed { .. } => StatusCode::BAD_REQUEST,
                ClinicError::ConcurrencyConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
                ClinicError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Clinic(e) => e.code(),
            ApiError::BadRequest(_) => "VALIDATION_ERROR",
            ApiError::Worker(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        }
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
