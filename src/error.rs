// src/error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Failures of one sync cycle. None of them are fatal to the process.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("could not resolve {host}: {cause}")]
    ResolutionFailure { host: String, cause: String },

    #[error("SOA serial unavailable: {0}")]
    SerialUnavailable(String),

    #[error("transfer rejected: {0}")]
    AuthenticationFailure(String),

    #[error("zone transfer failed: {0}")]
    TransferFailure(String),

    #[error("malformed zone data: {0}")]
    MalformedZoneData(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    ResolutionFailure,
    SerialUnavailable,
    AuthenticationFailure,
    TransferFailure,
    MalformedZoneData,
}

impl SyncError {
    pub fn serial(cause: impl ToString) -> Self {
        SyncError::SerialUnavailable(cause.to_string())
    }

    pub fn transfer(cause: impl ToString) -> Self {
        SyncError::TransferFailure(cause.to_string())
    }

    pub fn auth(cause: impl ToString) -> Self {
        SyncError::AuthenticationFailure(cause.to_string())
    }

    pub fn malformed(cause: impl ToString) -> Self {
        SyncError::MalformedZoneData(cause.to_string())
    }

    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::ResolutionFailure { .. } => SyncErrorKind::ResolutionFailure,
            SyncError::SerialUnavailable(_) => SyncErrorKind::SerialUnavailable,
            SyncError::AuthenticationFailure(_) => SyncErrorKind::AuthenticationFailure,
            SyncError::TransferFailure(_) => SyncErrorKind::TransferFailure,
            SyncError::MalformedZoneData(_) => SyncErrorKind::MalformedZoneData,
        }
    }

    /// Signature rejections point at misconfiguration and are logged louder.
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::AuthenticationFailure(_))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponseBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not found".into()),
        };

        let body = Json(ErrorResponseBody { error: msg });
        (status, body).into_response()
    }
}
