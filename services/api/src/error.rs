//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service and the HTTP rendering of
//! request-level pipeline failures.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use syllabus_core::{ErrorKind, PipelineError};
use tracing::{error, warn};
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from building an HTTP client.
    #[error("HTTP Client Error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The JSON body of every request-level failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    /// Machine-readable failure class.
    pub code: String,
    /// The model's unparsed reply, for `malformed_response` failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// A failure rendered by a handler: either a request-level pipeline failure or a
/// problem with the HTTP request itself.
#[derive(Debug)]
pub enum HttpError {
    Pipeline(PipelineError),
    BadRequest(String),
    Internal(String),
}

impl From<PipelineError> for HttpError {
    fn from(err: PipelineError) -> Self {
        HttpError::Pipeline(err)
    }
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Pipeline(PipelineError::MissingCredential) => StatusCode::UNAUTHORIZED,
            // Request-level port failures come from the server's own credentials.
            HttpError::Pipeline(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Transport | ErrorKind::MalformedResponse => StatusCode::BAD_GATEWAY,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            HttpError::BadRequest(_) => "bad_request",
            HttpError::Internal(_) => "internal",
            HttpError::Pipeline(err) => match err {
                PipelineError::NoFiles => "no_files",
                PipelineError::InvalidUserId(_) => "invalid_user_id",
                PipelineError::NoDocuments(_) => "no_documents",
                PipelineError::NoEventsProvided => "no_events_provided",
                PipelineError::MissingCredential => "missing_credential",
                PipelineError::Malformed(_) => "malformed_response",
                PipelineError::Port(_) => "transport_fault",
            },
        }
    }

    fn message(&self) -> String {
        match self {
            HttpError::Pipeline(err) => err.to_string(),
            HttpError::BadRequest(message) | HttpError::Internal(message) => message.clone(),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            error!(code = self.code(), "Request failed: {}", message);
        } else {
            warn!(code = self.code(), "Request rejected: {}", message);
        }

        let raw = match &self {
            HttpError::Pipeline(PipelineError::Malformed(m)) => Some(m.raw.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: message,
            code: self.code().to_string(),
            raw,
        };
        (status, Json(body)).into_response()
    }
}
