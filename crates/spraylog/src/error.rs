//! Error types for spraylog.
//!
//! This module defines all error types used throughout the spraylog crate,
//! and how each one is reported to HTTP clients.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::record::{FieldIssue, ValidationError};

/// The main error type for spraylog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Request Errors ===
    /// The submitted payload could not be turned into a record.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No record exists with the requested id.
    #[error("record {id} not found")]
    NotFound {
        /// The id that was looked up.
        id: i64,
    },

    // === Storage Errors ===
    /// A freshly inserted record could not be read back.
    #[error("record {id} unavailable after insert")]
    StorageUnavailable {
        /// The id assigned by the insert.
        id: i64,
    },

    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system or socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for spraylog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error is a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status used when this error reaches a client.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::StorageUnavailable { .. }
            | Self::DatabaseOpen { .. }
            | Self::DatabaseQuery(_)
            | Self::ConfigLoad(_)
            | Self::ConfigValidation { .. }
            | Self::Io(_)
            | Self::DirectoryCreate { .. }
            | Self::Json(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub detail: String,
    /// HTTP status code.
    pub code: u16,
    /// Per-field issues, present for validation failures only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldIssue>,
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> Self {
        let code = err.status_code().as_u16();
        match err {
            Error::Validation(validation) => Self {
                detail: validation.to_string(),
                code,
                errors: validation.into_issues(),
            },
            // Internal details stay in the server log.
            _ if code >= 500 => Self {
                detail: "internal server error".to_string(),
                code,
                errors: Vec::new(),
            },
            other => Self {
                detail: other.to_string(),
                code,
                errors: Vec::new(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {self}");
        } else {
            debug!("Rejected request: {self}");
        }
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}
