use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Document not found: {document_id}")]
    DocumentNotFound { document_id: i64 },

    #[error("Project not found: {project_id}")]
    ProjectNotFound { project_id: i64 },

    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    PayloadTooLarge { message: String },

    #[error("Not authorized: {message}")]
    Forbidden { message: String },

    #[error("Not authenticated: {message}")]
    Unauthorized { message: String },

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("File storage error")]
    Storage(#[source] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden {
            message: message.into(),
        }
    }
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed")]
    Migration(#[from] MigrationError),

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),
}

/// Errors raised while walking the revision chain
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Unknown revision: {revision}")]
    UnknownRevision { revision: String },

    #[error("Revision {revision} revises {found:?}, expected {expected:?}")]
    BrokenChain {
        revision: String,
        expected: Option<String>,
        found: Option<String>,
    },

    #[error("Cannot {direction} from {current} to {target}")]
    InvalidTarget {
        direction: &'static str,
        current: String,
        target: String,
    },

    #[error("Revision {revision} failed during {direction}")]
    Step {
        revision: String,
        direction: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Could not read schema revision")]
    Bookkeeping(#[source] rusqlite::Error),
}

impl From<MigrationError> for ServiceError {
    fn from(error: MigrationError) -> Self {
        ServiceError::Database(DatabaseError::Migration(error))
    }
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DocumentNotFound { .. } | ServiceError::ProjectNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ServiceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::Database(_) | ServiceError::Storage(_) | ServiceError::Config { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::DocumentNotFound { .. } => "document_not_found",
            ServiceError::ProjectNotFound { .. } => "project_not_found",
            ServiceError::Validation { .. } => "validation_failed",
            ServiceError::PayloadTooLarge { .. } => "payload_too_large",
            ServiceError::Forbidden { .. } => "forbidden",
            ServiceError::Unauthorized { .. } => "unauthorized",
            ServiceError::Database(DatabaseError::Migration(_)) => "migration_error",
            ServiceError::Database(_) => "database_error",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::Config { .. } => "config_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %format_error_chain(&self), "Request failed");
        }

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(self.error_code().to_string()),
        };

        (status, Json(response)).into_response()
    }
}

/// Render an error with all of its sources, outermost first
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
