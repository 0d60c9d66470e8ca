use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error.
    #[error("{0} not found")]
    NotFound(String),

    /// The caller may not see the requested resource.
    ///
    /// The message never says which check failed.
    #[error("Access denied")]
    AccessDenied,

    /// Condition JSON with an invalid shape, an unknown field, or a field
    /// that does not belong to the queried entity kind.
    #[error("Malformed condition at {path}: {message}")]
    MalformedCondition {
        /// JSON pointer of the offending node.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// Operator name that does not apply to the field's value kind.
    #[error("Operator '{operator}' is not supported for field '{field}'")]
    UnsupportedOperator {
        /// Field name as it appears on the wire.
        field: String,
        /// Operator name as it appears on the wire.
        operator: String,
    },

    /// Invalid request payload or parameter.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or unknown credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a malformed condition at `path`.
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::MalformedCondition {
            path: path.into(),
            message: message.into(),
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::MalformedCondition { .. }
            | AppError::UnsupportedOperator { .. }
            | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, self.to_string()).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
