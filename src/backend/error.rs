//! Backend failure taxonomy.

use thiserror::Error;

/// Errors raised while talking to the analytical backend.
///
/// The text of every variant is returned to the caller verbatim.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    /// The backend could not be reached or the connection could not be opened.
    #[error("Backend connection failed: {0}")]
    Connection(String),

    /// The backend refused the forwarded credentials.
    #[error("Backend authentication failed: {0}")]
    Authentication(String),

    /// The backend rejected or failed to run the query.
    #[error("Backend query failed{}: {message}", .code.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default())]
    Query { code: Option<String>, message: String },

    /// The backend did not answer within the requested timeout.
    #[error("Backend call timed out after {seconds} seconds")]
    Timeout { seconds: i32 },

    /// The backend answered with something that is not a readable rowset.
    #[error("Backend returned an unreadable response: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Short label used in logs, metrics and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Connection(_) => "backend_connection",
            BackendError::Authentication(_) => "backend_authentication",
            BackendError::Query { .. } => "backend_query",
            BackendError::Timeout { .. } => "backend_timeout",
            BackendError::Protocol(_) => "backend_protocol",
        }
    }
}
