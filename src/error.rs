//! Request-level error taxonomy and its HTTP status mapping.

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::BackendError;
use crate::security::ValidationError;

/// Terminal failure of one proxied request.
///
/// Validation and credential failures happen before any backend resource is
/// touched; backend failures happen after the connection has been released.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Basic authentication credentials not found in request")]
    MissingCredentials,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingCredentials => StatusCode::UNAUTHORIZED,
            ProxyError::Validation(ValidationError::BodyTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Validation(_) => StatusCode::BAD_REQUEST,
            ProxyError::Backend(e) => match e {
                BackendError::Authentication(_) => StatusCode::UNAUTHORIZED,
                BackendError::Connection(_) | BackendError::Protocol(_) => StatusCode::BAD_GATEWAY,
                BackendError::Query { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                BackendError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MissingCredentials => "authentication_missing",
            ProxyError::Validation(_) => "validation",
            ProxyError::Backend(e) => e.kind(),
        }
    }

    /// Offending request field, for validation failures.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ProxyError::Validation(e) => Some(e.field()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(ProxyError::MissingCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ProxyError::from(ValidationError::ServerNotAllowed).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::from(ValidationError::BodyTooLarge { limit: 16 }).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ProxyError::from(BackendError::Timeout { seconds: 1 }).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::from(BackendError::Connection("down".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::from(BackendError::Authentication("no".into())).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ProxyError::from(BackendError::Query { code: None, message: "x".into() }).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn validation_errors_name_their_field() {
        let err = ProxyError::from(ValidationError::ServerNotAllowed);
        assert_eq!(err.field(), Some("server"));
        assert_eq!(err.kind(), "validation");
        assert_eq!(
            err.to_string(),
            "Parameter server contains forbidden value (not in allowed servers list)"
        );
        assert_eq!(ProxyError::MissingCredentials.field(), None);
    }
}
