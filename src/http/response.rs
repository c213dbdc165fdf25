//! Response marshalling.
//!
//! # Responsibilities
//! - Turn a `ResultTable` into the JSON wire document (columns + rows)
//! - Turn a `ProxyError` into a status code and a JSON error body
//!
//! # Design Decisions
//! - Column order and backend-reported types are preserved
//! - Error bodies carry the full error text; callers are trusted
//! - 401 responses carry a Basic challenge

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::backend::{Column, ResultTable};
use crate::error::ProxyError;

/// Challenge sent with 401 responses.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"mdx-query-proxy\"";

/// Plain-text hint returned by an unauthenticated `GET /`.
pub const USAGE: &str = "Possible parameters: server, db, query (defaults to the request body), \
localeIdentifier (default 1029), applicationName (default SSASQueryProxy), \
timeout (default 120 seconds). Authenticate with HTTP basic authentication; \
the credentials are forwarded to the backend server.";

/// Wire form of a result table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl From<ResultTable> for QueryResponse {
    fn from(table: ResultTable) -> Self {
        let (columns, rows) = table.into_parts();
        Self { columns, rows }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: String,
    field: Option<&'static str>,
    request_id: &'a str,
}

/// A `ProxyError` bound to the request it terminated.
pub struct ErrorResponse {
    pub error: ProxyError,
    pub request_id: String,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let body = ErrorBody {
            error: self.error.kind(),
            message: self.error.to_string(),
            field: self.error.field(),
            request_id: &self.request_id,
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
        }
        response
    }
}
