//! Request correlation.
//!
//! # Responsibilities
//! - Assign every request an `x-request-id` (UUID v4) unless the caller sent one
//! - Expose the id to handlers and to the per-request tracing span
//! - Echo the id on the response
//!
//! # Design Decisions
//! - Request ID added as the outermost layer so every log line can carry it
//! - An id supplied by the caller is kept, so client and proxy logs join up

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer, MakeRequestUuid};
use tracing::Span;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer assigning a UUID request id when none is present.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer copying the request id onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// The request id carried by `headers`, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Span for `TraceLayer`, tagged with the request id.
pub fn make_request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request_id(request.headers()),
        method = %request.method(),
        path = %request.uri().path(),
    )
}
