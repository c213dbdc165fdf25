//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, tracing span)
//!     → query.rs (URI parameters → QueryRequest, defaults)
//!     → [auth → security → backend]
//!     → response.rs (ResultTable → JSON, ProxyError → status + body)
//!     → Send to client
//! ```

pub mod query;
pub mod request;
pub mod response;
pub mod server;

pub use query::QueryParams;
pub use request::X_REQUEST_ID;
pub use response::{QueryResponse, USAGE};
pub use server::{AppState, HttpServer};
