//! MDX Query Proxy Library
//!
//! Stateless HTTP proxy that runs analytical (MDX) queries against an
//! allow-listed backend server under the caller's own credentials.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod query;
pub mod security;

pub use auth::Credentials;
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use query::QueryRequest;
pub use security::AllowList;
