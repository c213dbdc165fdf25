//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → plain: tokio TcpListener served by axum (http/server.rs)
//!     → TLS:   tls.rs (rustls handshake via axum-server)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is optional; basic-auth credentials should only travel over TLS or
//!   behind a TLS-terminating front end
//! - Both paths drain in-flight requests on shutdown

pub mod tls;
