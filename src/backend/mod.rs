//! Backend query execution subsystem.
//!
//! # Data Flow
//! ```text
//! ValidatedRequest
//!     → descriptor.rs (ConnectionDescriptor: identity + fixed session settings)
//!     → executor.rs (connect → execute → release, timing and row counts)
//!         → QueryBackend::connect (xmla/client.rs in production)
//!         → BackendConnection::execute
//!     → table.rs (ResultTable, schema taken from the backend as-is)
//! ```
//!
//! # Design Decisions
//! - One exclusive connection per request; nothing is pooled or reused
//! - The connection is released by a guard's `Drop` on every exit path
//! - No retries: failures surface to the caller, who owns retry policy
//! - The executor only knows the traits below, so tests can inject doubles

pub mod descriptor;
pub mod error;
pub mod executor;
pub mod table;
pub mod xmla;

use async_trait::async_trait;

pub use descriptor::ConnectionDescriptor;
pub use error::BackendError;
pub use executor::QueryExecutor;
pub use table::{Column, ColumnType, ResultTable};
pub use xmla::XmlaBackend;

/// Opens connections to the analytical backend.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Open a connection described by `descriptor`, authenticating with the
    /// caller's credentials. Blocks for at most the descriptor's timeout.
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn BackendConnection>, BackendError>;
}

/// An open connection owned by exactly one request.
///
/// Dropping the value closes the connection.
#[async_trait]
pub trait BackendConnection: Send {
    /// Run `statement` and read the complete result set into memory.
    async fn execute(&mut self, statement: &str) -> Result<ResultTable, BackendError>;
}
