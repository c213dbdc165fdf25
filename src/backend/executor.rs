//! Backend query executor.
//!
//! # Responsibilities
//! - Build the connection descriptor from validated input
//! - Open one exclusive connection, run the query, read every row
//! - Release the connection on success, failure and cancellation alike
//! - Record elapsed time and row counts

use std::sync::Arc;
use std::time::Instant;

use crate::backend::{BackendConnection, BackendError, ConnectionDescriptor, QueryBackend, ResultTable};
use crate::observability::metrics;
use crate::security::ValidatedRequest;

/// Runs validated queries against the backend.
#[derive(Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn QueryBackend>,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self { backend }
    }

    /// Execute the request's query under the caller's identity.
    ///
    /// Never retries; the first failure is returned.
    pub async fn execute(
        &self,
        validated: &ValidatedRequest,
        request_id: &str,
    ) -> Result<ResultTable, BackendError> {
        let descriptor = ConnectionDescriptor::from_validated(validated);
        tracing::debug!(
            request_id = %request_id,
            connection = %descriptor,
            "Opening backend connection"
        );

        let start = Instant::now();
        let result = self
            .run(&descriptor, &validated.request().query_text, request_id)
            .await;
        let elapsed = start.elapsed();

        match &result {
            Ok(table) => {
                tracing::info!(
                    request_id = %request_id,
                    server = %descriptor.server,
                    elapsed_ms = elapsed.as_millis() as u64,
                    rows = table.row_count(),
                    columns = table.column_count(),
                    "Backend query completed"
                );
                metrics::record_backend_call("ok", elapsed, Some(table.row_count()));
            }
            Err(e) => {
                tracing::debug!(
                    request_id = %request_id,
                    server = %descriptor.server,
                    elapsed_ms = elapsed.as_millis() as u64,
                    kind = e.kind(),
                    "Backend query failed"
                );
                metrics::record_backend_call(e.kind(), elapsed, None);
            }
        }

        result
    }

    async fn run(
        &self,
        descriptor: &ConnectionDescriptor,
        statement: &str,
        request_id: &str,
    ) -> Result<ResultTable, BackendError> {
        let connection = self.backend.connect(descriptor).await?;
        let mut guard = ConnectionGuard::new(connection, request_id, &descriptor.server);
        guard.connection.execute(statement).await
    }
}

/// Owns an open connection for the rest of the request and closes it on drop.
struct ConnectionGuard {
    connection: Box<dyn BackendConnection>,
    request_id: String,
    server: String,
}

impl ConnectionGuard {
    fn new(connection: Box<dyn BackendConnection>, request_id: &str, server: &str) -> Self {
        metrics::connection_opened();
        Self {
            connection,
            request_id: request_id.to_string(),
            server: server.to_string(),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::connection_released();
        tracing::debug!(
            request_id = %self.request_id,
            server = %self.server,
            "Backend connection released"
        );
    }
}
