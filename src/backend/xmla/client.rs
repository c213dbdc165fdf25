//! XMLA backend client.
//!
//! # Responsibilities
//! - Resolve a server identifier to its XMLA endpoint URL
//! - Refuse plaintext endpoints unless explicitly allowed
//! - Open a per-request HTTP client (no idle pooling) with the caller's credentials
//! - Map transport, HTTP and SOAP failures to `BackendError`

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use url::Url;

use crate::backend::xmla::envelope::{self, Method};
use crate::backend::xmla::rowset;
use crate::backend::{BackendConnection, BackendError, ConnectionDescriptor, QueryBackend, ResultTable};
use crate::config::BackendConfig;
use crate::query::truncate_chars;

/// Placeholder replaced by the server identifier in the endpoint template.
pub const SERVER_PLACEHOLDER: &str = "{server}";

/// Characters of a non-XMLA error body kept in error messages.
const ERROR_BODY_PREFIX: usize = 2048;

/// Production backend speaking XMLA over HTTP(S).
#[derive(Debug, Clone)]
pub struct XmlaBackend {
    endpoint_template: String,
    allow_plaintext: bool,
}

impl XmlaBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            endpoint_template: config.endpoint_template.clone(),
            allow_plaintext: config.allow_plaintext,
        }
    }

    /// Resolve the endpoint for `server`, enforcing encrypted transport.
    pub fn endpoint_for(&self, server: &str) -> Result<Url, BackendError> {
        let raw = self.endpoint_template.replace(SERVER_PLACEHOLDER, server);
        let url = Url::parse(&raw)
            .map_err(|e| BackendError::Connection(format!("invalid endpoint '{}': {}", raw, e)))?;

        match url.scheme() {
            "https" => Ok(url),
            "http" if self.allow_plaintext => Ok(url),
            scheme => Err(BackendError::Connection(format!(
                "endpoint '{}' uses '{}'; an encrypted (https) transport is required",
                url, scheme
            ))),
        }
    }
}

#[async_trait]
impl QueryBackend for XmlaBackend {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn BackendConnection>, BackendError> {
        let endpoint = self.endpoint_for(&descriptor.server)?;
        let client = build_client(descriptor.timeout())?;

        let connection = XmlaConnection {
            client,
            endpoint,
            descriptor: descriptor.clone(),
        };
        connection.open().await?;

        Ok(Box::new(connection))
    }
}

fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, BackendError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .user_agent(concat!("mdx-query-proxy/", env!("CARGO_PKG_VERSION")));

    if let Some(timeout) = timeout {
        builder = builder.connect_timeout(timeout).timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| BackendError::Connection(format!("failed to build HTTP client: {}", e)))
}

/// One request's connection: a dedicated HTTP client bound to one endpoint.
///
/// The client keeps no idle sockets, so dropping this value closes everything.
struct XmlaConnection {
    client: reqwest::Client,
    endpoint: Url,
    descriptor: ConnectionDescriptor,
}

impl XmlaConnection {
    /// Handshake: the catalog must be visible to the forwarded identity.
    async fn open(&self) -> Result<(), BackendError> {
        let body = envelope::discover_catalog(&self.descriptor);
        let response = self.post(Method::Discover, body).await?;

        let catalogs = rowset::parse(&response).map_err(|e| match e {
            BackendError::Query { message, .. } => BackendError::Connection(message),
            other => other,
        })?;

        if catalogs.row_count() == 0 {
            return Err(BackendError::Connection(format!(
                "catalog '{}' not found on server '{}'",
                self.descriptor.catalog, self.descriptor.server
            )));
        }

        Ok(())
    }

    async fn post(&self, method: Method, body: String) -> Result<String, BackendError> {
        let credentials = &self.descriptor.credentials;
        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth(credentials.username(), Some(credentials.password()))
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", method.soap_action())
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Authentication(format!(
                "server '{}' rejected the credentials of user '{}' (HTTP {})",
                self.descriptor.server,
                credentials.username(),
                status
            )));
        }

        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            // SOAP faults arrive with HTTP 500; keep their detail.
            if let Err(fault @ BackendError::Query { .. }) = rowset::parse(&text) {
                return Err(fault);
            }
            return Err(BackendError::Connection(format!(
                "endpoint {} returned HTTP {}: {}",
                self.endpoint,
                status,
                truncate_chars(text.trim(), ERROR_BODY_PREFIX)
            )));
        }

        Ok(text)
    }

    fn transport_error(&self, error: reqwest::Error) -> BackendError {
        if error.is_timeout() {
            return BackendError::Timeout {
                seconds: self.descriptor.timeout_secs,
            };
        }
        BackendError::Connection(format!("{}: {}", self.endpoint, error_chain(&error)))
    }
}

#[async_trait]
impl BackendConnection for XmlaConnection {
    async fn execute(&mut self, statement: &str) -> Result<ResultTable, BackendError> {
        let body = envelope::execute(&self.descriptor, statement);
        let response = self.post(Method::Execute, body).await?;
        rowset::parse(&response)
    }
}

/// Render an error with all of its sources, outermost first.
fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(template: &str, allow_plaintext: bool) -> XmlaBackend {
        XmlaBackend::new(&BackendConfig {
            allowed_servers: "PROD1".into(),
            endpoint_template: template.into(),
            allow_plaintext,
        })
    }

    #[test]
    fn resolves_endpoint_from_template() {
        let url = backend("https://{server}/olap/msmdpump.dll", false)
            .endpoint_for("prod1")
            .unwrap();
        assert_eq!(url.as_str(), "https://prod1/olap/msmdpump.dll");
    }

    #[test]
    fn plaintext_endpoint_requires_opt_in() {
        let err = backend("http://{server}/xmla", false).endpoint_for("prod1").unwrap_err();
        assert!(matches!(err, BackendError::Connection(ref m) if m.contains("encrypted")));

        assert!(backend("http://{server}/xmla", true).endpoint_for("prod1").is_ok());
    }

    #[test]
    fn unparseable_endpoint_is_connection_error() {
        let err = backend("{server}", false).endpoint_for("prod1").unwrap_err();
        assert!(matches!(err, BackendError::Connection(_)));
    }
}
