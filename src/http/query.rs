//! Query parameters of the proxy endpoint.

use serde::Deserialize;

use crate::query::{QueryRequest, DEFAULT_APPLICATION_NAME, DEFAULT_LOCALE_ID, DEFAULT_TIMEOUT_SECS};
use crate::security::ValidationError;

/// Raw URI parameters. Everything is optional text here so that missing or
/// malformed values are reported by name, after the credential check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryParams {
    pub server: Option<String>,
    pub db: Option<String>,
    pub query: Option<String>,
    #[serde(rename = "localeIdentifier")]
    pub locale_identifier: Option<String>,
    #[serde(rename = "applicationName")]
    pub application_name: Option<String>,
    pub timeout: Option<String>,
}

impl QueryParams {
    /// Query text: the `query` parameter when present, otherwise the body.
    pub fn query_text<'a>(&'a self, body: &'a str) -> &'a str {
        self.query.as_deref().unwrap_or(body)
    }

    /// Turn the parameters into a request, applying defaults.
    pub fn into_request(self, body: &str) -> Result<QueryRequest, ValidationError> {
        let query_text = self.query_text(body).to_string();

        let server = self.server.ok_or(ValidationError::MissingParameter { field: "server" })?;
        let database = self.db.ok_or(ValidationError::MissingParameter { field: "db" })?;
        let locale_id = parse_int("localeIdentifier", self.locale_identifier, DEFAULT_LOCALE_ID)?;
        let timeout_secs = parse_int("timeout", self.timeout, DEFAULT_TIMEOUT_SECS)?;
        let application_name = self
            .application_name
            .unwrap_or_else(|| DEFAULT_APPLICATION_NAME.to_string());

        Ok(QueryRequest {
            server,
            database,
            locale_id,
            application_name,
            timeout_secs,
            query_text,
        })
    }
}

fn parse_int(field: &'static str, value: Option<String>, default: i32) -> Result<i32, ValidationError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ValidationError::NotAnInteger { field, value: raw }),
    }
}
