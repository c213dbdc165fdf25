//! Query request model shared by the HTTP layer, the validator and the executor.

/// Locale identifier used when the caller does not supply one.
pub const DEFAULT_LOCALE_ID: i32 = 1029;

/// Application name reported to the backend by default.
pub const DEFAULT_APPLICATION_NAME: &str = "SSASQueryProxy";

/// Connect and command timeout (seconds) used by default.
pub const DEFAULT_TIMEOUT_SECS: i32 = 120;

/// Number of query characters kept in log lines.
pub const LOGGED_QUERY_PREFIX: usize = 512;

/// One analytical query to run against an allow-listed backend server.
///
/// Numeric fields are deliberately signed and unchecked; out-of-range values
/// are the backend's to reject.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub server: String,
    pub database: String,
    pub locale_id: i32,
    pub application_name: String,
    pub timeout_secs: i32,
    pub query_text: String,
}

impl QueryRequest {
    /// Build a request with default locale, application name and timeout.
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        query_text: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            locale_id: DEFAULT_LOCALE_ID,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            query_text: query_text.into(),
        }
    }
}

/// Return at most `max` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
