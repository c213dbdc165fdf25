//! Allow-list of backend servers the proxy may connect to.

use std::collections::HashSet;

use thiserror::Error;

/// Delimiter between server identifiers in the configured value.
pub const SERVER_DELIMITER: char = ';';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllowListError {
    /// The configured value contained no server identifiers.
    #[error("allow-list of backend servers is empty")]
    Empty,
}

/// Normalized (upper-cased) set of permitted server identifiers.
///
/// Built once at startup and read concurrently afterwards; it has no mutating
/// API, so sharing it behind an `Arc` needs no lock.
#[derive(Debug, Clone)]
pub struct AllowList {
    servers: HashSet<String>,
}

impl AllowList {
    /// Parse a semicolon-delimited list such as `"prod1; PROD2;"`.
    pub fn parse(raw: &str) -> Result<Self, AllowListError> {
        Self::from_servers(raw.split(SERVER_DELIMITER))
    }

    pub fn from_servers<I, S>(servers: I) -> Result<Self, AllowListError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let servers: HashSet<String> = servers
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        if servers.is_empty() {
            return Err(AllowListError::Empty);
        }

        Ok(Self { servers })
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, server: &str) -> bool {
        self.servers.contains(&server.to_uppercase())
    }

    /// Sorted server identifiers, for startup logging.
    pub fn servers(&self) -> Vec<&str> {
        let mut servers: Vec<&str> = self.servers.iter().map(String::as_str).collect();
        servers.sort_unstable();
        servers
    }
}
