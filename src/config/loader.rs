//! Configuration loading from disk and environment.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that replaces `backend.allowed_servers`.
pub const ENV_ALLOWED_SERVERS: &str = "MDX_PROXY_ALLOWED_SERVERS";

/// Environment variable that replaces `listener.bind_address`.
pub const ENV_BIND_ADDRESS: &str = "MDX_PROXY_BIND_ADDRESS";

/// Error type for configuration loading. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where the base configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    File,
    /// The file did not exist; built-in defaults were used.
    Defaults,
}

/// Load and validate configuration.
///
/// A missing file is not an error by itself: defaults plus environment
/// overrides are validated instead, so an allow-list supplied only through
/// the environment still works. The returned origin lets the caller report
/// that once logging is up.
pub fn load_config(path: &Path) -> Result<(ProxyConfig, ConfigOrigin), ConfigError> {
    let (mut config, origin) = read_config(path)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok((config, origin))
}

/// Read and parse the file at `path`, falling back to defaults when it is absent.
pub fn read_config(path: &Path) -> Result<(ProxyConfig, ConfigOrigin), ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok((toml::from_str(&content)?, ConfigOrigin::File)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok((ProxyConfig::default(), ConfigOrigin::Defaults)),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(servers) = lookup(ENV_ALLOWED_SERVERS) {
        config.backend.allowed_servers = servers;
    }
    if let Some(addr) = lookup(ENV_BIND_ADDRESS) {
        config.listener.bind_address = addr;
    }
}
