//! Per-request connection descriptor.

use std::fmt;
use std::time::Duration;

use crate::auth::Credentials;
use crate::security::ValidatedRequest;

/// Everything needed to open one backend connection for one request.
///
/// Built from validated input only and dropped with the request; it is never
/// cached or shared.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    pub server: String,
    pub catalog: String,
    pub credentials: Credentials,
    pub locale_id: i32,
    pub application_name: String,
    pub timeout_secs: i32,
}

impl ConnectionDescriptor {
    /// Transport protection; the backend must encrypt every packet.
    pub const PROTECTION_LEVEL: &'static str = "Pkt Privacy";
    /// Members missing from a dimension are ignored instead of failing the query.
    pub const MISSING_MEMBER_MODE: &'static str = "Ignore";
    pub const MDX_COMPATIBILITY: u8 = 1;
    pub const VISUAL_MODE: u8 = 0;

    pub fn from_validated(validated: &ValidatedRequest) -> Self {
        let request = validated.request();
        Self {
            server: request.server.clone(),
            catalog: request.database.clone(),
            credentials: validated.credentials().clone(),
            locale_id: request.locale_id,
            application_name: request.application_name.clone(),
            timeout_secs: request.timeout_secs,
        }
    }

    /// Client-side connect/command timeout.
    ///
    /// `None` for zero or negative values: those go to the backend unchanged
    /// and it decides what they mean.
    pub fn timeout(&self) -> Option<Duration> {
        u64::try_from(self.timeout_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Renders the descriptor as a connection string with the password masked.
impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Data Source='{}'; Catalog='{}'; User ID='{}'; Password='*****'; \
             Protection Level={}; Locale Identifier={}; Application Name='{}'; \
             Connect Timeout={}; Timeout={}; MDX Compatibility={}; \
             MDX Missing Member Mode={}; VisualMode={};",
            self.server,
            self.catalog,
            self.credentials.username(),
            Self::PROTECTION_LEVEL,
            self.locale_id,
            self.application_name,
            self.timeout_secs,
            self.timeout_secs,
            Self::MDX_COMPATIBILITY,
            Self::MISSING_MEMBER_MODE,
            Self::VISUAL_MODE,
        )
    }
}
