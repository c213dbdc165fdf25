//! Pass-through credentials taken from HTTP basic authentication.

use std::fmt;

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Username and password supplied by the caller.
///
/// The pair is forwarded unmodified to the backend, which performs the real
/// authentication. Lives for a single request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Extract credentials from the `Authorization` header.
    ///
    /// Returns `None` when the header is absent, not `Basic`, not valid
    /// base64/UTF-8, or lacks the `:` separator.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        Self::from_basic_header(value)
    }

    fn from_basic_header(value: &str) -> Option<Self> {
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        // Passwords may contain ':'; usernames may not.
        let (username, password) = decoded.split_once(':')?;

        Some(Self::new(username, password))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn decodes_basic_header() {
        let encoded = STANDARD.encode("analyst:s3cret");
        let creds = Credentials::from_headers(&headers_with(&format!("Basic {}", encoded))).unwrap();
        assert_eq!(creds.username(), "analyst");
        assert_eq!(creds.password(), "s3cret");
    }

    #[test]
    fn password_keeps_colons() {
        let encoded = STANDARD.encode("analyst:a:b:c");
        let creds = Credentials::from_headers(&headers_with(&format!("basic {}", encoded))).unwrap();
        assert_eq!(creds.password(), "a:b:c");
    }

    #[test]
    fn missing_or_malformed_header_is_absent() {
        assert!(Credentials::from_headers(&HeaderMap::new()).is_none());
        assert!(Credentials::from_headers(&headers_with("Bearer abc")).is_none());
        assert!(Credentials::from_headers(&headers_with("Basic !!!not-base64")).is_none());

        let no_colon = STANDARD.encode("analyst");
        assert!(Credentials::from_headers(&headers_with(&format!("Basic {}", no_colon))).is_none());
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("analyst", "s3cret");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("analyst"));
        assert!(!rendered.contains("s3cret"));
    }
}
