//! Input validation for values interpolated into the backend connection.
//!
//! Every check guards a value that ends up inside the connection descriptor,
//! so quotes, semicolons, whitespace and other breakout characters are refused.
//! Checks run in a fixed order and stop at the first violation.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::auth::Credentials;
use crate::query::QueryRequest;
use crate::security::allow_list::AllowList;

static RE_DATABASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());
static RE_APPLICATION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-!@#$%^&*()+.:]+$").unwrap());
static RE_USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-!#$%^&*()+.]+$").unwrap());
static RE_PASSWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-!@#$%^&*()+.:]+$").unwrap());

/// Field whose content failed a character-class check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckedField {
    Database,
    ApplicationName,
    Username,
    Password,
}

impl CheckedField {
    pub fn name(self) -> &'static str {
        match self {
            CheckedField::Database => "db",
            CheckedField::ApplicationName => "applicationName",
            CheckedField::Username => "username",
            CheckedField::Password => "password",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            CheckedField::Database => "Parameter db",
            CheckedField::ApplicationName => "Parameter applicationName",
            CheckedField::Username => "User's username",
            CheckedField::Password => "User's password",
        }
    }
}

/// A rejected request, always reported as 400 Bad Request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Parameter {field} is required")]
    MissingParameter { field: &'static str },

    #[error("Parameter {field} must be an integer, got '{value}'")]
    NotAnInteger { field: &'static str, value: String },

    #[error("Query string could not be parsed: {0}")]
    MalformedParameters(String),

    #[error("Query text in the request body is not valid UTF-8")]
    QueryNotUtf8,

    #[error("Request body exceeds the limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Request body could not be read: {0}")]
    BodyUnreadable(String),

    #[error("Parameter server contains forbidden value (not in allowed servers list)")]
    ServerNotAllowed,

    #[error("{} contains forbidden characters", .0.describe())]
    ForbiddenCharacters(CheckedField),
}

impl ValidationError {
    /// Name of the offending request field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingParameter { field } => *field,
            ValidationError::NotAnInteger { field, .. } => *field,
            ValidationError::MalformedParameters(_) => "parameters",
            ValidationError::QueryNotUtf8
            | ValidationError::BodyTooLarge { .. }
            | ValidationError::BodyUnreadable(_) => "query",
            ValidationError::ServerNotAllowed => "server",
            ValidationError::ForbiddenCharacters(field) => field.name(),
        }
    }
}

/// A request that passed every check, paired with the caller's credentials.
///
/// Only [`validate`] can build one, so the executor cannot be handed
/// unchecked input.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    request: QueryRequest,
    credentials: Credentials,
}

impl ValidatedRequest {
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Run all checks in order: server, db, applicationName, username, password.
pub fn validate(
    request: QueryRequest,
    credentials: Credentials,
    allow_list: &AllowList,
) -> Result<ValidatedRequest, ValidationError> {
    if !allow_list.contains(&request.server) {
        return Err(ValidationError::ServerNotAllowed);
    }

    check(&RE_DATABASE, &request.database, CheckedField::Database)?;
    check(&RE_APPLICATION_NAME, &request.application_name, CheckedField::ApplicationName)?;
    check(&RE_USERNAME, credentials.username(), CheckedField::Username)?;
    check(&RE_PASSWORD, credentials.password(), CheckedField::Password)?;

    Ok(ValidatedRequest { request, credentials })
}

fn check(pattern: &Regex, value: &str, field: CheckedField) -> Result<(), ValidationError> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::ForbiddenCharacters(field))
    }
}
