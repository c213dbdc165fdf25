//! Caller identity subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization: Basic <base64(user:password)>
//!     → credentials.rs (decode into an immutable Credentials value)
//!     → passed explicitly through validation and into the backend descriptor
//! ```
//!
//! # Design Decisions
//! - Credentials are never checked here; the backend is the only authority
//! - A malformed header is treated the same as a missing one (401)
//! - The password never appears in Debug output or logs

pub mod credentials;

pub use credentials::Credentials;
