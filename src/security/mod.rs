//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     configured "SRV1;SRV2" → allow_list.rs (split, trim, upper-case) → AllowList
//!
//! Incoming request (after credentials are present):
//!     → validation.rs (allow-list membership, then field character classes)
//!     → ValidatedRequest handed to the backend executor
//! ```
//!
//! # Design Decisions
//! - Fail closed: the first violation rejects the request
//! - Nothing reaches the backend until every check has passed
//! - The allow-list is immutable after startup and shared without locking

pub mod allow_list;
pub mod validation;

pub use allow_list::{AllowList, AllowListError};
pub use validation::{validate, ValidatedRequest, ValidationError};
