//! XML for Analysis (XMLA) transport over HTTP.
//!
//! # Data Flow
//! ```text
//! ConnectionDescriptor
//!     → client.rs (resolve endpoint, per-request HTTP client, basic auth)
//!     → envelope.rs (SOAP Discover / Execute bodies)
//!     → POST to the backend's XMLA endpoint
//!     → rowset.rs (inline XSD schema + <row> elements → ResultTable,
//!                  SOAP faults and XMLA exceptions → BackendError)
//! ```

pub mod client;
pub mod envelope;
pub mod rowset;

pub use client::XmlaBackend;

/// XMLA namespace, also the prefix of every SOAPAction.
pub const XMLA_NAMESPACE: &str = "urn:schemas-microsoft-com:xml-analysis";
