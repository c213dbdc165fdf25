//! Client for the MDX query proxy.

pub mod client;

pub use client::{ProxyClient, QueryOptions, TableResponse};
