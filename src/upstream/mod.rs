//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! http handler (method, path_and_query, filtered headers, body)
//!     → client.rs (join base URL, single outbound call)
//!     → UpstreamResponse (status, headers, buffered body)
//!     → back to http/response.rs for transformation
//! ```

pub mod client;

pub use client::{UpstreamClient, UpstreamError, UpstreamResponse};
