//! CORS forwarding relay.
//!
//! Listens on one local port and forwards every GET and POST to a single
//! fixed upstream, returning the upstream's response with
//! `Access-Control-Allow-Origin: *` attached. CORS preflight (OPTIONS)
//! requests are answered locally.
//!
//! ```text
//!   Client ──▶ http::server ──▶ http::request ──▶ upstream::client ──▶ Upstream
//!   Client ◀── http::response (strip transfer-encoding, add CORS) ◀────┘
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod upstream;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
