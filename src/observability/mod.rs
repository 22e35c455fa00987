//! Observability subsystem.
//!
//! Structured logging through `tracing`. Request spans come from
//! tower-http's `TraceLayer` in the HTTP server; everything else logs with
//! key/value fields (`path`, `status`, `error`, ...).

pub mod logging;

pub use logging::init_logging;
