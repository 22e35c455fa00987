//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, method dispatch)
//!     → request.rs (classify method, path, outbound headers)
//!     → upstream client (single outbound call)
//!     → response.rs (transform, add CORS header, map errors)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::RelayMethod;
pub use response::RelayError;
pub use server::{AppState, HttpServer};
