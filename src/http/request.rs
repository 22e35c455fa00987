//! Inbound request handling.
//!
//! # Responsibilities
//! - Classify the inbound method into the closed set the relay serves
//! - Extract the origin-form path and query to forward
//! - Prepare the header set for the outbound request
//!
//! # Design Decisions
//! - Only `path?query` is taken from the request target; an absolute-form
//!   target cannot redirect the relay to another authority
//! - `host` and the framing headers are dropped; the client recomputes them

use axum::http::{header, HeaderMap, Method, Uri};

/// Headers never copied from the inbound request to the upstream.
pub const EXCLUDED_REQUEST_HEADERS: [header::HeaderName; 3] = [
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
];

/// Methods the relay answers. Anything else is 501.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMethod {
    Get,
    Post,
    Options,
}

impl RelayMethod {
    /// Classify an HTTP method. Returns `None` for unsupported methods.
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Self::Get),
            Method::POST => Some(Self::Post),
            Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }

    /// Whether this method is forwarded upstream.
    pub fn is_forwarded(self) -> bool {
        !matches!(self, Self::Options)
    }

    /// Whether the inbound body is read and forwarded.
    pub fn carries_body(self) -> bool {
        matches!(self, Self::Post)
    }

    pub fn as_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Options => Method::OPTIONS,
        }
    }
}

/// The path and query string to append to the upstream base URL.
pub fn forward_path(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}

/// Copy inbound headers for the outbound request, minus the excluded ones.
/// Repeated headers keep their order.
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound.iter() {
        if EXCLUDED_REQUEST_HEADERS.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}
