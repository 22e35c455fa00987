//! HTTP client for the fixed upstream origin.
//!
//! # Responsibilities
//! - Join the configured base URL with the inbound path and query
//! - Issue one outbound request per call (no retries), following redirects
//! - Buffer the complete upstream response before returning it
//! - Surface non-success upstream statuses as `UpstreamError::Status`
//!
//! # Design Decisions
//! - Idle pooling is disabled, every call opens a fresh connection
//! - Only 2xx (and 304, the answer to a forwarded conditional request) is
//!   returned as an `UpstreamResponse`
//! - Redirects: 301/302/303 are followed for GET and POST, 307/308 only for
//!   GET; the follow-up is always a bodyless GET, at most `MAX_REDIRECTS` hops

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Errors produced while talking to the upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// `base_url + path` is not a valid URI.
    #[error("invalid upstream target `{target}`")]
    InvalidTarget {
        target: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    /// The outbound request could not be assembled.
    #[error("failed to build upstream request")]
    Build(#[source] axum::http::Error),

    /// Connection, DNS or protocol failure.
    #[error("upstream request failed")]
    Request(#[source] hyper_util::client::legacy::Error),

    /// The upstream response body could not be read to the end.
    #[error("failed to read upstream response body")]
    Body(#[source] axum::Error),

    /// The upstream answered with a status that is not relayed.
    #[error("HTTP Error {}: {}", .0.as_u16(), .0.canonical_reason().unwrap_or("Unknown"))]
    Status(StatusCode),

    /// A `Location` header that cannot be followed.
    #[error("cannot follow redirect to `{0}`")]
    Redirect(String),

    #[error("more than {0} redirects")]
    TooManyRedirects(usize),
}

/// A fully buffered upstream response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Client bound to a single upstream base URL.
#[derive(Clone)]
pub struct UpstreamClient {
    base_url: Arc<str>,
    client: Client<HttpConnector, Body>,
}

impl UpstreamClient {
    /// Create a client forwarding to `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(HttpConnector::new());

        Self {
            base_url: Arc::from(base_url.into()),
            client,
        }
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the outbound URI. The path and query are appended verbatim.
    pub fn target(&self, path_and_query: &str) -> Result<Uri, UpstreamError> {
        let target = format!("{}{}", self.base_url, path_and_query);
        target
            .parse::<Uri>()
            .map_err(|source| UpstreamError::InvalidTarget { target, source })
    }

    /// Send a request upstream, follow redirects and buffer the final
    /// response.
    pub async fn send(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let mut uri = self.target(path_and_query)?;
        let mut method = method;
        let mut headers = headers;
        let mut body = body;

        for _ in 0..=MAX_REDIRECTS {
            let response = self
                .exchange(method.clone(), uri.clone(), headers.clone(), body.clone())
                .await?;

            if is_relayed(response.status) {
                return Ok(response);
            }

            let Some(location) = redirect_location(&method, &response) else {
                return Err(UpstreamError::Status(response.status));
            };

            let next = resolve_location(&uri, location)?;
            tracing::debug!(
                status = %response.status,
                from = %uri,
                to = %next,
                "Following upstream redirect"
            );
            uri = next;
            method = Method::GET;
            body = None;
            headers.remove(header::CONTENT_TYPE);
        }

        Err(UpstreamError::TooManyRedirects(MAX_REDIRECTS))
    }

    async fn exchange(
        &self,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let body = match body {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        };
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .map_err(UpstreamError::Build)?;
        *request.headers_mut() = headers;

        let response = self
            .client
            .request(request)
            .await
            .map_err(UpstreamError::Request)?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), usize::MAX)
            .await
            .map_err(UpstreamError::Body)?;

        Ok(UpstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

fn is_relayed(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_MODIFIED
}

/// The `Location` to follow, if this response is a followable redirect.
fn redirect_location<'a>(method: &Method, response: &'a UpstreamResponse) -> Option<&'a str> {
    let followable = match response.status {
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER => {
            *method == Method::GET || *method == Method::POST
        }
        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT => *method == Method::GET,
        _ => false,
    };
    if !followable {
        return None;
    }
    response
        .headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// Resolve a possibly relative `Location` against the current target.
fn resolve_location(current: &Uri, location: &str) -> Result<Uri, UpstreamError> {
    let base = Url::parse(&current.to_string())
        .map_err(|_| UpstreamError::Redirect(location.to_string()))?;
    let next = base
        .join(location)
        .map_err(|_| UpstreamError::Redirect(location.to_string()))?;
    if next.scheme() != "http" {
        return Err(UpstreamError::Redirect(location.to_string()));
    }
    next.as_str()
        .parse::<Uri>()
        .map_err(|_| UpstreamError::Redirect(location.to_string()))
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
