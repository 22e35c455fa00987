//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn a buffered upstream response into the client response
//! - Drop `transfer-encoding` and stamp `Access-Control-Allow-Origin: *`
//! - Answer CORS preflight requests locally
//! - Map relay failures to HTTP status codes

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

use crate::upstream::{UpstreamError, UpstreamResponse};

pub const ALLOW_ORIGIN: HeaderValue = HeaderValue::from_static("*");
pub const ALLOW_METHODS: HeaderValue = HeaderValue::from_static("GET, POST, OPTIONS");
pub const ALLOW_HEADERS: HeaderValue =
    HeaderValue::from_static("X-Requested-With, Content-Type, Authorization");

/// Failures that end a forwarded request with a 500.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Reading the inbound request body failed.
    #[error("failed to read request body")]
    InboundBody(#[source] axum::Error),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The request did not complete within the configured deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl RelayError {
    /// The error text followed by each of its causes.
    pub fn describe(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::INTERNAL_SERVER_ERROR, self.describe()).into_response();
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN);
        response
    }
}

/// Copy upstream headers for the client response, minus `transfer-encoding`.
pub fn client_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len() + 1);
    for (name, value) in upstream.iter() {
        if name == header::TRANSFER_ENCODING {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN);
    headers
}

/// Build the client response from a buffered upstream response.
pub fn relay_response(upstream: UpstreamResponse) -> Response {
    let headers = client_headers(&upstream.headers);
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = headers;
    response
}

/// Response to a CORS preflight request. Never touches the upstream.
pub fn preflight_response() -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN);
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS);
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS);
    response
}

/// Response for any method outside GET, POST and OPTIONS.
pub fn not_implemented(method: &Method) -> Response {
    (
        StatusCode::NOT_IMPLEMENTED,
        format!("Unsupported method ('{}')", method),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Bytes};

    fn upstream(
        status: StatusCode,
        headers: &[(&'static str, &'static str)],
        body: &'static str,
    ) -> UpstreamResponse {
        let mut map = HeaderMap::new();
        for &(name, value) in headers {
            map.append(name, HeaderValue::from_static(value));
        }
        UpstreamResponse {
            status,
            headers: map,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[tokio::test]
    async fn relays_status_headers_and_body() {
        let response = relay_response(upstream(
            StatusCode::CREATED,
            &[("content-type", "application/json"), ("x-upstream", "1")],
            r#"{"id":1}"#,
        ));

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.headers()["x-upstream"], "1");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"id":1}"#);
    }

    #[test]
    fn drops_transfer_encoding() {
        let chunked = upstream(
            StatusCode::OK,
            &[("Transfer-Encoding", "chunked"), ("content-type", "text/plain")],
            "",
        );
        let headers = client_headers(&chunked.headers);
        assert!(headers.get("transfer-encoding").is_none());
        assert_eq!(headers["content-type"], "text/plain");
    }

    #[test]
    fn allow_origin_has_exactly_one_value() {
        let restricted = upstream(
            StatusCode::OK,
            &[("access-control-allow-origin", "https://app.example")],
            "",
        );
        let headers = client_headers(&restricted.headers);
        let values: Vec<_> = headers.get_all("access-control-allow-origin").iter().collect();
        assert_eq!(values, ["*"]);
    }

    #[test]
    fn keeps_repeated_set_cookie() {
        let cookies = upstream(
            StatusCode::OK,
            &[("set-cookie", "a=1"), ("set-cookie", "b=2")],
            "",
        );
        let headers = client_headers(&cookies.headers);
        assert_eq!(headers.get_all("set-cookie").iter().count(), 2);
    }

    #[tokio::test]
    async fn preflight_has_fixed_cors_headers_and_empty_body() {
        let response = preflight_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["access-control-allow-methods"], "GET, POST, OPTIONS");
        assert_eq!(
            response.headers()["access-control-allow-headers"],
            "X-Requested-With, Content-Type, Authorization"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn relay_error_is_500_with_cause_chain() {
        let source = "/bad path".parse::<axum::http::Uri>().unwrap_err();
        let err = RelayError::from(UpstreamError::InvalidTarget {
            target: "http://localhost/bad path".into(),
            source,
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("invalid upstream target `http://localhost/bad path`: "));
    }

    #[tokio::test]
    async fn timeout_is_500_with_allow_origin() {
        let response = RelayError::Timeout(Duration::from_secs(30)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"request timed out after 30s");
    }

    #[tokio::test]
    async fn upstream_status_error_is_500_with_reason() {
        let err = RelayError::from(UpstreamError::Status(StatusCode::NOT_FOUND));
        assert_eq!(err.describe(), "HTTP Error 404: Not Found");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[test]
    fn unsupported_method_is_501() {
        let response = not_implemented(&Method::PUT);
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }
}
