//! HTTP server setup and the relay handler.
//!
//! # Responsibilities
//! - Create the Axum Router with the catch-all relay handler
//! - Wire up middleware (tracing)
//! - Dispatch on method: forward GET/POST, answer OPTIONS, reject the rest
//! - Bound each forwarded request by the configured deadline
//! - Serve until the shutdown signal fires

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::http::request::{forward_path, outbound_headers, RelayMethod};
use crate::http::response::{not_implemented, preflight_response, relay_response, RelayError};
use crate::lifecycle::ShutdownSignal;
use crate::upstream::UpstreamClient;

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub upstream: UpstreamClient,
    /// Deadline covering the inbound body read and the upstream exchange.
    pub request_timeout: Duration,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let state = AppState {
            upstream: UpstreamClient::new(config.upstream.base_url.clone()),
            request_timeout: config.timeouts.request(),
        };

        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(relay_handler))
            .route("/", any(relay_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Each connection is served on its own task. Returns once `shutdown`
    /// fires and in-flight requests have completed.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Relay handler for every path.
async fn relay_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let Some(method) = RelayMethod::from_method(request.method()) else {
        tracing::debug!(method = %request.method(), "Unsupported method");
        return not_implemented(request.method());
    };

    if !method.is_forwarded() {
        return preflight_response();
    }

    let outcome = tokio::time::timeout(state.request_timeout, forward(&state, method, request))
        .await
        .unwrap_or(Err(RelayError::Timeout(state.request_timeout)));

    match outcome {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(
                method = ?method,
                upstream = %state.upstream.base_url(),
                error = %err.describe(),
                "Relay request failed"
            );
            err.into_response()
        }
    }
}

async fn forward(state: &AppState, method: RelayMethod, request: Request<Body>) -> Result<Response, RelayError> {
    let (parts, body) = request.into_parts();
    let path = forward_path(&parts.uri);

    let body = if method.carries_body() {
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(RelayError::InboundBody)?;
        Some(bytes)
    } else {
        None
    };

    tracing::debug!(
        method = ?method,
        path = %path,
        body_len = body.as_ref().map_or(0, |b| b.len()),
        "Forwarding request"
    );

    let upstream = state
        .upstream
        .send(method.as_method(), path, outbound_headers(&parts.headers), body)
        .await?;

    tracing::debug!(
        path = %path,
        status = %upstream.status,
        body_len = upstream.body.len(),
        "Upstream responded"
    );

    Ok(relay_response(upstream))
}
