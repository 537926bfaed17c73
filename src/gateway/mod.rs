//! Read-only HTTP gateway over the data manager.
//!
//! # Responsibilities
//! - Serve database and instance lookups as JSON
//! - Optionally route threads by subdomain
//!
//! # Design Decisions
//! - Subdomain rewriting wraps the router so it runs before route matching
//! - `close` waits for in-flight requests with no deadline

pub mod handlers;
pub mod subdomain;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Request, http::StatusCode, routing::get, Router, ServiceExt};
use thiserror::Error;
use tower::Layer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Span;
use url::Url;

use crate::db::Manager;
use crate::lifecycle::supervisor::{FatalSender, ServeTask};
use crate::net::addr::HostPort;
use crate::net::listener::{self, ListenerError};

use self::handlers::*;
use self::subdomain::{route_by_host, SubdomainConfig};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("gateway task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub fn router(manager: Arc<Manager>, url: Url) -> Router {
    let routes = Router::new()
        .route("/health", get(health))
        .route("/", get(get_status))
        .route("/thread/{thread}", get(get_thread))
        .route("/thread/{thread}/{collection}", get(get_collection))
        .route("/thread/{thread}/{collection}/{id}", get(get_instance))
        .with_state(GatewayState { manager, url });
    with_layers(routes, REQUEST_TIMEOUT)
}

/// Requests running past `timeout` are answered with 408.
fn with_layers(routes: Router, timeout: Duration) -> Router {
    routes
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(TraceLayer::new_for_http())
}

pub struct Gateway {
    local_addr: SocketAddr,
    task: ServeTask,
}

impl Gateway {
    /// Bind `addr` and start serving right away.
    pub async fn start(
        manager: Arc<Manager>,
        addr: &HostPort,
        url: Url,
        subdomains: bool,
        fatal: FatalSender,
        span: Span,
    ) -> Result<Self, GatewayError> {
        let addr = listener::resolve("gateway", addr).await?;
        let (listener, local_addr) = listener::bind("gateway", addr).await?;
        span.in_scope(|| tracing::info!(%local_addr, %url, subdomains, "Gateway listening"));

        let config = Arc::new(SubdomainConfig {
            enabled: subdomains,
            url: url.clone(),
        });
        let app = axum::middleware::from_fn_with_state(config, route_by_host).layer(router(manager, url));

        let task = ServeTask::spawn("gateway", fatal, span, move |stop| async move {
            axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
                .with_graceful_shutdown(stop.wait())
                .await
        });
        Ok(Self { local_addr, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and wait for in-flight requests.
    pub async fn close(self) -> Result<(), GatewayError> {
        self.task.stop().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::ServiceExt as _;

    #[tokio::test]
    async fn slow_requests_time_out() {
        let routes = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let response = with_layers(routes, Duration::from_millis(50))
            .oneshot(axum::http::Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn fast_requests_pass_through() {
        let routes = Router::new().route("/fast", get(|| async { "ok" }));
        let response = with_layers(routes, Duration::from_secs(1))
            .oneshot(axum::http::Request::get("/fast").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
