use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tonic::service::Routes;
use tonic_web::{GrpcWebLayer, GrpcWebService};
use tower::util::MapResponse;
use tower::{Layer, ServiceExt};
use tower_http::cors::{AllowHeaders, AllowOrigin, Cors, CorsLayer};
use tracing::Span;

use super::detect::{self, BridgeRequest};
use super::{websocket, BridgeError};
use crate::lifecycle::shutdown::Shutdown;
use crate::config::validation::MIN_KEEP_ALIVE;
use crate::lifecycle::supervisor::{FatalSender, ServeTask};
use crate::net::listener;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

type IntoAxumBody = fn(axum::http::Response<tonic::body::Body>) -> Response;

/// gRPC-web translation over the shared routes, behind permissive CORS.
pub type BridgeService = Cors<MapResponse<GrpcWebService<Routes>, IntoAxumBody>>;

fn into_axum_body(response: axum::http::Response<tonic::body::Body>) -> Response {
    response.map(Body::new)
}

/// Any origin is accepted, with credentials, and the gRPC status headers are readable.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_methods([Method::POST, Method::OPTIONS])
        .expose_headers([
            HeaderName::from_static("grpc-status"),
            HeaderName::from_static("grpc-message"),
            HeaderName::from_static("grpc-status-details-bin"),
        ])
        .max_age(PREFLIGHT_MAX_AGE)
}

pub fn bridge_service(routes: Routes) -> BridgeService {
    let grpc_web = MapResponse::new(
        GrpcWebLayer::new().layer(routes),
        into_axum_body as IntoAxumBody,
    );
    cors_layer().layer(grpc_web)
}

#[derive(Clone)]
pub(crate) struct BridgeState {
    pub(crate) service: BridgeService,
    pub(crate) keep_alive: Duration,
    pub(crate) sessions: Arc<Shutdown>,
}

/// Router answering only recognised bridge requests; everything else is 404.
pub fn router(routes: Routes, keep_alive: Duration, sessions: Arc<Shutdown>) -> Router {
    Router::new().fallback(handle).with_state(BridgeState {
        service: bridge_service(routes),
        keep_alive,
        sessions,
    })
}

async fn handle(State(state): State<BridgeState>, request: Request) -> Response {
    match detect::classify(&request) {
        Some(BridgeRequest::GrpcWeb | BridgeRequest::Preflight) => {
            dispatch(state.service, request).await
        }
        Some(BridgeRequest::WebSocket) => websocket::upgrade(state, request).await,
        None => {
            tracing::debug!(method = %request.method(), uri = %request.uri(), "Not a bridge request");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

pub(crate) async fn dispatch(service: BridgeService, request: Request) -> Response {
    match service.oneshot(request).await {
        Ok(response) => response,
        Err(e) => internal_error(e),
    }
}

fn internal_error(e: impl Display) -> Response {
    tracing::error!(error = %e, "Bridge dispatch failed");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// The browser-facing listener on `apiProxyAddr`.
pub struct BridgeServer {
    local_addr: SocketAddr,
    sessions: Arc<Shutdown>,
    task: ServeTask,
}

impl BridgeServer {
    pub async fn start(
        addr: SocketAddr,
        routes: Routes,
        keep_alive: Duration,
        fatal: FatalSender,
        span: Span,
    ) -> Result<Self, BridgeError> {
        if keep_alive < MIN_KEEP_ALIVE {
            return Err(BridgeError::KeepAliveTooShort {
                got: keep_alive,
                min: MIN_KEEP_ALIVE,
            });
        }
        let (listener, local_addr) = listener::bind("bridge", addr).await?;
        span.in_scope(|| tracing::info!(%local_addr, ?keep_alive, "Bridge listening"));

        let sessions = Arc::new(Shutdown::new());
        let app = router(routes, keep_alive, sessions.clone());
        let task = ServeTask::spawn("bridge", fatal, span, move |stop| async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(stop.wait())
                .await
        });

        Ok(Self {
            local_addr,
            sessions,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the listener, ending websocket sessions, and wait at most `deadline`.
    ///
    /// Returns `false` when the deadline forced an abrupt cutoff.
    pub async fn shutdown(self, deadline: Duration) -> Result<bool, BridgeError> {
        self.sessions.trigger();
        Ok(self.task.stop_within(deadline).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::supervisor::fatal_channel;

    #[tokio::test]
    async fn keep_alive_below_minimum_is_rejected() {
        let (fatal, _rx) = fatal_channel();
        let result = BridgeServer::start(
            "127.0.0.1:0".parse().unwrap(),
            Routes::default(),
            Duration::ZERO,
            fatal,
            Span::none(),
        )
        .await;
        assert!(matches!(
            result,
            Err(BridgeError::KeepAliveTooShort { got: Duration::ZERO, .. })
        ));
    }

    #[tokio::test]
    async fn unrecognised_requests_get_404() {
        let app = router(Routes::default(), Duration::from_secs(5), Arc::new(Shutdown::new()));
        let response = app
            .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
