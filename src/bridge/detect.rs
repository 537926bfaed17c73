//! Classification of inbound bridge requests.

use axum::http::{header, HeaderMap, Method, Request};

pub const GRPC_WEB_CONTENT_TYPE: &str = "application/grpc-web";
pub const GRPC_WEBSOCKETS_PROTOCOL: &str = "grpc-websockets";
const GRPC_WEB_HEADER: &str = "x-grpc-web";

/// What the bridge should do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeRequest {
    /// Unary or streaming gRPC-web call.
    GrpcWeb,
    /// CORS preflight for a gRPC-web call.
    Preflight,
    /// `grpc-websockets` upgrade.
    WebSocket,
}

pub fn classify<B>(request: &Request<B>) -> Option<BridgeRequest> {
    if is_grpc_web_request(request) {
        Some(BridgeRequest::GrpcWeb)
    } else if is_acceptable_cors_preflight(request) {
        Some(BridgeRequest::Preflight)
    } else if is_grpc_websocket_request(request) {
        Some(BridgeRequest::WebSocket)
    } else {
        None
    }
}

/// A POST whose content type is one of the `application/grpc-web*` variants.
pub fn is_grpc_web_request<B>(request: &Request<B>) -> bool {
    request.method() == Method::POST
        && header_str(request.headers(), header::CONTENT_TYPE)
            .is_some_and(|ct| ct.starts_with(GRPC_WEB_CONTENT_TYPE))
}

/// An OPTIONS preflight announcing the `x-grpc-web` request header.
pub fn is_acceptable_cors_preflight<B>(request: &Request<B>) -> bool {
    request.method() == Method::OPTIONS
        && request
            .headers()
            .get_all(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|h| h.trim().eq_ignore_ascii_case(GRPC_WEB_HEADER))
}

/// A websocket upgrade offering the `grpc-websockets` subprotocol.
pub fn is_grpc_websocket_request<B>(request: &Request<B>) -> bool {
    let upgrade = header_str(request.headers(), header::UPGRADE)
        .is_some_and(|u| u.eq_ignore_ascii_case("websocket"));
    upgrade
        && request
            .headers()
            .get_all(header::SEC_WEBSOCKET_PROTOCOL)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|p| p.trim() == GRPC_WEBSOCKETS_PROTOCOL)
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().method(method).uri("/threads.pb.DataService/ListDbs");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn grpc_web_posts_are_recognised() {
        for ct in ["application/grpc-web", "application/grpc-web+proto", "application/grpc-web-text"] {
            let req = request(Method::POST, &[("content-type", ct)]);
            assert_eq!(classify(&req), Some(BridgeRequest::GrpcWeb), "{ct}");
        }
        let get = request(Method::GET, &[("content-type", "application/grpc-web")]);
        assert_eq!(classify(&get), None);
    }

    #[test]
    fn preflight_needs_grpc_web_header() {
        let ok = request(
            Method::OPTIONS,
            &[
                ("origin", "http://localhost:3000"),
                ("access-control-request-method", "POST"),
                ("access-control-request-headers", "content-type, X-Grpc-Web"),
            ],
        );
        assert_eq!(classify(&ok), Some(BridgeRequest::Preflight));

        let other = request(Method::OPTIONS, &[("access-control-request-headers", "content-type")]);
        assert_eq!(classify(&other), None);
    }

    #[test]
    fn websocket_needs_grpc_subprotocol() {
        let ok = request(
            Method::GET,
            &[
                ("connection", "Upgrade"),
                ("upgrade", "websocket"),
                ("sec-websocket-protocol", "grpc-websockets"),
            ],
        );
        assert_eq!(classify(&ok), Some(BridgeRequest::WebSocket));

        let plain = request(Method::GET, &[("upgrade", "websocket"), ("sec-websocket-protocol", "chat")]);
        assert_eq!(classify(&plain), None);
    }

    #[test]
    fn ordinary_requests_are_ignored() {
        assert_eq!(classify(&request(Method::GET, &[])), None);
        assert_eq!(classify(&request(Method::POST, &[("content-type", "application/json")])), None);
    }
}
