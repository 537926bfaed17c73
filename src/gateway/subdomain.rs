//! Subdomain-based thread routing.
//!
//! With subdomains enabled, `/thread/<id>/<rest>` redirects to
//! `<scheme>://<id>.thread.<gateway host>/<rest>`, and requests arriving on
//! such a host are rewritten to the path form before routing.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, uri::PathAndQuery, HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use url::Url;

const THREAD_LABEL: &str = "thread";

#[derive(Debug, Clone)]
pub struct SubdomainConfig {
    pub enabled: bool,
    pub url: Url,
}

/// The thread id encoded in `host`, if it has the form `<id>.thread.<base>`.
pub fn thread_from_host<'a>(host: &'a str, base: &str) -> Option<&'a str> {
    let host = strip_port(host);
    let rest = host.strip_suffix(base)?.strip_suffix('.')?;
    let thread = rest.strip_suffix(THREAD_LABEL)?.strip_suffix('.')?;
    (!thread.is_empty() && !thread.contains('.')).then_some(thread)
}

fn strip_port(host: &str) -> &str {
    if let Some(end) = host.find(']') {
        return &host[..=end];
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Where a path-style request should be redirected, if anywhere.
pub fn redirect_target(uri: &Uri, url: &Url) -> Option<String> {
    let path = uri.path().strip_prefix("/thread/")?;
    let (thread, rest) = path.split_once('/').unwrap_or((path, ""));
    if thread.is_empty() {
        return None;
    }
    let host = url.host_str()?;
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    let query = uri.query().map(|q| format!("?{q}")).unwrap_or_default();
    Some(format!(
        "{scheme}://{thread}.{THREAD_LABEL}.{host}{port}/{rest}{query}",
        scheme = url.scheme()
    ))
}

/// `/rest?query` on a thread host becomes `/thread/<id>/rest?query`.
fn rewrite_uri(uri: &Uri, thread: &str) -> Option<Uri> {
    let rest = uri.path().trim_start_matches('/');
    let mut path = format!("/{THREAD_LABEL}/{thread}");
    if !rest.is_empty() {
        path.push('/');
        path.push_str(rest);
    }
    if let Some(query) = uri.query() {
        path.push('?');
        path.push_str(query);
    }
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path).ok()?);
    Uri::from_parts(parts).ok()
}

fn request_host(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
}

pub async fn route_by_host(
    State(config): State<Arc<SubdomainConfig>>,
    mut request: Request,
    next: Next,
) -> Response {
    if !config.enabled {
        return next.run(request).await;
    }
    let Some(base) = config.url.host_str() else {
        return next.run(request).await;
    };

    let thread = request_host(&request)
        .and_then(|host| thread_from_host(host, base))
        .map(str::to_string);
    if let Some(thread) = thread {
        if let Some(uri) = rewrite_uri(request.uri(), &thread) {
            *request.uri_mut() = uri;
        }
        return next.run(request).await;
    }

    match redirect_target(request.uri(), &config.url)
        .and_then(|location| HeaderValue::from_str(&location).ok())
    {
        Some(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        None => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_host_detection() {
        assert_eq!(thread_from_host("abc.thread.127.0.0.1:8000", "127.0.0.1"), Some("abc"));
        assert_eq!(thread_from_host("abc.thread.example.com", "example.com"), Some("abc"));
        assert_eq!(thread_from_host("example.com", "example.com"), None);
        assert_eq!(thread_from_host("a.b.thread.example.com", "example.com"), None);
        assert_eq!(thread_from_host("abc.other.example.com", "example.com"), None);
    }

    #[test]
    fn path_requests_redirect_to_subdomain() {
        let url = Url::parse("http://127.0.0.1:8000").unwrap();
        let uri: Uri = "/thread/abc/todos/1?x=y".parse().unwrap();
        assert_eq!(
            redirect_target(&uri, &url).as_deref(),
            Some("http://abc.thread.127.0.0.1:8000/todos/1?x=y")
        );
        assert_eq!(redirect_target(&"/health".parse().unwrap(), &url), None);
    }

    #[test]
    fn thread_host_paths_are_rewritten() {
        let uri: Uri = "/todos?limit=2".parse().unwrap();
        assert_eq!(rewrite_uri(&uri, "abc").unwrap(), "/thread/abc/todos?limit=2");
        assert_eq!(rewrite_uri(&"/".parse().unwrap(), "abc").unwrap(), "/thread/abc");
    }
}
