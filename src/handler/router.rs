//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: body limits, manifest route
//! resolution and dispatch to the resolved destination.

use crate::app::{self, AppRequest};
use crate::config::AppState;
use crate::handler::static_files;
use crate::http::{self, HttpResponse};
use crate::logger::{self, AccessLogEntry};
use crate::manifest::Runtime;
use crate::routing::{self, Destination, Resolved};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, HeaderValue, SERVER};
use hyper::{Method, Request, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub is_head: bool,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<HttpResponse, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = state.access_log_enabled().then(|| access_entry(&req, peer_addr));

    let (mut response, dest) = route_request(req, &state).await;
    set_server_header(&mut response, &state.config.http.server_name);

    if let Some(entry) = entry.as_mut() {
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.dest = dest;
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Add `Server` unless a route header already set one
fn set_server_header(response: &mut HttpResponse, server_name: &str) {
    if response.headers().contains_key(SERVER) {
        return;
    }
    match HeaderValue::from_str(server_name) {
        Ok(value) => {
            response.headers_mut().insert(SERVER, value);
        }
        Err(e) => logger::log_warning(&format!("Invalid server_name '{server_name}': {e}")),
    }
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.referer = header("referer");
    entry.user_agent = header("user-agent");
    entry
}

/// Resolve and dispatch, returning the response and the routed destination
async fn route_request<B>(req: Request<B>, state: &Arc<AppState>) -> (HttpResponse, Option<String>)
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    // 1. CORS preflight
    if method == Method::OPTIONS && state.config.http.enable_cors {
        return (http::build_options_response(true), None);
    }

    // 2. Check declared body size
    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return (resp, None);
    }

    // 3. Log headers if enabled
    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    // 4. Resolve through the manifest's route table
    let deployment = state.deployment().await;
    let resolved = deployment.routes.resolve(method.as_str(), &path);
    logger::log_route(method.as_str(), &path, resolved.as_ref().map(|r| r.dest.as_str()));
    let Some(resolved) = resolved else {
        return (http::build_404_response(), None);
    };

    // 5. Dispatch
    let ctx = RequestContext {
        method: &method,
        path: &path,
        is_head: method == Method::HEAD,
    };
    let response = match deployment.destination(&resolved.dest) {
        Destination::Entrypoint { src, runtime } => {
            dispatch_entrypoint(req, state, &src, &runtime).await
        }
        Destination::Static { path: file } => {
            static_files::serve_file(&ctx, &state.config.deploy.project_root, &file).await
        }
    };

    let response = apply_route_overrides(response, &resolved);
    (response, Some(resolved.dest))
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<HttpResponse> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Hand the request to the runtime behind a build entrypoint
async fn dispatch_entrypoint<B>(
    req: Request<B>,
    state: &Arc<AppState>,
    src: &str,
    runtime: &Runtime,
) -> HttpResponse
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if src != routing::normalize(&state.config.app.entrypoint) || *runtime != Runtime::Python {
        logger::log_warning(&format!("No runtime bound to entrypoint {src} ({runtime})"));
        return http::build_json_error(
            StatusCode::BAD_GATEWAY,
            &format!("No runtime available for entrypoint '{src}' ({runtime})"),
        );
    }

    let (parts, body) = req.into_parts();
    let limit = usize::try_from(state.config.http.max_body_size).unwrap_or(usize::MAX);
    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => return http::build_413_response(),
        Err(e) => {
            logger::log_error(&format!("Failed to read request body: {e}"));
            return http::build_text_response(StatusCode::BAD_REQUEST, "400 Bad Request");
        }
    };

    let app_request = AppRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body,
    };
    app::handle(app_request, state).await
}

/// Apply the route's status override and extra headers
fn apply_route_overrides(mut response: HttpResponse, resolved: &Resolved) -> HttpResponse {
    if let Some(status) = resolved.status {
        match StatusCode::from_u16(status) {
            Ok(code) => *response.status_mut() = code,
            Err(e) => logger::log_warning(&format!("Ignoring route status {status}: {e}")),
        }
    }

    for (name, value) in &resolved.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => logger::log_warning(&format!("Ignoring invalid route header '{name}'")),
        }
    }
    response
}
