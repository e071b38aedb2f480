//! Handler - protocol requests to files, with request logging

use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode, Uri};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::cache::store::ModuleFile;
use crate::core::error::ProxyError;
use crate::core::model::EntryKind;
use crate::ops::dispatch::Dispatch;
use crate::server::metrics::MetricsRegistry;
use crate::server::route::route;

const METRICS_PATH: &str = "/metrics";
const TEXT_PLAIN: &str = "text/plain; charset=UTF-8";

/// Serve one request and log it with its latency and status
pub async fn handle(dispatch: Arc<Dispatch>, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    if req.uri().path() == METRICS_PATH {
        return Ok(metrics());
    }

    let start = Instant::now();
    let (method, uri) = (req.method().clone(), req.uri().clone());
    drop(req);
    let (response, op) = respond(&dispatch, &method, &uri).await;
    let elapsed = start.elapsed();

    info!("{:.3}s {} {}", elapsed.as_secs_f64(), response.status().as_u16(), uri);
    MetricsRegistry::global().record_request(op, elapsed, !response.status().is_success());
    Ok(response)
}

async fn respond(dispatch: &Dispatch, method: &Method, uri: &Uri) -> (Response<Body>, &'static str) {
    if *method != Method::GET && *method != Method::HEAD {
        return (text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"), "other");
    }

    let path = uri.path();
    if let Some(forwarder) = dispatch.forward.as_ref().filter(|f| f.matches(path)) {
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or(path);
        return match forwarder.forward(method, target).await {
            Ok(response) => (response, "forward"),
            Err(e) => {
                warn!(error = %e, "forwarding failed");
                (text(StatusCode::BAD_GATEWAY, &e.to_string()), "forward")
            }
        };
    }

    let op = match route(path) {
        Ok(Some(op)) => op,
        Ok(None) => return (text(StatusCode::NOT_FOUND, "not found"), "other"),
        Err(e) => return (error(&e), "other"),
    };

    match dispatch.ops.serve(&op).await {
        Ok(file) => (file_response(file, op.kind(), *method == Method::HEAD), op.name()),
        Err(e) => (error(&e), op.name()),
    }
}

fn file_response(file: ModuleFile, kind: EntryKind, head: bool) -> Response<Body> {
    let len = file.len;
    let body = if head {
        Body::empty()
    } else {
        Body::wrap_stream(ReaderStream::new(file.into_file()))
    };
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, kind.content_type())
        .header(CONTENT_LENGTH, len)
        .body(body)
        .unwrap_or_else(|_| text(StatusCode::INTERNAL_SERVER_ERROR, "building response"))
}

fn error(err: &ProxyError) -> Response<Body> {
    let status = err.status();
    if status.is_server_error() {
        warn!(error = %err, "request failed");
    }
    text(status, &err.to_string())
}

fn text(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(format!("{}\n", message)));
    *response.status_mut() = status;
    if let Ok(value) = TEXT_PLAIN.parse() {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

fn metrics() -> Response<Body> {
    let mut response = Response::new(Body::from(MetricsRegistry::global().render()));
    if let Ok(value) = "text/plain; version=0.0.4".parse() {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}
