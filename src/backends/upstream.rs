//! Next-hop module proxy
//!
//! Requests whose path matches the exclusion patterns skip local resolution
//! and are relayed unchanged to another module proxy.

use globset::{GlobBuilder, GlobMatcher};
use hyper::header::{
    HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED,
};
use hyper::{Body, Method, Response, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::core::escape::unescape_path;
use crate::server::metrics::MetricsRegistry;

/// Headers copied from the upstream response
const RELAYED_HEADERS: [HeaderName; 5] = [CONTENT_TYPE, CONTENT_LENGTH, ETAG, LAST_MODIFIED, CACHE_CONTROL];

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid exclude pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid upstream proxy url {url:?}: {reason}")]
    Url { url: String, reason: String },

    #[error("forwarding to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Comma-separated GOPRIVATE-style globs matched against path prefixes
///
/// A glob with N elements matches when the first N `/`-separated elements of
/// the target match it; `*` never crosses a `/`.
#[derive(Debug, Clone, Default)]
pub struct ExcludePatterns {
    globs: Vec<(usize, GlobMatcher)>,
}

impl ExcludePatterns {
    pub fn parse(patterns: &str) -> Result<Self, UpstreamError> {
        let mut globs = Vec::new();
        for raw in patterns.split(',') {
            let pattern = raw.trim().trim_end_matches('/');
            if pattern.is_empty() {
                continue;
            }
            let matcher = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|source| UpstreamError::Pattern {
                    pattern: pattern.to_string(),
                    source,
                })?
                .compile_matcher();
            globs.push((pattern.split('/').count(), matcher));
        }
        Ok(Self { globs })
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }

    /// Match a module path or a protocol request path
    ///
    /// Request paths are reduced to their module part and unescaped, so
    /// patterns see the same module path the go command does.
    pub fn matches(&self, target: &str) -> bool {
        let target = module_of(target);
        self.globs.iter().any(|(elems, glob)| {
            let parts: Vec<&str> = target.splitn(elems + 1, '/').collect();
            parts.len() >= *elems && glob.is_match(parts[..*elems].join("/"))
        })
    }
}

fn module_of(target: &str) -> String {
    let trimmed = target.trim_start_matches('/');
    let module = trimmed.find("/@").map_or(trimmed, |at| &trimmed[..at]);
    unescape_path(module).unwrap_or_else(|_| trimmed.to_string())
}

/// Relays matching requests to the next-hop proxy
#[derive(Debug, Clone)]
pub struct Forwarder {
    base: String,
    patterns: ExcludePatterns,
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(upstream: &str, patterns: ExcludePatterns) -> Result<Self, UpstreamError> {
        let url = reqwest::Url::parse(upstream).map_err(|e| UpstreamError::Url {
            url: upstream.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(UpstreamError::Url {
                url: upstream.to_string(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }
        Ok(Self {
            base: upstream.trim_end_matches('/').to_string(),
            patterns,
            client: reqwest::Client::new(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Whether a request for `path` goes upstream; with no patterns, all do
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.is_empty() || self.patterns.matches(path)
    }

    /// Send the request upstream and stream the answer back unchanged
    pub async fn forward(&self, method: &Method, path_and_query: &str) -> Result<Response<Body>, UpstreamError> {
        let url = format!("{}{}", self.base, path_and_query);
        debug!(%url, "forwarding request");
        MetricsRegistry::global().record_forward();

        let request = if *method == Method::HEAD {
            self.client.head(&url)
        } else {
            self.client.get(&url)
        };
        let upstream = request
            .send()
            .await
            .map_err(|source| UpstreamError::Request {
                url: url.clone(),
                source,
            })?;

        let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut response = Response::builder().status(status);
        if let Some(headers) = response.headers_mut() {
            for name in RELAYED_HEADERS {
                if let Some(value) = upstream.headers().get(name.as_str()) {
                    if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
                        headers.insert(name, value);
                    }
                }
            }
        }
        Ok(response
            .body(Body::wrap_stream(upstream.bytes_stream()))
            .unwrap_or_else(|_| Response::new(Body::empty())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_prefix_matching() {
        let patterns = ExcludePatterns::parse("*.corp.example.com,rsc.io/private").unwrap();
        assert!(patterns.matches("git.corp.example.com/team/repo/@v/list"));
        assert!(patterns.matches("/rsc.io/private/@v/v1.0.0.info"));
        assert!(patterns.matches("rsc.io/private"));
        assert!(!patterns.matches("rsc.io/public/@v/list"));
        assert!(!patterns.matches("corp.example.com/repo/@v/list"));
        assert!(!patterns.matches("rsc.io"));
    }

    #[test]
    fn test_patterns_see_unescaped_module_path() {
        let patterns = ExcludePatterns::parse("github.com/MyOrg").unwrap();
        assert!(patterns.matches("/github.com/!my!org/lib/@v/list"));
        assert!(patterns.matches("/github.com/!my!org/lib/@latest"));
        assert!(!patterns.matches("/github.com/myorg/lib/@v/list"));

        let fwd = Forwarder::new("https://proxy.example.com", patterns).unwrap();
        assert!(fwd.matches("/github.com/!my!org/lib/@v/v1.0.0.zip"));
    }

    #[test]
    fn test_star_does_not_cross_slash() {
        let patterns = ExcludePatterns::parse("example.com/*").unwrap();
        assert!(patterns.matches("example.com/foo/@v/list"));
        assert!(!patterns.matches("example.com"));

        let patterns = ExcludePatterns::parse("*").unwrap();
        assert!(patterns.matches("example.com/foo"));
    }

    #[test]
    fn test_blank_and_invalid_patterns() {
        assert!(ExcludePatterns::parse(" , ,").unwrap().is_empty());
        assert!(matches!(
            ExcludePatterns::parse("example.com/[").unwrap_err(),
            UpstreamError::Pattern { .. }
        ));
    }

    #[test]
    fn test_forwarder_rejects_bad_url() {
        assert!(Forwarder::new("not a url", ExcludePatterns::default()).is_err());
        assert!(Forwarder::new("ftp://proxy.example.com", ExcludePatterns::default()).is_err());
    }

    #[test]
    fn test_empty_patterns_forward_everything() {
        let fwd = Forwarder::new("https://proxy.example.com/", ExcludePatterns::default()).unwrap();
        assert_eq!(fwd.base(), "https://proxy.example.com");
        assert!(fwd.matches("anything.example.org/x/@v/list"));
    }

    #[tokio::test]
    async fn test_forward_relays_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/corp.example.com/lib/@v/list");
                then.status(200)
                    .header("content-type", "text/plain; charset=UTF-8")
                    .body("v0.1.0\nv0.2.0\n");
            })
            .await;

        let fwd = Forwarder::new(&server.base_url(), ExcludePatterns::parse("corp.example.com").unwrap()).unwrap();
        let response = fwd
            .forward(&Method::GET, "/corp.example.com/lib/@v/list")
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=UTF-8"
        );
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"v0.1.0\nv0.2.0\n");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_keeps_upstream_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/corp.example.com/lib/@v/v9.0.0.info");
                then.status(410).body("gone");
            })
            .await;

        let fwd = Forwarder::new(&server.base_url(), ExcludePatterns::default()).unwrap();
        let response = fwd
            .forward(&Method::GET, "/corp.example.com/lib/@v/v9.0.0.info")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_unreachable_upstream() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fwd = Forwarder::new(&format!("http://{addr}"), ExcludePatterns::default()).unwrap();
        let err = fwd.forward(&Method::GET, "/x.org/y/@v/list").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Request { .. }));
    }
}
