//! Startup configuration
//!
//! Everything the proxy needs is gathered into one value at startup and
//! passed down explicitly; nothing below the CLI reads flags or mutates the
//! process environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::freshness::LIST_EXPIRE;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8081";
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address the protocol server binds
    pub listen: SocketAddr,

    /// Base directory for the module cache (GOPATH's first entry when unset)
    pub cache_dir: Option<PathBuf>,

    /// Serve only from the cache
    pub offline: bool,

    /// GOPRIVATE-style patterns selecting requests for the upstream proxy
    pub exclude: Option<String>,

    /// Next-hop module proxy for forwarded requests
    pub upstream: Option<String>,

    /// Freshness window for cached version lists
    pub list_expire: Duration,

    /// How long shutdown waits for in-flight requests
    pub shutdown_grace: Duration,

    /// go command line (program plus leading arguments)
    pub go: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8081)),
            cache_dir: None,
            offline: false,
            exclude: None,
            upstream: None,
            list_expire: LIST_EXPIRE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            go: "go".to_string(),
        }
    }
}

impl ProxyConfig {
    /// The exclusion pattern, if one was given and is non-blank
    pub fn exclude_pattern(&self) -> Option<&str> {
        self.exclude
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// The upstream proxy, if one was given and is non-blank
    pub fn upstream_url(&self) -> Option<&str> {
        self.upstream
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}
