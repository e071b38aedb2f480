//! Dispatch - one-time choice of operation set and forwarding
//!
//! Offline mode serves the cache and nothing else. Online mode resolves
//! through the go command and may hand requests matching the exclusion
//! pattern to a next-hop proxy.

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::backends::go::GoCommand;
use crate::backends::upstream::{ExcludePatterns, Forwarder};
use crate::cache::freshness::ListPolicy;
use crate::cache::store::CacheStore;
use crate::core::config::ProxyConfig;
use crate::core::paths::CacheRoot;
use crate::ops::{ModuleOps, OfflineOps, OnlineOps};

#[derive(Debug, Clone)]
pub struct Dispatch {
    pub ops: ModuleOps,
    pub forward: Option<Forwarder>,
}

impl Dispatch {
    pub async fn from_config(config: &ProxyConfig) -> Result<Self> {
        let go = GoCommand::parse(&config.go).context("empty go command")?;
        let root = resolve_cache_root(config, &go).await?;
        let store = CacheStore::new(&root.download_root);

        if config.offline {
            if let Some(upstream) = config.upstream_url() {
                warn!(%upstream, "offline mode ignores the upstream proxy");
            }
            info!(root = %store.root().display(), "serving from cache only");
            return Ok(Self {
                ops: ModuleOps::Offline(OfflineOps::new(store)),
                forward: None,
            });
        }

        let exclude = config.exclude_pattern();
        let forward = match config.upstream_url() {
            Some(upstream) => {
                let patterns = ExcludePatterns::parse(exclude.unwrap_or_default())?;
                let forwarder = Forwarder::new(upstream, patterns)?;
                info!(upstream = forwarder.base(), exclude = exclude.unwrap_or("*"), "forwarding enabled");
                Some(forwarder)
            }
            None => None,
        };

        let go = go.with_resolver_env(&root, exclude);
        let policy = ListPolicy::new(config.list_expire);
        info!(
            root = %store.root().display(),
            go = %config.go,
            list_expire_secs = policy.expire().as_secs(),
            "resolving through the go command"
        );
        Ok(Self {
            ops: ModuleOps::Online(OnlineOps::new(store, go, policy)),
            forward,
        })
    }
}

/// Explicit cache directory, or the first GOPATH entry the go command reports
pub async fn resolve_cache_root(config: &ProxyConfig, go: &GoCommand) -> Result<CacheRoot> {
    if let Some(dir) = &config.cache_dir {
        return Ok(CacheRoot::from_base(dir));
    }
    let gopath = go.gopath().await.context("determining GOPATH")?;
    match CacheRoot::from_gopath(&gopath) {
        Some(root) => Ok(root),
        None => bail!("missing $GOPATH"),
    }
}
