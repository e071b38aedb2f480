//! Online mode - resolve through the go command, cache version lists

use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

use crate::backends::go::{GoCommand, ResolverError};
use crate::cache::freshness::ListPolicy;
use crate::cache::store::{CacheStore, ModuleFile};
use crate::core::error::{ProxyError, ProxyResult};
use crate::core::model::{encode_version_list, EntryKind, ModuleVersion};

#[derive(Debug, Clone)]
pub struct OnlineOps {
    store: CacheStore,
    go: GoCommand,
    policy: ListPolicy,
}

impl OnlineOps {
    pub fn new(store: CacheStore, go: GoCommand, policy: ListPolicy) -> Self {
        Self { store, go, policy }
    }

    /// Serve the version list, refreshing it once it leaves the freshness window
    pub async fn list(&self, path: &str) -> ProxyResult<ModuleFile> {
        let file = self.store.list_path(path)?;
        if let Ok(mod_time) = self.store.mod_time(&file).await {
            if self.policy.is_fresh(mod_time, SystemTime::now()) {
                debug!(module = path, "version list cache hit");
                return self.store.open(&file).await;
            }
        }

        let query = self.go.list_versions(path).await?;
        if query.path != path {
            return Err(ProxyError::UpstreamMismatch {
                requested: path.to_string(),
                actual: query.path,
            });
        }

        debug!(module = path, versions = query.versions.len(), "caching version list");
        self.store
            .write(&file, encode_version_list(&query.versions))
            .await?;
        self.store.open(&file).await
    }

    pub async fn latest(&self, path: &str) -> ProxyResult<ModuleFile> {
        self.fetch(&ModuleVersion::latest(path), EntryKind::Info).await
    }

    pub async fn info(&self, module: &ModuleVersion) -> ProxyResult<ModuleFile> {
        self.fetch(module, EntryKind::Info).await
    }

    pub async fn go_mod(&self, module: &ModuleVersion) -> ProxyResult<ModuleFile> {
        self.fetch(module, EntryKind::Mod).await
    }

    pub async fn zip(&self, module: &ModuleVersion) -> ProxyResult<ModuleFile> {
        self.fetch(module, EntryKind::Zip).await
    }

    /// Download `module` and open the file the go command reports for `kind`
    async fn fetch(&self, module: &ModuleVersion, kind: EntryKind) -> ProxyResult<ModuleFile> {
        // Malformed identifiers never reach the go command
        self.store.entry_path(module, kind)?;

        let info = self.go.download(module).await?;
        let artifact = info.artifact(kind);
        if artifact.is_empty() {
            return Err(ResolverError::MissingArtifact {
                module: module.to_string(),
                kind: kind.op_name(),
            }
            .into());
        }
        self.store.open(Path::new(artifact)).await
    }
}
