//! Offline mode - serve only what is already in the cache
//!
//! Presence is the only check: there is no upstream to refresh against, so a
//! version list of any age is served and every miss is final.

use crate::cache::store::{CacheStore, ModuleFile};
use crate::core::error::{ProxyError, ProxyResult};
use crate::core::model::{EntryKind, ModuleVersion};

#[derive(Debug, Clone)]
pub struct OfflineOps {
    store: CacheStore,
}

impl OfflineOps {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    pub async fn list(&self, path: &str) -> ProxyResult<ModuleFile> {
        let file = self.store.list_path(path)?;
        self.cached(&file).await
    }

    /// `latest` is looked up as the literal version `latest`
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

    async fn fetch(&self, module: &ModuleVersion, kind: EntryKind) -> ProxyResult<ModuleFile> {
        let file = self.store.entry_path(module, kind)?;
        self.cached(&file).await
    }

    async fn cached(&self, file: &std::path::Path) -> ProxyResult<ModuleFile> {
        if !self.store.exists(file).await {
            return Err(ProxyError::NotFound(file.display().to_string()));
        }
        self.store.open(file).await
    }
}
