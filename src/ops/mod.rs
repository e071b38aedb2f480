//! Ops module - The five proxy operations in online and offline mode
//!
//! Provides:
//! - online: resolve through the go command and cache version lists
//! - offline: read-only cache lookups
//! - dispatch: the per-process choice of mode and forwarding

pub mod dispatch;
pub mod offline;
pub mod online;

use crate::cache::store::ModuleFile;
use crate::core::error::ProxyResult;
use crate::core::model::{EntryKind, ModuleVersion};

pub use offline::OfflineOps;
pub use online::OnlineOps;

/// A protocol request after routing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    List(String),
    Latest(String),
    Entry(ModuleVersion, EntryKind),
}

impl Operation {
    /// Kind of file the operation answers with
    pub fn kind(&self) -> EntryKind {
        match self {
            Operation::List(_) => EntryKind::List,
            Operation::Latest(_) => EntryKind::Info,
            Operation::Entry(_, kind) => *kind,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Latest(_) => "latest",
            other => other.kind().op_name(),
        }
    }
}

/// The operation set, selected once at startup
#[derive(Debug, Clone)]
pub enum ModuleOps {
    Online(OnlineOps),
    Offline(OfflineOps),
}

impl ModuleOps {
    pub fn mode(&self) -> &'static str {
        match self {
            ModuleOps::Online(_) => "online",
            ModuleOps::Offline(_) => "offline",
        }
    }

    pub async fn list(&self, path: &str) -> ProxyResult<ModuleFile> {
        match self {
            ModuleOps::Online(ops) => ops.list(path).await,
            ModuleOps::Offline(ops) => ops.list(path).await,
        }
    }

    pub async fn latest(&self, path: &str) -> ProxyResult<ModuleFile> {
        match self {
            ModuleOps::Online(ops) => ops.latest(path).await,
            ModuleOps::Offline(ops) => ops.latest(path).await,
        }
    }

    pub async fn info(&self, module: &ModuleVersion) -> ProxyResult<ModuleFile> {
        match self {
            ModuleOps::Online(ops) => ops.info(module).await,
            ModuleOps::Offline(ops) => ops.info(module).await,
        }
    }

    pub async fn go_mod(&self, module: &ModuleVersion) -> ProxyResult<ModuleFile> {
        match self {
            ModuleOps::Online(ops) => ops.go_mod(module).await,
            ModuleOps::Offline(ops) => ops.go_mod(module).await,
        }
    }

    pub async fn zip(&self, module: &ModuleVersion) -> ProxyResult<ModuleFile> {
        match self {
            ModuleOps::Online(ops) => ops.zip(module).await,
            ModuleOps::Offline(ops) => ops.zip(module).await,
        }
    }

    /// Run a routed request
    pub async fn serve(&self, op: &Operation) -> ProxyResult<ModuleFile> {
        match op {
            Operation::List(path) => self.list(path).await,
            Operation::Latest(path) => self.latest(path).await,
            Operation::Entry(module, EntryKind::Info) => self.info(module).await,
            Operation::Entry(module, EntryKind::Mod) => self.go_mod(module).await,
            Operation::Entry(module, EntryKind::Zip) => self.zip(module).await,
            Operation::Entry(module, EntryKind::List) => self.list(&module.path).await,
        }
    }
}
