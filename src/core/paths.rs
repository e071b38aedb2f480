//! Cache root layout
//!
//! The proxy shares its download cache with the go command it invokes:
//! `<base>/pkg/mod` is the module cache (`GOMODCACHE`) and
//! `<base>/pkg/mod/cache/download` holds the files served to clients.
//!
//! The proxy must not share a GOPATH with its own clients: a client locks an
//! entry as "being downloaded" before asking the proxy, which would then wait
//! on that same lock forever.

use std::path::{Path, PathBuf};

/// Locations derived from a GOPATH-style base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoot {
    /// Module cache handed to the go command as GOMODCACHE
    pub mod_cache: PathBuf,

    /// Root of the `<escaped-module>/@v/<file>` tree served by the proxy
    pub download_root: PathBuf,
}

impl CacheRoot {
    /// Derive the layout from a base directory (an explicit cache dir or a GOPATH entry)
    pub fn from_base(base: &Path) -> Self {
        let mod_cache = base.join("pkg").join("mod");
        let download_root = mod_cache.join("cache").join("download");
        Self {
            mod_cache,
            download_root,
        }
    }

    /// Derive the layout from a GOPATH list, using its first entry
    pub fn from_gopath(gopath: &str) -> Option<Self> {
        std::env::split_paths(gopath)
            .next()
            .filter(|first| !first.as_os_str().is_empty())
            .map(|first| Self::from_base(&first))
    }
}
