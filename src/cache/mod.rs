//! Cache module - The on-disk module download cache
//!
//! Provides:
//! - Cache entry path derivation (list/info/mod/zip)
//! - File open/write/mtime access
//! - The freshness window for version lists

pub mod freshness;
pub mod store;
