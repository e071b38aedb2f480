//! Module identifiers and the records exchanged with the go command

use serde::Deserialize;
use std::fmt;

/// Version token that asks the resolver for the newest available version
pub const LATEST: &str = "latest";

/// A module path at a specific version (or the `latest` query)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleVersion {
    pub path: String,
    pub version: String,
}

impl ModuleVersion {
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
        }
    }

    pub fn latest(path: impl Into<String>) -> Self {
        Self::new(path, LATEST)
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.version)
    }
}

/// The kinds of file kept per module in the download cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    List,
    Info,
    Mod,
    Zip,
}

impl EntryKind {
    /// File name suffix appended to the escaped version
    pub fn suffix(self) -> &'static str {
        match self {
            EntryKind::List => "",
            EntryKind::Info => ".info",
            EntryKind::Mod => ".mod",
            EntryKind::Zip => ".zip",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            EntryKind::List | EntryKind::Mod => "text/plain; charset=UTF-8",
            EntryKind::Info => "application/json",
            EntryKind::Zip => "application/zip",
        }
    }

    /// Short operation name used in logs and metrics
    pub fn op_name(self) -> &'static str {
        match self {
            EntryKind::List => "list",
            EntryKind::Info => "info",
            EntryKind::Mod => "mod",
            EntryKind::Zip => "zip",
        }
    }
}

/// Output of `go list -m -json -versions <module>@latest`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionQuery {
    pub path: String,

    #[serde(default)]
    pub versions: Vec<String>,
}

/// Output of `go mod download -json <module>@<version>`
///
/// The go command writes every artifact into its module cache and reports where.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DownloadInfo {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub go_mod: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub dir: String,
    #[serde(default)]
    pub sum: String,
    #[serde(default)]
    pub go_mod_sum: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl DownloadInfo {
    /// Location of the artifact for `kind` (empty if the resolver reported none)
    pub fn artifact(&self, kind: EntryKind) -> &str {
        match kind {
            EntryKind::Info => &self.info,
            EntryKind::Mod => &self.go_mod,
            EntryKind::Zip => &self.zip,
            EntryKind::List => "",
        }
    }
}

/// Serialize a version list the way the cache stores it
///
/// Every version is newline-terminated; an empty list is zero bytes rather
/// than a lone newline.
pub fn encode_version_list(versions: &[String]) -> Vec<u8> {
    if versions.is_empty() {
        return Vec::new();
    }
    let mut data = versions.join("\n");
    data.push('\n');
    data.into_bytes()
}

/// Parse a cached version list, skipping blank lines
#[cfg(test)]
pub fn decode_version_list(data: &str) -> Vec<String> {
    data.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
