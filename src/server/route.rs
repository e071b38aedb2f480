//! Route - map a request path onto a proxy operation

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::ProxyResult;
use crate::core::escape::{unescape_path, unescape_version};
use crate::core::model::{EntryKind, ModuleVersion};
use crate::ops::Operation;

static ROUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/([^@]+)/(?:(@latest)|@v/(?:(list)|([^/]+)\.(info|mod|zip)))$")
        .expect("route regex")
});

/// Parse `path`; `Ok(None)` when it is not a protocol path
pub fn route(path: &str) -> ProxyResult<Option<Operation>> {
    let Some(caps) = ROUTE.captures(path) else {
        return Ok(None);
    };
    let module = unescape_path(&caps[1])?;

    if caps.get(2).is_some() {
        return Ok(Some(Operation::Latest(module)));
    }
    if caps.get(3).is_some() {
        return Ok(Some(Operation::List(module)));
    }

    let version = unescape_version(&caps[4])?;
    let kind = match &caps[5] {
        "info" => EntryKind::Info,
        "mod" => EntryKind::Mod,
        _ => EntryKind::Zip,
    };
    Ok(Some(Operation::Entry(ModuleVersion::new(module, version), kind)))
}
