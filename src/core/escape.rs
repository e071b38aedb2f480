//! Module path and version escaping
//!
//! Cache entries and proxy URLs use a case-folded form of module identifiers:
//! every uppercase ASCII letter becomes `!` followed by its lowercase form, so
//! `github.com/Azure/go` is stored under `github.com/!azure/go`. Escaping is a
//! pure function of its input; the cache layer only ever re-derives it.

use thiserror::Error;

/// Validation failure for a module path or version
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {what} {value:?}: {reason}")]
pub struct EscapeError {
    pub what: &'static str,
    pub value: String,
    pub reason: String,
}

impl EscapeError {
    fn path(value: &str, reason: impl Into<String>) -> Self {
        Self {
            what: "module path",
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn version(value: &str, reason: impl Into<String>) -> Self {
        Self {
            what: "version",
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Names Windows refuses as file names, regardless of extension
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum ElemKind {
    ModulePath,
    FileName,
}

fn module_char_ok(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

fn first_elem_char_ok(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.')
}

fn file_char_ok(c: char) -> bool {
    c.is_ascii_alphanumeric() || "#$%&()+,-.=@[]^_{}~".contains(c)
}

fn check_elem(elem: &str, kind: ElemKind) -> Result<(), String> {
    if elem.is_empty() {
        return Err("empty path element".to_string());
    }
    if elem.chars().all(|c| c == '.') {
        return Err(format!("invalid path element {:?}", elem));
    }
    if kind == ElemKind::ModulePath && elem.starts_with('.') {
        return Err(format!("leading dot in path element {:?}", elem));
    }
    if elem.ends_with('.') {
        return Err(format!("trailing dot in path element {:?}", elem));
    }

    let ok = match kind {
        ElemKind::ModulePath => module_char_ok,
        ElemKind::FileName => file_char_ok,
    };
    if let Some(c) = elem.chars().find(|c| !ok(*c)) {
        return Err(format!("invalid char {:?}", c));
    }

    let short = elem.split('.').next().unwrap_or(elem);
    if RESERVED_NAMES
        .iter()
        .any(|name| name.eq_ignore_ascii_case(short))
    {
        return Err(format!("{:?} disallowed as path element component on Windows", short));
    }

    // Windows 8.3 short names look like GOPRIV~1
    if let Some(tilde) = short.rfind('~') {
        let suffix = &short[tilde + 1..];
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("trailing tilde and digits in path element {:?}", elem));
        }
    }

    Ok(())
}

/// Check that `path` is a valid module path
pub fn check_path(path: &str) -> Result<(), EscapeError> {
    if path.is_empty() {
        return Err(EscapeError::path(path, "empty string"));
    }
    if path.starts_with('-') {
        return Err(EscapeError::path(path, "leading dash"));
    }
    if path.contains("//") {
        return Err(EscapeError::path(path, "double slash"));
    }
    if path.starts_with('/') {
        return Err(EscapeError::path(path, "leading slash"));
    }
    if path.ends_with('/') {
        return Err(EscapeError::path(path, "trailing slash"));
    }

    for elem in path.split('/') {
        check_elem(elem, ElemKind::ModulePath).map_err(|reason| EscapeError::path(path, reason))?;
    }

    let first = path.split('/').next().unwrap_or(path);
    if !first.contains('.') {
        return Err(EscapeError::path(path, "missing dot in first path element"));
    }
    if first.starts_with('-') {
        return Err(EscapeError::path(path, "leading dash in first path element"));
    }
    if let Some(c) = first.chars().find(|c| !first_elem_char_ok(*c)) {
        return Err(EscapeError::path(
            path,
            format!("invalid char {:?} in first path element", c),
        ));
    }

    Ok(())
}

/// Check that `version` can be used as a single file name element
pub fn check_version(version: &str) -> Result<(), EscapeError> {
    if version.contains('/') {
        return Err(EscapeError::version(version, "contains slash"));
    }
    check_elem(version, ElemKind::FileName).map_err(|reason| EscapeError::version(version, reason))
}

fn escape_string(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c == '!' || !c.is_ascii() {
            return None;
        }
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn unescape_string(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut bang = false;
    for c in s.chars() {
        if bang {
            if !c.is_ascii_lowercase() {
                return None;
            }
            out.push(c.to_ascii_uppercase());
            bang = false;
        } else if c == '!' {
            bang = true;
        } else if c.is_ascii_uppercase() {
            return None;
        } else {
            out.push(c);
        }
    }
    if bang {
        return None;
    }
    Some(out)
}

/// Escape a module path for use in the cache or a proxy URL
pub fn escape_path(path: &str) -> Result<String, EscapeError> {
    check_path(path)?;
    escape_string(path).ok_or_else(|| EscapeError::path(path, "internal error: invalid char"))
}

/// Escape a version for use as a cache file name
pub fn escape_version(version: &str) -> Result<String, EscapeError> {
    check_version(version)?;
    escape_string(version).ok_or_else(|| EscapeError::version(version, "invalid char '!'"))
}

/// Recover a module path from its escaped form
pub fn unescape_path(escaped: &str) -> Result<String, EscapeError> {
    let path =
        unescape_string(escaped).ok_or_else(|| EscapeError::path(escaped, "invalid escaped module path"))?;
    check_path(&path)?;
    Ok(path)
}

/// Recover a version from its escaped form
pub fn unescape_version(escaped: &str) -> Result<String, EscapeError> {
    let version =
        unescape_string(escaped).ok_or_else(|| EscapeError::version(escaped, "invalid escaped version"))?;
    check_version(&version)?;
    Ok(version)
}
