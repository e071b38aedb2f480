//! Failure taxonomy shared by the cache, the adapters and the protocol server

use hyper::StatusCode;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::backends::go::ResolverError;
use crate::core::escape::EscapeError;

/// Diagnostic fragments the go command prints when a module or version does not exist
const MISSING_MARKERS: &[&str] = &[
    "unknown revision",
    "no matching versions",
    "404 not found",
    "repository not found",
    "invalid version",
    "does not exist",
    "410 gone",
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    InvalidModule(#[from] EscapeError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("go list -m: asked for {requested} but got {actual}")]
    UpstreamMismatch { requested: String, actual: String },

    #[error(transparent)]
    Upstream(ResolverError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// Wrap an I/O failure on `path`, mapping a missing file to `NotFound`
    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ProxyError::NotFound(path.display().to_string())
        } else {
            ProxyError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// HTTP status the protocol server answers with
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidModule(_) => StatusCode::BAD_REQUEST,
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::UpstreamMismatch { .. } | ProxyError::Upstream(_) | ProxyError::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ResolverError> for ProxyError {
    fn from(err: ResolverError) -> Self {
        if let ResolverError::Failed { diagnostics, .. } = &err {
            let lower = diagnostics.to_ascii_lowercase();
            if MISSING_MARKERS.iter().any(|m| lower.contains(m)) {
                return ProxyError::NotFound(diagnostics.trim().to_string());
            }
        }
        ProxyError::Upstream(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(diagnostics: &str) -> ResolverError {
        ResolverError::Failed {
            command: "go mod download -json example.org/foo@v9.9.9".to_string(),
            diagnostics: diagnostics.to_string(),
        }
    }

    #[test]
    fn test_missing_version_maps_to_not_found() {
        let err: ProxyError =
            failed("go: example.org/foo@v9.9.9: invalid version: unknown revision v9.9.9").into();
        assert!(matches!(err, ProxyError::NotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_other_failures_stay_upstream_errors() {
        let err: ProxyError = failed("go: dial tcp: connection refused").into();
        assert!(matches!(err, ProxyError::Upstream(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_missing_tooling_is_not_a_missing_module() {
        let err: ProxyError = failed(
            "go: example.org/foo@v1.0.0: git init --bare in /cache/vcs: \
             exec: \"git\": executable file not found in $PATH",
        )
        .into();
        assert!(matches!(err, ProxyError::Upstream(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("executable file not found"));
    }

    #[test]
    fn test_missing_repository_maps_to_not_found() {
        for diagnostics in [
            "go: example.org/foo@latest: reading https://example.org/foo?go-get=1: 404 Not Found",
            "go: github.com/acme/gone@latest: git ls-remote -q origin: exit status 128:\n\tremote: Repository not found.",
        ] {
            let err: ProxyError = failed(diagnostics).into();
            assert_eq!(err.status(), StatusCode::NOT_FOUND, "{}", diagnostics);
        }
    }

    #[test]
    fn test_unparseable_output_is_upstream_error() {
        let err: ProxyError = ResolverError::Output {
            command: "go list -m -json -versions example.org/foo@latest".to_string(),
            message: "expected value at line 1 column 1".to_string(),
        }
        .into();
        assert!(matches!(err, ProxyError::Upstream(_)));
    }

    #[test]
    fn test_io_not_found_kind() {
        let path = Path::new("/cache/example.org/foo/@v/list");
        let err = ProxyError::io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, ProxyError::NotFound(_)));

        let err = ProxyError::io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, ProxyError::Io { .. }));
        assert!(err.to_string().starts_with("/cache/example.org/foo/@v/list"));
    }
}
