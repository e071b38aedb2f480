//! go command integration
//!
//! Every upstream resolution goes through [`GoCommand::invoke_json`]: it runs
//! the go command with `-json` output, captures stdout and stderr separately
//! and parses stdout into a typed record. A nonzero exit and unparseable
//! output are reported as different errors.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::model::{DownloadInfo, ModuleVersion, VersionQuery};
use crate::core::paths::CacheRoot;
use crate::server::metrics::MetricsRegistry;

#[derive(Debug, Error)]
pub enum ResolverError {
    /// The command could not be started or exited nonzero
    #[error("{command}:\n{diagnostics}")]
    Failed { command: String, diagnostics: String },

    /// The command succeeded but stdout was not the expected JSON
    #[error("{command}: reading json: {message}")]
    Output { command: String, message: String },

    /// The download succeeded but named no file of the requested kind
    #[error("go mod download -json {module}: no {kind} file reported")]
    MissingArtifact { module: String, kind: &'static str },
}

/// A configured go command (program, wrapper arguments and environment)
#[derive(Debug, Clone)]
pub struct GoCommand {
    program: PathBuf,
    leading_args: Vec<String>,
    env: Vec<(String, String)>,
}

impl GoCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Parse a whitespace-separated command line such as `go` or `sh ./go-wrapper.sh`
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut words = command_line.split_whitespace();
        let program = words.next()?;
        let mut go = Self::new(program);
        go.leading_args = words.map(str::to_string).collect();
        Some(go)
    }

    pub fn with_leading_arg(mut self, arg: impl Into<String>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    /// Set an environment variable for every invocation
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Apply the environment the proxy runs the go command under
    ///
    /// Modules always resolve directly from their origin into `root.mod_cache`,
    /// with checksum verification left to clients and interactive git prompts
    /// disabled.
    pub fn with_resolver_env(self, root: &CacheRoot, exclude: Option<&str>) -> Self {
        let mut go = self
            .with_env("GO111MODULE", "on")
            .with_env("GOPROXY", "direct")
            .with_env("GOSUMDB", "off")
            .with_env("GOMODCACHE", root.mod_cache.to_string_lossy());

        if std::env::var_os("GIT_TERMINAL_PROMPT").is_none() {
            go = go.with_env("GIT_TERMINAL_PROMPT", "0");
        }
        if std::env::var_os("GIT_SSH").is_none() && std::env::var_os("GIT_SSH_COMMAND").is_none() {
            go = go.with_env("GIT_SSH_COMMAND", "ssh -o ControlMaster=no");
        }
        if let Some(pattern) = exclude.filter(|p| !p.is_empty()) {
            go = go.with_env("GOPRIVATE", pattern);
        }
        go
    }

    /// Human-readable command line for diagnostics
    pub fn command_line(&self, args: &[&str]) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.leading_args.iter().cloned());
        parts.extend(args.iter().map(|a| a.to_string()));
        parts.join(" ")
    }

    /// Run the go command and parse its stdout as JSON into `T`
    ///
    /// Dropping the returned future kills the child process.
    pub async fn invoke_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, ResolverError> {
        let command = self.command_line(args);
        debug!(%command, "invoking go command");
        MetricsRegistry::global().record_resolver_call();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| ResolverError::Failed {
            command: command.clone(),
            diagnostics: format!("failed to start: {}", e),
        })?;

        if !output.status.success() {
            let diagnostics = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stderr),
                String::from_utf8_lossy(&output.stdout)
            );
            warn!(%command, status = %output.status, "go command failed");
            return Err(ResolverError::Failed {
                command,
                diagnostics,
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| ResolverError::Output {
            command,
            message: e.to_string(),
        })
    }

    /// Query every known version of `path`
    pub async fn list_versions(&self, path: &str) -> Result<VersionQuery, ResolverError> {
        let query = format!("{}@latest", path);
        self.invoke_json(&["list", "-m", "-json", "-versions", &query])
            .await
    }

    /// Download `module` into the module cache and report where its files landed
    pub async fn download(&self, module: &ModuleVersion) -> Result<DownloadInfo, ResolverError> {
        let query = module.to_string();
        let args = ["mod", "download", "-json", query.as_str()];
        let info: DownloadInfo = self.invoke_json(&args).await?;
        match info.error {
            Some(error) if !error.is_empty() => Err(ResolverError::Failed {
                command: self.command_line(&args),
                diagnostics: error,
            }),
            _ => Ok(info),
        }
    }

    /// Read GOPATH as the go command sees it
    pub async fn gopath(&self) -> Result<String, ResolverError> {
        #[derive(Deserialize)]
        struct Env {
            #[serde(rename = "GOPATH", default)]
            gopath: String,
        }

        let env: Env = self.invoke_json(&["env", "-json", "GOPATH"]).await?;
        Ok(env.gopath)
    }

    /// Report the go command's version line
    pub async fn version(&self) -> Result<String, ResolverError> {
        #[derive(Deserialize)]
        struct Env {
            #[serde(rename = "GOVERSION", default)]
            goversion: String,
        }

        let env: Env = self.invoke_json(&["env", "-json", "GOVERSION"]).await?;
        Ok(env.goversion)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testutil::{write_script, FakeGo};
    use tempfile::tempdir;

    #[test]
    fn test_parse_command_line() {
        let go = GoCommand::parse("sh ./wrapper.sh").unwrap();
        assert_eq!(go.command_line(&["env"]), "sh ./wrapper.sh env");
        assert!(GoCommand::parse("   ").is_none());
    }

    #[test]
    fn test_resolver_env() {
        let root = CacheRoot::from_base(std::path::Path::new("/srv"));
        let go = GoCommand::new("go").with_resolver_env(&root, Some("corp.example.com"));
        let get = |k: &str| {
            go.env
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("GOPROXY").as_deref(), Some("direct"));
        assert_eq!(get("GOSUMDB").as_deref(), Some("off"));
        assert_eq!(get("GOMODCACHE").as_deref(), Some("/srv/pkg/mod"));
        assert_eq!(get("GOPRIVATE").as_deref(), Some("corp.example.com"));
    }

    #[tokio::test]
    async fn test_list_versions_parses_output() {
        let fake = FakeGo::new();
        let query = fake.command().list_versions("example.org/foo").await.unwrap();
        assert_eq!(query.path, "example.org/foo");
        assert_eq!(query.versions, vec!["v1.0.0", "v1.1.0"]);
        assert_eq!(
            fake.calls(),
            vec!["list -m -json -versions example.org/foo@latest"]
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_embeds_streams() {
        let dir = tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "fail.sh",
            "echo 'to stdout'\necho 'go: something broke' >&2\nexit 1\n",
        );
        let go = GoCommand::new("sh").with_leading_arg(script.to_string_lossy());

        let err = go
            .invoke_json::<serde_json::Value>(&["env"])
            .await
            .unwrap_err();
        match err {
            ResolverError::Failed {
                command,
                diagnostics,
            } => {
                assert!(command.ends_with("fail.sh env"));
                assert_eq!(diagnostics, "go: something broke\nto stdout\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_json_is_distinct_error() {
        let dir = tempdir().unwrap();
        let script = write_script(dir.path(), "garbage.sh", "echo 'not json'\n");
        let go = GoCommand::new("sh").with_leading_arg(script.to_string_lossy());

        let err = go
            .invoke_json::<serde_json::Value>(&["env"])
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::Output { .. }));
        assert!(err.to_string().contains("reading json"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let go = GoCommand::new("/nonexistent/bin/go");
        let err = go.gopath().await.unwrap_err();
        match err {
            ResolverError::Failed { diagnostics, .. } => {
                assert!(diagnostics.starts_with("failed to start"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_error_field() {
        let dir = tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "err.sh",
            "printf '{\"Path\":\"example.org/foo\",\"Error\":\"unknown revision v9\"}'\n",
        );
        let go = GoCommand::new("sh").with_leading_arg(script.to_string_lossy());

        let err = go
            .download(&ModuleVersion::new("example.org/foo", "v9"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown revision v9"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_call_kills_child() {
        use std::time::Duration;

        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = write_script(
            dir.path(),
            "slow.sh",
            &format!("echo $$ > '{}'\nexec sleep 30\n", pid_file.display()),
        );
        let go = GoCommand::new("sh").with_leading_arg(script.to_string_lossy());

        let call = go.invoke_json::<serde_json::Value>(&["env"]);
        assert!(tokio::time::timeout(Duration::from_millis(500), call)
            .await
            .is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        // A reaped or zombie child no longer runs
        let running = || {
            std::fs::read_to_string(format!("/proc/{}/stat", pid))
                .ok()
                .and_then(|stat| stat.rsplit_once(") ").map(|(_, rest)| !rest.starts_with('Z')))
                .unwrap_or(false)
        };
        for _ in 0..50 {
            if !running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("go command {} still running after the call was dropped", pid);
    }
}
