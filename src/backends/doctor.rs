//! Doctor - Environment checking

use anyhow::{anyhow, bail, Result};

use crate::backends::go::GoCommand;
use crate::core::config::ProxyConfig;
use crate::core::paths::CacheRoot;
use crate::ops::dispatch::resolve_cache_root;

/// Outcome of one check
#[derive(Debug, Clone)]
pub struct CheckStatus {
    pub name: String,
    pub passed: bool,
    pub required: bool,
    pub detail: String,
}

impl CheckStatus {
    fn new(name: &str, required: bool, outcome: Result<String>) -> Self {
        let (passed, detail) = match outcome {
            Ok(detail) => (true, detail),
            Err(e) => (false, format!("{:#}", e)),
        };
        Self {
            name: name.to_string(),
            passed,
            required,
            detail,
        }
    }

    pub fn line(&self) -> String {
        let status = if self.passed { "✓" } else { "✗" };
        let required = if self.required {
            "required"
        } else {
            "optional"
        };
        format!("{} {} ({}) - {}", status, self.name, required, self.detail)
    }
}

/// Run every check against `config`
pub async fn check_environment(config: &ProxyConfig) -> Vec<CheckStatus> {
    let mut checks = Vec::new();

    let Some(go) = GoCommand::parse(&config.go) else {
        checks.push(CheckStatus::new("go", true, Err(anyhow!("empty go command"))));
        return checks;
    };

    let version = go.version().await.map_err(anyhow::Error::from).and_then(|v| {
        if v.is_empty() {
            bail!("go env reported no GOVERSION")
        }
        Ok(format!("{} ({})", v, config.go))
    });
    // Offline with an explicit cache dir never runs the go command
    let go_required = !(config.offline && config.cache_dir.is_some());
    checks.push(CheckStatus::new("go", go_required, version));

    let root = resolve_cache_root(config, &go).await;
    let root_detail = root
        .as_ref()
        .map(|r| r.download_root.display().to_string())
        .map_err(|e| anyhow!("{:#}", e));
    checks.push(CheckStatus::new("cache root", true, root_detail));

    if let Ok(root) = root {
        checks.push(CheckStatus::new(
            "cache writable",
            !config.offline,
            check_writable(&root),
        ));
    }

    checks
}

fn check_writable(root: &CacheRoot) -> Result<String> {
    std::fs::create_dir_all(&root.download_root)?;
    tempfile::tempfile_in(&root.download_root)?;
    Ok("ok".to_string())
}

/// Run the doctor command
pub async fn run_doctor(config: &ProxyConfig) -> Result<()> {
    let checks = check_environment(config).await;
    for check in &checks {
        println!("{}", check.line());
    }

    let failed: Vec<_> = checks
        .iter()
        .filter(|c| c.required && !c.passed)
        .map(|c| c.name.as_str())
        .collect();
    if !failed.is_empty() {
        bail!("required checks failed: {}", failed.join(", "));
    }
    Ok(())
}
