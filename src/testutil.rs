//! Test helpers: a scripted stand-in for the go command

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::backends::go::GoCommand;
use crate::core::paths::CacheRoot;

/// Answers `list`, `mod download` and `env` the way the go command does,
/// writing artifacts under `$GOMODCACHE/cache/download` and appending every
/// invocation to `calls.log` next to the script.
const FAKE_GO: &str = r#"dir=$(dirname "$0")
echo "$*" >> "$dir/calls.log"
case "$1" in
list)
  q="$5"; mod="${q%@*}"
  if [ -f "$dir/list.json" ]; then
    cat "$dir/list.json"
  else
    printf '{"Path":"%s","Version":"v1.1.0","Versions":["v1.0.0","v1.1.0"]}' "$mod"
  fi
  ;;
mod)
  q="$4"; mod="${q%@*}"; ver="${q#*@}"
  [ "$ver" = latest ] && ver=v1.1.0
  case "$ver" in
  v1.0.0|v1.1.0) ;;
  *)
    echo "go: $q: invalid version: unknown revision $ver" >&2
    printf '{"Path":"%s","Error":"unknown revision %s"}' "$mod" "$ver"
    exit 1
    ;;
  esac
  d="$GOMODCACHE/cache/download/$mod/@v"
  mkdir -p "$d"
  printf '{"Version":"%s","Time":"2019-01-01T00:00:00Z"}' "$ver" > "$d/$ver.info"
  printf 'module %s\n' "$mod" > "$d/$ver.mod"
  printf 'PK-fake-zip-%s' "$ver" > "$d/$ver.zip"
  printf '{"Path":"%s","Version":"%s","Info":"%s","GoMod":"%s","Zip":"%s"}' \
    "$mod" "$ver" "$d/$ver.info" "$d/$ver.mod" "$d/$ver.zip"
  ;;
env)
  case "$3" in
  GOPATH) printf '{"GOPATH":"%s"}' "$dir/gopath" ;;
  *) printf '{"GOVERSION":"go1.22.0"}' ;;
  esac
  ;;
*)
  echo "unsupported: $*" >&2
  exit 2
  ;;
esac
"#;

/// Write a `sh` script into `dir` and return its path
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    path
}

pub struct FakeGo {
    pub dir: TempDir,
    pub root: CacheRoot,
    script: PathBuf,
}

impl FakeGo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let script = write_script(&bin, "go.sh", FAKE_GO);
        let root = CacheRoot::from_base(&dir.path().join("cache"));
        Self { dir, root, script }
    }

    /// A go command running the script under the proxy's resolver environment
    pub fn command(&self) -> GoCommand {
        GoCommand::new("sh")
            .with_leading_arg(self.script.to_string_lossy())
            .with_resolver_env(&self.root, None)
    }

    /// Command line usable with `--go`
    pub fn command_line(&self) -> String {
        format!("sh {}", self.script.display())
    }

    /// Replace the output of `go list -m -json -versions`
    pub fn set_list_output(&self, json: &str) {
        fs::write(self.script.with_file_name("list.json"), json).unwrap();
    }

    /// Arguments of every invocation so far, oldest first
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.script.with_file_name("calls.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
