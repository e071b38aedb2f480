//! Cache store - Path-addressed files under the download root
//!
//! Layout: `<root>/<escaped-module>/@v/list` and
//! `<root>/<escaped-module>/@v/<escaped-version>.{info,mod,zip}`.
//! The go command writes everything except `list`; the proxy only writes
//! `list` and never deletes anything.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::{self, File};

use crate::core::error::{ProxyError, ProxyResult};
use crate::core::escape::{escape_path, escape_version, EscapeError};
use crate::core::model::{EntryKind, ModuleVersion};

/// Path of the version list for module `path`
pub fn list_file(root: &Path, path: &str) -> Result<PathBuf, EscapeError> {
    let escaped = escape_path(path)?;
    Ok(root.join(escaped).join("@v").join("list"))
}

/// Path of the `kind` file for `module`
pub fn entry_file(root: &Path, module: &ModuleVersion, kind: EntryKind) -> Result<PathBuf, EscapeError> {
    if kind == EntryKind::List {
        return list_file(root, &module.path);
    }
    let escaped = escape_path(&module.path)?;
    let version = escape_version(&module.version)?;
    Ok(root
        .join(escaped)
        .join("@v")
        .join(format!("{}{}", version, kind.suffix())))
}

/// An open cache file ready to be streamed to a client
#[derive(Debug)]
pub struct ModuleFile {
    pub path: PathBuf,
    pub len: u64,
    file: File,
}

impl ModuleFile {
    pub fn into_file(self) -> File {
        self.file
    }

    #[cfg(test)]
    pub async fn read_to_string(self) -> String {
        use tokio::io::AsyncReadExt;

        let mut s = String::new();
        self.into_file().read_to_string(&mut s).await.unwrap();
        s
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn list_path(&self, path: &str) -> ProxyResult<PathBuf> {
        Ok(list_file(&self.root, path)?)
    }

    pub fn entry_path(&self, module: &ModuleVersion, kind: EntryKind) -> ProxyResult<PathBuf> {
        Ok(entry_file(&self.root, module, kind)?)
    }

    /// Whether a regular file exists at `path`
    pub async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Open `path` for reading; a missing file is `NotFound`
    pub async fn open(&self, path: &Path) -> ProxyResult<ModuleFile> {
        let file = File::open(path)
            .await
            .map_err(|e| ProxyError::io(path, e))?;
        let metadata = file.metadata().await.map_err(|e| ProxyError::io(path, e))?;
        if !metadata.is_file() {
            return Err(ProxyError::NotFound(path.display().to_string()));
        }
        Ok(ModuleFile {
            path: path.to_path_buf(),
            len: metadata.len(),
            file,
        })
    }

    pub async fn mod_time(&self, path: &Path) -> ProxyResult<SystemTime> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| ProxyError::io(path, e))?;
        metadata.modified().map_err(|e| ProxyError::io(path, e))
    }

    /// Replace the file at `path` with `data`, creating missing directories
    ///
    /// The bytes go to a temporary file in the same directory which is then
    /// renamed over `path`, so readers never observe a partial file.
    pub async fn write(&self, path: &Path, data: Vec<u8>) -> ProxyResult<()> {
        let dir = path
            .parent()
            .ok_or_else(|| ProxyError::io(path, io::Error::other("no parent directory")))?
            .to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProxyError::io(&dir, e))?;

        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || atomic_write(&dir, &target, &data))
            .await
            .map_err(|e| ProxyError::io(path, io::Error::other(e)))?
    }
}

fn atomic_write(dir: &Path, target: &Path, data: &[u8]) -> ProxyResult<()> {
    use std::io::Write;

    let mut builder = tempfile::Builder::new();
    builder.prefix(".tmp-").suffix(".partial");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }

    let mut tmp = builder
        .tempfile_in(dir)
        .map_err(|e| ProxyError::io(dir, e))?;
    tmp.write_all(data)
        .map_err(|e| ProxyError::io(tmp.path(), e))?;
    tmp.persist(target)
        .map_err(|e| ProxyError::io(target, e.error))?;
    Ok(())
}
