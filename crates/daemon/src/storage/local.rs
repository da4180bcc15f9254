// Local filesystem backend, sandboxed under a single document root.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::errors::OpError;
use crate::security::ensure_owner_only_dir;
use crate::storage::DocumentStorage;

const BACKUP_EXT: &str = "bak";

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    autobackup: bool,
}

impl LocalStorage {
    /// Create a backend rooted at `root`, creating the directory if needed.
    /// The root is canonicalized once so containment checks compare real
    /// paths, not symlink spellings.
    pub fn new(root: impl AsRef<Path>, autobackup: bool) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .with_context(|| format!("failed to create document root `{}`", root.display()))?;
        ensure_owner_only_dir(root)?;
        let root = root
            .canonicalize()
            .with_context(|| format!("failed to canonicalize document root `{}`", root.display()))?;
        Ok(Self { root, autobackup })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a normalized relative path under the root and verify it stays
    /// inside. Normalization upstream already rejects `..` components; this
    /// is the last line of defense against symlinked escapes.
    fn resolve(&self, path: &str) -> Result<PathBuf, OpError> {
        let joined = self.root.join(path);

        // Canonicalize the deepest existing ancestor so symlinks inside the
        // tree can't point a write outside the root.
        let mut probe = joined.clone();
        let real_ancestor = loop {
            match probe.canonicalize() {
                Ok(real) => break real,
                Err(_) => match probe.parent() {
                    Some(parent) => probe = parent.to_path_buf(),
                    None => {
                        return Err(OpError::PathEscapesRoot { path: path.to_string() });
                    }
                },
            }
        };

        if !real_ancestor.starts_with(&self.root) {
            return Err(OpError::PathEscapesRoot { path: path.to_string() });
        }
        Ok(joined)
    }

    fn backup_path(full_path: &Path) -> PathBuf {
        let mut name = full_path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(BACKUP_EXT);
        full_path.with_file_name(name)
    }

    fn write_atomic(full_path: &Path, content: &str) -> Result<()> {
        let parent = full_path
            .parent()
            .with_context(|| format!("document path `{}` has no parent", full_path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory `{}`", parent.display()))?;

        let file_name = full_path.file_name().unwrap_or_default().to_string_lossy();
        let tmp_path = parent.join(format!(".{file_name}.tmp-{}", std::process::id()));

        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create temp file `{}`", tmp_path.display()))?;
        file.write_all(content.as_bytes()).context("failed to write document content")?;
        file.sync_data().context("failed to fsync document file")?;
        drop(file);

        fs::rename(&tmp_path, full_path).with_context(|| {
            format!(
                "failed to atomically move `{}` to `{}`",
                tmp_path.display(),
                full_path.display()
            )
        })?;
        Ok(())
    }
}

impl DocumentStorage for LocalStorage {
    fn load(&self, path: &str) -> Result<String, OpError> {
        let full_path = self.resolve(path)?;
        match fs::read_to_string(&full_path) {
            Ok(content) => Ok(content),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(OpError::DocumentNotFound { path: path.to_string() })
            }
            Err(error) => Err(OpError::Storage(format!(
                "failed to read `{}`: {error}",
                full_path.display()
            ))),
        }
    }

    fn save(&self, path: &str, content: &str) -> Result<(), OpError> {
        let full_path = self.resolve(path)?;

        if self.autobackup && full_path.exists() {
            let backup = Self::backup_path(&full_path);
            fs::copy(&full_path, &backup).map_err(|error| {
                OpError::Storage(format!(
                    "failed to write backup `{}`: {error}",
                    backup.display()
                ))
            })?;
            debug!(path, backup = %backup.display(), "wrote pre-apply backup");
        }

        Self::write_atomic(&full_path, content)
            .map_err(|error| OpError::Storage(error.to_string()))
    }

    fn exists(&self, path: &str) -> Result<bool, OpError> {
        let full_path = self.resolve(path)?;
        Ok(full_path.exists())
    }
}
