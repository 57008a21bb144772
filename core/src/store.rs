//! Artifact file storage.
//!
//! The `ArtifactStore` is the only component that touches the tools
//! directory: a flat layout of one `<id>.<ext>` script per tool. Writes go
//! through a sibling temp file and an atomic rename, so a concurrent reader
//! (or a crash) never observes a half-written script.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::artifact::ToolId;
use crate::config::ToolboxConfig;
use crate::error::{Result, ToolboxError};

/// Filesystem backend for tool scripts.
pub struct ArtifactStore {
    root: PathBuf,
    extension: String,
}

impl ArtifactStore {
    /// Create a store for the configured tools directory, creating the
    /// directory if needed.
    pub async fn new(config: &ToolboxConfig) -> Result<Self> {
        fs::create_dir_all(&config.tools_dir).await?;
        Ok(Self {
            root: config.tools_dir.clone(),
            extension: config.extension.clone(),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing an id.
    pub fn path_for(&self, id: &ToolId) -> PathBuf {
        self.root.join(format!("{id}.{}", self.extension))
    }

    /// Every tool file directly under the root, in no particular order.
    ///
    /// Entries whose stem is not a legal id are skipped with a warning so a
    /// stray file cannot poison the whole listing.
    pub async fn list(&self) -> Result<Vec<(ToolId, PathBuf)>> {
        let mut out = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file()
                || !path.extension().map_or(false, |e| e == self.extension.as_str())
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match ToolId::new(stem) {
                Ok(id) => out.push((id, path)),
                Err(_) => warn!("skipping tool file with unusable name: {}", path.display()),
            }
        }

        Ok(out)
    }

    /// Whether a tool file exists at the given path.
    pub async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await?)
    }

    /// Read a tool file's full text.
    pub async fn read(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path).await?)
    }

    /// Write a tool file atomically: temp sibling first, then rename into
    /// place.
    pub async fn write(&self, path: &Path, body: &str) -> Result<()> {
        let tmp = temp_sibling(path);
        fs::write(&tmp, body).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!("wrote {}", path.display());
        Ok(())
    }

    /// Atomically move a tool file. Fails with `Conflict` when the
    /// destination already exists.
    pub async fn rename(&self, old_path: &Path, new_path: &Path) -> Result<()> {
        if fs::try_exists(new_path).await? {
            return Err(ToolboxError::Conflict(new_path.display().to_string()));
        }
        fs::rename(old_path, new_path).await?;
        debug!("renamed {} -> {}", old_path.display(), new_path.display());
        Ok(())
    }

    /// Delete a tool file. Fails with `NotFound` when absent.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ToolboxError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
