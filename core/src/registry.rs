//! In-memory tool index over the artifact store.
//!
//! The registry is a cache of what is on disk. It is rebuilt wholesale by
//! [`Registry::refresh`] rather than merged incrementally, which keeps the
//! consistency story simple: after a refresh, index entries and files under
//! the tools root correspond one to one. Files whose metadata cannot be
//! decoded are still indexed with blank fields so every file stays visible
//! and manageable.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::artifact::{Artifact, Metadata, ToolId};
use crate::config::ToolboxConfig;
use crate::error::{Result, ToolboxError};
use crate::metadata;
use crate::store::ArtifactStore;

/// Index of all known tools.
pub struct Registry {
    store: ArtifactStore,
    index: HashMap<ToolId, Artifact>,
}

impl Registry {
    /// Open (or create) the tools directory and build the initial index.
    pub async fn open(config: &ToolboxConfig) -> Result<Self> {
        let store = ArtifactStore::new(config).await?;
        let mut registry = Self {
            store,
            index: HashMap::new(),
        };
        registry.refresh().await?;
        Ok(registry)
    }

    /// Access to the underlying store.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Rebuild the whole index from disk.
    pub async fn refresh(&mut self) -> Result<()> {
        let mut index = HashMap::new();

        for (id, path) in self.store.list().await? {
            let body = self.store.read(&path).await?;
            let meta = metadata::decode(&body).unwrap_or_default();
            index.insert(
                id.clone(),
                Artifact {
                    id,
                    path,
                    body,
                    metadata: meta,
                },
            );
        }

        info!("indexed {} tools", index.len());
        self.index = index;
        Ok(())
    }

    /// Look up a tool.
    pub fn get(&self, id: &ToolId) -> Result<&Artifact> {
        self.index
            .get(id)
            .ok_or_else(|| ToolboxError::NotFound(id.to_string()))
    }

    /// All tools, sorted by id for deterministic output.
    pub fn list_all(&self) -> Vec<&Artifact> {
        let mut all: Vec<_> = self.index.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Number of indexed tools.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the registry holds no tools.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Persist a new tool. Fails with `Conflict` if the id is taken either
    /// in the index or on disk.
    pub async fn create(&mut self, id: ToolId, body: String) -> Result<Artifact> {
        let path = self.store.path_for(&id);
        if self.index.contains_key(&id) || self.store.exists(&path).await? {
            return Err(ToolboxError::Conflict(id.to_string()));
        }

        let (body, meta) = ensure_header(body, &id);
        self.store.write(&path, &body).await?;

        let artifact = Artifact {
            id: id.clone(),
            path,
            body,
            metadata: meta,
        };
        self.index.insert(id.clone(), artifact.clone());
        debug!("created tool {id}");
        Ok(artifact)
    }

    /// Rename a tool's id (and therefore its file). The display name in the
    /// metadata header is left alone.
    pub async fn rename(&mut self, id: &ToolId, new_id: ToolId) -> Result<Artifact> {
        if self.index.contains_key(&new_id) {
            return Err(ToolboxError::Conflict(new_id.to_string()));
        }
        let old_path = self.get(id)?.path.clone();
        let new_path = self.store.path_for(&new_id);

        self.store.rename(&old_path, &new_path).await?;

        // The index move cannot fail once the filesystem rename succeeded.
        let mut artifact = match self.index.remove(id) {
            Some(a) => a,
            None => {
                // Roll back so index and disk stay in step.
                self.store.rename(&new_path, &old_path).await?;
                return Err(ToolboxError::NotFound(id.to_string()));
            }
        };
        artifact.id = new_id.clone();
        artifact.path = new_path;
        self.index.insert(new_id.clone(), artifact.clone());
        debug!("renamed tool {id} -> {new_id}");
        Ok(artifact)
    }

    /// Rewrite the metadata header in place with a new description,
    /// preserving the display name and creation time.
    pub async fn update_metadata(&mut self, id: &ToolId, new_description: &str) -> Result<Artifact> {
        let current = self.get(id)?;
        let mut meta = current.metadata.clone();
        meta.description = new_description.to_string();

        let new_body = metadata::replace_header(&current.body, &meta);
        self.write_through(id, new_body).await
    }

    /// Overwrite a tool's entire body (the Modify path) and re-decode its
    /// metadata.
    pub async fn replace_body(&mut self, id: &ToolId, new_body: String) -> Result<Artifact> {
        self.get(id)?;
        let (new_body, _) = ensure_header(new_body, id);
        self.write_through(id, new_body).await
    }

    /// Remove a tool's file and index entry.
    pub async fn delete(&mut self, id: &ToolId) -> Result<()> {
        let path = self.get(id)?.path.clone();
        self.store.remove(&path).await?;
        self.index.remove(id);
        info!("deleted tool {id}");
        Ok(())
    }

    async fn write_through(&mut self, id: &ToolId, body: String) -> Result<Artifact> {
        let path = self.get(id)?.path.clone();
        self.store.write(&path, &body).await?;

        let meta = metadata::decode(&body).unwrap_or_default();
        let artifact = Artifact {
            id: id.clone(),
            path,
            body,
            metadata: meta,
        };
        self.index.insert(id.clone(), artifact.clone());
        Ok(artifact)
    }
}

/// Guarantee a registry-driven write leaves a well-formed header behind: a
/// body without one gets a canonical header appended, named after the id.
fn ensure_header(body: String, id: &ToolId) -> (String, Metadata) {
    match metadata::decode(&body) {
        Some(meta) => (body, meta),
        None => {
            let meta = Metadata::new(id.as_str(), "");
            (metadata::replace_header(&body, &meta), meta)
        }
    }
}
