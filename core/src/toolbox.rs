//! Front-end-facing surface.
//!
//! `Toolbox` ties the registry and the generation pipeline together and
//! exposes the operations an interactive front end needs. Mutating calls
//! are expected from one foreground loop; background generation tasks reach
//! the registry only through its lock.

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::sync::{RwLock, mpsc};
use tracing::info;

use crate::artifact::{Artifact, ToolId};
use crate::backend::CompletionBackend;
use crate::config::ToolboxConfig;
use crate::error::{Result, ToolboxError};
use crate::pipeline::{GenerationPipeline, TaskEvent, TaskId, TaskStatus};
use crate::registry::Registry;

/// The assembled toolbox core.
pub struct Toolbox {
    registry: Arc<RwLock<Registry>>,
    pipeline: GenerationPipeline,
}

impl Toolbox {
    /// Open the tools directory and wire up the pipeline. Returns the
    /// toolbox and the completion channel the front-end loop should drain.
    pub async fn open(
        config: &ToolboxConfig,
        backend: Arc<dyn CompletionBackend>,
        default_max_tokens: u32,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TaskEvent>)> {
        let registry = Arc::new(RwLock::new(Registry::open(config).await?));
        let (pipeline, events) =
            GenerationPipeline::new(backend, Arc::clone(&registry), default_max_tokens);
        Ok((Self { registry, pipeline }, events))
    }

    /// All tools, sorted by id.
    pub async fn list_tools(&self) -> Vec<Artifact> {
        let registry = self.registry.read().await;
        registry.list_all().into_iter().cloned().collect()
    }

    /// Look up one tool.
    pub async fn get(&self, id: &ToolId) -> Result<Artifact> {
        let registry = self.registry.read().await;
        registry.get(id).cloned()
    }

    /// Re-scan the tools directory, picking up external changes.
    pub async fn refresh(&self) -> Result<()> {
        self.registry.write().await.refresh().await
    }

    /// Kick off generation of a new tool from a free-text request.
    pub async fn create_tool(&self, request: &str, token_budget: u32) -> Result<TaskId> {
        self.pipeline.submit_create(request, token_budget).await
    }

    /// Kick off an AI modification of an existing tool's body.
    pub async fn modify_tool(&self, id: &ToolId, prompt: &str) -> Result<TaskId> {
        self.pipeline.submit_modify(id, prompt).await
    }

    /// Status of a previously submitted task.
    pub async fn task_status(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.pipeline.status(task_id).await
    }

    /// Whether a modification of this tool is currently in flight.
    pub async fn is_modify_in_flight(&self, id: &ToolId) -> bool {
        self.pipeline.is_modify_in_flight(id).await
    }

    /// Rename a tool's id (its filename stem).
    pub async fn rename_tool(&self, id: &ToolId, new_id: ToolId) -> Result<Artifact> {
        self.registry.write().await.rename(id, new_id).await
    }

    /// Update a tool's description in its metadata header.
    pub async fn update_description(&self, id: &ToolId, text: &str) -> Result<Artifact> {
        self.registry.write().await.update_metadata(id, text).await
    }

    /// Delete a tool's file and registry entry.
    pub async fn delete_tool(&self, id: &ToolId) -> Result<()> {
        self.registry.write().await.delete(id).await
    }

    /// Copy a tool's file to a destination path, bytes preserved exactly.
    pub async fn export_tool(&self, id: &ToolId, destination: &Path) -> Result<()> {
        let source = {
            let registry = self.registry.read().await;
            registry.get(id)?.path.clone()
        };
        fs::copy(&source, destination).await?;
        info!("exported {id} to {}", destination.display());
        Ok(())
    }

    /// Import a script file as a tool; the id is the source filename stem.
    /// Fails with `Conflict` when the id is taken, unless the caller has
    /// confirmed `overwrite`.
    pub async fn import_tool(&self, source: &Path, overwrite: bool) -> Result<ToolId> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                ToolboxError::Validation(format!("unusable filename: {}", source.display()))
            })?;
        let id = ToolId::new(stem)?;
        let body = fs::read_to_string(source).await?;

        let mut registry = self.registry.write().await;
        let exists = registry.get(&id).is_ok();
        if exists && !overwrite {
            return Err(ToolboxError::Conflict(id.to_string()));
        }

        if exists {
            registry.replace_body(&id, body).await?;
        } else {
            registry.create(id.clone(), body).await?;
        }
        info!("imported {} as {id}", source.display());
        Ok(id)
    }
}
