//! Asynchronous generation and modification pipeline.
//!
//! Each submitted request becomes one background task running exactly one
//! backend round trip: compose prompts, call the backend, strip code fences,
//! then hand the text to the registry (create or replace-body). Submission
//! never blocks the caller; completions are posted to an unbounded channel
//! the foreground loop drains. On shutdown, outstanding tasks are simply
//! abandoned.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::ToolId;
use crate::backend::{self, CompletionBackend};
use crate::error::{Result, ToolboxError};
use crate::naming;
use crate::registry::Registry;

/// Identifier of one generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// What a task is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Generate a brand new tool.
    Create,

    /// Rewrite the body of an existing tool.
    Modify(ToolId),
}

/// Lifecycle of a task: `Queued -> InFlight -> Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    InFlight,
    Succeeded,
    Failed,
}

/// Posted to the completion channel when a task finishes.
#[derive(Debug)]
pub struct TaskEvent {
    /// The finished task.
    pub task_id: TaskId,

    /// What the task was doing.
    pub kind: TaskKind,

    /// The id the task produced or touched, or the originating error.
    pub outcome: Result<ToolId>,
}

/// Orchestrates backend calls and registry writes for create and modify
/// requests.
pub struct GenerationPipeline {
    backend: Arc<dyn CompletionBackend>,
    registry: Arc<RwLock<Registry>>,
    statuses: Arc<RwLock<HashMap<TaskId, TaskStatus>>>,
    modify_in_flight: Arc<Mutex<HashSet<ToolId>>>,
    events: mpsc::UnboundedSender<TaskEvent>,
    default_max_tokens: u32,
}

impl GenerationPipeline {
    /// Create a pipeline over a shared registry. Returns the pipeline and
    /// the receiving end of its completion channel.
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        registry: Arc<RwLock<Registry>>,
        default_max_tokens: u32,
    ) -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = Self {
            backend,
            registry,
            statuses: Arc::new(RwLock::new(HashMap::new())),
            modify_in_flight: Arc::new(Mutex::new(HashSet::new())),
            events: tx,
            default_max_tokens,
        };
        (pipeline, rx)
    }

    /// Current status of a task, if known.
    pub async fn status(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.statuses.read().await.get(&task_id).copied()
    }

    /// Whether a modification of the given tool is already in flight.
    /// Front ends use this to disable duplicate submissions for the scope.
    pub async fn is_modify_in_flight(&self, id: &ToolId) -> bool {
        self.modify_in_flight.lock().await.contains(id)
    }

    /// Submit a create request. Fire-and-continue: the returned task id can
    /// be matched against the completion channel later.
    pub async fn submit_create(&self, prompt: &str, max_tokens: u32) -> Result<TaskId> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ToolboxError::Validation("prompt cannot be empty".to_string()));
        }
        if max_tokens == 0 {
            return Err(ToolboxError::Validation(
                "token budget must be positive".to_string(),
            ));
        }

        let task_id = TaskId::new();
        self.statuses.write().await.insert(task_id, TaskStatus::Queued);
        info!("queued create task {task_id}");

        let backend = Arc::clone(&self.backend);
        let registry = Arc::clone(&self.registry);
        let statuses = Arc::clone(&self.statuses);
        let events = self.events.clone();
        let prompt = prompt.to_string();

        tokio::spawn(async move {
            statuses.write().await.insert(task_id, TaskStatus::InFlight);

            let outcome = run_create(backend, registry, &prompt, max_tokens).await;
            finish(task_id, TaskKind::Create, outcome, &statuses, &events).await;
        });

        Ok(task_id)
    }

    /// Submit a modify request targeting an existing tool. Rejects with
    /// `Conflict` while another modification of the same tool is in flight.
    pub async fn submit_modify(&self, id: &ToolId, prompt: &str) -> Result<TaskId> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ToolboxError::Validation("prompt cannot be empty".to_string()));
        }

        // Snapshot the current body up front; NotFound surfaces here, not
        // as a failed background task.
        let current_body = {
            let registry = self.registry.read().await;
            registry.get(id)?.body.clone()
        };

        {
            let mut in_flight = self.modify_in_flight.lock().await;
            if !in_flight.insert(id.clone()) {
                return Err(ToolboxError::Conflict(format!(
                    "modification of {id} already in flight"
                )));
            }
        }

        let task_id = TaskId::new();
        self.statuses.write().await.insert(task_id, TaskStatus::Queued);
        info!("queued modify task {task_id} for {id}");

        let backend = Arc::clone(&self.backend);
        let registry = Arc::clone(&self.registry);
        let statuses = Arc::clone(&self.statuses);
        let modify_in_flight = Arc::clone(&self.modify_in_flight);
        let events = self.events.clone();
        let prompt = prompt.to_string();
        let id = id.clone();
        let max_tokens = self.default_max_tokens;

        tokio::spawn(async move {
            statuses.write().await.insert(task_id, TaskStatus::InFlight);

            let outcome =
                run_modify(backend, registry, &id, &prompt, &current_body, max_tokens).await;

            modify_in_flight.lock().await.remove(&id);
            finish(task_id, TaskKind::Modify(id), outcome, &statuses, &events).await;
        });

        Ok(task_id)
    }
}

async fn run_create(
    backend: Arc<dyn CompletionBackend>,
    registry: Arc<RwLock<Registry>>,
    prompt: &str,
    max_tokens: u32,
) -> Result<ToolId> {
    let raw = backend
        .complete(&backend::system_prompt(), prompt, max_tokens)
        .await?;
    let body = backend::strip_fences(&raw).to_string();
    if body.is_empty() {
        return Err(ToolboxError::Backend(
            "backend returned no usable content".to_string(),
        ));
    }

    let id = naming::derive_id(&body);

    // Hold the write lock across the retry so two tasks deriving the same
    // base id cannot both claim the same disambiguated one.
    let mut registry = registry.write().await;
    match registry.create(id.clone(), body.clone()).await {
        Ok(artifact) => Ok(artifact.id),
        Err(ToolboxError::Conflict(_)) => {
            let retry = naming::disambiguate(&id, 2);
            debug!("id {id} taken, retrying as {retry}");
            let artifact = registry.create(retry, body).await?;
            Ok(artifact.id)
        }
        Err(e) => Err(e),
    }
}

async fn run_modify(
    backend: Arc<dyn CompletionBackend>,
    registry: Arc<RwLock<Registry>>,
    id: &ToolId,
    prompt: &str,
    current_body: &str,
    max_tokens: u32,
) -> Result<ToolId> {
    let user_prompt = backend::modify_prompt(prompt, current_body);
    let raw = backend
        .complete(&backend::system_prompt(), &user_prompt, max_tokens)
        .await?;
    let body = backend::strip_fences(&raw).to_string();
    if body.is_empty() {
        return Err(ToolboxError::Backend(
            "backend returned no usable content".to_string(),
        ));
    }

    let mut registry = registry.write().await;
    let artifact = registry.replace_body(id, body).await?;
    Ok(artifact.id)
}

async fn finish(
    task_id: TaskId,
    kind: TaskKind,
    outcome: Result<ToolId>,
    statuses: &RwLock<HashMap<TaskId, TaskStatus>>,
    events: &mpsc::UnboundedSender<TaskEvent>,
) {
    let status = if outcome.is_ok() {
        TaskStatus::Succeeded
    } else {
        TaskStatus::Failed
    };
    statuses.write().await.insert(task_id, status);

    match &outcome {
        Ok(id) => info!("task {task_id} succeeded: {id}"),
        Err(e) => warn!("task {task_id} failed: {e}"),
    }

    // The receiver may be gone during shutdown; abandoning the result is
    // fine then.
    let _ = events.send(TaskEvent {
        task_id,
        kind,
        outcome,
    });
}
