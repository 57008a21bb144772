//! End-to-end scenarios through the public `Toolbox` surface, with the
//! completion backend replaced by canned test doubles.

use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::{Semaphore, mpsc};
use toolbox_core::{
    CompletionBackend, Result, TaskEvent, TaskKind, ToolId, Toolbox, ToolboxConfig, ToolboxError,
};

/// Always replies with the same text.
struct StaticBackend(String);

#[async_trait]
impl CompletionBackend for StaticBackend {
    async fn complete(&self, _system: &str, _user: &str, _max_tokens: u32) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Always fails.
struct FailingBackend;

#[async_trait]
impl CompletionBackend for FailingBackend {
    async fn complete(&self, _system: &str, _user: &str, _max_tokens: u32) -> Result<String> {
        Err(ToolboxError::Backend("simulated outage".to_string()))
    }
}

/// Blocks every call until the test releases a permit.
struct GatedBackend {
    gate: Arc<Semaphore>,
    reply: String,
}

#[async_trait]
impl CompletionBackend for GatedBackend {
    async fn complete(&self, _system: &str, _user: &str, _max_tokens: u32) -> Result<String> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ToolboxError::Backend(e.to_string()))?;
        Ok(self.reply.clone())
    }
}

async fn open_with(
    dir: &TempDir,
    backend: Arc<dyn CompletionBackend>,
) -> (Toolbox, mpsc::UnboundedReceiver<TaskEvent>) {
    Toolbox::open(&ToolboxConfig::new(dir.path()), backend, 2000)
        .await
        .unwrap()
}

fn id(s: &str) -> ToolId {
    ToolId::new(s).unwrap()
}

#[tokio::test]
async fn create_strips_fences_and_derives_id() {
    let reply = concat!(
        "```python\n",
        "def main():\n",
        "    \"\"\"count_words tool\"\"\"\n",
        "    pass\n",
        "# metadata = {\"name\": \"x\", \"description\": \"y\", \"created\": \"2024-01-01\"}\n",
        "```",
    );
    let dir = TempDir::new().unwrap();
    let (toolbox, mut events) =
        open_with(&dir, Arc::new(StaticBackend(reply.to_string()))).await;

    let task_id = toolbox.create_tool("count words in a file", 500).await.unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.task_id, task_id);
    assert_eq!(event.kind, TaskKind::Create);
    let created_id = event.outcome.unwrap();
    assert_eq!(created_id.as_str(), "count_words_tool");

    let artifact = toolbox.get(&created_id).await.unwrap();
    assert!(!artifact.body.contains("```"));
    assert!(artifact.body.starts_with("def main():"));
    assert_eq!(artifact.metadata.description, "y");
}

#[tokio::test]
async fn modify_replaces_body_in_place() {
    let replacement = concat!(
        "```python\n",
        "def main():\n",
        "    \"\"\"resizer v2\"\"\"\n",
        "    print('resized!')\n",
        "# metadata = {\"name\": \"resizer\", \"description\": \"v2\", \"created\": \"2024-01-01\"}\n",
        "```",
    );
    let dir = TempDir::new().unwrap();
    let (toolbox, mut events) =
        open_with(&dir, Arc::new(StaticBackend(replacement.to_string()))).await;

    // Seed an existing tool directly on disk.
    let original = "def main():\n    print('v1')\n# metadata = {\"name\": \"resizer\", \"description\": \"v1\", \"created\": \"2024-01-01\"}\n";
    tokio::fs::write(dir.path().join("resizer.py"), original).await.unwrap();
    toolbox.refresh().await.unwrap();

    toolbox.modify_tool(&id("resizer"), "print a message").await.unwrap();
    let event = events.recv().await.unwrap();
    assert_eq!(event.kind, TaskKind::Modify(id("resizer")));
    assert_eq!(event.outcome.unwrap(), id("resizer"));

    let artifact = toolbox.get(&id("resizer")).await.unwrap();
    assert!(artifact.body.contains("print('resized!')"));
    assert_eq!(artifact.metadata.description, "v2");

    // The target was rewritten in place; no stray files appeared.
    toolbox.refresh().await.unwrap();
    let all = toolbox.list_tools().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, id("resizer"));
}

#[tokio::test]
async fn concurrent_creates_with_same_name_get_distinct_ids() {
    let reply = concat!(
        "def main():\n",
        "    \"\"\"twin tool\"\"\"\n",
        "    pass\n",
        "# metadata = {\"name\": \"twin\", \"description\": \"d\", \"created\": \"2024-01-01\"}\n",
    );
    let dir = TempDir::new().unwrap();
    let (toolbox, mut events) =
        open_with(&dir, Arc::new(StaticBackend(reply.to_string()))).await;

    toolbox.create_tool("first twin", 500).await.unwrap();
    toolbox.create_tool("second twin", 500).await.unwrap();

    let first = events.recv().await.unwrap().outcome.unwrap();
    let second = events.recv().await.unwrap().outcome.unwrap();

    let mut ids = vec![first.to_string(), second.to_string()];
    ids.sort();
    assert_eq!(ids, vec!["twin_tool", "twin_tool_2"]);

    toolbox.refresh().await.unwrap();
    assert_eq!(toolbox.list_tools().await.len(), 2);
}

#[tokio::test]
async fn backend_failure_leaves_no_artifact() {
    let dir = TempDir::new().unwrap();
    let (toolbox, mut events) = open_with(&dir, Arc::new(FailingBackend)).await;

    let task_id = toolbox.create_tool("anything", 500).await.unwrap();
    let event = events.recv().await.unwrap();
    assert_eq!(event.task_id, task_id);
    assert!(matches!(event.outcome, Err(ToolboxError::Backend(_))));

    toolbox.refresh().await.unwrap();
    assert!(toolbox.list_tools().await.is_empty());
}

#[tokio::test]
async fn duplicate_modify_of_same_tool_is_suppressed() {
    let gate = Arc::new(Semaphore::new(0));
    let backend = Arc::new(GatedBackend {
        gate: Arc::clone(&gate),
        reply: "def main():\n    \"\"\"gated\"\"\"\n    pass\n".to_string(),
    });
    let dir = TempDir::new().unwrap();
    let (toolbox, mut events) = open_with(&dir, backend).await;

    tokio::fs::write(dir.path().join("gated.py"), "print('v1')\n").await.unwrap();
    toolbox.refresh().await.unwrap();

    toolbox.modify_tool(&id("gated"), "change it").await.unwrap();
    assert!(toolbox.is_modify_in_flight(&id("gated")).await);

    // Same scope, still in flight: rejected.
    let err = toolbox.modify_tool(&id("gated"), "change it again").await.unwrap_err();
    assert!(matches!(err, ToolboxError::Conflict(_)));

    gate.add_permits(1);
    let event = events.recv().await.unwrap();
    assert!(event.outcome.is_ok());
    assert!(!toolbox.is_modify_in_flight(&id("gated")).await);

    // The scope is free again.
    gate.add_permits(1);
    toolbox.modify_tool(&id("gated"), "once more").await.unwrap();
    assert!(events.recv().await.unwrap().outcome.is_ok());
}
