//! Generation backend interface and prompt composition.
//!
//! The core treats the completion endpoint as an opaque collaborator: one
//! call per task, no streaming, no cancellation. Concrete clients live
//! outside this crate (see `toolbox-openai`).

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;

/// An opaque text-completion backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion round trip. The token budget is passed through
    /// unchanged; budget exhaustion is the backend's problem to report.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String>;
}

/// System instructions for script generation, stamped with the current time
/// so generated metadata can carry a real creation date.
pub fn system_prompt() -> String {
    let now = Utc::now().format("%Y-%m-%d %H:%M:%S");
    format!(
        "You are a professional Python developer writing small utility scripts.\n\
         Produce a complete, directly runnable script that follows these rules:\n\
         \n\
         1. Include a main() function as the entry point, with a docstring whose\n\
            first line is a short name for the tool.\n\
         2. Include a metadata comment of the form:\n\
            # metadata = {{\"name\": \"tool name\", \"description\": \"what it does\", \"created\": \"creation time\"}}\n\
         3. Handle errors and give user-friendly feedback.\n\
         4. Prefer the standard library; keep the script focused on the request.\n\
         5. Read input interactively rather than from command-line arguments.\n\
         \n\
         Return only the complete script, with no explanation or extra text.\n\
         Current time: {now}"
    )
}

/// User prompt for a modification request: the instruction, the change the
/// user wants, and the current script body fenced for clarity.
pub fn modify_prompt(change: &str, current_body: &str) -> String {
    format!(
        "Modify the following script according to this instruction.\n\
         \n\
         Instruction: {change}\n\
         \n\
         Current script:\n\
         ```python\n\
         {current_body}\n\
         ```"
    )
}

/// Strip a leading code fence (with optional language tag) and a trailing
/// fence from backend output. Interior content is never altered.
pub fn strip_fences(text: &str) -> &str {
    let mut out = text.trim();

    if let Some(rest) = out.strip_prefix("```") {
        // Drop the fence line including any language tag.
        out = match rest.split_once('\n') {
            Some((_tag, body)) => body,
            None => rest,
        };
    }
    if let Some(rest) = out.trim_end().strip_suffix("```") {
        out = rest;
    }

    out.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_fences_with_language_tag() {
        let raw = "```python\ndef main():\n    pass\n```";
        assert_eq!(strip_fences(raw), "def main():\n    pass");
    }

    #[test]
    fn test_strip_fences_leaves_interior_fences() {
        let raw = "```python\nprint('```not a fence```')\nprint('done')\n```";
        assert_eq!(strip_fences(raw), "print('```not a fence```')\nprint('done')");
    }

    #[test]
    fn test_strip_fences_noop_without_fences() {
        assert_eq!(strip_fences("def main():\n    pass"), "def main():\n    pass");
    }

    #[test]
    fn test_system_prompt_carries_timestamp() {
        let prompt = system_prompt();
        assert!(prompt.contains("Current time: 2"));
        assert!(prompt.contains("# metadata = {"));
    }

    #[test]
    fn test_modify_prompt_embeds_body() {
        let prompt = modify_prompt("add logging", "def main():\n    pass\n");
        assert!(prompt.contains("Instruction: add logging"));
        assert!(prompt.contains("def main():"));
    }
}
