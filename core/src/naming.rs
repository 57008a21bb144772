//! Tool id derivation from generated script text.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::ToolId;

static MAIN_DOC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)def\s+main\s*\(\s*\)\s*:\s*"""\s*(.*?)\s*""""#)
        .unwrap_or_else(|_| unreachable!())
});
static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""description"\s*:\s*"([^"]+)""#).unwrap_or_else(|_| unreachable!())
});

/// Collapse whitespace to underscores, strip everything outside
/// `[A-Za-z0-9_]`, and lowercase. May come out empty.
fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Derive a filesystem-safe id from generated script text.
///
/// Preference order: the first line of a `main()` entry-point docstring,
/// then the first word of an embedded `"description"` field, then a
/// timestamp id. Collisions against the registry are the caller's problem.
pub fn derive_id(text: &str) -> ToolId {
    if let Some(caps) = MAIN_DOC_RE.captures(text) {
        let first_line = caps
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .lines()
            .next()
            .unwrap_or_default();
        if let Ok(id) = ToolId::new(normalize(first_line)) {
            return id;
        }
    }

    if let Some(caps) = DESCRIPTION_RE.captures(text) {
        let first_word = caps
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split_whitespace()
            .next()
            .unwrap_or_default();
        if let Ok(id) = ToolId::new(normalize(first_word)) {
            return id;
        }
    }

    timestamp_id()
}

/// Fallback id of the form `tool_YYYYMMDD_HHMMSS`.
pub fn timestamp_id() -> ToolId {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    ToolId::new(format!("tool_{stamp}")).unwrap_or_else(|_| unreachable!())
}

/// Suffix an id for conflict retry: `word_count` becomes `word_count_2`.
pub fn disambiguate(id: &ToolId, n: u32) -> ToolId {
    ToolId::new(format!("{id}_{n}")).unwrap_or_else(|_| unreachable!())
}
