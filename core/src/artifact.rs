//! Core artifact types.
//!
//! An artifact is one stored tool: a single script file carrying both its
//! executable body and an embedded metadata header.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolboxError};

/// Filesystem-safe tool identifier.
///
/// Equals the artifact's filename stem. Restricted to `[A-Za-z0-9_]` so the
/// id is always a legal path component; the human-readable display name lives
/// in [`Metadata::name`] and may contain anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    /// Validate and wrap a raw id string.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ToolboxError::Validation("tool id cannot be empty".to_string()));
        }
        if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ToolboxError::Validation(format!(
                "tool id may only contain letters, digits, and underscores: {raw}"
            )));
        }
        Ok(Self(raw))
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata embedded in an artifact's header line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Human-readable display name. Distinct from the id; may contain
    /// characters that are illegal in a filename.
    #[serde(default)]
    pub name: String,

    /// Description of what the tool does.
    #[serde(default)]
    pub description: String,

    /// Creation time, stored as an opaque string.
    #[serde(default)]
    pub created: String,
}

impl Metadata {
    /// Create metadata with a creation timestamp of now.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            created: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Whether no field carries any content.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.description.is_empty() && self.created.is_empty()
    }
}

/// One tool as known to the registry.
///
/// The authoritative copy is always the file on disk; this value is a cache
/// that is rebuilt wholesale on every [`crate::registry::Registry::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Identifier; equals the filename stem.
    pub id: ToolId,

    /// Full path of the backing file.
    pub path: PathBuf,

    /// Complete file text, header included.
    pub body: String,

    /// Decoded metadata; blank fields if the header was undecodable.
    pub metadata: Metadata,
}

impl Artifact {
    /// Display name for listings: the metadata name, falling back to the id
    /// when the header carried none.
    pub fn display_name(&self) -> &str {
        if self.metadata.name.is_empty() {
            self.id.as_str()
        } else {
            &self.metadata.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tool_id_validation() {
        assert!(ToolId::new("count_words_2").is_ok());
        assert!(ToolId::new("").is_err());
        assert!(ToolId::new("has space").is_err());
        assert!(ToolId::new("dot.py").is_err());
        assert!(ToolId::new("../escape").is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let artifact = Artifact {
            id: ToolId::new("word_count").unwrap(),
            path: PathBuf::from("tools/word_count.py"),
            body: String::new(),
            metadata: Metadata::default(),
        };
        assert_eq!(artifact.display_name(), "word_count");
    }
}
