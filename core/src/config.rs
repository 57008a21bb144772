//! Configuration types.
//!
//! Configuration is passed in as plain values at construction time; the core
//! does not read or persist any config file of its own.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the artifact store and registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolboxConfig {
    /// Root directory holding one script file per tool, flat.
    pub tools_dir: PathBuf,

    /// Script file extension, without the leading dot.
    pub extension: String,
}

impl ToolboxConfig {
    /// Create a config rooted at the given tools directory.
    pub fn new(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: tools_dir.into(),
            extension: "py".to_string(),
        }
    }

    /// Override the script extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

/// Configuration for the generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// API key for the completion endpoint.
    pub api_key: String,

    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// Default token budget for requests that do not specify one.
    pub max_tokens: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            max_tokens: 2000,
        }
    }
}

impl BackendConfig {
    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the default token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
