//! # Script Toolbox Core
//!
//! This crate manages a directory of small executable script tools, each a
//! single file carrying its code and an embedded metadata header. Tools are
//! created and modified by an external text-completion backend from natural
//! language requests.
//!
//! - **Decode Tolerantly**: two header grammars are accepted on read, one
//!   canonical form is written
//! - **Stay Consistent**: the registry index is a cache rebuilt wholesale
//!   from disk; writes are atomic temp-then-rename
//! - **Never Block**: generation runs in background tasks posting results
//!   to a completion channel
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Toolbox                             │
//! ├────────────────────────────────────────────────────────────┤
//! │  GenerationPipeline ──► Registry ──► ArtifactStore         │
//! │        │                   │                               │
//! │        ▼                   ▼                               │
//! │  CompletionBackend    MetadataCodec / NameResolver         │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod artifact;
pub mod backend;
pub mod config;
pub mod error;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod toolbox;

pub use artifact::{Artifact, Metadata, ToolId};
pub use backend::CompletionBackend;
pub use config::{BackendConfig, ToolboxConfig};
pub use error::{Result, ToolboxError};
pub use pipeline::{GenerationPipeline, TaskEvent, TaskId, TaskKind, TaskStatus};
pub use registry::Registry;
pub use store::ArtifactStore;
pub use toolbox::Toolbox;
