//! # Treedoc - parse trees to JSON documents
//!
//! Turns the parse tree of a binary file into a JSON document, moving
//! oversized byte blobs out of the document and into an artifact store.
//!
//! Treedoc provides:
//! - A parse-node view over any grammar's tree, with schema-backed records
//! - A streaming serializer with a four-way blob policy
//!   (inline / refuse / range reference / copy)
//! - `$`-rooted document paths linking offloaded blobs to their position
//! - Artifact sinks: in-memory, directory and SQLite-backed
//! - A built-in PNG grammar

pub mod adapter;
pub mod config;
pub mod descriptor;
pub mod formats;
pub mod naming;
pub mod path;
pub mod policy;
pub mod serializer;
pub mod sink;
pub mod storage;
pub mod ui;

// Re-exports for convenient access
pub use adapter::{Grammar, ParseNode, Record, Schema, SourceRange, Value};
pub use descriptor::FormatDescriptor;
pub use path::DocPath;
pub use policy::{BlobAction, BlobPolicy};
pub use serializer::{Layout, SerializeStats, TreeSerializer};
pub use sink::{ArtifactHandle, ArtifactSink, OffloadRequest, Payload};
pub use storage::SqliteArtifactStore;

/// Result type alias for Treedoc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Treedoc operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Artifact sink error: {0}")]
    Sink(String),

    #[error("Invalid descriptor: {0}")]
    Descriptor(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
