//! Storage Layer - SQLite-backed artifact store
//!
//! System of record for offloaded blobs is SQLite with a single table:
//! - artifacts(id, path, kind, size, range_start, range_end, data, digest, source)
//!
//! Copied blobs keep their bytes and a blake3 digest; range references
//! keep only the offsets into the named source.

pub mod schema;
pub mod sqlite;

pub use sqlite::{ArtifactKind, SqliteArtifactStore, StoredArtifact};
