//! SQLite storage implementation

use super::schema;
use crate::adapter::SourceRange;
use crate::path::DocPath;
use crate::sink::{ArtifactHandle, ArtifactSink, OffloadRequest, Payload};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

const ARTIFACT_COLUMNS: &str = "id, path, kind, size, range_start, range_end, digest, source";

/// How an artifact's content is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Bytes copied into the store
    Bytes,
    /// Offsets into the source input
    Range,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Bytes => "bytes",
            ArtifactKind::Range => "range",
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bytes" => Ok(ArtifactKind::Bytes),
            "range" => Ok(ArtifactKind::Range),
            _ => Err(Error::Sink(format!("Unknown artifact kind: {}", s))),
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Artifact row without its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    pub id: i64,
    pub path: DocPath,
    pub kind: ArtifactKind,
    pub size: u64,
    pub source_range: Option<SourceRange>,
    /// blake3 of copied bytes
    pub digest: Option<String>,
    /// Label of the input the artifact was taken from
    pub source: Option<String>,
}

/// SQLite-backed artifact sink
pub struct SqliteArtifactStore {
    conn: Connection,
    source: Option<String>,
}

impl SqliteArtifactStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn, source: None };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn, source: None };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Label recorded on every artifact stored from now on
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    // ========== Artifact Operations ==========

    fn insert(&self, request: &OffloadRequest<'_>) -> Result<i64> {
        let size = request.payload.len();
        let range = match request.payload {
            Payload::Range(range) => Some(range),
            Payload::Bytes(_) => request.source_range,
        };
        let (data, digest) = match request.payload {
            Payload::Bytes(bytes) => (Some(bytes), Some(blake3::hash(bytes).to_hex().to_string())),
            Payload::Range(_) => (None, None),
        };

        self.conn.execute(
            r#"
            INSERT INTO artifacts (path, kind, size, range_start, range_end, data, digest, source)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                request.path.to_path_string(),
                request.payload.kind(),
                size,
                range.map(|r| r.start()),
                range.map(|r| r.end()),
                data,
                digest,
                self.source,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get an artifact by id
    pub fn get(&self, id: i64) -> Result<Option<StoredArtifact>> {
        let sql = format!("SELECT {} FROM artifacts WHERE id = ?1", ARTIFACT_COLUMNS);
        self.conn
            .query_row(&sql, [id], row_to_artifact)
            .optional()
            .map_err(Into::into)
    }

    /// All artifacts, optionally restricted to one source, in insertion order
    pub fn list(&self, source: Option<&str>) -> Result<Vec<StoredArtifact>> {
        let (sql, filter) = match source {
            Some(_) => (
                format!("SELECT {} FROM artifacts WHERE source = ?1 ORDER BY id", ARTIFACT_COLUMNS),
                source,
            ),
            None => (format!("SELECT {} FROM artifacts ORDER BY id", ARTIFACT_COLUMNS), None),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match filter {
            Some(source) => stmt.query_map([source], row_to_artifact)?,
            None => stmt.query_map([], row_to_artifact)?,
        };
        let artifacts = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(artifacts)
    }

    /// Artifacts stored under a document path.
    ///
    /// Blob elements of one sequence share the sequence's path, so a path
    /// can name several artifacts.
    pub fn find_by_path(&self, path: &DocPath) -> Result<Vec<StoredArtifact>> {
        let sql = format!("SELECT {} FROM artifacts WHERE path = ?1 ORDER BY id", ARTIFACT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let artifacts = stmt
            .query_map([path.to_path_string()], row_to_artifact)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(artifacts)
    }

    /// Count all artifacts
    pub fn count(&self) -> Result<usize> {
        let count: usize = self.conn.query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete the artifacts of one source, returning how many went
    pub fn clear_source(&self, source: &str) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM artifacts WHERE source = ?1", [source])?;
        Ok(removed)
    }

    /// Content of an artifact.
    ///
    /// Copied artifacts come from the store; range references are resolved
    /// against `source`, the bytes of the original input.
    pub fn materialize(&self, artifact: &StoredArtifact, source: Option<&[u8]>) -> Result<Vec<u8>> {
        match artifact.kind {
            ArtifactKind::Bytes => {
                let data: Option<Vec<u8>> = self
                    .conn
                    .query_row("SELECT data FROM artifacts WHERE id = ?1", [artifact.id], |row| {
                        row.get::<_, Option<Vec<u8>>>(0)
                    })
                    .optional()?
                    .flatten();
                data.ok_or_else(|| Error::Sink(format!("artifact {} has no stored bytes", artifact.id)))
            }
            ArtifactKind::Range => {
                let range = artifact.source_range.ok_or_else(|| {
                    Error::Sink(format!("artifact {} is a range reference without a range", artifact.id))
                })?;
                let source = source.ok_or_else(|| {
                    Error::Sink(format!(
                        "artifact {} references {} of its source; the source input is required",
                        artifact.id, range
                    ))
                })?;
                let offset = |value: u64| {
                    usize::try_from(value).map_err(|_| {
                        Error::Sink(format!("artifact {} range {} does not fit in memory", artifact.id, range))
                    })
                };
                source.get(offset(range.start())?..offset(range.end())?).map(<[u8]>::to_vec).ok_or_else(|| {
                    Error::Sink(format!(
                        "artifact {} range {} lies outside the {} byte source",
                        artifact.id,
                        range,
                        source.len()
                    ))
                })
            }
        }
    }

    // ========== Bulk Operations ==========

    /// Begin a transaction for bulk operations
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.conn.execute("ROLLBACK", [])?;
        Ok(())
    }
}

impl ArtifactSink for SqliteArtifactStore {
    fn supports_range_references(&self) -> bool {
        true
    }

    fn offload(&mut self, request: OffloadRequest<'_>) -> Result<ArtifactHandle> {
        let id = self.insert(&request)?;
        tracing::debug!("Stored artifact {} for {} ({} bytes)", id, request.path, request.payload.len());
        Ok(ArtifactHandle {
            id: id.to_string(),
            path: request.path.clone(),
        })
    }
}

/// Helper to convert a row to a StoredArtifact
fn row_to_artifact(row: &rusqlite::Row) -> rusqlite::Result<StoredArtifact> {
    let path_str: String = row.get(1)?;
    let kind_str: String = row.get(2)?;

    let path = DocPath::parse(&path_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let kind: ArtifactKind = kind_str.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let start: Option<u64> = row.get(4)?;
    let end: Option<u64> = row.get(5)?;
    let source_range = match (start, end) {
        (Some(start), Some(end)) => Some(SourceRange::new(start, end).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Integer, Box::new(e))
        })?),
        _ => None,
    };

    Ok(StoredArtifact {
        id: row.get(0)?,
        path,
        kind,
        size: row.get(3)?,
        source_range,
        digest: row.get(6)?,
        source: row.get(7)?,
    })
}
