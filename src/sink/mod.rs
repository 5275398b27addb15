//! Artifact sinks
//!
//! Receivers for blobs offloaded from the document. A sink either stores
//! a copy of the bytes or, when it can reference the original input, just
//! the source range.
//!
//! For persistent storage see [`crate::storage::SqliteArtifactStore`].

pub mod directory;
pub mod memory;

pub use directory::DirectorySink;
pub use memory::{MemorySink, StoredPayload, StoredRequest};

use crate::Result;
use crate::adapter::SourceRange;
use crate::path::DocPath;
use serde::Serialize;

/// Content of an offload request
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Copied bytes
    Bytes(&'a [u8]),
    /// Range of the original input; only sent to sinks that accept it
    Range(SourceRange),
}

impl Payload<'_> {
    /// Size of the artifact in bytes
    pub fn len(&self) -> u64 {
        match self {
            Payload::Bytes(bytes) => bytes.len() as u64,
            Payload::Range(range) => range.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Bytes(_) => "bytes",
            Payload::Range(_) => "range",
        }
    }
}

/// One oversized blob handed to a sink
#[derive(Debug, Clone, Copy)]
pub struct OffloadRequest<'a> {
    /// Where the blob would have appeared inline
    pub path: &'a DocPath,
    pub payload: Payload<'a>,
    /// Source range of the blob, when known, even for copied payloads
    pub source_range: Option<SourceRange>,
}

/// Receipt for a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactHandle {
    pub id: String,
    pub path: DocPath,
}

/// Destination for offloaded blobs
pub trait ArtifactSink {
    /// Whether [`Payload::Range`] requests are accepted
    fn supports_range_references(&self) -> bool {
        false
    }

    /// Store one artifact. Failures abort the traversal that issued it.
    fn offload(&mut self, request: OffloadRequest<'_>) -> Result<ArtifactHandle>;
}

impl<S: ArtifactSink + ?Sized> ArtifactSink for &mut S {
    fn supports_range_references(&self) -> bool {
        (**self).supports_range_references()
    }

    fn offload(&mut self, request: OffloadRequest<'_>) -> Result<ArtifactHandle> {
        (**self).offload(request)
    }
}

impl<S: ArtifactSink + ?Sized> ArtifactSink for Box<S> {
    fn supports_range_references(&self) -> bool {
        (**self).supports_range_references()
    }

    fn offload(&mut self, request: OffloadRequest<'_>) -> Result<ArtifactHandle> {
        (**self).offload(request)
    }
}
