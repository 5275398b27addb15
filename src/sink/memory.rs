//! In-memory sink

use super::{ArtifactHandle, ArtifactSink, OffloadRequest, Payload};
use crate::Result;
use crate::adapter::SourceRange;
use crate::path::DocPath;

/// Owned form of a received payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredPayload {
    Bytes(Vec<u8>),
    Range(SourceRange),
}

/// Owned copy of an [`OffloadRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRequest {
    pub path: DocPath,
    pub payload: StoredPayload,
    pub source_range: Option<SourceRange>,
}

/// Sink that keeps every request in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemorySink {
    ranges: bool,
    requests: Vec<StoredRequest>,
}

impl MemorySink {
    /// Sink accepting byte copies only
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that also accepts range references
    pub fn with_range_references() -> Self {
        Self {
            ranges: true,
            requests: Vec::new(),
        }
    }

    pub fn requests(&self) -> &[StoredRequest] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<StoredRequest> {
        self.requests
    }
}

impl ArtifactSink for MemorySink {
    fn supports_range_references(&self) -> bool {
        self.ranges
    }

    fn offload(&mut self, request: OffloadRequest<'_>) -> Result<ArtifactHandle> {
        let payload = match request.payload {
            Payload::Bytes(bytes) => StoredPayload::Bytes(bytes.to_vec()),
            Payload::Range(range) => StoredPayload::Range(range),
        };
        let id = self.requests.len().to_string();
        self.requests.push(StoredRequest {
            path: request.path.clone(),
            payload,
            source_range: request.source_range,
        });
        Ok(ArtifactHandle {
            id,
            path: request.path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut sink = MemorySink::new();
        assert!(!sink.supports_range_references());

        let a = DocPath::root().field("a");
        let b = DocPath::root().field("b");
        let range = SourceRange::new(3, 5).unwrap();

        let first = sink
            .offload(OffloadRequest { path: &a, payload: Payload::Bytes(&[1, 2]), source_range: None })
            .unwrap();
        sink.offload(OffloadRequest { path: &b, payload: Payload::Range(range), source_range: Some(range) })
            .unwrap();

        assert_eq!(first.id, "0");
        assert_eq!(first.path, a);
        let requests = sink.into_requests();
        assert_eq!(requests[0].payload, StoredPayload::Bytes(vec![1, 2]));
        assert_eq!(requests[1].payload, StoredPayload::Range(range));
        assert_eq!(requests[1].path, b);
    }
}
