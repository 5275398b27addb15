//! Tree serializer
//!
//! Walks a parse tree depth-first and streams it as JSON. The document is
//! never materialized: lazy [`Serialize`] views over nodes and sequences
//! hand each fragment straight to `serde_json`, which writes it to the
//! output. Blobs go through the [`BlobPolicy`] as they are met, so offload
//! requests reach the sink in document order.

use crate::adapter::{FieldOffsets, FieldValue, ParseNode, SourceRange, classify, is_visible};
use crate::naming::to_lower_camel_case;
use crate::path::DocPath;
use crate::policy::{BlobAction, BlobPolicy};
use crate::sink::{ArtifactSink, OffloadRequest, Payload};
use crate::{Error, Result};
use serde::ser::{self, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::ser::PrettyFormatter;
use std::cell::RefCell;
use std::io::{self, Write};

/// Output formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Two-space indented
    #[default]
    Pretty,
    Compact,
}

/// Counters collected during one traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializeStats {
    pub nodes: usize,
    pub fields: usize,
    pub blobs_inlined: usize,
    pub blobs_copied: usize,
    pub blobs_referenced: usize,
    pub blobs_refused: usize,
}

impl SerializeStats {
    pub fn blobs_offloaded(&self) -> usize {
        self.blobs_copied + self.blobs_referenced
    }
}

/// Serializes parse trees to JSON, offloading blobs per policy
#[derive(Debug, Clone)]
pub struct TreeSerializer {
    policy: BlobPolicy,
    layout: Layout,
    root: DocPath,
}

impl TreeSerializer {
    pub fn new(policy: BlobPolicy) -> Self {
        Self {
            policy,
            layout: Layout::default(),
            root: DocPath::root(),
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Path assigned to the root node, `$` unless the document is embedded
    pub fn with_root(mut self, root: DocPath) -> Self {
        self.root = root;
        self
    }

    pub fn policy(&self) -> &BlobPolicy {
        &self.policy
    }

    /// Stream `root` as JSON into `writer`.
    ///
    /// Any adapter, sink or write failure aborts the traversal and is
    /// returned as-is; the output is then incomplete and must be discarded.
    pub fn write<W: Write>(
        &self,
        root: &dyn ParseNode,
        writer: W,
        sink: &mut dyn ArtifactSink,
    ) -> Result<SerializeStats> {
        let walk = Walk::new(self.policy, sink);
        let doc = NodeDoc {
            walk: &walk,
            node: root,
            path: self.root.clone(),
        };

        let written = match self.layout {
            Layout::Pretty => {
                let formatter = PrettyFormatter::with_indent(b"  ");
                let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
                doc.serialize(&mut ser).map(|_| ser.into_inner())
            }
            Layout::Compact => {
                let mut ser = serde_json::Serializer::new(writer);
                doc.serialize(&mut ser).map(|_| ser.into_inner())
            }
        };

        let mut writer = match written {
            Ok(writer) => writer,
            Err(e) => return Err(walk.failure.take().unwrap_or(Error::Json(e))),
        };
        writer.flush()?;

        let stats = walk.stats.into_inner();
        tracing::info!(
            "Serialized {} nodes ({} blobs inlined, {} offloaded, {} refused)",
            stats.nodes,
            stats.blobs_inlined,
            stats.blobs_offloaded(),
            stats.blobs_refused
        );
        Ok(stats)
    }

    /// Serialize into a string
    pub fn to_json_string(&self, root: &dyn ParseNode, sink: &mut dyn ArtifactSink) -> Result<String> {
        let mut buf = Vec::new();
        self.write(root, &mut buf, sink)?;
        String::from_utf8(buf).map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

/// Traversal state shared by the lazy views.
///
/// serde serializes through `&self`, so the sink and counters sit in
/// `RefCell`s. The first error raised inside a view is parked in
/// `failure` so the caller gets it back with its original type.
struct Walk<'s> {
    policy: BlobPolicy,
    sink: RefCell<&'s mut dyn ArtifactSink>,
    stats: RefCell<SerializeStats>,
    failure: RefCell<Option<Error>>,
}

impl<'s> Walk<'s> {
    fn new(policy: BlobPolicy, sink: &'s mut dyn ArtifactSink) -> Self {
        Self {
            policy,
            sink: RefCell::new(sink),
            stats: RefCell::new(SerializeStats::default()),
            failure: RefCell::new(None),
        }
    }

    fn fail<E: ser::Error>(&self, err: Error) -> E {
        let message = err.to_string();
        let mut failure = self.failure.borrow_mut();
        if failure.is_none() {
            *failure = Some(err);
        }
        E::custom(message)
    }

    fn render_blob(&self, bytes: &[u8], path: &DocPath, source: Option<SourceRange>) -> Result<String> {
        let len = bytes.len();
        // A range that does not cover exactly the blob cannot stand in for it.
        let source = source.filter(|range| range.len() == len as u64);

        let mut sink = self.sink.borrow_mut();
        let action = self.policy.decide(len, source, sink.supports_range_references());
        let mut stats = self.stats.borrow_mut();

        match action {
            BlobAction::Inline => {
                stats.blobs_inlined += 1;
                Ok(hex::encode(bytes))
            }
            BlobAction::Refuse => {
                stats.blobs_refused += 1;
                tracing::warn!(
                    "Blob at {} ({} bytes) exceeds sink ceiling of {} bytes, not offloaded",
                    path,
                    len,
                    self.policy.max_sinkable_size()
                );
                Ok(self.policy.refused_placeholder(len))
            }
            BlobAction::OffloadRange(range) => {
                let handle = sink.offload(OffloadRequest {
                    path,
                    payload: Payload::Range(range),
                    source_range: Some(range),
                })?;
                stats.blobs_referenced += 1;
                tracing::debug!("Offloaded {} as range {} (artifact {})", path, range, handle.id);
                Ok(BlobPolicy::stored_placeholder(len, path))
            }
            BlobAction::OffloadCopy => {
                let handle = sink.offload(OffloadRequest {
                    path,
                    payload: Payload::Bytes(bytes),
                    source_range: source,
                })?;
                stats.blobs_copied += 1;
                tracing::debug!("Offloaded {} as {} copied bytes (artifact {})", path, len, handle.id);
                Ok(BlobPolicy::stored_placeholder(len, path))
            }
        }
    }
}

/// Lazy JSON object for one node
struct NodeDoc<'a, 's> {
    walk: &'a Walk<'s>,
    node: &'a dyn ParseNode,
    path: DocPath,
}

impl Serialize for NodeDoc<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let walk = self.walk;
        let fields = self.node.fields().map_err(|e| walk.fail(e))?;
        let offsets = self.node.offsets();
        walk.stats.borrow_mut().nodes += 1;

        let mut map = serializer.serialize_map(None)?;
        for field in fields {
            if !is_visible(&field.name, &field.value) {
                continue;
            }
            let Some(value) = classify(field.value) else {
                continue;
            };
            walk.stats.borrow_mut().fields += 1;

            let key = to_lower_camel_case(&field.name);
            let path = self.path.field(field.name.as_ref());
            let field_offsets = offsets.and_then(|table| table.get(&field.name));

            match &value {
                FieldValue::Node(node) => {
                    map.serialize_entry(&key, &NodeDoc { walk, node: &**node, path })?;
                }
                FieldValue::Sequence(items) => {
                    let seq = SeqDoc {
                        walk,
                        items,
                        path,
                        offsets: field_offsets,
                    };
                    map.serialize_entry(&key, &seq)?;
                }
                FieldValue::Blob(bytes) => {
                    let rendered = walk
                        .render_blob(bytes, &path, field_offsets.map(|o| o.range))
                        .map_err(|e| walk.fail(e))?;
                    map.serialize_entry(&key, &rendered)?;
                }
                FieldValue::Enumerated(e) => map.serialize_entry(&key, e)?,
                FieldValue::Scalar(scalar) => map.serialize_entry(&key, scalar)?,
            }
        }
        map.end()
    }
}

/// Lazy JSON array for a sequence field.
///
/// Nested nodes and sequences are addressed `<path>.[i]`; blob elements
/// are offloaded under the sequence's own path.
struct SeqDoc<'a, 's> {
    walk: &'a Walk<'s>,
    items: &'a [FieldValue<'a>],
    path: DocPath,
    offsets: Option<&'a FieldOffsets>,
}

impl Serialize for SeqDoc<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let walk = self.walk;
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for (index, item) in self.items.iter().enumerate() {
            match item {
                FieldValue::Node(node) => {
                    seq.serialize_element(&NodeDoc {
                        walk,
                        node: &**node,
                        path: self.path.index(index),
                    })?;
                }
                FieldValue::Sequence(items) => {
                    seq.serialize_element(&SeqDoc {
                        walk,
                        items,
                        path: self.path.index(index),
                        offsets: None,
                    })?;
                }
                FieldValue::Blob(bytes) => {
                    let source = self.offsets.and_then(|o| o.elements.get(index).copied());
                    let rendered = walk
                        .render_blob(bytes, &self.path, source)
                        .map_err(|e| walk.fail(e))?;
                    seq.serialize_element(&rendered)?;
                }
                FieldValue::Enumerated(e) => seq.serialize_element(e)?,
                FieldValue::Scalar(scalar) => seq.serialize_element(scalar)?,
            }
        }
        seq.end()
    }
}
