//! Parse-Tree Adapter
//!
//! Presents any parse node in a normalized shape regardless of which
//! grammar produced it: ordered named fields, a structural classification
//! of each value, and optional source offsets for blob provenance.
//!
//! Grammars build their trees from schema-backed [`Record`]s; custom node
//! types can implement [`ParseNode`] directly.

pub mod classify;
pub mod framework;
pub mod node;
pub mod record;

pub use classify::{Enumerated, FieldValue, Scalar, classify, is_visible};
pub use framework::Grammar;
pub use node::{
    EnumValue, Field, FieldOffsets, NodeRef, OffsetTable, ParseNode, SourceRange, Value,
};
pub use record::{Computed, Record, RecordBuilder, Schema};
