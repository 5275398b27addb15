//! Parse-node view
//!
//! Defines the trait every parse-tree node exposes to the serializer and
//! the raw values its fields carry.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;

/// A node of a parse tree produced by a binary-format grammar.
///
/// Nodes are read-only to the serializer. Field order is stored fields in
/// declaration order, followed by computed fields.
pub trait ParseNode {
    /// Name of the node type (e.g. `chunk`, `ihdr_chunk`)
    fn type_name(&self) -> &str;

    /// Enumerate the node's fields.
    ///
    /// An error here aborts serialization of the whole tree.
    fn fields(&self) -> Result<Vec<Field<'_>>>;

    /// Source byte ranges of the node's fields, when the grammar tracked them
    fn offsets(&self) -> Option<&OffsetTable> {
        None
    }
}

/// A named field of a parse node
#[derive(Debug)]
pub struct Field<'a> {
    pub name: Cow<'a, str>,
    pub value: Value<'a>,
}

impl<'a> Field<'a> {
    pub fn new(name: impl Into<Cow<'a, str>>, value: Value<'a>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Symbolic enumeration value: a name plus its ordinal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue<'a> {
    pub name: Cow<'a, str>,
    pub ordinal: i64,
}

/// Raw field value as returned by a node, before classification.
#[derive(Debug)]
pub enum Value<'a> {
    /// Field not present in this instance (optional or conditional field)
    Absent,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(Cow<'a, str>),
    Enum(EnumValue<'a>),
    /// Variable-length byte payload, subject to the blob policy
    Blob(Cow<'a, [u8]>),
    /// Byte-typed scalar such as a fixed magic; always rendered inline
    Bytes(Cow<'a, [u8]>),
    Node(NodeRef<'a>),
    List(Vec<Value<'a>>),
}

impl<'a> Value<'a> {
    pub fn blob(bytes: impl Into<Cow<'a, [u8]>>) -> Self {
        Value::Blob(bytes.into())
    }

    pub fn bytes(bytes: impl Into<Cow<'a, [u8]>>) -> Self {
        Value::Bytes(bytes.into())
    }

    pub fn enumerated(name: impl Into<Cow<'a, str>>, ordinal: i64) -> Self {
        Value::Enum(EnumValue {
            name: name.into(),
            ordinal,
        })
    }

    pub fn node(node: impl ParseNode + 'a) -> Self {
        Value::Node(NodeRef::Owned(Box::new(node)))
    }

    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value<'a>>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Borrow this value without copying any payload
    pub fn reborrow(&self) -> Value<'_> {
        match self {
            Value::Absent => Value::Absent,
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(i) => Value::Int(*i),
            Value::UInt(u) => Value::UInt(*u),
            Value::Float(f) => Value::Float(*f),
            Value::Str(s) => Value::Str(Cow::Borrowed(s.as_ref())),
            Value::Enum(e) => Value::Enum(EnumValue {
                name: Cow::Borrowed(e.name.as_ref()),
                ordinal: e.ordinal,
            }),
            Value::Blob(b) => Value::Blob(Cow::Borrowed(b.as_ref())),
            Value::Bytes(b) => Value::Bytes(Cow::Borrowed(b.as_ref())),
            Value::Node(n) => Value::Node(NodeRef::Borrowed(n.deref())),
            Value::List(items) => Value::List(items.iter().map(Value::reborrow).collect()),
        }
    }
}

macro_rules! value_from_int {
    ($variant:ident, $target:ty, $($t:ty),*) => {
        $(
            impl From<$t> for Value<'_> {
                fn from(v: $t) -> Self {
                    Value::$variant(<$target>::from(v))
                }
            }
        )*
    };
}

value_from_int!(UInt, u64, u8, u16, u32, u64);
value_from_int!(Int, i64, i8, i16, i32, i64);

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value<'_> {
    fn from(v: String) -> Self {
        Value::Str(Cow::Owned(v))
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::Str(Cow::Borrowed(v))
    }
}

impl<'a, T: Into<Value<'a>>> From<Option<T>> for Value<'a> {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Absent)
    }
}

/// Borrowed or owned handle to a nested node
pub enum NodeRef<'a> {
    Borrowed(&'a (dyn ParseNode + 'a)),
    Owned(Box<dyn ParseNode + 'a>),
}

impl<'a> Deref for NodeRef<'a> {
    type Target = dyn ParseNode + 'a;

    fn deref(&self) -> &Self::Target {
        match self {
            NodeRef::Borrowed(node) => *node,
            NodeRef::Owned(node) => node.as_ref(),
        }
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.type_name()).finish()
    }
}

/// Half-open byte range `[start, end)` in the original input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct SourceRange {
    start: u64,
    end: u64,
}

/// Unvalidated wire form of a [`SourceRange`]
#[derive(Deserialize)]
struct RawRange {
    start: u64,
    end: u64,
}

impl TryFrom<RawRange> for SourceRange {
    type Error = Error;

    fn try_from(raw: RawRange) -> Result<Self> {
        SourceRange::new(raw.start, raw.end)
    }
}

impl SourceRange {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if end < start {
            return Err(Error::Adapter(format!(
                "source range ends before it starts ({}..{})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Source ranges recorded for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOffsets {
    pub range: SourceRange,
    /// Per-element ranges when the field is a sequence
    pub elements: Vec<SourceRange>,
}

impl FieldOffsets {
    pub fn new(range: SourceRange) -> Self {
        Self {
            range,
            elements: Vec::new(),
        }
    }

    pub fn with_elements(range: SourceRange, elements: Vec<SourceRange>) -> Self {
        Self { range, elements }
    }
}

/// Per-field offset table of a node, keyed by field name
#[derive(Debug, Clone, Default)]
pub struct OffsetTable {
    fields: HashMap<String, FieldOffsets>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, offsets: FieldOffsets) {
        self.fields.insert(name.into(), offsets);
    }

    pub fn get(&self, name: &str) -> Option<&FieldOffsets> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;

    impl ParseNode for Leaf {
        fn type_name(&self) -> &str {
            "leaf"
        }

        fn fields(&self) -> Result<Vec<Field<'_>>> {
            Ok(vec![Field::new("x", Value::from(1u8))])
        }
    }

    #[test]
    fn test_source_range() {
        let range = SourceRange::new(8, 20).unwrap();
        assert_eq!(range.len(), 12);
        assert_eq!(range.to_string(), "8..20");
        assert!(SourceRange::new(5, 4).is_err());
        assert!(SourceRange::new(4, 4).unwrap().is_empty());
    }

    #[test]
    fn test_source_range_deserialize_validates() {
        let range: SourceRange = serde_json::from_str(r#"{"start":2,"end":9}"#).unwrap();
        assert_eq!((range.start(), range.end()), (2, 9));
        assert!(serde_json::from_str::<SourceRange>(r#"{"start":9,"end":2}"#).is_err());
        assert_eq!(serde_json::to_string(&range).unwrap(), r#"{"start":2,"end":9}"#);
    }

    #[test]
    fn test_reborrow_keeps_shape() {
        let owned: Value<'static> = Value::list([Value::blob(vec![1u8, 2]), Value::node(Leaf)]);
        match owned.reborrow() {
            Value::List(items) => {
                assert!(matches!(&items[0], Value::Blob(Cow::Borrowed(b)) if b.to_vec() == vec![1u8, 2]));
                assert!(matches!(&items[1], Value::Node(NodeRef::Borrowed(n)) if n.type_name() == "leaf"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_option_conversion() {
        assert!(Value::from(None::<u32>).is_absent());
        assert!(matches!(Value::from(Some(3u32)), Value::UInt(3)));
    }
}
