//! Structural classification of field values
//!
//! The serializer never inspects raw values; it dispatches on the
//! [`FieldValue`] built here.

use super::node::{NodeRef, Value};
use serde::{Serialize, Serializer};
use std::borrow::Cow;

/// Classified field value
#[derive(Debug)]
pub enum FieldValue<'a> {
    /// Nested node, serialized recursively
    Node(NodeRef<'a>),
    /// Ordered elements, each classified on its own
    Sequence(Vec<FieldValue<'a>>),
    /// Byte payload subject to the blob policy
    Blob(Cow<'a, [u8]>),
    Enumerated(Enumerated),
    Scalar(Scalar<'a>),
}

/// Enumeration rendered as `{"name": "UPPER_NAME", "value": ordinal}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enumerated {
    pub name: String,
    pub value: i64,
}

/// Leaf value emitted as-is
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar<'a> {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(Cow<'a, str>),
    /// Byte-typed scalar, emitted as an array of integers
    Bytes(Cow<'a, [u8]>),
}

impl Serialize for Scalar<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::UInt(u) => serializer.serialize_u64(*u),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::Str(s) => serializer.serialize_str(s),
            Scalar::Bytes(bytes) => serializer.collect_seq(bytes.iter()),
        }
    }
}

/// Whether a field appears in the document.
///
/// Names starting with `_` are reserved for grammar internals (debug maps,
/// parent links, raw buffers) and absent values are skipped.
pub fn is_visible(name: &str, value: &Value<'_>) -> bool {
    !name.starts_with('_') && !value.is_absent()
}

/// Classify a raw value. Returns `None` for absent values.
pub fn classify(value: Value<'_>) -> Option<FieldValue<'_>> {
    let classified = match value {
        Value::Absent => return None,
        Value::Node(node) => FieldValue::Node(node),
        Value::List(items) => FieldValue::Sequence(
            items
                .into_iter()
                .map(|item| classify(item).unwrap_or(FieldValue::Scalar(Scalar::Null)))
                .collect(),
        ),
        Value::Blob(bytes) => FieldValue::Blob(bytes),
        Value::Enum(e) => FieldValue::Enumerated(Enumerated {
            name: e.name.to_uppercase(),
            value: e.ordinal,
        }),
        Value::Bytes(bytes) => FieldValue::Scalar(Scalar::Bytes(bytes)),
        Value::Bool(b) => FieldValue::Scalar(Scalar::Bool(b)),
        Value::Int(i) => FieldValue::Scalar(Scalar::Int(i)),
        Value::UInt(u) => FieldValue::Scalar(Scalar::UInt(u)),
        Value::Float(f) => FieldValue::Scalar(Scalar::Float(f)),
        Value::Str(s) => FieldValue::Scalar(Scalar::Str(s)),
    };
    Some(classified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility() {
        assert!(is_visible("width", &Value::from(3u32)));
        assert!(!is_visible("_debug", &Value::from(3u32)));
        assert!(!is_visible("_parent", &Value::Absent));
        assert!(!is_visible("palette", &Value::Absent));
    }

    #[test]
    fn test_classify_enum_uppercases() {
        match classify(Value::enumerated("kFoo", 3)) {
            Some(FieldValue::Enumerated(e)) => {
                assert_eq!(e, Enumerated { name: "KFOO".to_string(), value: 3 });
                assert_eq!(serde_json::to_string(&e).unwrap(), r#"{"name":"KFOO","value":3}"#);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_bytes_scalar() {
        match classify(Value::bytes(vec![0x89u8, 0x50, 0x4e])) {
            Some(FieldValue::Scalar(scalar)) => {
                assert_eq!(serde_json::to_string(&scalar).unwrap(), "[137,80,78]");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_list_keeps_absent_slots() {
        match classify(Value::list([Value::from(1u8), Value::Absent, Value::blob(vec![7u8])])) {
            Some(FieldValue::Sequence(items)) => {
                assert_eq!(items.len(), 3);
                assert!(matches!(items[1], FieldValue::Scalar(Scalar::Null)));
                assert!(matches!(items[2], FieldValue::Blob(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(classify(Value::Absent).is_none());
    }

    #[test]
    fn test_scalar_passthrough() {
        let cases = [
            (Value::from(10u32), "10"),
            (Value::from(-4i32), "-4"),
            (Value::from(true), "true"),
            (Value::from(1.5f64), "1.5"),
            (Value::from("tEXt"), "\"tEXt\""),
        ];
        for (value, expected) in cases {
            match classify(value) {
                Some(FieldValue::Scalar(scalar)) => {
                    assert_eq!(serde_json::to_string(&scalar).unwrap(), expected);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
