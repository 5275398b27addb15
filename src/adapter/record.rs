//! Schema-backed generic parse nodes
//!
//! A [`Schema`] is registered once per node type and lists its stored
//! fields and computed accessors. Grammars build [`Record`]s against a
//! schema while parsing, recording source ranges as they go.

use super::node::{Field, FieldOffsets, OffsetTable, ParseNode, SourceRange, Value};
use crate::{Error, Result};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Accessor deriving a field from the rest of the record
pub type Computed = Arc<dyn Fn(&Record) -> Result<Value<'_>> + Send + Sync>;

/// Field layout of one node type
pub struct Schema {
    name: String,
    stored: Vec<String>,
    computed: Vec<(String, Computed)>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stored: Vec::new(),
            computed: Vec::new(),
        }
    }

    /// Declare a stored field; declaration order is document order
    pub fn stored(mut self, name: impl Into<String>) -> Self {
        self.stored.push(name.into());
        self
    }

    /// Declare a computed field, emitted after all stored fields
    pub fn computed<F>(mut self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&Record) -> Result<Value<'_>> + Send + Sync + 'static,
    {
        self.computed.push((name.into(), Arc::new(accessor)));
        self
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stored_fields(&self) -> impl Iterator<Item = &str> {
        self.stored.iter().map(String::as_str)
    }

    pub fn computed_fields(&self) -> impl Iterator<Item = &str> {
        self.computed.iter().map(|(name, _)| name.as_str())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.stored.iter().position(|f| f == name)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("stored", &self.stored)
            .field("computed", &self.computed_fields().collect::<Vec<_>>())
            .finish()
    }
}

/// Generic parse node built against a [`Schema`]
#[derive(Debug)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Value<'static>>,
    offsets: Option<OffsetTable>,
}

impl Record {
    pub fn builder(schema: &Arc<Schema>) -> RecordBuilder {
        RecordBuilder {
            schema: Arc::clone(schema),
            values: schema.stored.iter().map(|_| Value::Absent).collect(),
            offsets: OffsetTable::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Stored value of a field, `None` when the schema has no such field
    pub fn get(&self, name: &str) -> Option<&Value<'static>> {
        self.schema.position(name).map(|i| &self.values[i])
    }

    /// Stored unsigned integer field, for computed accessors
    pub fn get_uint(&self, name: &str) -> Result<u64> {
        match self.get(name) {
            Some(Value::UInt(v)) => Ok(*v),
            Some(other) => Err(Error::Adapter(format!(
                "{}.{} is not an unsigned integer: {:?}",
                self.schema.name, name, other
            ))),
            None => Err(Error::Adapter(format!(
                "{} has no field {}",
                self.schema.name, name
            ))),
        }
    }
}

impl ParseNode for Record {
    fn type_name(&self) -> &str {
        &self.schema.name
    }

    fn fields(&self) -> Result<Vec<Field<'_>>> {
        let mut fields = Vec::with_capacity(self.schema.stored.len() + self.schema.computed.len());

        for (name, value) in self.schema.stored.iter().zip(&self.values) {
            fields.push(Field::new(Cow::Borrowed(name.as_str()), value.reborrow()));
        }

        for (name, accessor) in &self.schema.computed {
            let value = accessor(self).map_err(|e| {
                Error::Adapter(format!("{}.{}: {}", self.schema.name, name, e))
            })?;
            fields.push(Field::new(Cow::Borrowed(name.as_str()), value));
        }

        Ok(fields)
    }

    fn offsets(&self) -> Option<&OffsetTable> {
        self.offsets.as_ref()
    }
}

/// Incremental constructor for a [`Record`]
pub struct RecordBuilder {
    schema: Arc<Schema>,
    values: Vec<Value<'static>>,
    offsets: OffsetTable,
}

impl RecordBuilder {
    /// Set a stored field
    pub fn set(&mut self, name: &str, value: impl Into<Value<'static>>) -> Result<&mut Self> {
        let index = self.schema.position(name).ok_or_else(|| {
            Error::Adapter(format!("{} declares no field {}", self.schema.name, name))
        })?;
        self.values[index] = value.into();
        Ok(self)
    }

    /// Set a stored field read from `range` of the input
    pub fn set_at(
        &mut self,
        name: &str,
        value: impl Into<Value<'static>>,
        range: SourceRange,
    ) -> Result<&mut Self> {
        self.set(name, value)?;
        self.offsets.insert(name, FieldOffsets::new(range));
        Ok(self)
    }

    /// Record offsets for a field, including per-element ranges
    pub fn set_offsets(&mut self, name: &str, offsets: FieldOffsets) -> &mut Self {
        self.offsets.insert(name, offsets);
        self
    }

    pub fn finish(self) -> Record {
        let offsets = if self.offsets.is_empty() {
            None
        } else {
            Some(self.offsets)
        };
        Record {
            schema: self.schema,
            values: self.values,
            offsets,
        }
    }
}
