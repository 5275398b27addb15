//! Document paths - stable addresses for positions in an emitted document
//!
//! Format: `$` followed by `.<field>` or `.[<index>]` segments.
//!
//! Examples:
//! - `$` (the root object)
//! - `$.ihdr.width`
//! - `$.chunks.[3].body`
//!
//! Every offloaded artifact is tagged with the path where the blob would
//! have appeared inline, so artifact and document can be correlated later.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One step of a [`DocPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Named field, as spelled by the grammar (not camel-cased)
    Field(String),
    /// Position inside a sequence
    Index(usize),
}

/// `$`-rooted address of a document position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DocPath {
    segments: Vec<Segment>,
}

impl DocPath {
    /// The document root, `$`
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of a named child field
    pub fn field(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Field(name.into()));
        Self { segments }
    }

    /// Path of a sequence element
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parse a path string
    ///
    /// Expected format: `$(.name|.[index])*`
    pub fn parse(path: &str) -> Result<Self> {
        let rest = path
            .strip_prefix('$')
            .ok_or_else(|| Error::InvalidPath(format!("path must start with $: {}", path)))?;

        if rest.is_empty() {
            return Ok(Self::root());
        }

        let rest = rest
            .strip_prefix('.')
            .ok_or_else(|| Error::InvalidPath(format!("expected . after $: {}", path)))?;

        let mut segments = Vec::new();
        for part in rest.split('.') {
            if part.is_empty() {
                return Err(Error::InvalidPath(format!("empty segment in {}", path)));
            }
            let segment = match part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
                Some(index) => Segment::Index(index.parse().map_err(|_| {
                    Error::InvalidPath(format!("invalid index [{}] in {}", index, path))
                })?),
                None => Segment::Field(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    /// Convert to path string
    pub fn to_path_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                Segment::Field(name) => write!(f, ".{}", name)?,
                Segment::Index(index) => write!(f, ".[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl FromStr for DocPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for DocPath {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocPath {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DocPath::parse(&s).map_err(serde::de::Error::custom)
    }
}
