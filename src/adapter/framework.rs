//! Grammar framework
//!
//! A grammar turns raw input into a parse tree. The serializer never picks
//! a grammar; the caller hands it one.

use super::record::Record;
use crate::Result;
use crate::descriptor::FormatDescriptor;

/// Trait for binary-format grammars
///
/// Each grammar is responsible for:
/// 1. Naming its format through a descriptor
/// 2. Parsing input bytes into a tree of records
/// 3. Recording source ranges for the fields it reads
pub trait Grammar {
    /// Naming metadata of the format
    fn descriptor(&self) -> &FormatDescriptor;

    /// Parse a complete input. Malformed input is an error, never a
    /// partial tree.
    fn parse(&self, data: &[u8]) -> Result<Record>;
}
