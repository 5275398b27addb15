//! Built-in grammars

pub mod png;

pub use png::{PNG_MAGIC, PngGrammar};

use crate::adapter::Grammar;
use crate::{Error, Result};

/// Ids of the grammars compiled into the crate
pub const BUILTIN_FORMATS: &[&str] = &["png"];

/// Look up a built-in grammar by descriptor id
pub fn grammar_for(id: &str) -> Result<Box<dyn Grammar>> {
    match id {
        "png" => Ok(Box::new(PngGrammar::new()?)),
        other => Err(Error::Config(format!(
            "unknown format '{}' (available: {})",
            other,
            BUILTIN_FORMATS.join(", ")
        ))),
    }
}
