//! Format descriptors
//!
//! A grammar ships a kaitai-style YAML descriptor whose `meta` section
//! names the format. Only the naming metadata is read here; the grammar
//! itself is compiled into the parser.

use crate::naming::to_camel_case;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File extension of descriptor files
pub const DESCRIPTOR_EXTENSION: &str = "ksy";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DescriptorFile {
    meta: FormatDescriptor,
}

/// `meta` section of a format descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl FormatDescriptor {
    pub fn from_yaml(source: &str) -> Result<Self> {
        let file: DescriptorFile = serde_yaml::from_str(source)?;
        if file.meta.id.trim().is_empty() {
            return Err(Error::Descriptor("meta.id must not be empty".to_string()));
        }
        Ok(file.meta)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
            .map_err(|e| Error::Descriptor(format!("{}: {}", path.display(), e)))
    }

    /// Camel-cased title, falling back to the id
    pub fn display_title(&self) -> String {
        to_camel_case(self.title.as_deref().unwrap_or(&self.id))
    }

    /// Identifier-safe name: spaces become `_`, other punctuation is dropped
    pub fn plugin_name(&self) -> String {
        self.display_title()
            .replace(' ', "_")
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect()
    }

    pub fn description(&self) -> String {
        format!(
            "Extracts \"{}\" files and attaches its low-level data structure as a JSON text to the trace.",
            self.display_title()
        )
    }
}

/// Locate the single descriptor file in `dir`.
///
/// Zero or several candidates is an error: the directory must name
/// exactly one format.
pub fn find_descriptor(dir: &Path) -> Result<PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTOR_EXTENSION) {
            found.push(path);
        }
    }

    match found.len() {
        1 => Ok(found.remove(0)),
        n => Err(Error::Descriptor(format!(
            "found {} .{} files in {}, expected exactly 1",
            n,
            DESCRIPTOR_EXTENSION,
            dir.display()
        ))),
    }
}
