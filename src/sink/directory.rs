//! Directory sink
//!
//! Writes each artifact to its own file and keeps a `manifest.json`
//! mapping files back to document paths. Only byte copies are supported.

use super::{ArtifactHandle, ArtifactSink, OffloadRequest, Payload};
use crate::adapter::SourceRange;
use crate::path::DocPath;
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: String,
    pub path: DocPath,
    pub file: String,
    pub size: u64,
    pub source_range: Option<SourceRange>,
}

pub struct DirectorySink {
    dir: PathBuf,
    entries: Vec<ManifestEntry>,
}

impl DirectorySink {
    /// Create the directory if needed.
    ///
    /// Artifact files and the manifest of an earlier run in the same
    /// directory are removed; other files are left alone.
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut stale = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if path.is_file() && (name == MANIFEST_FILE || is_artifact_file(name)) {
                std::fs::remove_file(&path)?;
                stale += 1;
            }
        }
        if stale > 0 {
            tracing::debug!("Removed {} files of a previous run from {}", stale, dir.display());
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            entries: Vec::new(),
        })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Write the manifest and return its location
    pub fn finish(self) -> Result<PathBuf> {
        let manifest = self.dir.join(MANIFEST_FILE);
        let contents = serde_json::to_vec_pretty(&self.entries)?;
        std::fs::write(&manifest, contents)?;
        tracing::debug!("Wrote manifest with {} artifacts to {}", self.entries.len(), manifest.display());
        Ok(manifest)
    }

    /// Remove every artifact file written so far, for a run that failed
    pub fn discard(self) -> Result<()> {
        for entry in &self.entries {
            std::fs::remove_file(self.dir.join(&entry.file))?;
        }
        tracing::debug!("Discarded {} artifacts in {}", self.entries.len(), self.dir.display());
        Ok(())
    }
}

/// Whether `name` has the `NNNN.bin` / `NNNN_<path>.bin` shape of [`file_name_for`]
fn is_artifact_file(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".bin") else {
        return false;
    };
    let digits = stem.bytes().take_while(u8::is_ascii_digit).count();
    digits >= 4 && (digits == stem.len() || stem.as_bytes()[digits] == b'_')
}

fn file_name_for(index: usize, path: &DocPath) -> String {
    let stem: String = path
        .to_string()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        format!("{:04}.bin", index)
    } else {
        format!("{:04}_{}.bin", index, stem)
    }
}

impl ArtifactSink for DirectorySink {
    fn offload(&mut self, request: OffloadRequest<'_>) -> Result<ArtifactHandle> {
        let bytes = match request.payload {
            Payload::Bytes(bytes) => bytes,
            Payload::Range(range) => {
                return Err(Error::Sink(format!(
                    "directory sink cannot store range reference {} for {}",
                    range, request.path
                )));
            }
        };

        let index = self.entries.len();
        let file = file_name_for(index, request.path);
        std::fs::write(self.dir.join(&file), bytes)
            .map_err(|e| Error::Sink(format!("writing {}: {}", file, e)))?;

        let id = index.to_string();
        self.entries.push(ManifestEntry {
            id: id.clone(),
            path: request.path.clone(),
            file,
            size: bytes.len() as u64,
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
    fn test_file_names() {
        let path = DocPath::root().field("chunks").index(2).field("body");
        assert_eq!(file_name_for(7, &path), "0007_chunks__2__body.bin");
        assert_eq!(file_name_for(0, &DocPath::root()), "0000.bin");
    }

    #[test]
    fn test_writes_files_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(&dir.path().join("artifacts")).unwrap();
        assert!(!sink.supports_range_references());

        let path = DocPath::root().field("rows");
        let handle = sink
            .offload(OffloadRequest { path: &path, payload: Payload::Bytes(b"abcdef"), source_range: None })
            .unwrap();
        assert_eq!(handle.id, "0");

        let range = SourceRange::new(0, 6).unwrap();
        assert!(sink
            .offload(OffloadRequest { path: &path, payload: Payload::Range(range), source_range: Some(range) })
            .is_err());

        let stored = dir.path().join("artifacts").join(&sink.entries()[0].file);
        assert_eq!(std::fs::read(stored).unwrap(), b"abcdef");

        let manifest = sink.finish().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(manifest).unwrap()).unwrap();
        assert_eq!(json[0]["path"], "$.rows");
        assert_eq!(json[0]["size"], 6);
        assert!(json[0]["sourceRange"].is_null());
    }

    #[test]
    fn test_artifact_file_names_recognized() {
        assert!(is_artifact_file("0007_chunks__2__body.bin"));
        assert!(is_artifact_file("0000.bin"));
        assert!(is_artifact_file("12345_rows.bin"));
        assert!(!is_artifact_file("007_rows.bin"));
        assert!(!is_artifact_file("notes.bin"));
        assert!(!is_artifact_file("0001_rows.txt"));
    }

    #[test]
    fn test_create_clears_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = DocPath::root().field("rows");
        let mut first = DirectorySink::create(dir.path()).unwrap();
        for _ in 0..3 {
            first
                .offload(OffloadRequest { path: &path, payload: Payload::Bytes(b"old"), source_range: None })
                .unwrap();
        }
        first.finish().unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"unrelated").unwrap();

        let mut second = DirectorySink::create(dir.path()).unwrap();
        second
            .offload(OffloadRequest { path: &path, payload: Payload::Bytes(b"new"), source_range: None })
            .unwrap();
        second.finish().unwrap();

        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["0000_rows.bin", "keep.txt", "manifest.json"]);
    }

    #[test]
    fn test_discard_removes_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = DocPath::root().field("rows");
        let mut sink = DirectorySink::create(dir.path()).unwrap();
        sink.offload(OffloadRequest { path: &path, payload: Payload::Bytes(b"abc"), source_range: None })
            .unwrap();
        sink.discard().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
