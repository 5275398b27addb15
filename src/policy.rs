//! Blob-offload policy
//!
//! Decides per blob whether it is inlined as hex, offloaded to the
//! artifact sink (as a range reference or a byte copy), or replaced by a
//! placeholder because the sink cannot accept it.

use crate::adapter::SourceRange;
use crate::path::DocPath;
use crate::{Error, Result};

/// Blobs up to this many bytes are inlined by default
pub const DEFAULT_MAX_INLINE_LENGTH: usize = 10;

/// Largest payload an artifact sink accepts by default (8 MiB)
pub const DEFAULT_MAX_SINKABLE_SIZE: usize = 8 * 1024 * 1024;

/// Thresholds driving the blob decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobPolicy {
    max_inline_length: usize,
    max_sinkable_size: usize,
}

/// How a blob ends up in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobAction {
    /// Emit as a lowercase hex string
    Inline,
    /// Too large for the sink; emit a placeholder only
    Refuse,
    /// Offload as a reference into the source stream
    OffloadRange(SourceRange),
    /// Offload a copy of the bytes
    OffloadCopy,
}

impl BlobPolicy {
    /// Validate and build a policy.
    ///
    /// The sink ceiling must exceed the inline threshold, otherwise no
    /// blob could ever be offloaded.
    pub fn new(max_inline_length: usize, max_sinkable_size: usize) -> Result<Self> {
        if max_sinkable_size == 0 {
            return Err(Error::Config("max_sinkable_size must be positive".to_string()));
        }
        if max_sinkable_size <= max_inline_length {
            return Err(Error::Config(format!(
                "max_sinkable_size ({}) must be larger than max_inline_length ({})",
                max_sinkable_size, max_inline_length
            )));
        }
        Ok(Self {
            max_inline_length,
            max_sinkable_size,
        })
    }

    /// Build a policy from signed values, as read from configuration files
    pub fn from_signed(max_inline_length: i64, max_sinkable_size: i64) -> Result<Self> {
        let inline = usize::try_from(max_inline_length).map_err(|_| {
            Error::Config(format!("max_inline_length must not be negative: {}", max_inline_length))
        })?;
        let sinkable = usize::try_from(max_sinkable_size).map_err(|_| {
            Error::Config(format!("max_sinkable_size must not be negative: {}", max_sinkable_size))
        })?;
        Self::new(inline, sinkable)
    }

    pub fn max_inline_length(&self) -> usize {
        self.max_inline_length
    }

    pub fn max_sinkable_size(&self) -> usize {
        self.max_sinkable_size
    }

    /// Apply the decision table to a blob of `len` bytes
    pub fn decide(&self, len: usize, source: Option<SourceRange>, sink_takes_ranges: bool) -> BlobAction {
        if len <= self.max_inline_length {
            return BlobAction::Inline;
        }
        if len >= self.max_sinkable_size {
            return BlobAction::Refuse;
        }
        match source {
            Some(range) if sink_takes_ranges => BlobAction::OffloadRange(range),
            _ => BlobAction::OffloadCopy,
        }
    }

    /// Placeholder for a blob that was offloaded under `path`
    pub fn stored_placeholder(len: usize, path: &DocPath) -> String {
        format!("data block of size: {} (stored as {})", len, path)
    }

    /// Placeholder for a blob the sink cannot accept
    pub fn refused_placeholder(&self, len: usize) -> String {
        format!(
            "data block of size: {} (not added as child artifact because size exceeds {})",
            len, self.max_sinkable_size
        )
    }
}

impl Default for BlobPolicy {
    fn default() -> Self {
        Self {
            max_inline_length: DEFAULT_MAX_INLINE_LENGTH,
            max_sinkable_size: DEFAULT_MAX_SINKABLE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BlobPolicy {
        BlobPolicy::new(16, 1000).unwrap()
    }

    #[test]
    fn test_inline_boundary() {
        let p = policy();
        assert_eq!(p.decide(0, None, true), BlobAction::Inline);
        assert_eq!(p.decide(16, None, true), BlobAction::Inline);
        assert_eq!(p.decide(17, None, true), BlobAction::OffloadCopy);
    }

    #[test]
    fn test_ceiling_boundary() {
        let p = policy();
        let range = SourceRange::new(0, 1000).unwrap();
        assert_eq!(p.decide(1000, Some(range), true), BlobAction::Refuse);
        assert_eq!(p.decide(5000, None, false), BlobAction::Refuse);
        assert_eq!(
            p.decide(999, Some(SourceRange::new(1, 1000).unwrap()), true),
            BlobAction::OffloadRange(SourceRange::new(1, 1000).unwrap())
        );
    }

    #[test]
    fn test_range_needs_offsets_and_capability() {
        let p = policy();
        let range = SourceRange::new(40, 540).unwrap();
        assert_eq!(p.decide(500, Some(range), true), BlobAction::OffloadRange(range));
        assert_eq!(p.decide(500, Some(range), false), BlobAction::OffloadCopy);
        assert_eq!(p.decide(500, None, true), BlobAction::OffloadCopy);
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(BlobPolicy::new(16, 0).is_err());
        assert!(BlobPolicy::new(16, 16).is_err());
        assert!(BlobPolicy::new(100, 10).is_err());
        assert!(BlobPolicy::from_signed(-1, 100).is_err());
        assert!(BlobPolicy::from_signed(10, -100).is_err());
        assert_eq!(BlobPolicy::from_signed(16, 1000).unwrap(), policy());
    }

    #[test]
    fn test_placeholders() {
        let path = DocPath::root().field("rows");
        assert_eq!(
            BlobPolicy::stored_placeholder(500, &path),
            "data block of size: 500 (stored as $.rows)"
        );
        assert_eq!(
            policy().refused_placeholder(2000),
            "data block of size: 2000 (not added as child artifact because size exceeds 1000)"
        );
    }

    #[test]
    fn test_default_is_valid() {
        let d = BlobPolicy::default();
        assert!(BlobPolicy::new(d.max_inline_length(), d.max_sinkable_size()).is_ok());
    }
}
