//! Envelope errors.

/// Result type for envelope operations
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

/// Errors raised while reading or writing an envelope
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The first two bytes were not the magic marker
    #[error("Envelope header doesn't start with \"#~\" (found \"{}\")", show(.found))]
    BadMagic {
        /// Bytes actually read
        found: [u8; 2],
    },

    /// Unknown format/version tag
    #[error("Envelope type is not \"DF02\" (found \"{}\")", show(.found))]
    BadVersion {
        /// Bytes actually read
        found: [u8; 4],
    },

    /// The header terminator did not match
    #[error("Envelope header doesn't end with \"~#\\r\\n\" (found \"{}\")", show(.found))]
    BadTerminator {
        /// Bytes actually read
        found: [u8; 4],
    },

    /// A section is too long for its 32-bit length field
    #[error("{section} of {len} bytes does not fit a 32-bit length")]
    TooLarge {
        /// Which section overflowed
        section: &'static str,
        /// Its length
        len: u64,
    },

    /// Metadata block is longer than the reader accepts
    #[error("metadata of {len} bytes exceeds the {limit} byte limit")]
    MetaLimit {
        /// Declared length
        len: u32,
        /// Reader limit
        limit: usize,
    },

    /// Metadata block is not valid JSON
    #[error("Invalid envelope metadata: {0}")]
    Meta(#[from] serde_json::Error),

    /// Underlying I/O failure (including truncated input)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn show(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).escape_debug().to_string()
}

impl EnvelopeError {
    /// Check if this error is a framing violation
    #[must_use]
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::BadMagic { .. } | Self::BadVersion { .. } | Self::BadTerminator { .. }
        )
    }
}
