//! Fixed 20-byte envelope header.
//!
//! ```text
//! "#~" | "DF02" | 2 reserved | meta_len: u32 BE | data_len: u32 BE | "~#\r\n"
//! ```

use crate::error::{EnvelopeError, EnvelopeResult};

/// Leading marker
pub const MAGIC: &[u8; 2] = b"#~";
/// Format and version tag
pub const VERSION: &[u8; 4] = b"DF02";
/// Reserved metadata-encoding hint, written as-is and ignored on read
pub const RESERVED: &[u8; 2] = b"..";
/// Trailing marker
pub const TERMINATOR: &[u8; 4] = b"~#\r\n";
/// Total header length in bytes
pub const HEADER_LEN: usize = 20;

/// Decoded envelope header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Length of the JSON metadata block
    pub meta_len: u32,
    /// Length of the binary payload
    pub data_len: u32,
}

impl Header {
    /// Create a header for the given section lengths
    ///
    /// # Errors
    ///
    /// Returns error if either length exceeds `u32::MAX`
    pub fn for_lengths(meta_len: usize, data_len: usize) -> EnvelopeResult<Self> {
        let meta_len = u32::try_from(meta_len).map_err(|_| EnvelopeError::TooLarge {
            section: "metadata",
            len: meta_len as u64,
        })?;
        let data_len = u32::try_from(data_len).map_err(|_| EnvelopeError::TooLarge {
            section: "payload",
            len: data_len as u64,
        })?;
        Ok(Self { meta_len, data_len })
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..2].copy_from_slice(MAGIC);
        out[2..6].copy_from_slice(VERSION);
        out[6..8].copy_from_slice(RESERVED);
        out[8..12].copy_from_slice(&self.meta_len.to_be_bytes());
        out[12..16].copy_from_slice(&self.data_len.to_be_bytes());
        out[16..20].copy_from_slice(TERMINATOR);
        out
    }

    /// Check the leading marker on its own, before the rest is read
    ///
    /// # Errors
    ///
    /// Returns `BadMagic` on mismatch
    pub fn check_magic(bytes: [u8; 2]) -> EnvelopeResult<()> {
        if &bytes != MAGIC {
            return Err(EnvelopeError::BadMagic { found: bytes });
        }
        Ok(())
    }

    /// Decode from wire bytes
    ///
    /// # Errors
    ///
    /// Returns a framing error if any fixed marker doesn't match
    pub fn decode(buf: &[u8; HEADER_LEN]) -> EnvelopeResult<Self> {
        Self::check_magic([buf[0], buf[1]])?;

        let version = [buf[2], buf[3], buf[4], buf[5]];
        if &version != VERSION {
            return Err(EnvelopeError::BadVersion { found: version });
        }

        let terminator = [buf[16], buf[17], buf[18], buf[19]];
        if &terminator != TERMINATOR {
            return Err(EnvelopeError::BadTerminator { found: terminator });
        }

        Ok(Self {
            meta_len: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            data_len: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }
}
