//! Envelope payload storage.

use bytes::Bytes;
use memmap2::Mmap;
use std::fmt;
use std::fs::File;

/// Raw binary payload of an envelope.
///
/// Small payloads live on the heap. Large ones are memory-mapped, either
/// straight from the input file or from a spooled temporary file that the
/// payload owns and releases on drop.
pub enum Payload {
    /// Heap buffer
    Bytes(Bytes),
    /// Memory-mapped region
    Mapped(MappedPayload),
}

/// Memory-mapped payload with its optional backing temp file
pub struct MappedPayload {
    map: Mmap,
    // Anonymous temp file; the OS reclaims it once this handle closes.
    _spool: Option<File>,
}

impl MappedPayload {
    pub(crate) fn new(map: Mmap, spool: Option<File>) -> Self {
        Self { map, _spool: spool }
    }

    /// Check if the mapping is backed by a spooled temp file
    #[must_use]
    pub fn is_spooled(&self) -> bool {
        self._spool.is_some()
    }
}

impl Payload {
    /// Empty payload
    #[must_use]
    pub fn empty() -> Self {
        Self::Bytes(Bytes::new())
    }

    /// Borrow the payload bytes
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Bytes(b) => b,
            Self::Mapped(m) => &m.map,
        }
    }

    /// Payload length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Check if the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the payload is memory-mapped
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }

    /// Access the mapped variant
    #[must_use]
    pub fn as_mapped(&self) -> Option<&MappedPayload> {
        match self {
            Self::Mapped(m) => Some(m),
            Self::Bytes(_) => None,
        }
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Payload {}

impl Default for Payload {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => write!(f, "Payload::Bytes({} bytes)", b.len()),
            Self::Mapped(m) => write!(
                f,
                "Payload::Mapped({} bytes, spooled: {})",
                m.map.len(),
                m.is_spooled()
            ),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<&'static [u8]> for Payload {
    fn from(b: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(b))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Bytes(Bytes::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_bytes_payload() {
        let payload = Payload::from(b"abc".to_vec());
        assert_eq!(payload.len(), 3);
        assert!(!payload.is_mapped());
        assert_eq!(payload.as_slice(), b"abc");
    }

    #[test]
    fn test_mapped_equals_bytes() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"hello").unwrap();
        let map = unsafe { Mmap::map(&file).unwrap() };
        let mapped = Payload::Mapped(MappedPayload::new(map, Some(file)));

        assert!(mapped.is_mapped());
        assert!(mapped.as_mapped().unwrap().is_spooled());
        assert_eq!(mapped, Payload::from(&b"hello"[..]));
    }

    #[test]
    fn test_empty_default() {
        assert!(Payload::default().is_empty());
        assert_eq!(format!("{:?}", Payload::empty()), "Payload::Bytes(0 bytes)");
    }
}
