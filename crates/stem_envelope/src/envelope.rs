//! Envelope reading and writing.

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::header::{HEADER_LEN, Header};
use crate::payload::{MappedPayload, Payload};
use memmap2::MmapOptions;
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::net::TcpStream;
use std::process::ChildStdout;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Payloads at least this large are memory-mapped instead of buffered
pub const DEFAULT_SPILL_THRESHOLD: usize = 128 * 1024 * 1024;

/// Copy granularity when spooling a large payload to a temp file
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Longest metadata block a reader accepts by default
pub const DEFAULT_MAX_META_LEN: usize = 64 * 1024 * 1024;

/// Byte source an envelope can be read from.
///
/// Sources backed by a regular file expose it through [`as_file`] so large
/// payloads can be mapped in place. Everything else is spooled.
///
/// [`as_file`]: EnvelopeInput::as_file
pub trait EnvelopeInput: Read {
    /// Underlying file, if the source supports random access
    fn as_file(&mut self) -> Option<&mut File> {
        None
    }
}

impl EnvelopeInput for File {
    fn as_file(&mut self) -> Option<&mut File> {
        Some(self)
    }
}

impl EnvelopeInput for &[u8] {}
impl<T: AsRef<[u8]>> EnvelopeInput for Cursor<T> {}
impl EnvelopeInput for TcpStream {}
impl EnvelopeInput for ChildStdout {}
impl EnvelopeInput for io::Stdin {}
impl<R: Read> EnvelopeInput for BufReader<R> {}

impl<T: EnvelopeInput + ?Sized> EnvelopeInput for &mut T {
    fn as_file(&mut self) -> Option<&mut File> {
        (**self).as_file()
    }
}

/// Self-describing frame: JSON metadata plus a raw payload
#[derive(Debug, PartialEq)]
pub struct Envelope {
    /// Metadata block
    pub meta: Value,
    /// Binary payload
    pub payload: Payload,
}

impl Envelope {
    /// Create an envelope with an empty payload
    #[must_use]
    pub fn new(meta: Value) -> Self {
        Self {
            meta,
            payload: Payload::empty(),
        }
    }

    /// Attach a payload
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Look up a top-level metadata field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    /// Metadata rendered as compact JSON
    #[must_use]
    pub fn meta_str(&self) -> String {
        self.meta.to_string()
    }

    /// Parse the payload as JSON
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not valid JSON
    pub fn payload_json(&self) -> EnvelopeResult<Value> {
        Ok(serde_json::from_slice(self.payload.as_slice())?)
    }

    /// Read one envelope with default options
    ///
    /// # Errors
    ///
    /// Returns a framing error on marker mismatch, or I/O error on short input
    pub fn read<R: EnvelopeInput>(input: &mut R) -> EnvelopeResult<Self> {
        EnvelopeReader::default().read(input)
    }

    /// Read one envelope from an async source with default options
    ///
    /// # Errors
    ///
    /// Returns a framing error on marker mismatch, or I/O error on short input
    pub async fn read_async<R: AsyncRead + Unpin>(input: &mut R) -> EnvelopeResult<Self> {
        EnvelopeReader::default().read_async(input).await
    }

    /// Decode an envelope from an in-memory buffer
    ///
    /// # Errors
    ///
    /// See [`Envelope::read`]
    pub fn from_bytes(bytes: &[u8]) -> EnvelopeResult<Self> {
        let mut input = bytes;
        Self::read(&mut input)
    }

    /// Encode the whole envelope into one buffer
    ///
    /// # Errors
    ///
    /// Returns error if a section is too long for its length field
    pub fn to_bytes(&self) -> EnvelopeResult<Vec<u8>> {
        let meta = serde_json::to_vec(&self.meta)?;
        let header = Header::for_lengths(meta.len(), self.payload.len())?;
        let mut out = Vec::with_capacity(HEADER_LEN + meta.len() + self.payload.len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&meta);
        out.extend_from_slice(self.payload.as_slice());
        Ok(out)
    }

    /// Write the envelope to a sink and flush it.
    ///
    /// Mapped payloads are written straight from the mapping.
    ///
    /// # Errors
    ///
    /// Returns error on oversize sections or I/O failure
    pub fn write_to<W: Write>(&self, output: &mut W) -> EnvelopeResult<()> {
        let meta = serde_json::to_vec(&self.meta)?;
        let header = Header::for_lengths(meta.len(), self.payload.len())?;
        output.write_all(&header.encode())?;
        output.write_all(&meta)?;
        output.write_all(self.payload.as_slice())?;
        output.flush()?;
        Ok(())
    }

    /// Async variant of [`Envelope::write_to`]
    ///
    /// # Errors
    ///
    /// Returns error on oversize sections or I/O failure
    pub async fn write_async<W: AsyncWrite + Unpin>(&self, output: &mut W) -> EnvelopeResult<()> {
        let meta = serde_json::to_vec(&self.meta)?;
        let header = Header::for_lengths(meta.len(), self.payload.len())?;
        output.write_all(&header.encode()).await?;
        output.write_all(&meta).await?;
        output.write_all(self.payload.as_slice()).await?;
        output.flush().await?;
        Ok(())
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.meta)
    }
}

/// Reader options for large payloads
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeReader {
    /// Payloads at least this long are mapped instead of buffered
    pub spill_threshold: usize,
    /// Chunk size used while spooling to a temp file
    pub chunk_size: usize,
    /// Metadata blocks longer than this are rejected before allocation
    pub max_meta_len: usize,
}

impl Default for EnvelopeReader {
    fn default() -> Self {
        Self {
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_meta_len: DEFAULT_MAX_META_LEN,
        }
    }
}

impl EnvelopeReader {
    /// Create a reader with default thresholds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the spill threshold
    #[must_use]
    pub fn with_spill_threshold(mut self, bytes: usize) -> Self {
        self.spill_threshold = bytes;
        self
    }

    /// Set the spool chunk size (minimum 1)
    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Set the metadata length limit
    #[must_use]
    pub fn with_max_meta_len(mut self, bytes: usize) -> Self {
        self.max_meta_len = bytes;
        self
    }

    fn meta_buffer(&self, header: &Header) -> EnvelopeResult<Vec<u8>> {
        let len = header.meta_len as usize;
        if len > self.max_meta_len {
            return Err(EnvelopeError::MetaLimit {
                len: header.meta_len,
                limit: self.max_meta_len,
            });
        }
        Ok(vec![0u8; len])
    }

    /// Read one envelope
    ///
    /// # Errors
    ///
    /// Returns a framing error on marker mismatch, or I/O error on short input
    pub fn read<R: EnvelopeInput>(&self, input: &mut R) -> EnvelopeResult<Envelope> {
        let mut buf = [0u8; HEADER_LEN];
        input.read_exact(&mut buf[..2])?;
        Header::check_magic([buf[0], buf[1]])?;
        input.read_exact(&mut buf[2..])?;
        let header = Header::decode(&buf)?;

        let mut meta = self.meta_buffer(&header)?;
        input.read_exact(&mut meta)?;
        let meta = parse_meta(&meta)?;

        let len = header.data_len as usize;
        let payload = if len == 0 {
            Payload::empty()
        } else if len < self.spill_threshold {
            let mut data = vec![0u8; len];
            input.read_exact(&mut data)?;
            Payload::from(data)
        } else {
            self.read_large(input, len)?
        };

        Ok(Envelope { meta, payload })
    }

    /// Read one envelope from an async source.
    ///
    /// Large payloads always go through a temp file.
    ///
    /// # Errors
    ///
    /// Returns a framing error on marker mismatch, or I/O error on short input
    pub async fn read_async<R: AsyncRead + Unpin>(&self, input: &mut R) -> EnvelopeResult<Envelope> {
        let mut buf = [0u8; HEADER_LEN];
        input.read_exact(&mut buf[..2]).await?;
        Header::check_magic([buf[0], buf[1]])?;
        input.read_exact(&mut buf[2..]).await?;
        let header = Header::decode(&buf)?;

        let mut meta = self.meta_buffer(&header)?;
        input.read_exact(&mut meta).await?;
        let meta = parse_meta(&meta)?;

        let len = header.data_len as usize;
        let payload = if len == 0 {
            Payload::empty()
        } else if len < self.spill_threshold {
            let mut data = vec![0u8; len];
            input.read_exact(&mut data).await?;
            Payload::from(data)
        } else {
            let spool = tokio::fs::File::from_std(tempfile::tempfile()?);
            let spool = self.spool_async(input, spool, len).await?;
            map_spool(spool, len)?
        };

        Ok(Envelope { meta, payload })
    }

    fn read_large<R: EnvelopeInput>(&self, input: &mut R, len: usize) -> EnvelopeResult<Payload> {
        if let Some(file) = input.as_file() {
            if file.metadata()?.is_file() {
                return map_in_place(file, len);
            }
        }

        let mut spool = tempfile::tempfile()?;
        let mut chunk = vec![0u8; self.chunk_size.min(len)];
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(chunk.len());
            input.read_exact(&mut chunk[..n])?;
            spool.write_all(&chunk[..n])?;
            remaining -= n;
        }
        spool.flush()?;
        map_spool(spool, len)
    }

    async fn spool_async<R: AsyncRead + Unpin>(
        &self,
        input: &mut R,
        mut spool: tokio::fs::File,
        len: usize,
    ) -> EnvelopeResult<File> {
        let mut chunk = vec![0u8; self.chunk_size.min(len)];
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(chunk.len());
            input.read_exact(&mut chunk[..n]).await?;
            spool.write_all(&chunk[..n]).await?;
            remaining -= n;
        }
        spool.flush().await?;
        Ok(spool.into_std().await)
    }
}

fn parse_meta(bytes: &[u8]) -> EnvelopeResult<Value> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(EnvelopeError::from)
}

fn map_in_place(file: &mut File, len: usize) -> EnvelopeResult<Payload> {
    let offset = file.stream_position()?;
    let available = file.metadata()?.len().saturating_sub(offset);
    if available < len as u64 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("payload needs {len} bytes, file has {available} left"),
        )
        .into());
    }

    // SAFETY: the mapping is read-only; callers must not truncate the file
    // while the envelope is alive.
    let map = unsafe { MmapOptions::new().offset(offset).len(len).map(&*file)? };
    file.seek(SeekFrom::Start(offset + len as u64))?;
    debug!(len, offset, "mapped envelope payload in place");
    Ok(Payload::Mapped(MappedPayload::new(map, None)))
}

fn map_spool(spool: File, len: usize) -> EnvelopeResult<Payload> {
    // SAFETY: the temp file is anonymous and owned by the payload.
    let map = unsafe { MmapOptions::new().len(len).map(&spool)? };
    debug!(len, "spooled envelope payload to temp file");
    Ok(Payload::Mapped(MappedPayload::new(map, Some(spool))))
}
