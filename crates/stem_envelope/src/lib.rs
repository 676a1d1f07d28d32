//! STEM envelope protocol
//!
//! Length-prefixed binary frame carrying a JSON metadata block and a raw
//! payload. Used on every hop between clients, distributors, worker units
//! and process-pool children.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod error;
pub mod header;
pub mod payload;

// Re-exports
pub use envelope::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_META_LEN, DEFAULT_SPILL_THRESHOLD, Envelope, EnvelopeInput,
    EnvelopeReader,
};
pub use error::{EnvelopeError, EnvelopeResult};
pub use header::{HEADER_LEN, Header};
pub use payload::{MappedPayload, Payload};
