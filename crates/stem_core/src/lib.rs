//! STEM Core Types
//!
//! Pure types shared by every other crate: context records, task data,
//! specifications and the core error type. No I/O lives here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod data;
pub mod error;
pub mod meta;
pub mod spec;

// Re-exports
pub use data::{Data, DataStream, StreamIter};
pub use error::{CoreError, CoreResult};
pub use meta::{Meta, Record};
pub use spec::{FieldError, FieldSpec, MetaVerifier, Specification, ValueKind};
