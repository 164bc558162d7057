//! Typed batching over the serprims byte transport.
//!
//! Scalars are grouped into one lane per primitive kind and framed as
//! batches:
//! - a nine-int index record (eight kind counts, then the array count)
//! - each non-empty lane as one packed segment, in kind order
//! - whole-array payloads, in the order they were written
//!
//! Arrays below a configured length are unrolled into the lanes, so short
//! arrays cost nothing beyond their elements.

pub mod codec;
pub mod config;
pub mod error;
pub mod mutf8;
pub mod reader;
pub mod writer;

pub use codec::{BatchIndex, INDEX_FIELDS, INDEX_SIZE};
pub use config::{BatchConfig, DEFAULT_SCALAR_BUFFER_BYTES, DEFAULT_SMALL_ARRAY_THRESHOLD};
pub use error::{BatchError, Result};
pub use reader::BatchReader;
pub use writer::BatchWriter;
