//! Array-aware byte transport.
//!
//! The lowest layer of serprims:
//! - [`ByteOrder`] converts primitives to and from fixed-endian bytes
//! - [`ByteWriter`] / [`ByteReader`] buffer whole primitive arrays over any
//!   `Write` / `Read`
//! - [`StreamSplitter`] and [`ParallelSplitter`] fan one write stream out to
//!   many destinations
//!
//! Everything above (batching, object graphs) writes through the
//! [`DataOutput`] contract defined here.

pub mod config;
pub mod conversion;
pub mod error;
pub mod fanout;
pub mod primitive;
pub mod reader;
pub mod splitter;
pub mod traits;
pub mod writer;

pub use config::{SplitterConfig, TransportConfig};
pub use conversion::ByteOrder;
pub use error::{Result, TransportError};
pub use fanout::ParallelSplitter;
pub use primitive::{
    ArrayMut, ArraySlice, Primitive, PrimitiveArray, PrimitiveKind, Scalar, SharedArray,
};
pub use reader::ByteReader;
pub use splitter::{DestinationFailure, DestinationId, FanOutError, StreamSplitter};
pub use traits::{ByteSink, DataOutput};
pub use writer::ByteWriter;
