//! Layered binary serialization with object-graph sharing.
//!
//! serprims writes primitive values, arrays, strings, and whole object graphs
//! to any byte stream, and fans a stream out to many destinations.
//!
//! # Crate Structure
//!
//! - [`transport`] - Buffered byte transport, endian conversion, splitters
//! - [`batch`] - Scalars grouped by primitive kind into framed batches
//! - [`graph`] - Object graphs with handles, type codes, and control codes

/// Re-export transport types.
pub mod transport {
    pub use serprims_transport::*;
}

/// Re-export batch types.
pub mod batch {
    pub use serprims_batch::*;
}

/// Re-export graph types.
pub mod graph {
    pub use serprims_graph::*;
}
