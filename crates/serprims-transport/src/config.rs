use crate::conversion::ByteOrder;

/// Default byte buffer size: 16 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Smallest usable buffer; must hold the widest primitive.
pub const MIN_BUFFER_SIZE: usize = 16;

/// Default number of fan-out workers running at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Configuration for byte readers and writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Size of the single reusable buffer, in bytes. Default: 16 KiB.
    pub buffer_size: usize,
    /// Byte order for multi-byte primitives. Default: big-endian.
    pub byte_order: ByteOrder,
}

impl TransportConfig {
    /// Buffer size actually allocated (never below [`MIN_BUFFER_SIZE`]).
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(MIN_BUFFER_SIZE)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            byte_order: ByteOrder::default(),
        }
    }
}

/// Configuration for stream splitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Evict a destination from the active set after it fails.
    pub remove_on_error: bool,
    /// Maximum worker threads writing at once in the parallel variant.
    pub max_in_flight: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            remove_on_error: false,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}
