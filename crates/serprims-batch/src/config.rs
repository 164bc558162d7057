use serprims_transport::{PrimitiveKind, TransportConfig};

/// Default per-kind scalar buffer size: 8 KiB.
pub const DEFAULT_SCALAR_BUFFER_BYTES: usize = 8 * 1024;

/// Default element count at which arrays stop being unrolled into the
/// scalar buffers.
pub const DEFAULT_SMALL_ARRAY_THRESHOLD: usize = 64;

/// Configuration for batch readers and writers.
///
/// Both ends of a stream must use the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Byte transport settings.
    pub transport: TransportConfig,
    /// Bytes reserved for each kind's scalar buffer. Default: 8 KiB.
    pub scalar_buffer_bytes: usize,
    /// Arrays shorter than this are unrolled as scalars. Default: 64.
    pub small_array_threshold: usize,
}

impl BatchConfig {
    /// Scalars of `kind` held before a batch must be flushed.
    pub fn lane_capacity(&self, kind: PrimitiveKind) -> usize {
        (self.scalar_buffer_bytes / kind.size()).max(1)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            scalar_buffer_bytes: DEFAULT_SCALAR_BUFFER_BYTES,
            small_array_threshold: DEFAULT_SMALL_ARRAY_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_capacity_scales_with_kind_size() {
        let config = BatchConfig::default();
        assert_eq!(config.lane_capacity(PrimitiveKind::Byte), 8192);
        assert_eq!(config.lane_capacity(PrimitiveKind::Int), 2048);
        assert_eq!(config.lane_capacity(PrimitiveKind::Double), 1024);

        let tiny = BatchConfig {
            scalar_buffer_bytes: 3,
            ..BatchConfig::default()
        };
        assert_eq!(tiny.lane_capacity(PrimitiveKind::Long), 1);
    }
}
