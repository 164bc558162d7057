use serprims_batch::BatchConfig;

/// Default initial slot count of the writer's handle and type tables.
pub const DEFAULT_INITIAL_TABLE_CAPACITY: usize = 64;

/// Configuration for graph readers and writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    /// Batch layer settings. Both ends must agree.
    pub batch: BatchConfig,
    /// Initial capacity of the identity tables. Default: 64.
    pub initial_table_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            initial_table_capacity: DEFAULT_INITIAL_TABLE_CAPACITY,
        }
    }
}
