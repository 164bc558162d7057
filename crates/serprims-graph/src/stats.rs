use serde::Serialize;

/// Counters for one side of an object stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Objects, strings, and arrays written or read fresh.
    pub objects: u64,
    /// Fresh objects that bypassed the handle table.
    pub unshared: u64,
    /// References resolved through an existing handle.
    pub back_references: u64,
    /// Null references.
    pub nulls: u64,
    /// Type names declared on the wire.
    pub types_declared: u64,
    /// Control epoch: RESET and CLEAR codes written or consumed so far.
    pub epoch: u64,
    /// Handles live in the current epoch.
    pub live_handles: u64,
    /// Batches flushed or received.
    pub batches: u64,
    /// Bytes handed to or taken from the byte transport.
    pub bytes: u64,
}
