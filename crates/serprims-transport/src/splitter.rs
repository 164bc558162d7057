//! Fan-out of the primitive write contract to many destinations.
//!
//! Every operation is attempted on every destination. Failures are
//! collected per destination and surfaced once, after the last destination
//! has been tried, as a single [`FanOutError`].

use std::fmt;
use std::io;

use tracing::{debug, warn};

use crate::config::SplitterConfig;
use crate::error::{Result, TransportError};
use crate::primitive::{ArraySlice, Scalar};
use crate::traits::DataOutput;

/// Identifier handed out by [`StreamSplitter::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationId(u64);

impl DestinationId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dest-{}", self.0)
    }
}

/// One destination's failure within a broadcast.
#[derive(Debug)]
pub struct DestinationFailure {
    pub destination: DestinationId,
    pub error: TransportError,
}

/// Aggregate failure of a broadcast.
///
/// Destinations not listed here received the write.
#[derive(Debug)]
pub struct FanOutError {
    operation: &'static str,
    attempted: usize,
    failures: Vec<DestinationFailure>,
}

impl FanOutError {
    pub(crate) fn new(
        operation: &'static str,
        attempted: usize,
        failures: Vec<DestinationFailure>,
    ) -> Self {
        Self {
            operation,
            attempted,
            failures,
        }
    }

    /// The broadcast operation that failed (e.g. `write_array`).
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Number of destinations the operation was attempted on.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Every failing destination with its error, in destination order.
    pub fn failures(&self) -> &[DestinationFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<DestinationFailure> {
        self.failures
    }

    /// True if `id` is among the failing destinations.
    pub fn failed(&self, id: DestinationId) -> bool {
        self.failures.iter().any(|f| f.destination == id)
    }
}

impl fmt::Display for FanOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed on {} of {} destinations",
            self.operation,
            self.failures.len(),
            self.attempted
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{}: {}", failure.destination, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for FanOutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| &f.error as &(dyn std::error::Error + 'static))
    }
}

/// Collect failures from one broadcast round and apply the eviction policy.
pub(crate) fn settle<D>(
    operation: &'static str,
    destinations: &mut Vec<(DestinationId, D)>,
    attempted: usize,
    mut failures: Vec<DestinationFailure>,
    remove_on_error: bool,
) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    failures.sort_by_key(|f| f.destination);
    for failure in &failures {
        warn!(
            destination = %failure.destination,
            operation,
            error = %failure.error,
            "fan-out destination failed"
        );
    }
    if remove_on_error {
        destinations.retain(|(id, _)| !failures.iter().any(|f| f.destination == *id));
        debug!(
            evicted = failures.len(),
            remaining = destinations.len(),
            "evicted failing destinations"
        );
    }
    Err(FanOutError::new(operation, attempted, failures).into())
}

/// Sequential fan-out over destinations of one type.
///
/// Use `Box<dyn DataOutput>` as `D` to mix destination kinds.
pub struct StreamSplitter<D> {
    destinations: Vec<(DestinationId, D)>,
    next_id: u64,
    remove_on_error: bool,
}

impl<D> StreamSplitter<D> {
    pub fn new() -> Self {
        Self::with_config(SplitterConfig::default())
    }

    pub fn with_config(config: SplitterConfig) -> Self {
        Self {
            destinations: Vec::new(),
            next_id: 1,
            remove_on_error: config.remove_on_error,
        }
    }

    /// Evict destinations from the active set after they fail.
    pub fn with_remove_on_error(mut self, enabled: bool) -> Self {
        self.remove_on_error = enabled;
        self
    }

    /// Register a destination.
    pub fn add(&mut self, destination: D) -> DestinationId {
        let id = DestinationId::new(self.next_id);
        self.next_id += 1;
        self.destinations.push((id, destination));
        debug!(destination = %id, total = self.destinations.len(), "destination added");
        id
    }

    /// Unregister a destination, handing it back.
    pub fn remove(&mut self, id: DestinationId) -> Option<D> {
        let pos = self.destinations.iter().position(|(d, _)| *d == id)?;
        let (_, destination) = self.destinations.remove(pos);
        debug!(destination = %id, total = self.destinations.len(), "destination removed");
        Some(destination)
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn contains(&self, id: DestinationId) -> bool {
        self.destinations.iter().any(|(d, _)| *d == id)
    }

    /// Active destination ids in registration order.
    pub fn ids(&self) -> Vec<DestinationId> {
        self.destinations.iter().map(|(id, _)| *id).collect()
    }

    pub fn get(&self, id: DestinationId) -> Option<&D> {
        self.destinations
            .iter()
            .find(|(d, _)| *d == id)
            .map(|(_, dest)| dest)
    }

    pub fn get_mut(&mut self, id: DestinationId) -> Option<&mut D> {
        self.destinations
            .iter_mut()
            .find(|(d, _)| *d == id)
            .map(|(_, dest)| dest)
    }

    /// Consume the splitter and return its destinations.
    pub fn into_destinations(self) -> Vec<(DestinationId, D)> {
        self.destinations
    }
}

impl<D> Default for StreamSplitter<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DataOutput> StreamSplitter<D> {
    fn broadcast<F>(&mut self, operation: &'static str, mut op: F) -> Result<()>
    where
        F: FnMut(&mut D) -> Result<()>,
    {
        let attempted = self.destinations.len();
        let mut failures = Vec::new();
        for (id, destination) in &mut self.destinations {
            if let Err(error) = op(destination) {
                failures.push(DestinationFailure {
                    destination: *id,
                    error,
                });
            }
        }
        settle(
            operation,
            &mut self.destinations,
            attempted,
            failures,
            self.remove_on_error,
        )
    }
}

impl<D: DataOutput> DataOutput for StreamSplitter<D> {
    fn write_scalar_value(&mut self, value: Scalar) -> Result<()> {
        self.broadcast("write_scalar", |d| d.write_scalar_value(value))
    }

    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()> {
        self.broadcast("write_array", |d| d.write_array_slice(values))
    }

    fn flush(&mut self) -> Result<()> {
        self.broadcast("flush", |d| d.flush())
    }

    fn close(&mut self) -> Result<()> {
        self.broadcast("close", |d| d.close())
    }
}

/// Byte-level view: lets a `ByteWriter` sit on top of a splitter.
impl<D: DataOutput> io::Write for StreamSplitter<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        DataOutput::flush(self).map_err(io::Error::other)
    }
}
