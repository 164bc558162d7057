//! Parallel fan-out.
//!
//! [`ParallelSplitter`] writes to every destination concurrently, one scoped
//! worker per destination, bounded by an in-flight limit. A gate lock is held
//! for the whole broadcast, so concurrent callers never interleave their
//! writes on any destination and registration changes wait for in-flight
//! broadcasts to finish.

use std::sync::mpsc;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, trace};

use crate::config::SplitterConfig;
use crate::error::Result;
use crate::primitive::{ArraySlice, Scalar};
use crate::splitter::{settle, DestinationFailure, DestinationId};
use crate::traits::DataOutput;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counting semaphore for worker threads.
struct InFlightLimit {
    available: Mutex<usize>,
    released: Condvar,
    max: usize,
}

impl InFlightLimit {
    fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            available: Mutex::new(max),
            released: Condvar::new(),
            max,
        }
    }

    fn acquire(&self) -> Permit<'_> {
        let mut available = lock(&self.available);
        while *available == 0 {
            available = self
                .released
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        Permit { limit: self }
    }
}

/// Returned to the limit on drop.
struct Permit<'a> {
    limit: &'a InFlightLimit,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut available = lock(&self.limit.available);
        *available += 1;
        self.limit.released.notify_one();
    }
}

struct Members<D> {
    destinations: Vec<(DestinationId, D)>,
    next_id: u64,
}

/// Concurrent fan-out over destinations of one type.
///
/// All operations take `&self`; share the splitter across threads with an
/// `Arc`. It also implements [`DataOutput`] so it can be stacked under the
/// batch or graph layers.
pub struct ParallelSplitter<D> {
    gate: Mutex<Members<D>>,
    limit: InFlightLimit,
    remove_on_error: bool,
}

impl<D: DataOutput + Send> ParallelSplitter<D> {
    pub fn new() -> Self {
        Self::with_config(SplitterConfig::default())
    }

    pub fn with_config(config: SplitterConfig) -> Self {
        Self {
            gate: Mutex::new(Members {
                destinations: Vec::new(),
                next_id: 1,
            }),
            limit: InFlightLimit::new(config.max_in_flight),
            remove_on_error: config.remove_on_error,
        }
    }

    /// Upper bound on worker threads writing at once.
    pub fn max_in_flight(&self) -> usize {
        self.limit.max
    }

    /// Register a destination. Waits for any in-flight broadcast.
    pub fn add(&self, destination: D) -> DestinationId {
        let mut members = lock(&self.gate);
        let id = DestinationId::new(members.next_id);
        members.next_id += 1;
        members.destinations.push((id, destination));
        debug!(destination = %id, total = members.destinations.len(), "destination added");
        id
    }

    /// Unregister a destination. Waits for any in-flight broadcast.
    pub fn remove(&self, id: DestinationId) -> Option<D> {
        let mut members = lock(&self.gate);
        let pos = members.destinations.iter().position(|(d, _)| *d == id)?;
        let (_, destination) = members.destinations.remove(pos);
        debug!(destination = %id, total = members.destinations.len(), "destination removed");
        Some(destination)
    }

    pub fn len(&self) -> usize {
        lock(&self.gate).destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: DestinationId) -> bool {
        lock(&self.gate).destinations.iter().any(|(d, _)| *d == id)
    }

    /// Run `f` against one destination while holding the gate.
    pub fn inspect<R>(&self, id: DestinationId, f: impl FnOnce(&D) -> R) -> Option<R> {
        let members = lock(&self.gate);
        members
            .destinations
            .iter()
            .find(|(d, _)| *d == id)
            .map(|(_, dest)| f(dest))
    }

    pub fn into_destinations(self) -> Vec<(DestinationId, D)> {
        self.gate
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .destinations
    }

    /// Broadcast one primitive.
    pub fn send_scalar(&self, value: Scalar) -> Result<()> {
        self.broadcast("write_scalar", |d| d.write_scalar_value(value))
    }

    /// Broadcast a slice of one primitive kind.
    pub fn send_array(&self, values: ArraySlice<'_>) -> Result<()> {
        self.broadcast("write_array", |d| d.write_array_slice(values))
    }

    pub fn send_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.send_array(ArraySlice::Byte(bytes))
    }

    pub fn flush_all(&self) -> Result<()> {
        self.broadcast("flush", |d| d.flush())
    }

    pub fn close_all(&self) -> Result<()> {
        self.broadcast("close", |d| d.close())
    }

    fn broadcast<F>(&self, operation: &'static str, op: F) -> Result<()>
    where
        F: Fn(&mut D) -> Result<()> + Sync,
    {
        let mut members = lock(&self.gate);
        let attempted = members.destinations.len();
        trace!(operation, destinations = attempted, "parallel broadcast");

        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            let mut targets = members.destinations.iter_mut();
            let first = targets.next();
            for (id, destination) in targets {
                let permit = self.limit.acquire();
                let tx = tx.clone();
                let op = &op;
                let id = *id;
                scope.spawn(move || {
                    let _permit = permit;
                    let _ = tx.send((id, op(destination)));
                });
            }
            if let Some((id, destination)) = first {
                let _ = tx.send((*id, op(destination)));
            }
        });
        drop(tx);

        let failures = rx
            .into_iter()
            .filter_map(|(destination, result)| {
                result
                    .err()
                    .map(|error| DestinationFailure { destination, error })
            })
            .collect();
        settle(
            operation,
            &mut members.destinations,
            attempted,
            failures,
            self.remove_on_error,
        )
    }
}

impl<D: DataOutput + Send> Default for ParallelSplitter<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DataOutput + Send> DataOutput for ParallelSplitter<D> {
    fn write_scalar_value(&mut self, value: Scalar) -> Result<()> {
        self.send_scalar(value)
    }

    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()> {
        self.send_array(values)
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_all()
    }

    fn close(&mut self) -> Result<()> {
        self.close_all()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, ErrorKind, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::error::TransportError;
    use crate::traits::ByteSink;

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Tracks how many writes are running at the same time.
    struct SlowSink {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Write for SlowSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn every_destination_receives_payload() {
        let splitter = ParallelSplitter::new();
        let ids: Vec<_> = (0..5).map(|_| splitter.add(ByteSink::new(Vec::new()))).collect();

        splitter.send_bytes(b"fan").unwrap();
        splitter.send_scalar(Scalar::Byte(b'!')).unwrap();
        splitter.flush_all().unwrap();

        for id in ids {
            let data = splitter.inspect(id, |d| d.get_ref().clone()).unwrap();
            assert_eq!(data, b"fan!");
        }
    }

    #[test]
    fn failures_are_sorted_and_complete() {
        let splitter: ParallelSplitter<Box<dyn DataOutput + Send>> = ParallelSplitter::new();
        let good = splitter.add(Box::new(ByteSink::new(Vec::new())));
        let bad_a = splitter.add(Box::new(ByteSink::new(FailingSink)));
        let bad_b = splitter.add(Box::new(ByteSink::new(FailingSink)));

        let err = splitter.send_bytes(b"x").unwrap_err();
        let TransportError::FanOut(fanout) = err else {
            panic!("expected fan-out error");
        };
        let failed: Vec<_> = fanout.failures().iter().map(|f| f.destination).collect();
        assert_eq!(failed, vec![bad_a, bad_b]);
        assert!(!fanout.failed(good));
        assert_eq!(fanout.attempted(), 3);
    }

    #[test]
    fn remove_on_error_shrinks_active_set() {
        let config = SplitterConfig {
            remove_on_error: true,
            ..SplitterConfig::default()
        };
        let splitter: ParallelSplitter<Box<dyn DataOutput + Send>> =
            ParallelSplitter::with_config(config);
        splitter.add(Box::new(ByteSink::new(FailingSink)));
        let good = splitter.add(Box::new(ByteSink::new(Vec::new())));

        assert!(splitter.send_bytes(b"x").is_err());
        assert_eq!(splitter.len(), 1);
        assert!(splitter.contains(good));
        splitter.send_bytes(b"y").unwrap();
    }

    #[test]
    fn concurrent_broadcasts_do_not_interleave() {
        let splitter = Arc::new(ParallelSplitter::new());
        let ids: Vec<_> = (0..3).map(|_| splitter.add(ByteSink::new(Vec::new()))).collect();

        let handles: Vec<_> = [0xAAu8, 0xBB]
            .into_iter()
            .map(|tag| {
                let splitter = Arc::clone(&splitter);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        splitter.send_bytes(&[tag; 4]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reference = splitter.inspect(ids[0], |d| d.get_ref().clone()).unwrap();
        assert_eq!(reference.len(), 800);
        for chunk in reference.chunks(4) {
            assert!(chunk.iter().all(|b| *b == chunk[0]), "write torn: {chunk:?}");
        }
        for id in &ids[1..] {
            let data = splitter.inspect(*id, |d| d.get_ref().clone()).unwrap();
            assert_eq!(data, reference, "destinations saw different orders");
        }
    }

    #[test]
    fn in_flight_workers_are_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let config = SplitterConfig {
            max_in_flight: 2,
            ..SplitterConfig::default()
        };
        let splitter = ParallelSplitter::with_config(config);
        for _ in 0..6 {
            splitter.add(ByteSink::new(SlowSink {
                running: Arc::clone(&running),
                peak: Arc::clone(&peak),
            }));
        }

        splitter.send_bytes(b"slow").unwrap();
        // Two workers plus the caller's inline write.
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn usable_as_data_output() {
        let mut splitter = ParallelSplitter::new();
        splitter.add(ByteSink::new(Vec::new()));
        DataOutput::write_bytes(&mut splitter, b"ok").unwrap();
        DataOutput::close(&mut splitter).unwrap();

        let (_, sink) = splitter.into_destinations().remove(0);
        assert_eq!(sink.into_inner(), b"ok");
    }

    #[test]
    fn zero_limit_still_makes_progress() {
        let config = SplitterConfig {
            max_in_flight: 0,
            ..SplitterConfig::default()
        };
        let splitter = ParallelSplitter::with_config(config);
        assert_eq!(splitter.max_in_flight(), 1);
        splitter.add(ByteSink::new(Vec::new()));
        splitter.add(ByteSink::new(Vec::new()));
        splitter.send_bytes(b"z").unwrap();
    }
}
