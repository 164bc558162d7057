use std::io::Read;
use std::sync::Arc;

use serprims_transport::{ArrayMut, ByteReader, Primitive, PrimitiveArray, PrimitiveKind, SharedArray};
use tracing::{debug, warn};

use crate::codec::{BatchIndex, INDEX_SIZE};
use crate::config::BatchConfig;
use crate::error::{BatchError, Result};
use crate::mutf8;

/// Elements allocated ahead of the payload that fills them.
const READ_CHUNK_ELEMENTS: usize = 64 * 1024;

/// Reads batches produced by [`BatchWriter`](crate::BatchWriter).
///
/// Every read must mirror the writer's call sequence: the same kinds, the
/// same array lengths, in the same order. A mismatch surfaces as
/// [`BatchError::Desync`] and poisons the reader.
pub struct BatchReader<R> {
    input: ByteReader<R>,
    lanes: [PrimitiveArray; PrimitiveKind::COUNT],
    cursor: [usize; PrimitiveKind::COUNT],
    arrays_left: usize,
    config: BatchConfig,
    poisoned: bool,
    batches: u64,
    arrays: u64,
}

impl<R: Read> BatchReader<R> {
    /// Create a new batch reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, BatchConfig::default())
    }

    /// Create a new batch reader with explicit configuration.
    pub fn with_config(inner: R, config: BatchConfig) -> Self {
        Self {
            input: ByteReader::with_config(inner, config.transport),
            lanes: PrimitiveKind::ALL.map(|kind| PrimitiveArray::zeroed(kind, 0)),
            cursor: [0; PrimitiveKind::COUNT],
            arrays_left: 0,
            config,
            poisoned: false,
            batches: 0,
            arrays: 0,
        }
    }

    /// Read one scalar, receiving the next batch if its lane is drained.
    pub fn read_scalar<T: Primitive>(&mut self) -> Result<T> {
        self.check()?;
        let lane = T::KIND.index();
        if self.lane_left(lane) == 0 {
            self.receive()?;
            if self.lane_left(lane) == 0 {
                return Err(self.desync(format!("batch carries no {} value", T::KIND)));
            }
        }
        let value = self.lanes[lane].get(self.cursor[lane]).and_then(T::from_scalar);
        let Some(value) = value else {
            return Err(self.desync(format!("{} lane holds a foreign value", T::KIND)));
        };
        self.cursor[lane] += 1;
        Ok(value)
    }

    /// Fill `dst` with one array written by `write_array` or
    /// `write_shared_array` of the same length.
    pub fn read_array<T: Primitive>(&mut self, dst: &mut [T]) -> Result<()> {
        self.check()?;
        if dst.len() < self.config.small_array_threshold {
            for slot in dst.iter_mut() {
                *slot = self.read_scalar()?;
            }
            return Ok(());
        }

        self.expect_payload(T::KIND, dst.len())?;
        self.input.read_array(dst)?;
        self.arrays_left -= 1;
        self.arrays += 1;
        Ok(())
    }

    /// Read `len` elements into a vector grown as the payload arrives.
    pub fn read_vec<T: Primitive>(&mut self, len: usize) -> Result<Vec<T>> {
        if len < self.config.small_array_threshold {
            let mut values = vec![T::default(); len];
            self.read_array(&mut values)?;
            return Ok(values);
        }

        self.check()?;
        self.expect_payload(T::KIND, len)?;
        let mut values = Vec::with_capacity(len.min(READ_CHUNK_ELEMENTS));
        while values.len() < len {
            let start = values.len();
            values.resize(len.min(start + READ_CHUNK_ELEMENTS), T::default());
            self.input.read_array(&mut values[start..])?;
        }
        self.arrays_left -= 1;
        self.arrays += 1;
        Ok(values)
    }

    /// Fill a kind-tagged destination.
    pub fn read_array_mut(&mut self, dst: ArrayMut<'_>) -> Result<()> {
        serprims_transport::dispatch_primitive!(ArrayMut, dst, v => self.read_array(v))
    }

    /// Read an array of `len` elements into a fresh allocation.
    pub fn read_array_new(&mut self, kind: PrimitiveKind, len: usize) -> Result<PrimitiveArray> {
        let array = match kind {
            PrimitiveKind::Boolean => PrimitiveArray::Bool(self.read_vec(len)?),
            PrimitiveKind::Byte => PrimitiveArray::Byte(self.read_vec(len)?),
            PrimitiveKind::Char => PrimitiveArray::Char(self.read_vec(len)?),
            PrimitiveKind::Short => PrimitiveArray::Short(self.read_vec(len)?),
            PrimitiveKind::Int => PrimitiveArray::Int(self.read_vec(len)?),
            PrimitiveKind::Long => PrimitiveArray::Long(self.read_vec(len)?),
            PrimitiveKind::Float => PrimitiveArray::Float(self.read_vec(len)?),
            PrimitiveKind::Double => PrimitiveArray::Double(self.read_vec(len)?),
        };
        Ok(array)
    }

    /// Read an array written with `write_shared_array`.
    pub fn read_shared_array(&mut self, kind: PrimitiveKind, len: usize) -> Result<SharedArray> {
        let array = self.read_array_new(kind, len)?;
        Ok(serprims_transport::dispatch_primitive!(
            PrimitiveArray, array, v => Primitive::shared(Arc::<[_]>::from(v))
        ))
    }

    /// Read a string written by `write_utf`.
    pub fn read_utf(&mut self) -> Result<Option<String>> {
        let len = self.read_scalar::<i32>()?;
        if len == -1 {
            return Ok(None);
        }
        let len = usize::try_from(len)
            .map_err(|_| BatchError::InvalidUtf(format!("negative string length {len}")))?;
        let bytes = self.read_vec::<u8>(len)?;
        mutf8::decode(&bytes).map(Some)
    }

    /// True when the current batch has been fully consumed.
    pub fn is_drained(&self) -> bool {
        self.arrays_left == 0 && (0..PrimitiveKind::COUNT).all(|lane| self.lane_left(lane) == 0)
    }

    /// True after a protocol failure.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Batches received so far.
    pub fn batches_received(&self) -> u64 {
        self.batches
    }

    /// Whole-array payloads consumed so far.
    pub fn arrays_received(&self) -> u64 {
        self.arrays
    }

    /// Bytes consumed from the byte transport so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.input.bytes_transferred()
    }

    /// Current reader configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &R {
        self.input.get_ref()
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        self.input.get_mut()
    }

    /// Consume the reader and return the source.
    pub fn into_inner(self) -> R {
        self.input.into_inner()
    }

    fn lane_left(&self, lane: usize) -> usize {
        self.lanes[lane].len() - self.cursor[lane]
    }

    fn check(&self) -> Result<()> {
        if self.poisoned {
            return Err(BatchError::Poisoned);
        }
        Ok(())
    }

    /// Make sure a whole-array payload is pending, receiving a batch if not.
    fn expect_payload(&mut self, kind: PrimitiveKind, len: usize) -> Result<()> {
        if self.arrays_left == 0 {
            self.receive()?;
            if self.arrays_left == 0 {
                return Err(self.desync(format!("expected a {len}-element {kind} array payload")));
            }
        }
        Ok(())
    }

    fn desync(&mut self, reason: String) -> BatchError {
        warn!(%reason, "batch stream desynchronized");
        self.poisoned = true;
        BatchError::Desync { reason }
    }

    /// Read the next index record and its scalar segments.
    fn receive(&mut self) -> Result<()> {
        if !self.is_drained() {
            let scalars: usize = (0..PrimitiveKind::COUNT).map(|l| self.lane_left(l)).sum();
            let reason = format!(
                "next batch requested with {scalars} scalars and {} arrays unread",
                self.arrays_left
            );
            return Err(self.desync(reason));
        }

        let mut header = [0u8; INDEX_SIZE];
        self.input.read_bytes(&mut header)?;
        let index = match BatchIndex::decode(self.input.byte_order(), &header) {
            Ok(index) => index,
            Err(err) => {
                warn!(error = %err, "rejected batch index");
                self.poisoned = true;
                return Err(err);
            }
        };

        for (lane, kind) in PrimitiveKind::ALL.iter().enumerate() {
            let count = index.count(*kind);
            if count > self.config.lane_capacity(*kind) {
                warn!(%kind, count, "batch lane exceeds configured capacity");
                self.poisoned = true;
                return Err(BatchError::InvalidIndex {
                    slot: lane,
                    value: i32::try_from(count).unwrap_or(i32::MAX),
                });
            }
            self.lanes[lane].resize(count);
            self.cursor[lane] = 0;
            if count > 0 {
                self.input.read_array_mut(self.lanes[lane].as_mut())?;
            }
        }
        self.arrays_left = index.arrays;
        self.batches += 1;
        debug!(
            scalars = index.scalars(),
            arrays = index.arrays,
            batch = self.batches,
            "batch received"
        );
        Ok(())
    }
}
