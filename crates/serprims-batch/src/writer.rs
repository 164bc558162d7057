use std::collections::VecDeque;
use std::io::{self, ErrorKind, Write};

use bytes::BytesMut;
use serprims_transport::{
    ArraySlice, ByteWriter, DataOutput, Primitive, PrimitiveArray, PrimitiveKind, Result, Scalar,
    SharedArray, TransportError,
};
use tracing::{debug, trace};

use crate::codec::{BatchIndex, INDEX_SIZE};
use crate::config::BatchConfig;
use crate::mutf8;

/// Groups scalar writes by primitive kind and frames them as batches.
///
/// Each kind has its own lane. A batch is emitted when a lane fills, when a
/// large borrowed array is written, or on an explicit flush. Writes can only
/// fail in the byte transport below, so every method returns the transport's
/// error type.
pub struct BatchWriter<W> {
    out: ByteWriter<W>,
    lanes: [PrimitiveArray; PrimitiveKind::COUNT],
    capacity: [usize; PrimitiveKind::COUNT],
    queued: VecDeque<SharedArray>,
    header: BytesMut,
    config: BatchConfig,
    batches: u64,
    arrays: u64,
}

impl<W: Write> BatchWriter<W> {
    /// Create a new batch writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, BatchConfig::default())
    }

    /// Create a new batch writer with explicit configuration.
    pub fn with_config(inner: W, config: BatchConfig) -> Self {
        Self {
            out: ByteWriter::with_config(inner, config.transport),
            lanes: PrimitiveKind::ALL.map(|kind| PrimitiveArray::zeroed(kind, 0)),
            capacity: PrimitiveKind::ALL.map(|kind| config.lane_capacity(kind)),
            queued: VecDeque::new(),
            header: BytesMut::with_capacity(INDEX_SIZE),
            config,
            batches: 0,
            arrays: 0,
        }
    }

    /// Append one scalar to its kind's lane.
    pub fn write_scalar<T: Primitive>(&mut self, value: T) -> Result<()> {
        let lane = T::KIND.index();
        if self.lanes[lane].len() >= self.capacity[lane] {
            self.flush_batch()?;
        }
        self.lanes[lane].push(value.into_scalar());
        Ok(())
    }

    /// Write a whole array.
    ///
    /// Arrays shorter than the small-array threshold are unrolled into the
    /// scalar lane. Longer ones end the current batch: the slice is only
    /// borrowed, so it goes out right away as the batch's last payload.
    pub fn write_array<T: Primitive>(&mut self, values: &[T]) -> Result<()> {
        if values.len() < self.config.small_array_threshold {
            return self.unroll(values);
        }
        self.emit(Some(T::slice(values)))
    }

    /// Queue a shared array as a whole-array payload without copying it.
    ///
    /// Unlike [`write_array`](Self::write_array) this does not end the
    /// batch. Short arrays are unrolled the same way.
    pub fn write_shared_array(&mut self, values: SharedArray) -> Result<()> {
        if values.len() < self.config.small_array_threshold {
            return serprims_transport::dispatch_primitive!(
                SharedArray, &values, v => self.unroll(&v[..])
            );
        }
        trace!(kind = %values.kind(), len = values.len(), "queued shared array");
        self.queued.push_back(values);
        Ok(())
    }

    /// Write an optional string as an `i32` byte length (`-1` for `None`)
    /// followed by its modified UTF-8 bytes.
    pub fn write_utf(&mut self, text: Option<&str>) -> Result<()> {
        let Some(text) = text else {
            return self.write_scalar(-1i32);
        };
        let bytes = mutf8::encode(text);
        let len = i32::try_from(bytes.len()).map_err(|_| {
            TransportError::Io(io::Error::new(
                ErrorKind::InvalidInput,
                "string longer than i32::MAX encoded bytes",
            ))
        })?;
        self.write_scalar(len)?;
        self.write_array(&bytes)
    }

    /// Emit the current batch, if it holds anything.
    pub fn flush_batch(&mut self) -> Result<()> {
        self.emit(None)
    }

    /// Emit the current batch and flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_batch()?;
        self.out.flush()
    }

    /// Scalars waiting in the lanes.
    pub fn pending_scalars(&self) -> usize {
        self.lanes.iter().map(PrimitiveArray::len).sum()
    }

    /// Shared arrays waiting for the next batch.
    pub fn pending_arrays(&self) -> usize {
        self.queued.len()
    }

    /// Batches emitted so far.
    pub fn batches_flushed(&self) -> u64 {
        self.batches
    }

    /// Whole-array payloads emitted so far.
    pub fn arrays_flushed(&self) -> u64 {
        self.arrays
    }

    /// Bytes handed to the byte transport so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.out.bytes_transferred()
    }

    /// Current writer configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        self.out.get_ref()
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        self.out.get_mut()
    }

    /// Consume the writer and return the sink. Unflushed batches are dropped.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn unroll<T: Primitive>(&mut self, values: &[T]) -> Result<()> {
        let lane = T::KIND.index();
        let mut done = 0usize;
        while done < values.len() {
            let room = self.capacity[lane].saturating_sub(self.lanes[lane].len());
            if room == 0 {
                self.flush_batch()?;
                continue;
            }
            let take = room.min(values.len() - done);
            self.lanes[lane].extend_from_slice(T::slice(&values[done..done + take]));
            done += take;
        }
        Ok(())
    }

    /// Write index, lanes, queued arrays, then `last` if given.
    fn emit(&mut self, last: Option<ArraySlice<'_>>) -> Result<()> {
        let index = BatchIndex {
            counts: std::array::from_fn(|i| self.lanes[i].len()),
            arrays: self.queued.len() + usize::from(last.is_some()),
        };
        if index.is_empty() {
            return Ok(());
        }

        self.header.clear();
        index
            .encode(self.out.byte_order(), &mut self.header)
            .map_err(|err| TransportError::Io(io::Error::new(ErrorKind::InvalidData, err)))?;
        self.out.write_bytes(&self.header)?;

        for lane in &mut self.lanes {
            if !lane.is_empty() {
                self.out.write_array_slice(lane.as_slice())?;
                lane.clear();
            }
        }
        while let Some(array) = self.queued.pop_front() {
            self.out.write_array_slice(array.as_slice())?;
        }
        if let Some(array) = last {
            self.out.write_array_slice(array)?;
        }

        self.batches += 1;
        self.arrays += index.arrays as u64;
        debug!(
            scalars = index.scalars(),
            arrays = index.arrays,
            batch = self.batches,
            "batch flushed"
        );
        Ok(())
    }
}

impl<W: Write> DataOutput for BatchWriter<W> {
    fn write_scalar_value(&mut self, value: Scalar) -> Result<()> {
        serprims_transport::dispatch_primitive!(Scalar, value, v => self.write_scalar(v))
    }

    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()> {
        serprims_transport::dispatch_primitive!(ArraySlice, values, v => self.write_array(v))
    }

    fn flush(&mut self) -> Result<()> {
        BatchWriter::flush(self)
    }
}
