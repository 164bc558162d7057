use std::io::Write;

use bytes::BytesMut;
use tracing::trace;

use crate::config::TransportConfig;
use crate::conversion::ByteOrder;
use crate::error::Result;
use crate::primitive::{ArraySlice, Primitive, Scalar};
use crate::traits::{flush_retrying, write_all_retrying, DataOutput};

/// Buffered primitive writer over any `Write` sink.
///
/// Owns one reusable buffer. Values are encoded into it and the buffer is
/// pushed to the sink whenever the next value would overflow it. Byte
/// arrays larger than the buffer skip it entirely.
pub struct ByteWriter<W> {
    inner: W,
    buf: BytesMut,
    capacity: usize,
    order: ByteOrder,
    count: u64,
    config: TransportConfig,
}

impl<W: Write> ByteWriter<W> {
    /// Create a new byte writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, TransportConfig::default())
    }

    /// Create a new byte writer with explicit configuration.
    pub fn with_config(inner: W, config: TransportConfig) -> Self {
        let capacity = config.effective_buffer_size();
        Self {
            inner,
            buf: BytesMut::with_capacity(capacity),
            capacity,
            order: config.byte_order,
            count: 0,
            config,
        }
    }

    /// Write one primitive.
    pub fn write_scalar<T: Primitive>(&mut self, value: T) -> Result<()> {
        if self.buf.len() + T::SIZE > self.capacity {
            self.drain()?;
        }
        let start = self.buf.len();
        self.buf.resize(start + T::SIZE, 0);
        self.order.encode(value, &mut self.buf, start);
        self.count += T::SIZE as u64;
        Ok(())
    }

    /// Write a whole slice.
    pub fn write_array<T: Primitive>(&mut self, values: &[T]) -> Result<()> {
        let total = values.len() * T::SIZE;
        if total == 0 {
            return Ok(());
        }

        if self.buf.len() + total <= self.capacity {
            let start = self.buf.len();
            self.buf.resize(start + total, 0);
            self.order.encode_slice(values, &mut self.buf, start);
            self.count += total as u64;
            return Ok(());
        }

        if total > self.capacity {
            if let Some(bytes) = T::as_bytes(values) {
                self.drain()?;
                trace!(len = bytes.len(), "byte array bypasses buffer");
                write_all_retrying(&mut self.inner, bytes)?;
                self.count += total as u64;
                return Ok(());
            }
        }

        let mut done = 0usize;
        while done < values.len() {
            let room = (self.capacity - self.buf.len()) / T::SIZE;
            if room == 0 {
                self.drain()?;
                continue;
            }
            let take = room.min(values.len() - done);
            let start = self.buf.len();
            self.buf.resize(start + take * T::SIZE, 0);
            self.order
                .encode_slice(&values[done..done + take], &mut self.buf, start);
            done += take;
        }
        self.count += total as u64;
        Ok(())
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_array(bytes)
    }

    /// Make room for `hint` more bytes.
    ///
    /// Pushes pending bytes to the sink when `hint` would overflow the
    /// buffer. A hint of at least the buffer size always pushes.
    pub fn flush_hint(&mut self, hint: usize) -> Result<()> {
        if hint >= self.capacity || self.buf.len() + hint > self.capacity {
            self.drain()?;
        }
        Ok(())
    }

    /// Push pending bytes and flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.drain()?;
        flush_retrying(&mut self.inner)
    }

    /// Bytes accepted since creation or the last counter reset.
    pub fn bytes_transferred(&self) -> u64 {
        self.count
    }

    /// Reset the byte counter to zero.
    pub fn reset_byte_counter(&mut self) {
        self.count = 0;
    }

    /// Bytes currently held in the buffer.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Size of the reusable buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Byte order used for encoding.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Current writer configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the writer and return the sink. Unflushed bytes are dropped.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn drain(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        trace!(len = self.buf.len(), "draining byte buffer");
        write_all_retrying(&mut self.inner, &self.buf)?;
        self.buf.clear();
        Ok(())
    }
}

impl<W: Write> DataOutput for ByteWriter<W> {
    fn write_scalar_value(&mut self, value: Scalar) -> Result<()> {
        crate::dispatch_primitive!(Scalar, value, v => self.write_scalar(v))
    }

    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()> {
        crate::dispatch_primitive!(ArraySlice, values, v => self.write_array(v))
    }

    fn flush(&mut self) -> Result<()> {
        ByteWriter::flush(self)
    }
}
