use std::io::{ErrorKind, Write};

use crate::error::{Result, TransportError};
use crate::primitive::{ArraySlice, Scalar};

/// The primitive write contract shared by every output layer.
///
/// Object-safe so heterogeneous destinations can sit behind one splitter.
/// Streams that only move raw bytes implement the byte variants and answer
/// everything else with [`TransportError::Unsupported`].
pub trait DataOutput {
    /// Write one kind-tagged primitive.
    fn write_scalar_value(&mut self, value: Scalar) -> Result<()>;

    /// Write a whole slice of one primitive kind.
    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()>;

    /// Push everything written so far to the underlying sink.
    fn flush(&mut self) -> Result<()>;

    /// Flush and release the destination. Writes after close are undefined.
    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_scalar_value(Scalar::Bool(value))
    }

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_scalar_value(Scalar::Byte(value))
    }

    fn write_char(&mut self, value: u16) -> Result<()> {
        self.write_scalar_value(Scalar::Char(value))
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_scalar_value(Scalar::Short(value))
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_scalar_value(Scalar::Int(value))
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_scalar_value(Scalar::Long(value))
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_scalar_value(Scalar::Float(value))
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_scalar_value(Scalar::Double(value))
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_array_slice(ArraySlice::Byte(bytes))
    }
}

impl<D: DataOutput + ?Sized> DataOutput for Box<D> {
    fn write_scalar_value(&mut self, value: Scalar) -> Result<()> {
        (**self).write_scalar_value(value)
    }

    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()> {
        (**self).write_array_slice(values)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<D: DataOutput + ?Sized> DataOutput for &mut D {
    fn write_scalar_value(&mut self, value: Scalar) -> Result<()> {
        (**self).write_scalar_value(value)
    }

    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()> {
        (**self).write_array_slice(values)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// A byte-only destination over any `Write`.
///
/// Accepts single bytes and byte arrays; every other primitive is rejected
/// with [`TransportError::Unsupported`] so a capability mismatch is never
/// mistaken for an I/O failure.
#[derive(Debug)]
pub struct ByteSink<W> {
    inner: W,
    written: u64,
}

impl<W: Write> ByteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the wrapper and return the sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> DataOutput for ByteSink<W> {
    fn write_scalar_value(&mut self, value: Scalar) -> Result<()> {
        match value {
            Scalar::Byte(byte) => {
                write_all_retrying(&mut self.inner, &[byte])?;
                self.written += 1;
                Ok(())
            }
            other => Err(TransportError::Unsupported(other.kind().write_op())),
        }
    }

    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()> {
        match values {
            ArraySlice::Byte(bytes) => {
                write_all_retrying(&mut self.inner, bytes)?;
                self.written += bytes.len() as u64;
                Ok(())
            }
            other => Err(TransportError::Unsupported(other.kind().write_op())),
        }
    }

    fn flush(&mut self) -> Result<()> {
        flush_retrying(&mut self.inner)
    }
}

/// Write every byte to `sink`, retrying interrupted writes. `WouldBlock`
/// is surfaced to the caller.
pub(crate) fn write_all_retrying<W: Write + ?Sized>(sink: &mut W, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match sink.write(&bytes[offset..]) {
            Ok(0) => return Err(TransportError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    Ok(())
}

/// Flush `sink`, retrying interrupted flushes.
pub(crate) fn flush_retrying<W: Write + ?Sized>(sink: &mut W) -> Result<()> {
    loop {
        match sink.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}
