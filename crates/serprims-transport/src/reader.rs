use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::config::TransportConfig;
use crate::conversion::ByteOrder;
use crate::error::{Result, TransportError};
use crate::primitive::{ArrayMut, Primitive};

/// Buffered primitive reader over any `Read` source.
///
/// Requests block until fully satisfied. If the source ends first the call
/// fails with [`TransportError::EndOfStream`]; a short read never hands back
/// a partially filled array as if it were complete.
pub struct ByteReader<R> {
    inner: R,
    buf: BytesMut,
    capacity: usize,
    order: ByteOrder,
    count: u64,
    config: TransportConfig,
}

impl<R: Read> ByteReader<R> {
    /// Create a new byte reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, TransportConfig::default())
    }

    /// Create a new byte reader with explicit configuration.
    pub fn with_config(inner: R, config: TransportConfig) -> Self {
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

    /// Read one primitive.
    pub fn read_scalar<T: Primitive>(&mut self) -> Result<T> {
        while self.buf.len() < T::SIZE {
            if self.refill()? == 0 {
                return Err(TransportError::EndOfStream {
                    needed: T::SIZE,
                    got: self.buf.len(),
                });
            }
        }
        let value = self.order.decode(&self.buf, 0);
        self.buf.advance(T::SIZE);
        self.count += T::SIZE as u64;
        Ok(value)
    }

    /// Fill `dst` completely.
    pub fn read_array<T: Primitive>(&mut self, dst: &mut [T]) -> Result<()> {
        if let Some(bytes) = T::as_bytes_mut(dst) {
            return self.read_bytes(bytes);
        }

        let needed = dst.len() * T::SIZE;
        let mut done = 0usize;
        while done < dst.len() {
            if self.buf.len() < T::SIZE && self.refill()? == 0 {
                return Err(TransportError::EndOfStream {
                    needed,
                    got: done * T::SIZE + self.buf.len(),
                });
            }
            let ready = (self.buf.len() / T::SIZE).min(dst.len() - done);
            if ready == 0 {
                continue;
            }
            let used = self
                .order
                .decode_slice(&self.buf, 0, &mut dst[done..done + ready]);
            self.buf.advance(used);
            done += ready;
        }
        self.count += needed as u64;
        Ok(())
    }

    /// Fill a kind-tagged destination completely.
    pub fn read_array_mut(&mut self, dst: ArrayMut<'_>) -> Result<()> {
        crate::dispatch_primitive!(ArrayMut, dst, v => self.read_array(v))
    }

    /// Fill `dst` with raw bytes.
    ///
    /// Buffered bytes are handed out first. A remainder at least as large as
    /// the buffer is read straight into `dst`.
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<()> {
        let needed = dst.len();
        let mut done = self.take_buffered(dst);

        if needed - done >= self.capacity {
            trace!(len = needed - done, "byte read bypasses buffer");
            while done < needed {
                match self.inner.read(&mut dst[done..]) {
                    Ok(0) => {
                        self.count += done as u64;
                        return Err(TransportError::EndOfStream { needed, got: done });
                    }
                    Ok(n) => done += n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => return Err(TransportError::Io(err)),
                }
            }
        } else {
            while done < needed {
                if self.refill()? == 0 {
                    self.count += done as u64;
                    return Err(TransportError::EndOfStream { needed, got: done });
                }
                done += self.take_buffered(&mut dst[done..]);
            }
        }

        self.count += needed as u64;
        Ok(())
    }

    /// Bytes that can be read without touching the source.
    pub fn available(&self) -> usize {
        self.buf.len()
    }

    /// Bytes consumed since creation or the last counter reset.
    pub fn bytes_transferred(&self) -> u64 {
        self.count
    }

    /// Reset the byte counter to zero.
    pub fn reset_byte_counter(&mut self) {
        self.count = 0;
    }

    /// Byte order used for decoding.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Current reader configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader and return the source. Buffered bytes are dropped.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn take_buffered(&mut self, dst: &mut [u8]) -> usize {
        let n = self.buf.len().min(dst.len());
        dst[..n].copy_from_slice(&self.buf[..n]);
        self.buf.advance(n);
        n
    }

    /// Read once from the source into the free tail of the buffer.
    ///
    /// Returns the number of bytes added; zero means end of stream.
    fn refill(&mut self) -> Result<usize> {
        let start = self.buf.len();
        if start >= self.capacity {
            return Ok(0);
        }
        self.buf.resize(self.capacity, 0);
        loop {
            match self.inner.read(&mut self.buf[start..]) {
                Ok(n) => {
                    self.buf.truncate(start + n);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(TransportError::Io(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::writer::ByteWriter;

    fn small(buffer_size: usize) -> TransportConfig {
        TransportConfig {
            buffer_size,
            ..TransportConfig::default()
        }
    }

    #[test]
    fn scalars_roundtrip() {
        let mut writer = ByteWriter::new(Vec::new());
        writer.write_scalar(true).unwrap();
        writer.write_scalar(0x1234u16).unwrap();
        writer.write_scalar(-5i64).unwrap();
        writer.write_scalar(2.5f32).unwrap();
        writer.flush().unwrap();

        let mut reader = ByteReader::new(Cursor::new(writer.into_inner()));
        assert!(reader.read_scalar::<bool>().unwrap());
        assert_eq!(reader.read_scalar::<u16>().unwrap(), 0x1234);
        assert_eq!(reader.read_scalar::<i64>().unwrap(), -5);
        assert_eq!(reader.read_scalar::<f32>().unwrap(), 2.5);
        assert_eq!(reader.bytes_transferred(), 15);
    }

    #[test]
    fn array_larger_than_buffer_spans_refills() {
        let values: Vec<i64> = (0..100).map(|i| i * 1_000_003).collect();
        let mut wire = vec![0u8; 800];
        ByteOrder::Big.encode_slice(&values, &mut wire, 0);

        let mut reader = ByteReader::with_config(Cursor::new(wire), small(20));
        let mut back = vec![0i64; 100];
        reader.read_array(&mut back).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn element_split_across_source_reads() {
        let mut wire = vec![0u8; 12];
        ByteOrder::Big.encode_slice(&[7i32, 8, 9], &mut wire, 0);

        let mut reader = ByteReader::new(ByteByByteReader { bytes: wire, pos: 0 });
        let mut back = [0i32; 3];
        reader.read_array(&mut back).unwrap();
        assert_eq!(back, [7, 8, 9]);
    }

    #[test]
    fn truncated_array_is_end_of_stream() {
        let mut wire = vec![0u8; 10];
        ByteOrder::Big.encode_slice(&[1i16, 2, 3, 4, 5], &mut wire, 0);
        wire.truncate(7);

        let mut reader = ByteReader::new(Cursor::new(wire));
        let mut back = [0i16; 5];
        let err = reader.read_array(&mut back).unwrap_err();
        assert!(matches!(
            err,
            TransportError::EndOfStream { needed: 10, got: 7 }
        ));
    }

    #[test]
    fn empty_source_is_end_of_stream() {
        let mut reader = ByteReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_scalar::<i32>().unwrap_err();
        assert!(err.is_end_of_stream());
    }

    #[test]
    fn large_byte_read_goes_direct() {
        let payload: Vec<u8> = (0..200u8).collect();
        let mut wire = vec![0xEE];
        wire.extend_from_slice(&payload);

        let mut reader = ByteReader::with_config(Cursor::new(wire), small(16));
        assert_eq!(reader.read_scalar::<u8>().unwrap(), 0xEE);

        let mut back = vec![0u8; 200];
        reader.read_bytes(&mut back).unwrap();
        assert_eq!(back, payload);
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn large_byte_read_truncated() {
        let mut reader = ByteReader::with_config(Cursor::new(vec![1u8; 40]), small(16));
        let mut back = vec![0u8; 64];
        let err = reader.read_bytes(&mut back).unwrap_err();
        assert!(matches!(
            err,
            TransportError::EndOfStream { needed: 64, got: 40 }
        ));
    }

    #[test]
    fn available_reports_buffered_bytes() {
        let mut reader = ByteReader::new(Cursor::new(vec![0u8; 10]));
        assert_eq!(reader.available(), 0);
        reader.read_scalar::<i16>().unwrap();
        assert_eq!(reader.available(), 8);
    }

    #[test]
    fn interrupted_read_retries() {
        let mut wire = vec![0u8; 4];
        ByteOrder::Big.encode(99i32, &mut wire, 0);
        let source = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire),
        };
        let mut reader = ByteReader::new(source);
        assert_eq!(reader.read_scalar::<i32>().unwrap(), 99);
    }

    #[test]
    fn kind_tagged_destination() {
        let mut wire = vec![0u8; 8];
        ByteOrder::Little.encode_slice(&[1.0f32, -1.0], &mut wire, 0);
        let cfg = TransportConfig {
            byte_order: ByteOrder::Little,
            ..TransportConfig::default()
        };
        let mut reader = ByteReader::with_config(Cursor::new(wire), cfg);
        let mut back = [0f32; 2];
        reader.read_array_mut(ArrayMut::Float(&mut back)).unwrap();
        assert_eq!(back, [1.0, -1.0]);
    }

    #[cfg(unix)]
    #[test]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let writer_thread = std::thread::spawn(move || {
            let mut writer = ByteWriter::with_config(left, small(64));
            let values: Vec<f64> = (0..1000).map(f64::from).collect();
            writer.write_array(&values).unwrap();
            writer.write_scalar(42i32).unwrap();
            writer.flush().unwrap();
        });

        let mut reader = ByteReader::with_config(right, small(64));
        let mut back = vec![0f64; 1000];
        reader.read_array(&mut back).unwrap();
        assert_eq!(back[999], 999.0);
        assert_eq!(reader.read_scalar::<i32>().unwrap(), 42);
        writer_thread.join().unwrap();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
