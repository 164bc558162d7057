//! Fixed-endianness conversion between primitives and bytes.
//!
//! Both endpoints of a connection must agree on one [`ByteOrder`] for its
//! whole lifetime. Callers size the destination; nothing here grows a
//! buffer, and an undersized destination panics on the slice index.

use crate::primitive::{Primitive, Scalar};

/// Byte order used for every multi-byte primitive on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Network order. The default.
    #[default]
    Big,
    Little,
}

impl ByteOrder {
    /// The order of the running machine.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Parse `"big"` / `"little"` (also `"be"` / `"le"`), case-insensitive.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "big" | "be" | "network" => Some(ByteOrder::Big),
            "little" | "le" => Some(ByteOrder::Little),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ByteOrder::Big => "big",
            ByteOrder::Little => "little",
        }
    }

    /// Encode one value at `dst[offset..]`.
    pub fn encode<T: Primitive>(self, value: T, dst: &mut [u8], offset: usize) {
        value.put(self, &mut dst[offset..offset + T::SIZE]);
    }

    /// Decode one value from `src[offset..]`.
    pub fn decode<T: Primitive>(self, src: &[u8], offset: usize) -> T {
        T::get(self, &src[offset..offset + T::SIZE])
    }

    /// Encode a whole slice starting at `dst[offset..]`. Returns bytes written.
    pub fn encode_slice<T: Primitive>(self, src: &[T], dst: &mut [u8], offset: usize) -> usize {
        let total = src.len() * T::SIZE;
        if let Some(bytes) = T::as_bytes(src) {
            dst[offset..offset + total].copy_from_slice(bytes);
            return total;
        }
        for (value, chunk) in src
            .iter()
            .zip(dst[offset..offset + total].chunks_exact_mut(T::SIZE))
        {
            value.put(self, chunk);
        }
        total
    }

    /// Decode `dst.len()` values from `src[offset..]`. Returns bytes read.
    pub fn decode_slice<T: Primitive>(self, src: &[u8], offset: usize, dst: &mut [T]) -> usize {
        let total = dst.len() * T::SIZE;
        if let Some(bytes) = T::as_bytes_mut(dst) {
            bytes.copy_from_slice(&src[offset..offset + total]);
            return total;
        }
        for (value, chunk) in dst
            .iter_mut()
            .zip(src[offset..offset + total].chunks_exact(T::SIZE))
        {
            *value = T::get(self, chunk);
        }
        total
    }

    /// Encode a kind-tagged value. Returns bytes written.
    pub fn encode_scalar(self, value: Scalar, dst: &mut [u8], offset: usize) -> usize {
        crate::dispatch_primitive!(Scalar, value, v => self.encode(v, dst, offset));
        value.kind().size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_int_layout() {
        let mut buf = [0u8; 4];
        ByteOrder::Big.encode(0x0102_0304i32, &mut buf, 0);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(ByteOrder::Big.decode::<i32>(&buf, 0), 0x0102_0304);
    }

    #[test]
    fn little_endian_int_layout() {
        let mut buf = [0u8; 4];
        ByteOrder::Little.encode(0x0102_0304i32, &mut buf, 0);
        assert_eq!(buf, [4, 3, 2, 1]);
        assert_eq!(ByteOrder::Little.decode::<i32>(&buf, 0), 0x0102_0304);
    }

    #[test]
    fn encode_at_offset_leaves_prefix_untouched() {
        let mut buf = [0xEEu8; 6];
        ByteOrder::Big.encode(0x0A0Bu16, &mut buf, 4);
        assert_eq!(buf, [0xEE, 0xEE, 0xEE, 0xEE, 0x0A, 0x0B]);
    }

    #[test]
    fn slices_in_both_orders() {
        let values = [1.5f64, -2.25, f64::MAX, 0.0];
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let mut buf = vec![0u8; 2 + values.len() * 8];
            let written = order.encode_slice(&values, &mut buf, 2);
            assert_eq!(written, 32);

            let mut back = [0f64; 4];
            let read = order.decode_slice(&buf, 2, &mut back);
            assert_eq!(read, 32);
            assert_eq!(back, values);
        }
    }

    #[test]
    fn bool_encoding_is_zero_or_one() {
        let mut buf = [0u8; 3];
        ByteOrder::Big.encode_slice(&[true, false, true], &mut buf, 0);
        assert_eq!(buf, [1, 0, 1]);
        assert!(ByteOrder::Big.decode::<bool>(&[7], 0));
    }

    #[test]
    fn byte_slices_copy_verbatim() {
        let mut buf = [0u8; 3];
        ByteOrder::Little.encode_slice(&[9u8, 8, 7], &mut buf, 0);
        assert_eq!(buf, [9, 8, 7]);
    }

    #[test]
    fn float_bits_survive() {
        let mut buf = [0u8; 4];
        ByteOrder::Big.encode(f32::NAN, &mut buf, 0);
        assert!(ByteOrder::Big.decode::<f32>(&buf, 0).is_nan());
    }

    #[test]
    fn encode_scalar_reports_size() {
        let mut buf = [0u8; 8];
        assert_eq!(ByteOrder::Big.encode_scalar(Scalar::Long(-1), &mut buf, 0), 8);
        assert_eq!(buf, [0xFF; 8]);
        assert_eq!(ByteOrder::Big.encode_scalar(Scalar::Short(1), &mut buf, 0), 2);
    }

    #[test]
    fn parse_names() {
        assert_eq!(ByteOrder::parse("BIG"), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::parse("le"), Some(ByteOrder::Little));
        assert_eq!(ByteOrder::parse("middle"), None);
        assert_eq!(ByteOrder::default(), ByteOrder::Big);
    }
}
