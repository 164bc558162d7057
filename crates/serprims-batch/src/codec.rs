use bytes::{Buf, BufMut, BytesMut};
use serprims_transport::{ByteOrder, PrimitiveKind};

use crate::error::{BatchError, Result};

/// Integers in an index record: one count per kind, then the array count.
pub const INDEX_FIELDS: usize = PrimitiveKind::COUNT + 1;

/// Encoded size of an index record, in bytes.
pub const INDEX_SIZE: usize = INDEX_FIELDS * 4;

/// The header that opens every batch.
///
/// Wire format (each field an `i32` in the connection's byte order):
/// ```text
/// ┌──────┬──────┬──────┬───────┬─────┬──────┬───────┬────────┬────────┐
/// │ bool │ byte │ char │ short │ int │ long │ float │ double │ arrays │
/// └──────┴──────┴──────┴───────┴─────┴──────┴───────┴────────┴────────┘
/// ```
/// Followed by each non-empty kind's packed values in the same kind order,
/// then the whole-array payloads in the order they were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchIndex {
    /// Scalar count per kind, in wire order.
    pub counts: [usize; PrimitiveKind::COUNT],
    /// Number of whole-array payloads following the scalar segments.
    pub arrays: usize,
}

impl BatchIndex {
    pub fn count(&self, kind: PrimitiveKind) -> usize {
        self.counts[kind.index()]
    }

    /// Total scalars across every kind.
    pub fn scalars(&self) -> usize {
        self.counts.iter().sum()
    }

    /// True when the batch carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.arrays == 0 && self.scalars() == 0
    }

    /// Append the encoded record to `dst`.
    pub fn encode(&self, order: ByteOrder, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(INDEX_SIZE);
        let fields = self.counts.iter().chain(std::iter::once(&self.arrays));
        for (slot, &count) in fields.enumerate() {
            let value = i32::try_from(count).map_err(|_| BatchError::InvalidIndex {
                slot,
                value: i32::MAX,
            })?;
            match order {
                ByteOrder::Big => dst.put_i32(value),
                ByteOrder::Little => dst.put_i32_le(value),
            }
        }
        Ok(())
    }

    /// Decode a record from the first [`INDEX_SIZE`] bytes of `src`.
    pub fn decode(order: ByteOrder, mut src: &[u8]) -> Result<Self> {
        if src.len() < INDEX_SIZE {
            return Err(BatchError::Desync {
                reason: format!("index record needs {INDEX_SIZE} bytes, got {}", src.len()),
            });
        }
        let mut index = BatchIndex::default();
        for slot in 0..INDEX_FIELDS {
            let value = match order {
                ByteOrder::Big => src.get_i32(),
                ByteOrder::Little => src.get_i32_le(),
            };
            let count = usize::try_from(value)
                .map_err(|_| BatchError::InvalidIndex { slot, value })?;
            if slot < PrimitiveKind::COUNT {
                index.counts[slot] = count;
            } else {
                index.arrays = count;
            }
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_nine_ints_in_kind_order() {
        let mut index = BatchIndex::default();
        index.counts[PrimitiveKind::Boolean.index()] = 1;
        index.counts[PrimitiveKind::Double.index()] = 2;
        index.arrays = 3;

        let mut buf = BytesMut::new();
        index.encode(ByteOrder::Big, &mut buf).unwrap();
        assert_eq!(buf.len(), INDEX_SIZE);
        assert_eq!(&buf[0..4], &[0, 0, 0, 1]);
        assert_eq!(&buf[28..32], &[0, 0, 0, 2]);
        assert_eq!(&buf[32..36], &[0, 0, 0, 3]);

        assert_eq!(BatchIndex::decode(ByteOrder::Big, &buf).unwrap(), index);
    }

    #[test]
    fn little_endian_record() {
        let index = BatchIndex {
            counts: [0, 0, 0, 0, 258, 0, 0, 0],
            arrays: 0,
        };
        let mut buf = BytesMut::new();
        index.encode(ByteOrder::Little, &mut buf).unwrap();
        assert_eq!(&buf[16..20], &[2, 1, 0, 0]);
        assert_eq!(BatchIndex::decode(ByteOrder::Little, &buf).unwrap(), index);
        assert_eq!(index.count(PrimitiveKind::Int), 258);
        assert_eq!(index.scalars(), 258);
    }

    #[test]
    fn negative_count_rejected() {
        let mut buf = BytesMut::new();
        BatchIndex::default().encode(ByteOrder::Big, &mut buf).unwrap();
        buf[12..16].copy_from_slice(&(-4i32).to_be_bytes());

        let err = BatchIndex::decode(ByteOrder::Big, &buf).unwrap_err();
        assert!(matches!(err, BatchError::InvalidIndex { slot: 3, value: -4 }));
    }

    #[test]
    fn short_record_rejected() {
        let err = BatchIndex::decode(ByteOrder::Big, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, BatchError::Desync { .. }));
    }

    #[test]
    fn empty_index() {
        assert!(BatchIndex::default().is_empty());
        let one_array = BatchIndex {
            arrays: 1,
            ..BatchIndex::default()
        };
        assert!(!one_array.is_empty());
    }
}
