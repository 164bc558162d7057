//! The eight primitive kinds and their value, slice, and array carriers.
//!
//! Kind order is part of the wire format: batch index records and reserved
//! array type codes both enumerate kinds in [`PrimitiveKind::ALL`] order.

use std::fmt;
use std::sync::Arc;

use crate::conversion::ByteOrder;

/// A primitive kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    /// Number of primitive kinds.
    pub const COUNT: usize = 8;

    /// All kinds in wire order.
    pub const ALL: [PrimitiveKind; Self::COUNT] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    /// Encoded size of one value, in bytes.
    pub const fn size(self) -> usize {
        match self {
            PrimitiveKind::Boolean | PrimitiveKind::Byte => 1,
            PrimitiveKind::Char | PrimitiveKind::Short => 2,
            PrimitiveKind::Int | PrimitiveKind::Float => 4,
            PrimitiveKind::Long | PrimitiveKind::Double => 8,
        }
    }

    /// Position of this kind in wire order.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Kind at a wire-order position.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Human-readable kind name.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// Name of the scalar write operation for this kind, used in diagnostics.
    pub const fn write_op(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "write_bool",
            PrimitiveKind::Byte => "write_u8",
            PrimitiveKind::Char => "write_char",
            PrimitiveKind::Short => "write_i16",
            PrimitiveKind::Int => "write_i32",
            PrimitiveKind::Long => "write_i64",
            PrimitiveKind::Float => "write_f32",
            PrimitiveKind::Double => "write_f64",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust type carrying one primitive kind.
///
/// Implemented for `bool`, `u8`, `u16` (a UTF-16 code unit), `i16`, `i32`,
/// `i64`, `f32` and `f64`.
pub trait Primitive: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const KIND: PrimitiveKind;
    const SIZE: usize;

    fn put(self, order: ByteOrder, dst: &mut [u8]);
    fn get(order: ByteOrder, src: &[u8]) -> Self;

    fn into_scalar(self) -> Scalar;
    fn from_scalar(value: Scalar) -> Option<Self>;

    fn slice(values: &[Self]) -> ArraySlice<'_>;
    fn slice_mut(values: &mut [Self]) -> ArrayMut<'_>;
    fn shared(values: Arc<[Self]>) -> SharedArray;
    fn into_array(values: Vec<Self>) -> PrimitiveArray;

    /// Raw byte view, available only for `u8`.
    fn as_bytes(_values: &[Self]) -> Option<&[u8]> {
        None
    }

    /// Mutable raw byte view, available only for `u8`.
    fn as_bytes_mut(_values: &mut [Self]) -> Option<&mut [u8]> {
        None
    }
}

macro_rules! impl_numeric_primitive {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl Primitive for $ty {
            const KIND: PrimitiveKind = PrimitiveKind::$kind;
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn put(self, order: ByteOrder, dst: &mut [u8]) {
                let bytes = match order {
                    ByteOrder::Big => self.to_be_bytes(),
                    ByteOrder::Little => self.to_le_bytes(),
                };
                dst[..Self::SIZE].copy_from_slice(&bytes);
            }

            fn get(order: ByteOrder, src: &[u8]) -> Self {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                bytes.copy_from_slice(&src[..Self::SIZE]);
                match order {
                    ByteOrder::Big => <$ty>::from_be_bytes(bytes),
                    ByteOrder::Little => <$ty>::from_le_bytes(bytes),
                }
            }

            fn into_scalar(self) -> Scalar {
                Scalar::$variant(self)
            }

            fn from_scalar(value: Scalar) -> Option<Self> {
                match value {
                    Scalar::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn slice(values: &[Self]) -> ArraySlice<'_> {
                ArraySlice::$variant(values)
            }

            fn slice_mut(values: &mut [Self]) -> ArrayMut<'_> {
                ArrayMut::$variant(values)
            }

            fn shared(values: Arc<[Self]>) -> SharedArray {
                SharedArray::$variant(values)
            }

            fn into_array(values: Vec<Self>) -> PrimitiveArray {
                PrimitiveArray::$variant(values)
            }
        }
    };
}

impl_numeric_primitive!(u16, Char, Char);
impl_numeric_primitive!(i16, Short, Short);
impl_numeric_primitive!(i32, Int, Int);
impl_numeric_primitive!(i64, Long, Long);
impl_numeric_primitive!(f32, Float, Float);
impl_numeric_primitive!(f64, Double, Double);

impl Primitive for bool {
    const KIND: PrimitiveKind = PrimitiveKind::Boolean;
    const SIZE: usize = 1;

    fn put(self, _order: ByteOrder, dst: &mut [u8]) {
        dst[0] = u8::from(self);
    }

    fn get(_order: ByteOrder, src: &[u8]) -> Self {
        src[0] != 0
    }

    fn into_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    fn from_scalar(value: Scalar) -> Option<Self> {
        match value {
            Scalar::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn slice(values: &[Self]) -> ArraySlice<'_> {
        ArraySlice::Bool(values)
    }

    fn slice_mut(values: &mut [Self]) -> ArrayMut<'_> {
        ArrayMut::Bool(values)
    }

    fn shared(values: Arc<[Self]>) -> SharedArray {
        SharedArray::Bool(values)
    }

    fn into_array(values: Vec<Self>) -> PrimitiveArray {
        PrimitiveArray::Bool(values)
    }
}

impl Primitive for u8 {
    const KIND: PrimitiveKind = PrimitiveKind::Byte;
    const SIZE: usize = 1;

    fn put(self, _order: ByteOrder, dst: &mut [u8]) {
        dst[0] = self;
    }

    fn get(_order: ByteOrder, src: &[u8]) -> Self {
        src[0]
    }

    fn into_scalar(self) -> Scalar {
        Scalar::Byte(self)
    }

    fn from_scalar(value: Scalar) -> Option<Self> {
        match value {
            Scalar::Byte(v) => Some(v),
            _ => None,
        }
    }

    fn slice(values: &[Self]) -> ArraySlice<'_> {
        ArraySlice::Byte(values)
    }

    fn slice_mut(values: &mut [Self]) -> ArrayMut<'_> {
        ArrayMut::Byte(values)
    }

    fn shared(values: Arc<[Self]>) -> SharedArray {
        SharedArray::Byte(values)
    }

    fn into_array(values: Vec<Self>) -> PrimitiveArray {
        PrimitiveArray::Byte(values)
    }

    fn as_bytes(values: &[Self]) -> Option<&[u8]> {
        Some(values)
    }

    fn as_bytes_mut(values: &mut [Self]) -> Option<&mut [u8]> {
        Some(values)
    }
}

/// Expands `$body` once per primitive variant of a kind-tagged enum.
///
/// Works with [`Scalar`], [`ArraySlice`], [`ArrayMut`], [`SharedArray`] and
/// [`PrimitiveArray`], which all share variant names:
///
/// ```
/// use serprims_transport::{dispatch_primitive, ArraySlice};
///
/// let values = ArraySlice::Int(&[1, 2, 3]);
/// let len = dispatch_primitive!(ArraySlice, values, v => v.len());
/// assert_eq!(len, 3);
/// ```
#[macro_export]
macro_rules! dispatch_primitive {
    ($carrier:ident, $value:expr, $bind:ident => $body:expr) => {
        match $value {
            $crate::$carrier::Bool($bind) => $body,
            $crate::$carrier::Byte($bind) => $body,
            $crate::$carrier::Char($bind) => $body,
            $crate::$carrier::Short($bind) => $body,
            $crate::$carrier::Int($bind) => $body,
            $crate::$carrier::Long($bind) => $body,
            $crate::$carrier::Float($bind) => $body,
            $crate::$carrier::Double($bind) => $body,
        }
    };
}

/// Match an owned array against a value or slice of the same kind.
macro_rules! same_kind {
    ($array:expr, $value:expr, $carrier:ident, $dst:ident, $v:ident => $body:expr) => {
        match ($array, $value) {
            (PrimitiveArray::Bool($dst), $carrier::Bool($v)) => {
                $body;
                true
            }
            (PrimitiveArray::Byte($dst), $carrier::Byte($v)) => {
                $body;
                true
            }
            (PrimitiveArray::Char($dst), $carrier::Char($v)) => {
                $body;
                true
            }
            (PrimitiveArray::Short($dst), $carrier::Short($v)) => {
                $body;
                true
            }
            (PrimitiveArray::Int($dst), $carrier::Int($v)) => {
                $body;
                true
            }
            (PrimitiveArray::Long($dst), $carrier::Long($v)) => {
                $body;
                true
            }
            (PrimitiveArray::Float($dst), $carrier::Float($v)) => {
                $body;
                true
            }
            (PrimitiveArray::Double($dst), $carrier::Double($v)) => {
                $body;
                true
            }
            _ => false,
        }
    };
}

/// One primitive value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Byte(u8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Scalar {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Scalar::Bool(_) => PrimitiveKind::Boolean,
            Scalar::Byte(_) => PrimitiveKind::Byte,
            Scalar::Char(_) => PrimitiveKind::Char,
            Scalar::Short(_) => PrimitiveKind::Short,
            Scalar::Int(_) => PrimitiveKind::Int,
            Scalar::Long(_) => PrimitiveKind::Long,
            Scalar::Float(_) => PrimitiveKind::Float,
            Scalar::Double(_) => PrimitiveKind::Double,
        }
    }

    /// The zero value of a kind.
    pub fn zero(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::Boolean => Scalar::Bool(false),
            PrimitiveKind::Byte => Scalar::Byte(0),
            PrimitiveKind::Char => Scalar::Char(0),
            PrimitiveKind::Short => Scalar::Short(0),
            PrimitiveKind::Int => Scalar::Int(0),
            PrimitiveKind::Long => Scalar::Long(0),
            PrimitiveKind::Float => Scalar::Float(0.0),
            PrimitiveKind::Double => Scalar::Double(0.0),
        }
    }
}

/// A borrowed slice of one primitive kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArraySlice<'a> {
    Bool(&'a [bool]),
    Byte(&'a [u8]),
    Char(&'a [u16]),
    Short(&'a [i16]),
    Int(&'a [i32]),
    Long(&'a [i64]),
    Float(&'a [f32]),
    Double(&'a [f64]),
}

impl ArraySlice<'_> {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            ArraySlice::Bool(_) => PrimitiveKind::Boolean,
            ArraySlice::Byte(_) => PrimitiveKind::Byte,
            ArraySlice::Char(_) => PrimitiveKind::Char,
            ArraySlice::Short(_) => PrimitiveKind::Short,
            ArraySlice::Int(_) => PrimitiveKind::Int,
            ArraySlice::Long(_) => PrimitiveKind::Long,
            ArraySlice::Float(_) => PrimitiveKind::Float,
            ArraySlice::Double(_) => PrimitiveKind::Double,
        }
    }

    pub fn len(&self) -> usize {
        dispatch_primitive!(ArraySlice, self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encoded size of the whole slice, in bytes.
    pub fn byte_len(&self) -> usize {
        self.len() * self.kind().size()
    }
}

/// A mutable slice of one primitive kind, used as a read destination.
#[derive(Debug, PartialEq)]
pub enum ArrayMut<'a> {
    Bool(&'a mut [bool]),
    Byte(&'a mut [u8]),
    Char(&'a mut [u16]),
    Short(&'a mut [i16]),
    Int(&'a mut [i32]),
    Long(&'a mut [i64]),
    Float(&'a mut [f32]),
    Double(&'a mut [f64]),
}

impl ArrayMut<'_> {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            ArrayMut::Bool(_) => PrimitiveKind::Boolean,
            ArrayMut::Byte(_) => PrimitiveKind::Byte,
            ArrayMut::Char(_) => PrimitiveKind::Char,
            ArrayMut::Short(_) => PrimitiveKind::Short,
            ArrayMut::Int(_) => PrimitiveKind::Int,
            ArrayMut::Long(_) => PrimitiveKind::Long,
            ArrayMut::Float(_) => PrimitiveKind::Float,
            ArrayMut::Double(_) => PrimitiveKind::Double,
        }
    }

    pub fn len(&self) -> usize {
        dispatch_primitive!(ArrayMut, self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A reference-counted array of one primitive kind.
///
/// Queued by the batch layer as a whole-array write without copying.
#[derive(Debug, Clone, PartialEq)]
pub enum SharedArray {
    Bool(Arc<[bool]>),
    Byte(Arc<[u8]>),
    Char(Arc<[u16]>),
    Short(Arc<[i16]>),
    Int(Arc<[i32]>),
    Long(Arc<[i64]>),
    Float(Arc<[f32]>),
    Double(Arc<[f64]>),
}

impl SharedArray {
    pub fn kind(&self) -> PrimitiveKind {
        self.as_slice().kind()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> ArraySlice<'_> {
        dispatch_primitive!(SharedArray, self, v => Primitive::slice(&v[..]))
    }
}

/// An owned array of one primitive kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveArray {
    Bool(Vec<bool>),
    Byte(Vec<u8>),
    Char(Vec<u16>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl PrimitiveArray {
    /// A zero-filled array of `len` elements.
    pub fn zeroed(kind: PrimitiveKind, len: usize) -> Self {
        match kind {
            PrimitiveKind::Boolean => PrimitiveArray::Bool(vec![false; len]),
            PrimitiveKind::Byte => PrimitiveArray::Byte(vec![0; len]),
            PrimitiveKind::Char => PrimitiveArray::Char(vec![0; len]),
            PrimitiveKind::Short => PrimitiveArray::Short(vec![0; len]),
            PrimitiveKind::Int => PrimitiveArray::Int(vec![0; len]),
            PrimitiveKind::Long => PrimitiveArray::Long(vec![0; len]),
            PrimitiveKind::Float => PrimitiveArray::Float(vec![0.0; len]),
            PrimitiveKind::Double => PrimitiveArray::Double(vec![0.0; len]),
        }
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.as_slice().kind()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> ArraySlice<'_> {
        dispatch_primitive!(PrimitiveArray, self, v => Primitive::slice(v.as_slice()))
    }

    pub fn as_mut(&mut self) -> ArrayMut<'_> {
        dispatch_primitive!(PrimitiveArray, self, v => Primitive::slice_mut(v.as_mut_slice()))
    }

    /// Element at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<Scalar> {
        dispatch_primitive!(PrimitiveArray, self, v => v.get(index).map(|x| x.into_scalar()))
    }

    /// Append one value. Returns false, leaving the array untouched, when
    /// the value's kind differs from the array's.
    pub fn push(&mut self, value: Scalar) -> bool {
        same_kind!(self, value, Scalar, dst, v => dst.push(v))
    }

    /// Append a slice. Returns false when the kinds differ.
    pub fn extend_from_slice(&mut self, values: ArraySlice<'_>) -> bool {
        same_kind!(self, values, ArraySlice, dst, v => dst.extend_from_slice(v))
    }

    /// Grow or shrink to `len`, zero-filling new elements.
    pub fn resize(&mut self, len: usize) {
        dispatch_primitive!(PrimitiveArray, self, v => v.resize(len, Default::default()))
    }

    pub fn clear(&mut self) {
        dispatch_primitive!(PrimitiveArray, self, v => v.clear())
    }
}

impl<T: Primitive> From<Vec<T>> for PrimitiveArray {
    fn from(values: Vec<T>) -> Self {
        T::into_array(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_order_and_sizes() {
        let sizes: Vec<usize> = PrimitiveKind::ALL.iter().map(|k| k.size()).collect();
        assert_eq!(sizes, vec![1, 1, 2, 2, 4, 8, 4, 8]);
        for (i, kind) in PrimitiveKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(PrimitiveKind::from_index(i), Some(*kind));
        }
        assert_eq!(PrimitiveKind::from_index(8), None);
    }

    #[test]
    fn scalar_conversions() {
        assert_eq!(42i32.into_scalar(), Scalar::Int(42));
        assert_eq!(i32::from_scalar(Scalar::Int(7)), Some(7));
        assert_eq!(i32::from_scalar(Scalar::Long(7)), None);
        assert_eq!(Scalar::zero(PrimitiveKind::Double).kind(), PrimitiveKind::Double);
    }

    #[test]
    fn array_carriers_report_kind_and_len() {
        let owned = PrimitiveArray::from(vec![1.5f32, 2.5]);
        assert_eq!(owned.kind(), PrimitiveKind::Float);
        assert_eq!(owned.len(), 2);
        assert_eq!(owned.as_slice().byte_len(), 8);

        let shared = <i64 as Primitive>::shared(Arc::from(vec![1i64, 2, 3]));
        assert_eq!(shared.kind(), PrimitiveKind::Long);
        assert_eq!(shared.len(), 3);

        let mut zeroed = PrimitiveArray::zeroed(PrimitiveKind::Char, 4);
        assert_eq!(zeroed.as_mut().len(), 4);
        assert!(PrimitiveArray::zeroed(PrimitiveKind::Byte, 0).is_empty());
    }

    #[test]
    fn lane_helpers() {
        let mut lane = PrimitiveArray::zeroed(PrimitiveKind::Short, 0);
        assert!(lane.push(Scalar::Short(3)));
        assert!(!lane.push(Scalar::Int(3)));
        assert!(lane.extend_from_slice(ArraySlice::Short(&[4, 5])));
        assert!(!lane.extend_from_slice(ArraySlice::Long(&[4])));
        assert_eq!(lane, PrimitiveArray::Short(vec![3, 4, 5]));
        assert_eq!(lane.get(2), Some(Scalar::Short(5)));
        assert_eq!(lane.get(3), None);

        lane.resize(5);
        assert_eq!(lane, PrimitiveArray::Short(vec![3, 4, 5, 0, 0]));
        lane.clear();
        assert!(lane.is_empty());
        assert_eq!(lane.kind(), PrimitiveKind::Short);
    }

    #[test]
    fn byte_views_only_for_u8() {
        assert!(<u8 as Primitive>::as_bytes(&[1, 2]).is_some());
        assert!(<i16 as Primitive>::as_bytes(&[1, 2]).is_none());
    }
}
