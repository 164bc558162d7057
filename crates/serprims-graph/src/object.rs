//! Graph values and the surfaces custom serialization hooks write through.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serprims_transport::{ArrayMut, ArraySlice, PrimitiveArray, PrimitiveKind, Scalar};

use crate::error::{GraphError, Result};
use crate::types::{FieldSlot, FieldValue, REF_ARRAY_TYPE, STRING_TYPE};

/// Shared, mutable handle to one node of an object graph.
///
/// Identity is the `Rc` allocation: two refs to equal values are still two
/// objects on the wire.
pub type ObjectRef = Rc<RefCell<Object>>;

/// Wrap a value as a fresh graph node.
pub fn new_ref(object: impl Into<Object>) -> ObjectRef {
    Rc::new(RefCell::new(object.into()))
}

/// One node of an object graph.
pub enum Object {
    /// User type, described by a registered [`TypeDescriptor`](crate::TypeDescriptor).
    Instance(Box<dyn GraphObject>),
    Str(String),
    Array(PrimitiveArray),
    RefArray(Vec<Option<ObjectRef>>),
}

impl Object {
    /// Name the node's type is registered under.
    pub fn type_name(&self) -> String {
        match self {
            Object::Instance(instance) => instance.type_name().to_string(),
            Object::Str(_) => STRING_TYPE.to_string(),
            Object::Array(array) => crate::types::array_type_name(array.kind()),
            Object::RefArray(_) => REF_ARRAY_TYPE.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Object::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PrimitiveArray> {
        match self {
            Object::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_ref_array(&self) -> Option<&[Option<ObjectRef>]> {
        match self {
            Object::RefArray(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_ref_array_mut(&mut self) -> Option<&mut Vec<Option<ObjectRef>>> {
        match self {
            Object::RefArray(items) => Some(items),
            _ => None,
        }
    }

    /// The instance as its concrete type.
    pub fn downcast_ref<T: GraphObject>(&self) -> Option<&T> {
        match self {
            Object::Instance(instance) => instance.as_any().downcast_ref(),
            _ => None,
        }
    }

    pub fn downcast_mut<T: GraphObject>(&mut self) -> Option<&mut T> {
        match self {
            Object::Instance(instance) => instance.as_any_mut().downcast_mut(),
            _ => None,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Instance(instance) => f
                .debug_tuple("Instance")
                .field(&instance.type_name())
                .finish(),
            Object::Str(text) => f.debug_tuple("Str").field(text).finish(),
            Object::Array(array) => f.debug_tuple("Array").field(array).finish(),
            // Elements may point back at this node; print addresses only.
            Object::RefArray(items) => {
                let ids: Vec<Option<*const RefCell<Object>>> =
                    items.iter().map(|item| item.as_ref().map(Rc::as_ptr)).collect();
                f.debug_tuple("RefArray").field(&ids).finish()
            }
        }
    }
}

impl From<String> for Object {
    fn from(text: String) -> Self {
        Object::Str(text)
    }
}

impl From<&str> for Object {
    fn from(text: &str) -> Self {
        Object::Str(text.to_string())
    }
}

impl From<PrimitiveArray> for Object {
    fn from(array: PrimitiveArray) -> Self {
        Object::Array(array)
    }
}

impl From<Vec<Option<ObjectRef>>> for Object {
    fn from(items: Vec<Option<ObjectRef>>) -> Self {
        Object::RefArray(items)
    }
}

impl From<Box<dyn GraphObject>> for Object {
    fn from(instance: Box<dyn GraphObject>) -> Self {
        Object::Instance(instance)
    }
}

/// A user type that can live in an object graph.
///
/// Fields are addressed by [`FieldSlot`]: the n-th field of a primitive
/// kind, or the n-th reference field, as laid out by the type's
/// [`FieldLayout`](crate::FieldLayout). Types registered with custom logic
/// implement [`write_custom`](Self::write_custom) and
/// [`read_custom`](Self::read_custom) instead.
pub trait GraphObject: Any {
    fn type_name(&self) -> &str;

    fn field(&self, slot: FieldSlot) -> Result<FieldValue>;

    fn set_field(&mut self, slot: FieldSlot, value: FieldValue) -> Result<()>;

    fn write_custom(&self, _out: &mut dyn ObjectOutput) -> Result<()> {
        Err(GraphError::Unsupported("write_custom"))
    }

    /// Fill a freshly instantiated object. References read here may point
    /// back at the object being filled.
    fn read_custom(&mut self, _input: &mut dyn ObjectInput) -> Result<()> {
        Err(GraphError::Unsupported("read_custom"))
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Write surface handed to [`GraphObject::write_custom`].
pub trait ObjectOutput {
    fn write_scalar_value(&mut self, value: Scalar) -> Result<()>;

    /// Raw primitive elements, without an object header. The reader must
    /// know the length.
    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()>;

    fn write_object(&mut self, object: Option<&ObjectRef>) -> Result<()>;

    fn write_string(&mut self, text: Option<&str>) -> Result<()>;

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
}

macro_rules! typed_read {
    ($($name:ident => $kind:ident, $variant:ident, $ty:ty;)+) => {
        $(
            fn $name(&mut self) -> Result<$ty> {
                match self.read_scalar_value(PrimitiveKind::$kind)? {
                    Scalar::$variant(value) => Ok(value),
                    other => Err(GraphError::corrupt(format!(
                        "expected {} value, got {}",
                        PrimitiveKind::$kind,
                        other.kind()
                    ))),
                }
            }
        )+
    };
}

/// Read surface handed to [`GraphObject::read_custom`].
pub trait ObjectInput {
    fn read_scalar_value(&mut self, kind: PrimitiveKind) -> Result<Scalar>;

    /// Fill `dst` with raw primitive elements written by
    /// [`ObjectOutput::write_array_slice`].
    fn read_array_into(&mut self, dst: ArrayMut<'_>) -> Result<()>;

    fn read_object(&mut self) -> Result<Option<ObjectRef>>;

    fn read_string(&mut self) -> Result<Option<String>>;

    typed_read! {
        read_bool => Boolean, Bool, bool;
        read_u8 => Byte, Byte, u8;
        read_char => Char, Char, u16;
        read_i16 => Short, Short, i16;
        read_i32 => Int, Int, i32;
        read_i64 => Long, Long, i64;
        read_f32 => Float, Float, f32;
        read_f64 => Double, Double, f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Marker;

    impl GraphObject for Marker {
        fn type_name(&self) -> &str {
            "marker"
        }

        fn field(&self, slot: FieldSlot) -> Result<FieldValue> {
            Err(GraphError::field("marker", format!("no slot {slot:?}")))
        }

        fn set_field(&mut self, slot: FieldSlot, _value: FieldValue) -> Result<()> {
            Err(GraphError::field("marker", format!("no slot {slot:?}")))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn type_names() {
        assert_eq!(Object::from("x").type_name(), "string");
        assert_eq!(Object::from(PrimitiveArray::from(vec![1i64])).type_name(), "[long");
        assert_eq!(Object::RefArray(Vec::new()).type_name(), "[ref");
        let marker: Box<dyn GraphObject> = Box::new(Marker);
        assert_eq!(Object::from(marker).type_name(), "marker");
    }

    #[test]
    fn downcasts() {
        let mut object = Object::Instance(Box::new(Marker));
        assert!(object.downcast_ref::<Marker>().is_some());
        assert!(object.downcast_mut::<Marker>().is_some());
        assert!(object.as_str().is_none());

        let text = Object::from("hello");
        assert_eq!(text.as_str(), Some("hello"));
        assert!(text.downcast_ref::<Marker>().is_none());
    }

    #[test]
    fn identity_is_the_allocation() {
        let a = new_ref("same");
        let b = new_ref("same");
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(a.borrow().as_str(), b.borrow().as_str());
    }

    #[test]
    fn self_referencing_array_debug_terminates() {
        let array = new_ref(Object::RefArray(Vec::new()));
        if let Some(items) = array.borrow_mut().as_ref_array_mut() {
            items.push(Some(Rc::clone(&array)));
            items.push(None);
        }
        let shown = format!("{:?}", array.borrow());
        assert!(shown.starts_with("RefArray"));
        // Break the cycle so the test does not leak.
        if let Some(items) = array.borrow_mut().as_ref_array_mut() {
            items.clear();
        };
    }

    #[test]
    fn hooks_default_to_unsupported() {
        struct Sink;
        impl ObjectOutput for Sink {
            fn write_scalar_value(&mut self, _value: Scalar) -> Result<()> {
                Ok(())
            }
            fn write_array_slice(&mut self, _values: ArraySlice<'_>) -> Result<()> {
                Ok(())
            }
            fn write_object(&mut self, _object: Option<&ObjectRef>) -> Result<()> {
                Ok(())
            }
            fn write_string(&mut self, _text: Option<&str>) -> Result<()> {
                Ok(())
            }
        }

        let err = Marker.write_custom(&mut Sink).unwrap_err();
        assert!(matches!(err, GraphError::Unsupported("write_custom")));
    }
}
