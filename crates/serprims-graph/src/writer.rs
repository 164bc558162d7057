use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;

use serprims_batch::BatchWriter;
use serprims_transport::{ArraySlice, DataOutput, Primitive, Scalar};
use tracing::{debug, trace};

use crate::config::GraphConfig;
use crate::control::{self, ControlState, FIRST_DYNAMIC_CODE, FIRST_HANDLE, NUL, REF_ARRAY_CODE};
use crate::error::{GraphError, Result};
use crate::identity::IdentityTable;
use crate::object::{Object, ObjectOutput, ObjectRef};
use crate::stats::StreamStats;
use crate::types::{FieldSlot, FieldValue, TypeDescriptor, TypeKind, TypeRegistry};

/// Writes object graphs over a [`BatchWriter`].
///
/// Every distinct object gets a handle the first time it is written; later
/// references to it cost one `i32`. Every named type is declared once per
/// epoch. [`reset`](Self::reset) and [`clear`](Self::clear) start a new
/// epoch, telling the reader through a control code written just before the
/// next reference word.
///
/// Scalars and raw arrays written between objects go through the same batch
/// stream, so the reader must mirror the writer's call sequence exactly.
pub struct GraphWriter<W> {
    out: BatchWriter<W>,
    registry: Arc<TypeRegistry>,
    handles: IdentityTable<ObjectRef>,
    types: IdentityTable<Arc<TypeDescriptor>>,
    next_handle: i32,
    next_type: i32,
    control: ControlState,
    config: GraphConfig,
    stats: StreamStats,
}

impl<W: Write> GraphWriter<W> {
    /// Create a graph writer with default configuration.
    pub fn new(inner: W, registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(inner, registry, GraphConfig::default())
    }

    pub fn with_config(inner: W, registry: Arc<TypeRegistry>, config: GraphConfig) -> Self {
        Self {
            out: BatchWriter::with_config(inner, config.batch),
            registry,
            handles: IdentityTable::with_capacity(config.initial_table_capacity),
            types: IdentityTable::with_capacity(config.initial_table_capacity),
            next_handle: FIRST_HANDLE,
            next_type: FIRST_DYNAMIC_CODE,
            control: ControlState::Idle,
            config,
            stats: StreamStats::default(),
        }
    }

    pub fn write_scalar<T: Primitive>(&mut self, value: T) -> Result<()> {
        Ok(self.out.write_scalar(value)?)
    }

    pub fn write_scalar_value(&mut self, value: Scalar) -> Result<()> {
        Ok(DataOutput::write_scalar_value(&mut self.out, value)?)
    }

    /// Raw primitive elements, without an object header.
    pub fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()> {
        Ok(DataOutput::write_array_slice(&mut self.out, values)?)
    }

    /// Write a reference: NUL, the handle of an already written object, or
    /// the object itself.
    pub fn write_object(&mut self, object: Option<&ObjectRef>) -> Result<()> {
        let Some(object) = object else {
            self.stats.nulls += 1;
            return self.put_word(NUL);
        };
        let handle = self.handles.find(object);
        if handle != 0 {
            self.stats.back_references += 1;
            return self.put_word(handle);
        }
        self.write_fresh(object, true)
    }

    /// Write `object` in full without entering it in the handle table.
    ///
    /// The object still consumes a handle; the reader rejects any later
    /// reference to it.
    pub fn write_object_unshared(&mut self, object: &ObjectRef) -> Result<()> {
        self.write_fresh(object, false)
    }

    /// Write a string as an unshared object, or NUL.
    pub fn write_string(&mut self, text: Option<&str>) -> Result<()> {
        let Some(text) = text else {
            self.stats.nulls += 1;
            return self.put_word(NUL);
        };
        let descriptor = Arc::clone(self.registry.string_type());
        self.take_handle(None)?;
        self.write_type(&descriptor)?;
        Ok(self.out.write_utf(Some(text))?)
    }

    /// Write a primitive array as an unshared object: type word, `i32`
    /// element count, elements.
    pub fn write_array(&mut self, values: ArraySlice<'_>) -> Result<()> {
        let descriptor = Arc::clone(self.registry.array_type(values.kind()));
        self.take_handle(None)?;
        self.write_type(&descriptor)?;
        self.write_len(values.len())?;
        self.write_array_slice(values)
    }

    /// Write a type reference: NUL or a type word, declaring the name if it
    /// is new in this epoch. Takes no handle.
    pub fn write_class(&mut self, descriptor: Option<&Arc<TypeDescriptor>>) -> Result<()> {
        match descriptor {
            Some(descriptor) => self.write_type(descriptor),
            None => {
                self.stats.nulls += 1;
                self.put_word(NUL)
            }
        }
    }

    /// Forget every handle. The reader does the same when it sees the RESET
    /// code written before the next reference.
    pub fn reset(&mut self) {
        self.handles.clear();
        self.next_handle = FIRST_HANDLE;
        self.control = self.control.request(false);
        debug!(pending = ?self.control, "graph writer reset");
    }

    /// Forget every handle and type code.
    pub fn clear(&mut self) {
        self.handles.clear();
        self.types.clear();
        self.next_handle = FIRST_HANDLE;
        self.next_type = FIRST_DYNAMIC_CODE;
        self.control = self.control.request(true);
        debug!(pending = ?self.control, "graph writer cleared");
    }

    /// Emit the current batch and flush the sink.
    ///
    /// A pending control code stays pending: it is written with the next
    /// reference word.
    pub fn flush(&mut self) -> Result<()> {
        Ok(self.out.flush()?)
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            live_handles: (self.next_handle - FIRST_HANDLE) as u64,
            batches: self.out.batches_flushed(),
            bytes: self.out.bytes_transferred(),
            ..self.stats
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &W {
        self.out.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.out.get_mut()
    }

    /// Unwrap the sink. Unflushed data is lost.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    /// The single choke point for reference words: any pending control code
    /// goes out first.
    fn put_word(&mut self, word: i32) -> Result<()> {
        if let Some(code) = self.control.code() {
            self.out.write_scalar(code)?;
            self.control = ControlState::Idle;
            self.stats.epoch += 1;
            debug!(code, epoch = self.stats.epoch, "control code written");
        }
        Ok(self.out.write_scalar(word)?)
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len)
            .map_err(|_| GraphError::Unsupported("array longer than i32::MAX elements"))?;
        self.write_scalar(len)
    }

    /// Assign the next handle, entering `shared` objects in the table.
    fn take_handle(&mut self, shared: Option<&ObjectRef>) -> Result<i32> {
        let handle = self.next_handle;
        if handle == i32::MAX {
            return Err(GraphError::Unsupported("handle space exhausted; reset the stream"));
        }
        self.next_handle += 1;
        self.stats.objects += 1;
        match shared {
            Some(object) => self.handles.insert(Rc::clone(object), handle),
            None => self.stats.unshared += 1,
        }
        Ok(handle)
    }

    fn descriptor_of(&self, object: &Object) -> Result<Arc<TypeDescriptor>> {
        let descriptor = match object {
            Object::Instance(instance) => {
                let name = instance.type_name();
                return self
                    .registry
                    .lookup(name)
                    .ok_or_else(|| GraphError::UnregisteredType(name.to_string()));
            }
            Object::Str(_) => self.registry.string_type(),
            Object::Array(array) => self.registry.array_type(array.kind()),
            Object::RefArray(_) => self.registry.ref_array_type(),
        };
        Ok(Arc::clone(descriptor))
    }

    /// Type word, preceded on first use by the name declaration.
    fn write_type(&mut self, descriptor: &Arc<TypeDescriptor>) -> Result<()> {
        let code = match descriptor.kind() {
            TypeKind::RefArray => REF_ARRAY_CODE,
            TypeKind::Array(kind) => control::array_code(kind),
            TypeKind::Instance | TypeKind::String => {
                let known = self.types.find(descriptor);
                if known != 0 {
                    known
                } else {
                    let code = self.next_type;
                    self.next_type += 1;
                    self.types.insert(Arc::clone(descriptor), code);
                    self.put_word(control::type_word(code))?;
                    self.out.write_utf(Some(descriptor.name()))?;
                    self.stats.types_declared += 1;
                    debug!(name = descriptor.name(), code, "type declared");
                    return Ok(());
                }
            }
        };
        self.put_word(control::type_word(code))
    }

    fn write_fresh(&mut self, object: &ObjectRef, shared: bool) -> Result<()> {
        let node = object.borrow();
        let descriptor = self.descriptor_of(&node)?;
        let handle = self.take_handle(shared.then_some(object))?;
        trace!(handle, shared, type_name = descriptor.name(), "handle assigned");
        self.write_type(&descriptor)?;

        match &*node {
            Object::Str(text) => self.out.write_utf(Some(text))?,
            Object::Array(array) => {
                self.write_len(array.len())?;
                self.write_array_slice(array.as_slice())?;
            }
            Object::RefArray(items) => {
                self.write_len(items.len())?;
                for item in items {
                    self.write_object(item.as_ref())?;
                }
            }
            Object::Instance(instance) if descriptor.has_custom_logic() => {
                instance.write_custom(self)?;
            }
            Object::Instance(instance) => {
                for slot in descriptor.layout().slots() {
                    match (slot, instance.field(slot)?) {
                        (FieldSlot::Primitive(kind, _), FieldValue::Primitive(value))
                            if value.kind() == kind =>
                        {
                            self.write_scalar_value(value)?;
                        }
                        (FieldSlot::Reference(_), FieldValue::Reference(target)) => {
                            self.write_object(target.as_ref())?;
                        }
                        (slot, value) => {
                            return Err(GraphError::field(
                                descriptor.name(),
                                format!("slot {slot:?} produced {value:?}"),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl<W: Write> ObjectOutput for GraphWriter<W> {
    fn write_scalar_value(&mut self, value: Scalar) -> Result<()> {
        GraphWriter::write_scalar_value(self, value)
    }

    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> Result<()> {
        GraphWriter::write_array_slice(self, values)
    }

    fn write_object(&mut self, object: Option<&ObjectRef>) -> Result<()> {
        GraphWriter::write_object(self, object)
    }

    fn write_string(&mut self, text: Option<&str>) -> Result<()> {
        GraphWriter::write_string(self, text)
    }
}

impl<W: Write> DataOutput for GraphWriter<W> {
    fn write_scalar_value(&mut self, value: Scalar) -> serprims_transport::Result<()> {
        DataOutput::write_scalar_value(&mut self.out, value)
    }

    fn write_array_slice(&mut self, values: ArraySlice<'_>) -> serprims_transport::Result<()> {
        DataOutput::write_array_slice(&mut self.out, values)
    }

    fn flush(&mut self) -> serprims_transport::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serprims_batch::BatchReader;
    use serprims_transport::PrimitiveArray;

    use super::*;
    use crate::control::{type_word, CLEAR, RESET};
    use crate::object::new_ref;

    fn writer() -> GraphWriter<Vec<u8>> {
        GraphWriter::new(Vec::new(), Arc::new(TypeRegistry::new()))
    }

    fn wire(mut writer: GraphWriter<Vec<u8>>) -> BatchReader<Cursor<Vec<u8>>> {
        writer.flush().unwrap();
        BatchReader::new(Cursor::new(writer.into_inner()))
    }

    #[test]
    fn first_string_declares_its_type() {
        let mut w = writer();
        w.write_string(Some("ab")).unwrap();
        w.write_string(Some("cd")).unwrap();
        assert_eq!(w.stats().types_declared, 1);
        assert_eq!(w.stats().unshared, 2);

        let mut r = wire(w);
        assert_eq!(r.read_scalar::<i32>().unwrap(), type_word(FIRST_DYNAMIC_CODE));
        assert_eq!(r.read_utf().unwrap().as_deref(), Some("string"));
        assert_eq!(r.read_utf().unwrap().as_deref(), Some("ab"));
        assert_eq!(r.read_scalar::<i32>().unwrap(), type_word(FIRST_DYNAMIC_CODE));
        assert_eq!(r.read_utf().unwrap().as_deref(), Some("cd"));
        assert!(r.is_drained());
    }

    #[test]
    fn repeated_object_writes_its_handle() {
        let a = new_ref("a");
        let mut w = writer();
        w.write_object(Some(&a)).unwrap();
        w.write_object(Some(&a)).unwrap();
        w.write_object(None).unwrap();

        let stats = w.stats();
        assert_eq!(stats.objects, 1);
        assert_eq!(stats.back_references, 1);
        assert_eq!(stats.nulls, 1);

        let mut r = wire(w);
        assert_eq!(r.read_scalar::<i32>().unwrap(), type_word(FIRST_DYNAMIC_CODE));
        r.read_utf().unwrap();
        r.read_utf().unwrap();
        assert_eq!(r.read_scalar::<i32>().unwrap(), FIRST_HANDLE);
        assert_eq!(r.read_scalar::<i32>().unwrap(), NUL);
    }

    #[test]
    fn arrays_use_reserved_codes() {
        let ints = new_ref(PrimitiveArray::from(vec![7i32, 8]));
        let mut w = writer();
        w.write_object(Some(&ints)).unwrap();
        w.write_object(Some(&new_ref(Vec::<Option<ObjectRef>>::new()))).unwrap();
        assert_eq!(w.stats().types_declared, 0);

        let mut r = wire(w);
        assert_eq!(
            r.read_scalar::<i32>().unwrap(),
            type_word(control::array_code(serprims_transport::PrimitiveKind::Int))
        );
        assert_eq!(r.read_scalar::<i32>().unwrap(), 2);
        let mut back = [0i32; 2];
        r.read_array(&mut back).unwrap();
        assert_eq!(back, [7, 8]);
        assert_eq!(r.read_scalar::<i32>().unwrap(), type_word(REF_ARRAY_CODE));
        assert_eq!(r.read_scalar::<i32>().unwrap(), 0);
    }

    #[test]
    fn reset_is_written_lazily_and_once() {
        let a = new_ref("x");
        let mut w = writer();
        w.write_object(Some(&a)).unwrap();
        w.reset();
        w.reset();
        w.write_scalar(42i64).unwrap();
        w.write_object(Some(&a)).unwrap();
        assert_eq!(w.stats().epoch, 1);

        let mut r = wire(w);
        r.read_scalar::<i32>().unwrap();
        r.read_utf().unwrap();
        r.read_utf().unwrap();
        assert_eq!(r.read_scalar::<i64>().unwrap(), 42);
        assert_eq!(r.read_scalar::<i32>().unwrap(), RESET);
        // Type code survives; no second declaration.
        assert_eq!(r.read_scalar::<i32>().unwrap(), type_word(FIRST_DYNAMIC_CODE));
        assert_eq!(r.read_utf().unwrap().as_deref(), Some("x"));
        assert!(r.is_drained());
    }

    #[test]
    fn clear_supersedes_pending_reset() {
        let mut w = writer();
        w.write_string(Some("x")).unwrap();
        w.reset();
        w.clear();
        w.write_string(Some("y")).unwrap();
        assert_eq!(w.stats().types_declared, 2);

        let mut r = wire(w);
        r.read_scalar::<i32>().unwrap();
        r.read_utf().unwrap();
        r.read_utf().unwrap();
        assert_eq!(r.read_scalar::<i32>().unwrap(), CLEAR);
        assert_eq!(r.read_scalar::<i32>().unwrap(), type_word(FIRST_DYNAMIC_CODE));
        assert_eq!(r.read_utf().unwrap().as_deref(), Some("string"));
        assert_eq!(r.read_utf().unwrap().as_deref(), Some("y"));
    }

    #[test]
    fn pending_control_survives_flush() {
        let mut w = writer();
        w.write_string(Some("x")).unwrap();
        w.reset();
        w.flush().unwrap();
        assert_eq!(w.stats().epoch, 0);
        w.write_object(None).unwrap();
        assert_eq!(w.stats().epoch, 1);
    }

    #[test]
    fn class_writes_take_no_handle() {
        let mut w = writer();
        let string = Arc::clone(w.registry().string_type());
        w.write_class(Some(&string)).unwrap();
        w.write_class(Some(&string)).unwrap();
        w.write_class(None).unwrap();
        let stats = w.stats();
        assert_eq!(stats.live_handles, 0);
        assert_eq!(stats.types_declared, 1);
    }

    #[test]
    fn unregistered_instance_is_rejected() {
        use std::any::Any;

        struct Stray;
        impl crate::GraphObject for Stray {
            fn type_name(&self) -> &str {
                "stray"
            }
            fn field(&self, _slot: FieldSlot) -> Result<FieldValue> {
                unreachable!()
            }
            fn set_field(&mut self, _slot: FieldSlot, _value: FieldValue) -> Result<()> {
                unreachable!()
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let stray = new_ref(Object::Instance(Box::new(Stray)));
        let mut w = writer();
        let err = w.write_object(Some(&stray)).unwrap_err();
        assert!(matches!(err, GraphError::UnregisteredType(name) if name == "stray"));
        assert_eq!(w.stats().objects, 0);
    }
}
