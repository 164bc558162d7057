use std::io::Read;
use std::sync::Arc;

use serprims_batch::BatchReader;
use serprims_transport::{ArrayMut, Primitive, PrimitiveArray, PrimitiveKind, Scalar};
use tracing::{debug, trace, warn};

use crate::config::GraphConfig;
use crate::control::{self, Word, CLEAR, FIRST_DYNAMIC_CODE, FIRST_HANDLE, REF_ARRAY_CODE, RESET};
use crate::error::{GraphError, Result};
use crate::object::{new_ref, Object, ObjectInput, ObjectRef};
use crate::stats::StreamStats;
use crate::types::{FieldSlot, FieldValue, TypeDescriptor, TypeKind, TypeRegistry, TypeResolver};

/// Upper bound on reference-array capacity reserved ahead of reading the
/// elements.
const MAX_PREALLOCATED_ELEMENTS: usize = 4096;

enum HandleSlot {
    Shared(ObjectRef),
    /// Written unshared; referencing it is corruption.
    Unshared,
    /// Still being read.
    Reserved,
}

enum TypeSlot {
    Resolved(Arc<TypeDescriptor>),
    Unresolved(String),
}

/// Reads object graphs written by [`GraphWriter`](crate::GraphWriter).
///
/// Handles and type codes are never sent explicitly: the reader numbers
/// fresh objects and type declarations in arrival order, exactly as the
/// writer assigned them.
///
/// A type name that neither the registry nor the fallback resolver knows
/// fails with [`GraphError::TypeResolution`]. After a failed class read the
/// stream stays usable. After a failed object read the object's body is
/// left unread, so the stream cannot be continued.
pub struct GraphReader<R> {
    input: BatchReader<R>,
    registry: Arc<TypeRegistry>,
    fallback: Option<Box<dyn TypeResolver>>,
    handles: Vec<HandleSlot>,
    types: Vec<TypeSlot>,
    config: GraphConfig,
    stats: StreamStats,
}

impl<R: Read> GraphReader<R> {
    /// Create a graph reader with default configuration.
    pub fn new(inner: R, registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(inner, registry, GraphConfig::default())
    }

    pub fn with_config(inner: R, registry: Arc<TypeRegistry>, config: GraphConfig) -> Self {
        Self {
            input: BatchReader::with_config(inner, config.batch),
            registry,
            fallback: None,
            handles: Vec::with_capacity(config.initial_table_capacity),
            types: Vec::new(),
            config,
            stats: StreamStats::default(),
        }
    }

    /// Consult `resolver` for type names the registry does not know.
    pub fn set_fallback_resolver(&mut self, resolver: impl TypeResolver + 'static) {
        self.fallback = Some(Box::new(resolver));
    }

    /// Resolve again every type code recorded as unresolved. Returns how
    /// many now resolve.
    pub fn retry_type_resolution(&mut self) -> usize {
        let mut resolved = 0;
        for index in 0..self.types.len() {
            if let TypeSlot::Unresolved(name) = &self.types[index] {
                if let Some(descriptor) = self.resolve(name) {
                    self.types[index] = TypeSlot::Resolved(descriptor);
                    resolved += 1;
                }
            }
        }
        resolved
    }

    pub fn read_scalar<T: Primitive>(&mut self) -> Result<T> {
        Ok(self.input.read_scalar()?)
    }

    pub fn read_scalar_value(&mut self, kind: PrimitiveKind) -> Result<Scalar> {
        let value = match kind {
            PrimitiveKind::Boolean => self.input.read_scalar::<bool>()?.into_scalar(),
            PrimitiveKind::Byte => self.input.read_scalar::<u8>()?.into_scalar(),
            PrimitiveKind::Char => self.input.read_scalar::<u16>()?.into_scalar(),
            PrimitiveKind::Short => self.input.read_scalar::<i16>()?.into_scalar(),
            PrimitiveKind::Int => self.input.read_scalar::<i32>()?.into_scalar(),
            PrimitiveKind::Long => self.input.read_scalar::<i64>()?.into_scalar(),
            PrimitiveKind::Float => self.input.read_scalar::<f32>()?.into_scalar(),
            PrimitiveKind::Double => self.input.read_scalar::<f64>()?.into_scalar(),
        };
        Ok(value)
    }

    /// Raw primitive elements written by `write_array_slice`.
    pub fn read_array_into(&mut self, dst: ArrayMut<'_>) -> Result<()> {
        Ok(self.input.read_array_mut(dst)?)
    }

    /// Read a reference written by `write_object`.
    pub fn read_object(&mut self) -> Result<Option<ObjectRef>> {
        match self.next_word()? {
            Word::Null => {
                self.stats.nulls += 1;
                Ok(None)
            }
            Word::Handle(handle) => self.lookup_handle(handle).map(Some),
            Word::Type(code) => {
                let descriptor = self.read_type(code)?;
                self.read_fresh(&descriptor, true).map(Some)
            }
        }
    }

    /// Read an object written by `write_object_unshared`.
    pub fn read_object_unshared(&mut self) -> Result<ObjectRef> {
        match self.next_word()? {
            Word::Type(code) => {
                let descriptor = self.read_type(code)?;
                self.read_fresh(&descriptor, false)
            }
            Word::Null => Err(GraphError::corrupt("null where an unshared object was expected")),
            Word::Handle(handle) => Err(GraphError::corrupt(format!(
                "back-reference {handle} where an unshared object was expected"
            ))),
        }
    }

    /// Read a string written by `write_string`.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let Some(descriptor) = self.unshared_header("string")? else {
            return Ok(None);
        };
        if descriptor.kind() != TypeKind::String {
            return Err(GraphError::corrupt(format!(
                "expected a string, found type {:?}",
                descriptor.name()
            )));
        }
        self.push_handle(HandleSlot::Unshared);
        self.read_text().map(Some)
    }

    /// Fill `dst` with an array written by `write_array`. Kind and length
    /// must match.
    pub fn read_array(&mut self, dst: ArrayMut<'_>) -> Result<()> {
        let kind = dst.kind();
        let len = self
            .array_header(kind)?
            .ok_or_else(|| GraphError::corrupt(format!("null where a {kind} array was expected")))?;
        if len != dst.len() {
            return Err(GraphError::corrupt(format!(
                "{kind} array of {len} elements read into {} slots",
                dst.len()
            )));
        }
        self.read_array_into(dst)
    }

    /// Read an array written by `write_array` into a fresh allocation, or
    /// `None` for NUL.
    pub fn read_array_new(&mut self, kind: PrimitiveKind) -> Result<Option<PrimitiveArray>> {
        match self.array_header(kind)? {
            Some(len) => Ok(Some(self.input.read_array_new(kind, len)?)),
            None => Ok(None),
        }
    }

    /// Read a type reference written by `write_class`.
    pub fn read_class(&mut self) -> Result<Option<Arc<TypeDescriptor>>> {
        match self.next_word()? {
            Word::Null => {
                self.stats.nulls += 1;
                Ok(None)
            }
            Word::Type(code) => self.read_type(code).map(Some),
            Word::Handle(handle) => Err(GraphError::corrupt(format!(
                "handle {handle} where a type was expected"
            ))),
        }
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            live_handles: self.handles.len() as u64,
            batches: self.input.batches_received(),
            bytes: self.input.bytes_transferred(),
            ..self.stats
        }
    }

    /// True when the current batch has been fully consumed.
    pub fn is_drained(&self) -> bool {
        self.input.is_drained()
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &R {
        self.input.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.input.into_inner()
    }

    /// Next reference word, consuming any control codes before it.
    fn next_word(&mut self) -> Result<Word> {
        loop {
            let word = self.input.read_scalar::<i32>()?;
            match word {
                RESET => {
                    self.handles.clear();
                    self.stats.epoch += 1;
                    debug!(epoch = self.stats.epoch, "RESET received");
                }
                CLEAR => {
                    self.handles.clear();
                    self.types.clear();
                    self.stats.epoch += 1;
                    debug!(epoch = self.stats.epoch, "CLEAR received");
                }
                word => {
                    return Word::decode(word)
                        .ok_or_else(|| GraphError::corrupt(format!("invalid reference word {word}")));
                }
            }
        }
    }

    fn lookup_handle(&mut self, handle: i32) -> Result<ObjectRef> {
        let index = (handle - FIRST_HANDLE) as usize;
        let object = match self.handles.get(index) {
            Some(HandleSlot::Shared(object)) => ObjectRef::clone(object),
            Some(HandleSlot::Unshared) => {
                return Err(self.corrupt(format!("back-reference to unshared handle {handle}")));
            }
            Some(HandleSlot::Reserved) => {
                return Err(self.corrupt(format!("back-reference to incomplete handle {handle}")));
            }
            None => {
                let assigned = self.handles.len();
                return Err(self.corrupt(format!(
                    "unknown handle {handle}, {assigned} assigned this epoch"
                )));
            }
        };
        self.stats.back_references += 1;
        Ok(object)
    }

    fn push_handle(&mut self, slot: HandleSlot) -> usize {
        if matches!(slot, HandleSlot::Unshared) {
            self.stats.unshared += 1;
        }
        self.stats.objects += 1;
        self.handles.push(slot);
        self.handles.len() - 1
    }

    fn publish(&mut self, index: usize, object: &ObjectRef) {
        if let Some(slot) = self.handles.get_mut(index) {
            if matches!(slot, HandleSlot::Reserved) {
                *slot = HandleSlot::Shared(ObjectRef::clone(object));
                trace!(handle = index as i32 + FIRST_HANDLE, "handle assigned");
            }
        }
    }

    fn resolve(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.registry
            .lookup(name)
            .or_else(|| self.fallback.as_ref().and_then(|fallback| fallback.resolve(name)))
    }

    fn read_type(&mut self, code: i32) -> Result<Arc<TypeDescriptor>> {
        if code == REF_ARRAY_CODE {
            return Ok(Arc::clone(self.registry.ref_array_type()));
        }
        if code < FIRST_DYNAMIC_CODE {
            if let Some(kind) = control::array_kind(code) {
                return Ok(Arc::clone(self.registry.array_type(kind)));
            }
        }

        let index = (code - FIRST_DYNAMIC_CODE) as usize;
        if index < self.types.len() {
            let name = match &self.types[index] {
                TypeSlot::Resolved(descriptor) => return Ok(Arc::clone(descriptor)),
                TypeSlot::Unresolved(name) => name.clone(),
            };
            let descriptor = self
                .resolve(&name)
                .ok_or(GraphError::TypeResolution { name })?;
            self.types[index] = TypeSlot::Resolved(Arc::clone(&descriptor));
            return Ok(descriptor);
        }
        if index > self.types.len() {
            let expected = FIRST_DYNAMIC_CODE as usize + self.types.len();
            return Err(self.corrupt(format!("type code {code} declared before {expected}")));
        }

        let name = self
            .input
            .read_utf()?
            .ok_or_else(|| GraphError::corrupt(format!("null name for type code {code}")))?;
        self.stats.types_declared += 1;
        match self.resolve(&name) {
            Some(descriptor) => {
                debug!(name = %name, code, "type declared");
                self.types.push(TypeSlot::Resolved(Arc::clone(&descriptor)));
                Ok(descriptor)
            }
            None => {
                warn!(name = %name, code, "type not resolvable");
                self.types.push(TypeSlot::Unresolved(name.clone()));
                Err(GraphError::TypeResolution { name })
            }
        }
    }

    /// Header of an unshared string or array: `None` for NUL, the type
    /// otherwise. Handles are rejected.
    fn unshared_header(&mut self, what: &str) -> Result<Option<Arc<TypeDescriptor>>> {
        match self.next_word()? {
            Word::Null => {
                self.stats.nulls += 1;
                Ok(None)
            }
            Word::Type(code) => self.read_type(code).map(Some),
            Word::Handle(handle) => Err(self.corrupt(format!(
                "back-reference {handle} where an unshared {what} was expected"
            ))),
        }
    }

    /// Type and length of an unshared primitive array.
    fn array_header(&mut self, kind: PrimitiveKind) -> Result<Option<usize>> {
        let Some(descriptor) = self.unshared_header("array")? else {
            return Ok(None);
        };
        if descriptor.kind() != TypeKind::Array(kind) {
            return Err(self.corrupt(format!(
                "expected a {kind} array, found type {:?}",
                descriptor.name()
            )));
        }
        self.push_handle(HandleSlot::Unshared);
        self.read_len().map(Some)
    }

    fn read_len(&mut self) -> Result<usize> {
        let len = self.input.read_scalar::<i32>()?;
        usize::try_from(len).map_err(|_| self.corrupt(format!("negative length {len}")))
    }

    fn read_text(&mut self) -> Result<String> {
        self.input
            .read_utf()?
            .ok_or_else(|| GraphError::corrupt("null string body"))
    }

    fn read_fresh(&mut self, descriptor: &Arc<TypeDescriptor>, shared: bool) -> Result<ObjectRef> {
        let index = self.push_handle(if shared {
            HandleSlot::Reserved
        } else {
            HandleSlot::Unshared
        });

        match descriptor.kind() {
            TypeKind::String => {
                let object = new_ref(self.read_text()?);
                self.publish(index, &object);
                Ok(object)
            }
            TypeKind::Array(kind) => {
                let len = self.read_len()?;
                let object = new_ref(self.input.read_array_new(kind, len)?);
                self.publish(index, &object);
                Ok(object)
            }
            TypeKind::RefArray => {
                let len = self.read_len()?;
                let object = new_ref(Object::RefArray(Vec::with_capacity(
                    len.min(MAX_PREALLOCATED_ELEMENTS),
                )));
                // Published before the elements, which may point back here.
                self.publish(index, &object);
                for _ in 0..len {
                    let item = self.read_object()?;
                    if let Object::RefArray(items) = &mut *object.borrow_mut() {
                        items.push(item);
                    }
                }
                Ok(object)
            }
            TypeKind::Instance => {
                let instance = descriptor
                    .instantiate()
                    .ok_or(GraphError::Unsupported("type has no factory"))?;
                let object = new_ref(Object::Instance(instance));
                self.publish(index, &object);
                if descriptor.has_custom_logic() {
                    let mut node = object.borrow_mut();
                    if let Object::Instance(instance) = &mut *node {
                        instance.read_custom(self)?;
                    }
                } else {
                    self.read_fields(descriptor, &object)?;
                }
                Ok(object)
            }
        }
    }

    fn read_fields(&mut self, descriptor: &TypeDescriptor, object: &ObjectRef) -> Result<()> {
        for slot in descriptor.layout().slots() {
            let value = match slot {
                FieldSlot::Primitive(kind, _) => FieldValue::Primitive(self.read_scalar_value(kind)?),
                FieldSlot::Reference(_) => FieldValue::Reference(self.read_object()?),
            };
            if let Object::Instance(instance) = &mut *object.borrow_mut() {
                instance.set_field(slot, value)?;
            }
        }
        Ok(())
    }

    fn corrupt(&self, reason: String) -> GraphError {
        warn!(%reason, "object stream corrupt");
        GraphError::Corrupt(reason)
    }
}

impl<R: Read> ObjectInput for GraphReader<R> {
    fn read_scalar_value(&mut self, kind: PrimitiveKind) -> Result<Scalar> {
        GraphReader::read_scalar_value(self, kind)
    }

    fn read_array_into(&mut self, dst: ArrayMut<'_>) -> Result<()> {
        GraphReader::read_array_into(self, dst)
    }

    fn read_object(&mut self) -> Result<Option<ObjectRef>> {
        GraphReader::read_object(self)
    }

    fn read_string(&mut self) -> Result<Option<String>> {
        GraphReader::read_string(self)
    }
}
