//! Type descriptors and the registry that resolves type names.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serprims_transport::{PrimitiveKind, Scalar};

use crate::object::{GraphObject, ObjectRef};

/// Type name of strings.
pub const STRING_TYPE: &str = "string";

/// Type name of reference arrays.
pub const REF_ARRAY_TYPE: &str = "[ref";

/// Type name of primitive arrays of `kind`.
pub fn array_type_name(kind: PrimitiveKind) -> String {
    format!("[{}", kind.name())
}

/// What shape a type's values take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A [`GraphObject`] with positional fields.
    Instance,
    String,
    /// Array of nullable object references.
    RefArray,
    /// Array of one primitive kind.
    Array(PrimitiveKind),
}

/// Field counts of an instance type.
///
/// Default serialization visits the primitive fields kind by kind in wire
/// order, then the reference fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldLayout {
    pub counts: [usize; PrimitiveKind::COUNT],
    pub references: usize,
}

impl FieldLayout {
    pub const fn empty() -> Self {
        Self {
            counts: [0; PrimitiveKind::COUNT],
            references: 0,
        }
    }

    /// Add `count` primitive fields of `kind`.
    pub fn with(mut self, kind: PrimitiveKind, count: usize) -> Self {
        self.counts[kind.index()] += count;
        self
    }

    /// Add `count` reference fields.
    pub fn with_references(mut self, count: usize) -> Self {
        self.references += count;
        self
    }

    pub fn count(&self, kind: PrimitiveKind) -> usize {
        self.counts[kind.index()]
    }

    /// Total fields, primitive and reference.
    pub fn len(&self) -> usize {
        self.counts.iter().sum::<usize>() + self.references
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every field slot in serialization order.
    pub fn slots(&self) -> impl Iterator<Item = FieldSlot> + '_ {
        let primitives = PrimitiveKind::ALL
            .into_iter()
            .flat_map(move |kind| (0..self.count(kind)).map(move |i| FieldSlot::Primitive(kind, i)));
        primitives.chain((0..self.references).map(FieldSlot::Reference))
    }
}

/// Position of one field: the n-th field of a primitive kind, or the n-th
/// reference field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSlot {
    Primitive(PrimitiveKind, usize),
    Reference(usize),
}

/// A field's value.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Primitive(Scalar),
    Reference(Option<ObjectRef>),
}

/// Builds an empty instance for the reader to fill.
pub type Factory = fn() -> Box<dyn GraphObject>;

fn default_factory<T: GraphObject + Default>() -> Box<dyn GraphObject> {
    Box::new(T::default())
}

/// Everything the graph layer needs to know about one type.
#[derive(Clone)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    layout: FieldLayout,
    custom_logic: bool,
    factory: Option<Factory>,
}

impl TypeDescriptor {
    /// An instance type serialized field by field.
    pub fn instance(name: impl Into<String>, layout: FieldLayout, factory: Factory) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Instance,
            layout,
            custom_logic: false,
            factory: Some(factory),
        }
    }

    pub fn string() -> Self {
        Self::builtin(STRING_TYPE.to_string(), TypeKind::String)
    }

    pub fn ref_array() -> Self {
        Self::builtin(REF_ARRAY_TYPE.to_string(), TypeKind::RefArray)
    }

    pub fn array(kind: PrimitiveKind) -> Self {
        Self::builtin(array_type_name(kind), TypeKind::Array(kind))
    }

    fn builtin(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            layout: FieldLayout::empty(),
            custom_logic: false,
            factory: None,
        }
    }

    /// Serialize through the object's `write_custom` / `read_custom` hooks
    /// instead of the field layout.
    pub fn with_custom_logic(mut self) -> Self {
        self.custom_logic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    pub fn has_custom_logic(&self) -> bool {
        self.custom_logic
    }

    /// A fresh, empty instance, for instance types.
    pub fn instantiate(&self) -> Option<Box<dyn GraphObject>> {
        self.factory.map(|make| make())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("layout", &self.layout)
            .field("custom_logic", &self.custom_logic)
            .finish()
    }
}

/// Maps type names read off the wire to descriptors.
pub trait TypeResolver {
    fn resolve(&self, name: &str) -> Option<Arc<TypeDescriptor>>;
}

impl<F> TypeResolver for F
where
    F: Fn(&str) -> Option<Arc<TypeDescriptor>>,
{
    fn resolve(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self(name)
    }
}

/// Name-keyed descriptor registry, preloaded with the built-in types.
///
/// Both ends of a stream should be built from the same registrations.
pub struct TypeRegistry {
    by_name: HashMap<String, Arc<TypeDescriptor>>,
    string: Arc<TypeDescriptor>,
    ref_array: Arc<TypeDescriptor>,
    arrays: [Arc<TypeDescriptor>; PrimitiveKind::COUNT],
}

impl TypeRegistry {
    pub fn new() -> Self {
        let string = Arc::new(TypeDescriptor::string());
        let ref_array = Arc::new(TypeDescriptor::ref_array());
        let arrays = PrimitiveKind::ALL.map(|kind| Arc::new(TypeDescriptor::array(kind)));

        let mut by_name = HashMap::new();
        for builtin in arrays.iter().chain([&string, &ref_array]) {
            by_name.insert(builtin.name().to_string(), Arc::clone(builtin));
        }
        Self {
            by_name,
            string,
            ref_array,
            arrays,
        }
    }

    /// Register a descriptor, replacing any previous one with the same name.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let descriptor = Arc::new(descriptor);
        tracing::debug!(name = descriptor.name(), kind = ?descriptor.kind(), "type registered");
        self.by_name
            .insert(descriptor.name().to_string(), Arc::clone(&descriptor));
        descriptor
    }

    /// Register an instance type built from `T::default()`.
    pub fn register_type<T: GraphObject + Default>(
        &mut self,
        name: impl Into<String>,
        layout: FieldLayout,
    ) -> Arc<TypeDescriptor> {
        self.register(TypeDescriptor::instance(name, layout, default_factory::<T>))
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.by_name.get(name).cloned()
    }

    pub fn string_type(&self) -> &Arc<TypeDescriptor> {
        &self.string
    }

    pub fn ref_array_type(&self) -> &Arc<TypeDescriptor> {
        &self.ref_array
    }

    pub fn array_type(&self, kind: PrimitiveKind) -> &Arc<TypeDescriptor> {
        &self.arrays[kind.index()]
    }

    /// Registered names, built-ins included, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeResolver for TypeRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.lookup(name)
    }
}
