#![allow(dead_code)]

use std::any::Any;
use std::io::Cursor;
use std::sync::Arc;

use serprims_graph::{
    FieldLayout, FieldSlot, FieldValue, GraphError, GraphObject, GraphReader, GraphWriter,
    ObjectInput, ObjectOutput, ObjectRef, Result, TypeDescriptor, TypeRegistry,
};
use serprims_transport::{PrimitiveKind, Scalar};

/// Linked node: one int, a label, and a successor.
#[derive(Default)]
pub struct Node {
    pub value: i32,
    pub label: Option<ObjectRef>,
    pub next: Option<ObjectRef>,
}

impl Node {
    pub fn layout() -> FieldLayout {
        FieldLayout::empty()
            .with(PrimitiveKind::Int, 1)
            .with_references(2)
    }
}

impl GraphObject for Node {
    fn type_name(&self) -> &str {
        "test.Node"
    }

    fn field(&self, slot: FieldSlot) -> Result<FieldValue> {
        match slot {
            FieldSlot::Primitive(PrimitiveKind::Int, 0) => Ok(FieldValue::Primitive(Scalar::Int(self.value))),
            FieldSlot::Reference(0) => Ok(FieldValue::Reference(self.label.clone())),
            FieldSlot::Reference(1) => Ok(FieldValue::Reference(self.next.clone())),
            other => Err(GraphError::field("test.Node", format!("no slot {other:?}"))),
        }
    }

    fn set_field(&mut self, slot: FieldSlot, value: FieldValue) -> Result<()> {
        match (slot, value) {
            (FieldSlot::Primitive(PrimitiveKind::Int, 0), FieldValue::Primitive(Scalar::Int(v))) => {
                self.value = v;
            }
            (FieldSlot::Reference(0), FieldValue::Reference(r)) => self.label = r,
            (FieldSlot::Reference(1), FieldValue::Reference(r)) => self.next = r,
            (other, _) => return Err(GraphError::field("test.Node", format!("no slot {other:?}"))),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Serialized through its own hooks: a name, a weight, raw samples, and a
/// peer reference.
#[derive(Default)]
pub struct Sensor {
    pub name: Option<String>,
    pub weight: f64,
    pub samples: Vec<i16>,
    pub peer: Option<ObjectRef>,
}

impl GraphObject for Sensor {
    fn type_name(&self) -> &str {
        "test.Sensor"
    }

    fn field(&self, slot: FieldSlot) -> Result<FieldValue> {
        Err(GraphError::field("test.Sensor", format!("no slot {slot:?}")))
    }

    fn set_field(&mut self, slot: FieldSlot, _value: FieldValue) -> Result<()> {
        Err(GraphError::field("test.Sensor", format!("no slot {slot:?}")))
    }

    fn write_custom(&self, out: &mut dyn ObjectOutput) -> Result<()> {
        out.write_string(self.name.as_deref())?;
        out.write_f64(self.weight)?;
        out.write_i32(self.samples.len() as i32)?;
        out.write_array_slice(serprims_transport::ArraySlice::Short(&self.samples))?;
        out.write_object(self.peer.as_ref())
    }

    fn read_custom(&mut self, input: &mut dyn ObjectInput) -> Result<()> {
        self.name = input.read_string()?;
        self.weight = input.read_f64()?;
        let len = input.read_i32()? as usize;
        self.samples = vec![0; len];
        input.read_array_into(serprims_transport::ArrayMut::Short(&mut self.samples))?;
        self.peer = input.read_object()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register_type::<Node>("test.Node", Node::layout());
    registry.register(
        TypeDescriptor::instance("test.Sensor", FieldLayout::empty(), || {
            Box::new(Sensor::default())
        })
        .with_custom_logic(),
    );
    Arc::new(registry)
}

pub fn node(value: i32, label: Option<ObjectRef>, next: Option<ObjectRef>) -> ObjectRef {
    serprims_graph::new_ref(serprims_graph::Object::Instance(Box::new(Node { value, label, next })))
}

pub fn value_of(node: &ObjectRef) -> i32 {
    node.borrow().downcast_ref::<Node>().map(|n| n.value).unwrap()
}

pub fn next_of(node: &ObjectRef) -> Option<ObjectRef> {
    node.borrow().downcast_ref::<Node>().and_then(|n| n.next.clone())
}

pub fn label_of(node: &ObjectRef) -> Option<ObjectRef> {
    node.borrow().downcast_ref::<Node>().and_then(|n| n.label.clone())
}

pub fn set_next(node: &ObjectRef, next: Option<ObjectRef>) {
    if let Some(n) = node.borrow_mut().downcast_mut::<Node>() {
        n.next = next;
    }
}

pub fn writer() -> GraphWriter<Vec<u8>> {
    GraphWriter::new(Vec::new(), registry())
}

pub fn reader_for(mut writer: GraphWriter<Vec<u8>>) -> GraphReader<Cursor<Vec<u8>>> {
    writer.flush().unwrap();
    let registry = Arc::clone(writer.registry());
    GraphReader::new(Cursor::new(writer.into_inner()), registry)
}
