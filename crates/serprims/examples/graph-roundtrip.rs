//! Graph round trip: a folder tree whose children point back at their parent.
//!
//! Run with:
//!   cargo run --example graph-roundtrip

use std::any::Any;
use std::io::Cursor;
use std::rc::Rc;
use std::sync::Arc;

use serprims::graph::{
    new_ref, FieldLayout, FieldSlot, FieldValue, GraphError, GraphObject, GraphReader, GraphWriter,
    Object, ObjectRef, Result, TypeRegistry,
};
use serprims::transport::{PrimitiveKind, Scalar};

const FOLDER: &str = "example.Folder";

#[derive(Debug, Default)]
struct Folder {
    size: i64,
    name: Option<ObjectRef>,
    parent: Option<ObjectRef>,
    children: Option<ObjectRef>,
}

impl GraphObject for Folder {
    fn type_name(&self) -> &str {
        FOLDER
    }

    fn field(&self, slot: FieldSlot) -> Result<FieldValue> {
        Ok(match slot {
            FieldSlot::Primitive(PrimitiveKind::Long, 0) => FieldValue::Primitive(Scalar::Long(self.size)),
            FieldSlot::Reference(0) => FieldValue::Reference(self.name.clone()),
            FieldSlot::Reference(1) => FieldValue::Reference(self.parent.clone()),
            FieldSlot::Reference(2) => FieldValue::Reference(self.children.clone()),
            other => return Err(GraphError::field(FOLDER, format!("no field at {other:?}"))),
        })
    }

    fn set_field(&mut self, slot: FieldSlot, value: FieldValue) -> Result<()> {
        match (slot, value) {
            (FieldSlot::Primitive(PrimitiveKind::Long, 0), FieldValue::Primitive(Scalar::Long(v))) => {
                self.size = v
            }
            (FieldSlot::Reference(0), FieldValue::Reference(r)) => self.name = r,
            (FieldSlot::Reference(1), FieldValue::Reference(r)) => self.parent = r,
            (FieldSlot::Reference(2), FieldValue::Reference(r)) => self.children = r,
            (other, _) => return Err(GraphError::field(FOLDER, format!("no field at {other:?}"))),
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

fn folder(name: &str, size: i64, parent: Option<&ObjectRef>) -> ObjectRef {
    new_ref(Object::Instance(Box::new(Folder {
        size,
        name: Some(new_ref(name)),
        parent: parent.cloned(),
        children: None,
    })))
}

fn set_children(parent: &ObjectRef, children: Option<ObjectRef>) {
    if let Some(f) = parent.borrow_mut().downcast_mut::<Folder>() {
        f.children = children;
    }
}

fn describe(node: &ObjectRef, depth: usize) {
    let object = node.borrow();
    let Some(f) = object.downcast_ref::<Folder>() else {
        return;
    };
    let name = f
        .name
        .as_ref()
        .and_then(|n| n.borrow().as_str().map(str::to_string))
        .unwrap_or_default();
    let back = f.parent.is_some();
    println!("{}{name} ({} bytes, has parent: {back})", "  ".repeat(depth), f.size);
    if let Some(children) = &f.children {
        for child in children.borrow().as_ref_array().unwrap_or_default().iter().flatten() {
            describe(child, depth + 1);
        }
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut registry = TypeRegistry::new();
    registry.register_type::<Folder>(
        FOLDER,
        FieldLayout::empty()
            .with(PrimitiveKind::Long, 1)
            .with_references(3),
    );
    let registry = Arc::new(registry);

    let root = folder("root", 0, None);
    let docs = folder("docs", 4096, Some(&root));
    let src = folder("src", 8192, Some(&root));
    set_children(&root, Some(new_ref(vec![Some(Rc::clone(&docs)), Some(Rc::clone(&src))])));

    let mut writer = GraphWriter::new(Vec::new(), Arc::clone(&registry));
    writer.write_object(Some(&root))?;
    writer.flush()?;
    let stats = writer.stats();
    println!(
        "wrote {} objects, {} back references, {} bytes",
        stats.objects, stats.back_references, stats.bytes
    );
    let bytes = writer.into_inner();
    set_children(&root, None);

    let mut reader = GraphReader::new(Cursor::new(bytes), registry);
    let Some(copy) = reader.read_object()? else {
        return Err("stream held a null root".into());
    };
    describe(&copy, 0);
    set_children(&copy, None);
    Ok(())
}
