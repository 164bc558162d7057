//! The sample graph written by `demo` and checked by `inspect`.

use std::any::Any;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use serprims_graph::{
    new_ref, FieldLayout, FieldSlot, FieldValue, GraphError, GraphObject, GraphReader, GraphWriter,
    Object, ObjectRef, Result, TypeRegistry,
};
use serprims_transport::{ArrayMut, ArraySlice, PrimitiveArray, PrimitiveKind, Scalar};

pub const RECORD_TYPE: &str = "serprims.demo.Record";

const TITLE: &str = "serprims demo";
const TRAILER: &str = "end of sample";
const READINGS: i32 = 256;

/// Sample instance type: flags, id, score, a name, and a link to another
/// record.
#[derive(Debug, Default)]
pub struct Record {
    pub active: bool,
    pub id: i64,
    pub score: f64,
    pub name: Option<ObjectRef>,
    pub link: Option<ObjectRef>,
}

impl Record {
    pub fn layout() -> FieldLayout {
        FieldLayout::empty()
            .with(PrimitiveKind::Boolean, 1)
            .with(PrimitiveKind::Long, 1)
            .with(PrimitiveKind::Double, 1)
            .with_references(2)
    }
}

impl GraphObject for Record {
    fn type_name(&self) -> &str {
        RECORD_TYPE
    }

    fn field(&self, slot: FieldSlot) -> Result<FieldValue> {
        let value = match slot {
            FieldSlot::Primitive(PrimitiveKind::Boolean, 0) => FieldValue::Primitive(Scalar::Bool(self.active)),
            FieldSlot::Primitive(PrimitiveKind::Long, 0) => FieldValue::Primitive(Scalar::Long(self.id)),
            FieldSlot::Primitive(PrimitiveKind::Double, 0) => FieldValue::Primitive(Scalar::Double(self.score)),
            FieldSlot::Reference(0) => FieldValue::Reference(self.name.clone()),
            FieldSlot::Reference(1) => FieldValue::Reference(self.link.clone()),
            other => return Err(GraphError::field(RECORD_TYPE, format!("no field at {other:?}"))),
        };
        Ok(value)
    }

    fn set_field(&mut self, slot: FieldSlot, value: FieldValue) -> Result<()> {
        match (slot, value) {
            (FieldSlot::Primitive(PrimitiveKind::Boolean, 0), FieldValue::Primitive(Scalar::Bool(v))) => {
                self.active = v
            }
            (FieldSlot::Primitive(PrimitiveKind::Long, 0), FieldValue::Primitive(Scalar::Long(v))) => self.id = v,
            (FieldSlot::Primitive(PrimitiveKind::Double, 0), FieldValue::Primitive(Scalar::Double(v))) => {
                self.score = v
            }
            (FieldSlot::Reference(0), FieldValue::Reference(r)) => self.name = r,
            (FieldSlot::Reference(1), FieldValue::Reference(r)) => self.link = r,
            (other, _) => return Err(GraphError::field(RECORD_TYPE, format!("no field at {other:?}"))),
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

pub fn registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register_type::<Record>(RECORD_TYPE, Record::layout());
    Arc::new(registry)
}

fn record(id: i64, score: f64, name: Option<ObjectRef>) -> ObjectRef {
    new_ref(Object::Instance(Box::new(Record {
        active: id % 2 == 1,
        id,
        score,
        name,
        link: None,
    })))
}

fn with_record<T>(object: &ObjectRef, f: impl FnOnce(&Record) -> T) -> Option<T> {
    object.borrow().downcast_ref::<Record>().map(f)
}

fn set_link(object: &ObjectRef, link: Option<ObjectRef>) {
    if let Some(record) = object.borrow_mut().downcast_mut::<Record>() {
        record.link = link;
    }
}

/// Write the sample: scalars, a string, two records linked in a cycle and
/// sharing a name, a reference array holding itself and a large int array,
/// a small short array, a null, then the first record again after a reset.
pub fn write_sample<W: Write>(writer: &mut GraphWriter<W>) -> Result<()> {
    writer.write_scalar(true)?;
    writer.write_scalar(3i32)?;
    writer.write_string(Some(TITLE))?;

    let name = new_ref("shared-name");
    let alpha = record(1, 0.5, Some(Rc::clone(&name)));
    let beta = record(2, 1.5, Some(Rc::clone(&name)));
    set_link(&alpha, Some(Rc::clone(&beta)));
    set_link(&beta, Some(Rc::clone(&alpha)));

    let readings = new_ref(PrimitiveArray::from((0..READINGS).collect::<Vec<i32>>()));
    let bag = new_ref(Object::RefArray(vec![
        Some(Rc::clone(&alpha)),
        Some(Rc::clone(&readings)),
        None,
    ]));
    if let Some(items) = bag.borrow_mut().as_ref_array_mut() {
        items.push(Some(Rc::clone(&bag)));
    }

    let result = (|| {
        writer.write_object(Some(&alpha))?;
        writer.write_object(Some(&beta))?;
        writer.write_object(Some(&bag))?;
        writer.write_array(ArraySlice::Short(&[1, 2, 3]))?;
        writer.write_object(None)?;
        writer.reset();
        writer.write_object(Some(&alpha))?;
        writer.write_string(Some(TRAILER))?;
        writer.flush()
    })();

    // Break the cycles so the sample is freed.
    set_link(&alpha, None);
    set_link(&beta, None);
    if let Some(items) = bag.borrow_mut().as_ref_array_mut() {
        items.clear();
    }
    result
}

/// One verified property of a sample read back.
#[derive(Debug, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
}

fn check(checks: &mut Vec<Check>, name: &'static str, passed: bool) {
    if !passed {
        tracing::warn!(check = name, "sample check failed");
    }
    checks.push(Check { name, passed });
}

/// Read a sample back in write order and verify its shape.
pub fn read_sample<R: Read>(reader: &mut GraphReader<R>) -> Result<Vec<Check>> {
    let mut checks = Vec::new();

    let flag = reader.read_scalar::<bool>()?;
    let count = reader.read_scalar::<i32>()?;
    check(&mut checks, "scalars", flag && count == 3);
    let title = reader.read_string()?;
    check(&mut checks, "title", title.as_deref() == Some(TITLE));

    let alpha = reader.read_object()?;
    let beta = reader.read_object()?;
    let bag = reader.read_object()?;
    let mut shorts = [0i16; 3];
    reader.read_array(ArrayMut::Short(&mut shorts))?;
    let null = reader.read_object()?;
    let alpha_again = reader.read_object()?;
    let trailer = reader.read_string()?;

    let (Some(alpha), Some(beta), Some(bag), Some(alpha_again)) = (alpha, beta, bag, alpha_again)
    else {
        return Err(GraphError::corrupt("sample is missing an object"));
    };

    let beta_link = with_record(&beta, |r| r.link.clone()).flatten();
    let alpha_link = with_record(&alpha, |r| r.link.clone()).flatten();
    check(
        &mut checks,
        "cycle",
        alpha_link.as_ref().is_some_and(|l| Rc::ptr_eq(l, &beta))
            && beta_link.as_ref().is_some_and(|l| Rc::ptr_eq(l, &alpha)),
    );

    let alpha_name = with_record(&alpha, |r| r.name.clone()).flatten();
    let beta_name = with_record(&beta, |r| r.name.clone()).flatten();
    let shared_name = match (&alpha_name, &beta_name) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b) && a.borrow().as_str() == Some("shared-name"),
        _ => false,
    };
    check(&mut checks, "shared name", shared_name);

    let ids = with_record(&alpha, |r| (r.id, r.active, r.score)) == Some((1, true, 0.5))
        && with_record(&beta, |r| (r.id, r.active, r.score)) == Some((2, false, 1.5));
    check(&mut checks, "record fields", ids);

    let items: Vec<Option<ObjectRef>> = bag
        .borrow()
        .as_ref_array()
        .map(<[Option<ObjectRef>]>::to_vec)
        .unwrap_or_default();
    let bag_ok = items.len() == 4
        && items[0].as_ref().is_some_and(|o| Rc::ptr_eq(o, &alpha))
        && items[2].is_none()
        && items[3].as_ref().is_some_and(|o| Rc::ptr_eq(o, &bag));
    check(&mut checks, "self-referencing array", bag_ok);

    let readings_ok = items.get(1).and_then(Option::as_ref).is_some_and(|o| {
        o.borrow().as_array() == Some(&PrimitiveArray::from((0..READINGS).collect::<Vec<i32>>()))
    });
    check(&mut checks, "large array", readings_ok);
    check(&mut checks, "small array", shorts == [1, 2, 3]);
    check(&mut checks, "null", null.is_none());

    let fresh_after_reset = !Rc::ptr_eq(&alpha_again, &alpha)
        && with_record(&alpha_again, |r| r.id) == Some(1);
    check(&mut checks, "reset epoch", fresh_after_reset && reader.stats().epoch == 1);
    check(&mut checks, "trailer", trailer.as_deref() == Some(TRAILER));

    // Break the cycles read back.
    for object in [&alpha, &beta, &alpha_again] {
        set_link(object, None);
    }
    if let Some(items) = bag.borrow_mut().as_ref_array_mut() {
        items.clear();
    }

    Ok(checks)
}
