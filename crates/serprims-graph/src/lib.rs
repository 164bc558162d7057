//! Object-graph serialization over serprims batches.
//!
//! [`GraphWriter`] turns a graph of [`ObjectRef`] nodes into a batch stream
//! and [`GraphReader`] rebuilds it:
//! - each distinct object is written once; later references are handles
//! - each named type is declared once per epoch; later uses are type codes
//! - cycles terminate at the handle lookup
//! - `reset` / `clear` bound table growth between independent messages
//!
//! Both ends resolve type names through a [`TypeRegistry`] built from the
//! same registrations.
//!
//! ```
//! use std::io::Cursor;
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! use serprims_graph::{new_ref, GraphReader, GraphWriter, TypeRegistry};
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let shared = new_ref("hello");
//!
//! let mut writer = GraphWriter::new(Vec::new(), Arc::clone(&registry));
//! writer.write_object(Some(&shared)).unwrap();
//! writer.write_object(Some(&shared)).unwrap();
//! writer.flush().unwrap();
//!
//! let mut reader = GraphReader::new(Cursor::new(writer.into_inner()), registry);
//! let first = reader.read_object().unwrap().unwrap();
//! let second = reader.read_object().unwrap().unwrap();
//! assert!(Rc::ptr_eq(&first, &second));
//! assert_eq!(first.borrow().as_str(), Some("hello"));
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod identity;
pub mod object;
pub mod reader;
pub mod stats;
pub mod types;
pub mod writer;

pub use config::{GraphConfig, DEFAULT_INITIAL_TABLE_CAPACITY};
pub use error::{GraphError, Result};
pub use identity::{IdentityKey, IdentityTable};
pub use object::{new_ref, GraphObject, Object, ObjectInput, ObjectOutput, ObjectRef};
pub use reader::GraphReader;
pub use stats::StreamStats;
pub use types::{
    FieldLayout, FieldSlot, FieldValue, TypeDescriptor, TypeKind, TypeRegistry, TypeResolver,
};
pub use writer::GraphWriter;
