//! Object-graph serialization for the persistent-object store.
//!
//! # Architecture
//!
//! - [`value`]: the in-memory object model ([`PersistentObject`],
//!   [`PlainObject`], [`Value`])
//! - [`ObjectWriter`]: walks a graph from a root and emits one record per
//!   persistent object, allocating OIDs as needed
//! - [`ObjectReader`]: the full load path, resolving every class through a
//!   [`ClassLoader`](persist_backend::ClassLoader)
//!
//! Classes used as attribute values are written by name only. The writer
//! never walks their class-level state and the extractors never load them,
//! so a record stays describable after its classes are gone.

pub mod config;
pub mod error;
pub mod reader;
pub mod value;
pub mod writer;

pub use config::WriterConfig;
pub use error::{SerializeError, SerializeResult};
pub use reader::{LoadedRecord, ObjectReader};
pub use value::{PersistentObject, PlainObject, ResourceHandle, State, Value};
pub use writer::{ObjectWriter, SerializedGraph, SingleRecord};

#[cfg(test)]
mod tests {
    use super::*;
    use persist_backend::{ConflictReport, InMemoryBackend, RecordStore, StoreError};
    use persist_record::{extract_class, RecordBuilder};
    use persist_types::{ClassRef, Oid};

    fn missing_class_record() -> Vec<u8> {
        let mut b = RecordBuilder::new(&ClassRef::new(
            "path.that.does.not.exist",
            "likewise.the.class",
        ))
        .unwrap();
        b.begin_state(1);
        b.name("n").unwrap();
        b.int(1);
        b.finish()
    }

    #[test]
    fn unloadable_class_is_still_describable() {
        let backend = InMemoryBackend::new();
        let record = missing_class_record();

        let err = ObjectReader::new(&backend).read(&record).unwrap_err();
        assert!(matches!(err, SerializeError::Load(StoreError::ClassNotFound(_))));

        let class = extract_class(&record).unwrap();
        assert_eq!(class.module, "path.that.does.not.exist");
        assert_eq!(class.name, "likewise.the.class");

        let report = ConflictReport::from_records(Oid::new(1), &record, &record);
        assert!(report
            .to_string()
            .contains("path.that.does.not.exist.likewise.the.class"));
    }

    #[test]
    fn class_attribute_round_trips_without_instantiation() {
        let backend = InMemoryBackend::new();
        let kind = ClassRef::new("app.kinds", "Savings");
        backend.register_class(ClassRef::new("app", "Account"), true);
        backend.register_class(kind.clone(), true);

        let obj = PersistentObject::new(ClassRef::new("app", "Account"));
        obj.set("kind", Value::Class(kind.clone()));
        let graph = ObjectWriter::new(&backend).serialize(&obj).unwrap();
        assert_eq!(graph.len(), 1);

        let loaded = ObjectReader::new(&backend)
            .load(graph.root, graph.record(&graph.root).unwrap())
            .unwrap();
        assert_eq!(loaded.get("kind"), Some(Value::Class(kind)));
    }

    #[test]
    fn write_store_and_conflict() {
        let backend = InMemoryBackend::new();
        let writer = ObjectWriter::new(&backend);

        let root = PersistentObject::with_oid(ClassRef::new("app", "Root"), Oid::ZERO);
        let child = PersistentObject::new(ClassRef::new("app", "Child"));
        root.set("child", &child);
        child.set("parent", &root);

        let graph = writer.serialize(&root).unwrap();
        let serial = backend.store_all(&graph.to_writes(&backend, |_| None).unwrap()).unwrap();
        assert_eq!(backend.len(), 2);

        // A concurrent writer commits first.
        child.set("n", 1i64);
        let update = writer.serialize(&child).unwrap();
        backend
            .store_all(&update.to_writes(&backend, |_| Some(serial)).unwrap())
            .unwrap();

        // Our stale write of the same object now conflicts.
        let stale = PersistentObject::with_oid(ClassRef::new("app", "Renamed"), child.oid().unwrap());
        let stale_graph = writer.serialize(&stale).unwrap();
        let stale_writes = stale_graph.to_writes(&backend, |_| Some(serial)).unwrap();
        match backend.store_all(&stale_writes) {
            Err(StoreError::Conflict(report)) => {
                assert_eq!(report.oid, child.oid().unwrap());
                assert!(!report.same_class());
                let text = report.to_string();
                assert!(text.contains("app.Child"));
                assert!(text.contains("app.Renamed"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}
