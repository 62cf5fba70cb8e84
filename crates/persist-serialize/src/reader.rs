//! The full load path.
//!
//! Unlike the extractors in `persist-record`, [`ObjectReader`] resolves every
//! class a record names through a [`ClassLoader`]. A record whose class can
//! no longer be found fails here with [`SerializeError::Load`] even though
//! its class name can still be recovered with `extract_class`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use persist_backend::{ClassHandle, ClassLoader};
use persist_record::{Cursor, Opcode, ValueOpcode, MAX_NESTING_DEPTH};
use persist_types::{ClassRef, Oid};

use crate::error::{SerializeError, SerializeResult};
use crate::value::{PersistentObject, PlainObject, State, Value};

/// A decoded record whose classes have all been resolved.
#[derive(Debug)]
pub struct LoadedRecord {
    pub class: ClassHandle,
    pub state: State,
}

/// Decodes records into objects, loading each class named.
pub struct ObjectReader<'a> {
    loader: &'a dyn ClassLoader,
}

impl<'a> ObjectReader<'a> {
    pub fn new(loader: &'a dyn ClassLoader) -> Self {
        Self { loader }
    }

    /// Decode `record` into its class and attribute state.
    ///
    /// References to other persistent objects come back as [`Value::Ref`];
    /// they are not followed.
    pub fn read(&self, record: &[u8]) -> SerializeResult<LoadedRecord> {
        let mut cursor = Cursor::new(record);
        cursor.expect(Opcode::Class)?;
        let class = self.resolve(cursor.read_class()?)?;

        cursor.expect(Opcode::State)?;
        let count = cursor.read_count()?;
        let mut state = State::new();
        for _ in 0..count {
            let name = cursor.read_name()?.to_owned();
            let value = self.value(&mut cursor, 0)?;
            state.insert(name, value);
        }
        cursor.finish()?;

        Ok(LoadedRecord { class, state })
    }

    /// Decode `record` into a persistent object identified by `oid`.
    pub fn load(&self, oid: Oid, record: &[u8]) -> SerializeResult<Arc<PersistentObject>> {
        let loaded = self.read(record)?;
        let obj = PersistentObject::with_oid(loaded.class.class, oid);
        for (name, value) in loaded.state {
            obj.set(name, value);
        }
        debug!(oid = %oid, class = %obj.class(), "loaded object");
        Ok(obj)
    }

    fn resolve(&self, class: ClassRef) -> SerializeResult<ClassHandle> {
        self.loader
            .load_class(&class.module, &class.name)
            .map_err(SerializeError::Load)
    }

    fn value(&self, cursor: &mut Cursor<'_>, depth: usize) -> SerializeResult<Value> {
        let at = cursor.position();
        let value = match cursor.read_value_opcode()? {
            ValueOpcode::None => Value::None,
            ValueOpcode::False => Value::Bool(false),
            ValueOpcode::True => Value::Bool(true),
            ValueOpcode::Int => Value::Int(i64::from_be_bytes(cursor.read_fixed8()?)),
            ValueOpcode::Float => Value::Float(f64::from_bits(u64::from_be_bytes(cursor.read_fixed8()?))),
            ValueOpcode::Str => Value::Str(cursor.read_text()?.to_owned()),
            ValueOpcode::Bytes => Value::Bytes(cursor.read_blob()?.to_vec()),
            ValueOpcode::PersistentRef => Value::Ref(cursor.read_oid()?),
            ValueOpcode::ClassLiteral => {
                let handle = self.resolve(cursor.read_class()?)?;
                Value::Class(handle.class)
            }
            ValueOpcode::List => {
                Self::nested(cursor, at, depth)?;
                let count = cursor.read_count()?;
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(self.value(cursor, depth + 1)?);
                }
                Value::List(items)
            }
            ValueOpcode::Map => {
                Self::nested(cursor, at, depth)?;
                let count = cursor.read_count()?;
                let mut entries = BTreeMap::new();
                for _ in 0..count {
                    let key = cursor.read_name()?.to_owned();
                    entries.insert(key, self.value(cursor, depth + 1)?);
                }
                Value::Map(entries)
            }
            ValueOpcode::Instance => {
                Self::nested(cursor, at, depth)?;
                let handle = self.resolve(cursor.read_class()?)?;
                let obj = PlainObject::new(handle.class);
                let count = cursor.read_count()?;
                for _ in 0..count {
                    let name = cursor.read_name()?.to_owned();
                    obj.set(name, self.value(cursor, depth + 1)?);
                }
                Value::Object(obj)
            }
        };
        Ok(value)
    }

    fn nested(cursor: &Cursor<'_>, at: usize, depth: usize) -> SerializeResult<()> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(cursor
                .malformed(at, format!("nesting deeper than {MAX_NESTING_DEPTH}"))
                .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persist_backend::{InMemoryBackend, StoreError};
    use persist_record::{RecordBuilder, RecordError};

    use crate::writer::ObjectWriter;

    fn class(name: &str) -> ClassRef {
        ClassRef::new("app.models", name)
    }

    #[test]
    fn written_state_reads_back() {
        let backend = InMemoryBackend::new();
        backend.register_class(class("Account"), true);
        backend.register_class(class("Entry"), false);
        backend.register_class(class("Kind"), false);

        let other = PersistentObject::with_oid(class("Account"), Oid::new(77));
        let entry = PlainObject::new(class("Entry"));
        entry.set("amount", -12i64);
        let obj = PersistentObject::new(class("Account"));
        obj.set("owner", "ada");
        obj.set("rate", 0.25f64);
        obj.set("open", true);
        obj.set("blob", vec![1u8, 2, 3]);
        obj.set("peer", &other);
        obj.set("kind", Value::Class(class("Kind")));
        obj.set("entries", vec![Value::from(entry.clone())]);
        obj.set("nothing", Value::None);

        let single = ObjectWriter::new(&backend).serialize_one(&obj).unwrap();
        let loaded = ObjectReader::new(&backend).load(single.oid, &single.data).unwrap();

        assert_eq!(loaded.oid(), obj.oid());
        assert_eq!(loaded.class(), &class("Account"));
        assert_eq!(loaded.get("owner"), Some(Value::from("ada")));
        assert_eq!(loaded.get("rate"), Some(Value::Float(0.25)));
        assert_eq!(loaded.get("open"), Some(Value::Bool(true)));
        assert_eq!(loaded.get("blob"), Some(Value::Bytes(vec![1, 2, 3])));
        assert_eq!(loaded.get("peer"), Some(Value::Ref(Oid::new(77))));
        assert_eq!(loaded.get("kind"), Some(Value::Class(class("Kind"))));
        assert_eq!(loaded.get("entries"), Some(Value::List(vec![Value::from(entry)])));
        assert_eq!(loaded.get("nothing"), Some(Value::None));
    }

    #[test]
    fn missing_header_class_is_load_error() {
        let backend = InMemoryBackend::new();
        let mut b = RecordBuilder::new(&class("Gone")).unwrap();
        b.begin_state(0);
        let err = ObjectReader::new(&backend).read(&b.finish()).unwrap_err();
        assert!(matches!(
            err,
            SerializeError::Load(StoreError::ClassNotFound(c)) if c == class("Gone")
        ));
    }

    #[test]
    fn missing_literal_class_is_load_error() {
        let backend = InMemoryBackend::new();
        backend.register_class(class("Holder"), true);
        let mut b = RecordBuilder::new(&class("Holder")).unwrap();
        b.begin_state(1);
        b.name("kind").unwrap();
        b.class_literal(&class("Gone")).unwrap();
        let err = ObjectReader::new(&backend).read(&b.finish()).unwrap_err();
        assert!(matches!(err, SerializeError::Load(_)));
    }

    #[test]
    fn truncated_record_is_record_error() {
        let backend = InMemoryBackend::new();
        backend.register_class(class("K"), true);
        let mut b = RecordBuilder::new(&class("K")).unwrap();
        b.begin_state(1);
        b.name("n").unwrap();
        b.int(5);
        let record = b.finish();
        let err = ObjectReader::new(&backend)
            .read(&record[..record.len() - 3])
            .unwrap_err();
        assert!(matches!(err, SerializeError::Record(RecordError::Malformed { .. })));
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let backend = InMemoryBackend::new();
        backend.register_class(class("K"), true);
        let mut b = RecordBuilder::new(&class("K")).unwrap();
        b.begin_state(1);
        b.name("deep").unwrap();
        for _ in 0..=MAX_NESTING_DEPTH {
            b.begin_list(1);
        }
        b.none();
        let err = ObjectReader::new(&backend).read(&b.finish()).unwrap_err();
        assert!(matches!(err, SerializeError::Record(RecordError::Malformed { .. })));
    }
}
