//! The object-graph writer.
//!
//! [`ObjectWriter`] turns a root persistent object into one record per
//! reachable persistent object. Each value met during the walk is
//! classified once:
//!
//! - plain data, composites, and non-persistent instances are encoded inline;
//! - persistent objects become an OID reference and are queued for their own
//!   record;
//! - class objects become a literal class token carrying only the name.
//!   Their class-level attributes are never walked and nothing is recorded
//!   for instantiating them.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use persist_backend::{OidAllocator, RecordStore, RecordWrite, StoreResult};
use persist_record::RecordBuilder;
use persist_types::{ClassRefToken, Oid};

use crate::config::WriterConfig;
use crate::error::{SerializeError, SerializeResult};
use crate::value::{PersistentObject, PlainObject, Value};

/// Records produced by one [`ObjectWriter::serialize`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerializedGraph {
    /// OID of the root object.
    pub root: Oid,
    /// One record per object reached, keyed by OID.
    pub records: BTreeMap<Oid, Vec<u8>>,
    /// OIDs allocated during this call, in allocation order. Objects bound
    /// by an earlier failed call are not listed here.
    pub new_oids: Vec<Oid>,
    /// Every OID referenced from any record in this graph.
    pub references: BTreeSet<Oid>,
}

impl SerializedGraph {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, oid: &Oid) -> Option<&[u8]> {
        self.records.get(oid).map(Vec::as_slice)
    }

    /// Turn the records into a store batch.
    ///
    /// An object with no committed record in `store` is written as new.
    /// Every other object uses the serial returned by `expected`, which should
    /// be the serial its in-memory state was loaded at.
    pub fn to_writes(
        &self,
        store: &dyn RecordStore,
        expected: impl Fn(Oid) -> Option<u64>,
    ) -> StoreResult<Vec<RecordWrite>> {
        self.records
            .iter()
            .map(|(oid, data)| {
                let expected_serial = if store.exists(oid)? { expected(*oid) } else { None };
                Ok(RecordWrite {
                    oid: *oid,
                    expected_serial,
                    data: data.clone(),
                })
            })
            .collect()
    }
}

/// Result of [`ObjectWriter::serialize_one`].
#[derive(Debug)]
pub struct SingleRecord {
    pub oid: Oid,
    pub data: Vec<u8>,
    /// Persistent objects first reached from this record, in discovery order.
    pub discovered: Vec<Arc<PersistentObject>>,
    pub new_oids: Vec<Oid>,
}

/// Serializes persistent objects into records.
pub struct ObjectWriter<'a> {
    allocator: &'a dyn OidAllocator,
    config: WriterConfig,
}

#[derive(Default)]
struct Traversal {
    queue: VecDeque<(Oid, Arc<PersistentObject>)>,
    seen: HashSet<Oid>,
    new_oids: Vec<Oid>,
    references: BTreeSet<Oid>,
}

/// Per-record encoding state: the attribute path for diagnostics, the
/// nesting depth, the plain objects currently being expanded, and how many
/// inline instances have been written so far.
struct Frame {
    oid: Oid,
    path: Vec<String>,
    depth: usize,
    expanding: Vec<Arc<PlainObject>>,
    inline_objects: usize,
}

impl Frame {
    fn new(oid: Oid) -> Self {
        Self {
            oid,
            path: Vec::new(),
            depth: 0,
            expanding: Vec::new(),
            inline_objects: 0,
        }
    }

    fn render_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            if !out.is_empty() && !segment.starts_with('[') {
                out.push('.');
            }
            out.push_str(segment);
        }
        out
    }
}

impl<'a> ObjectWriter<'a> {
    pub fn new(allocator: &'a dyn OidAllocator) -> Self {
        Self::with_config(allocator, WriterConfig::default())
    }

    pub fn with_config(allocator: &'a dyn OidAllocator, config: WriterConfig) -> Self {
        Self { allocator, config }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Serialize `root` and every persistent object reachable from it.
    ///
    /// Cycles among persistent objects are fine: each object is written once
    /// and referenced by OID everywhere else. On error nothing is returned;
    /// OIDs bound before the failure stay bound.
    pub fn serialize(&self, root: &Arc<PersistentObject>) -> SerializeResult<SerializedGraph> {
        let mut traversal = Traversal::default();
        let root_oid = self.identify(root, &mut traversal)?;

        let mut records = BTreeMap::new();
        while let Some((oid, obj)) = traversal.queue.pop_front() {
            let data = self.encode_object(oid, &obj, &mut traversal)?;
            records.insert(oid, data);
        }

        debug!(root = %root_oid, records = records.len(), new_oids = traversal.new_oids.len(), "serialized object graph");
        Ok(SerializedGraph {
            root: root_oid,
            records,
            new_oids: traversal.new_oids,
            references: traversal.references,
        })
    }

    /// Serialize only `obj`, reporting the persistent objects it reaches for
    /// the caller to handle.
    pub fn serialize_one(&self, obj: &Arc<PersistentObject>) -> SerializeResult<SingleRecord> {
        let mut traversal = Traversal::default();
        let oid = self.identify(obj, &mut traversal)?;
        traversal.queue.clear();

        let data = self.encode_object(oid, obj, &mut traversal)?;
        Ok(SingleRecord {
            oid,
            data,
            discovered: traversal.queue.into_iter().map(|(_, o)| o).collect(),
            new_oids: traversal.new_oids,
        })
    }

    /// The OID a value would be referenced by, allocating one for a
    /// persistent object that has none yet.
    ///
    /// A class object has no persistent identity of its own, so this returns
    /// `Ok(None)` for it rather than failing, as it does for any other
    /// non-persistent value.
    pub fn persistent_id(&self, value: &Value) -> SerializeResult<Option<Oid>> {
        match value {
            Value::Persistent(obj) => {
                let mut traversal = Traversal::default();
                self.identify(obj, &mut traversal).map(Some)
            }
            Value::Ref(oid) => Ok(Some(*oid)),
            _ => Ok(None),
        }
    }

    /// The class token a value would be written with.
    ///
    /// A class object yields a [`ClassRefToken::Literal`]; instances yield the
    /// [`ClassRefToken::Blueprint`] of their class; everything else `None`.
    pub fn class_reference_of(value: &Value) -> Option<ClassRefToken> {
        match value {
            Value::Class(class) => Some(ClassRefToken::Literal(class.clone())),
            Value::Persistent(obj) => Some(ClassRefToken::Blueprint(obj.class().clone())),
            Value::Object(obj) => Some(ClassRefToken::Blueprint(obj.class().clone())),
            _ => None,
        }
    }

    // ---------------------------------------------------------------
    // Traversal
    // ---------------------------------------------------------------

    /// Resolve (or allocate) the object's OID and queue it if unseen.
    fn identify(
        &self,
        obj: &Arc<PersistentObject>,
        traversal: &mut Traversal,
    ) -> SerializeResult<Oid> {
        let oid = match obj.oid() {
            Some(oid) => oid,
            None => {
                let allocated = self.allocator.allocate_oid()?;
                let bound = obj.bind_oid(allocated);
                if bound == allocated {
                    debug!(oid = %bound, class = %obj.class(), "assigned oid");
                    traversal.new_oids.push(bound);
                }
                bound
            }
        };
        if traversal.seen.insert(oid) {
            traversal.queue.push_back((oid, Arc::clone(obj)));
        }
        Ok(oid)
    }

    fn encode_object(
        &self,
        oid: Oid,
        obj: &PersistentObject,
        traversal: &mut Traversal,
    ) -> SerializeResult<Vec<u8>> {
        let mut builder = RecordBuilder::new(obj.class())?;
        let mut frame = Frame::new(oid);
        {
            let state = obj.state();
            builder.begin_state(state.len());
            for (name, value) in state.iter() {
                builder.name(name)?;
                frame.path.push(name.clone());
                self.encode_value(value, &mut builder, traversal, &mut frame)?;
                frame.path.pop();
            }
        }

        let data = builder.finish();
        if data.len() > self.config.max_record_size {
            return Err(SerializeError::RecordTooLarge {
                oid,
                size: data.len(),
                max: self.config.max_record_size,
            });
        }
        debug!(oid = %oid, class = %obj.class(), size = data.len(), "encoded record");
        Ok(data)
    }

    fn encode_value(
        &self,
        value: &Value,
        builder: &mut RecordBuilder,
        traversal: &mut Traversal,
        frame: &mut Frame,
    ) -> SerializeResult<()> {
        self.check_size(builder, frame)?;
        match value {
            Value::None => builder.none(),
            Value::Bool(v) => builder.bool(*v),
            Value::Int(v) => builder.int(*v),
            Value::Float(v) => builder.float(*v),
            Value::Str(v) => builder.text(v),
            Value::Bytes(v) => builder.bytes(v),
            Value::List(items) => {
                self.enter(frame)?;
                builder.begin_list(items.len());
                for (i, item) in items.iter().enumerate() {
                    frame.path.push(format!("[{i}]"));
                    self.encode_value(item, builder, traversal, frame)?;
                    frame.path.pop();
                }
                frame.depth -= 1;
            }
            Value::Map(entries) => {
                self.enter(frame)?;
                builder.begin_map(entries.len());
                for (key, item) in entries {
                    builder.name(key)?;
                    frame.path.push(key.clone());
                    self.encode_value(item, builder, traversal, frame)?;
                    frame.path.pop();
                }
                frame.depth -= 1;
            }
            Value::Persistent(obj) => {
                let oid = self.identify(obj, traversal)?;
                traversal.references.insert(oid);
                builder.persistent_ref(oid);
            }
            Value::Ref(oid) => {
                traversal.references.insert(*oid);
                builder.persistent_ref(*oid);
            }
            Value::Class(class) => builder.class_literal(class)?,
            Value::Object(obj) => self.encode_plain(obj, builder, traversal, frame)?,
            Value::Resource(handle) => {
                return Err(SerializeError::UnserializableValue {
                    path: frame.render_path(),
                    kind: format!("{} ({})", handle.kind, handle.description),
                });
            }
        }
        Ok(())
    }

    fn encode_plain(
        &self,
        obj: &Arc<PlainObject>,
        builder: &mut RecordBuilder,
        traversal: &mut Traversal,
        frame: &mut Frame,
    ) -> SerializeResult<()> {
        if frame.expanding.iter().any(|open| Arc::ptr_eq(open, obj)) {
            return Err(SerializeError::CyclicWithoutIdentity {
                path: frame.render_path(),
                class: obj.class().clone(),
            });
        }
        frame.inline_objects += 1;
        if frame.inline_objects > self.config.max_inline_objects {
            return Err(SerializeError::TooManyInlineObjects {
                oid: frame.oid,
                path: frame.render_path(),
                max: self.config.max_inline_objects,
            });
        }
        self.enter(frame)?;
        frame.expanding.push(Arc::clone(obj));

        let state = obj.state();
        builder.begin_instance(obj.class(), state.len())?;
        for (name, value) in state.iter() {
            builder.name(name)?;
            frame.path.push(name.clone());
            self.encode_value(value, builder, traversal, frame)?;
            frame.path.pop();
        }

        frame.expanding.pop();
        frame.depth -= 1;
        Ok(())
    }

    /// Fail as soon as the partial record passes the size limit.
    fn check_size(&self, builder: &RecordBuilder, frame: &Frame) -> SerializeResult<()> {
        if builder.len() > self.config.max_record_size {
            return Err(SerializeError::RecordTooLarge {
                oid: frame.oid,
                size: builder.len(),
                max: self.config.max_record_size,
            });
        }
        Ok(())
    }

    fn enter(&self, frame: &mut Frame) -> SerializeResult<()> {
        let max = self.config.effective_max_depth();
        if frame.depth >= max {
            return Err(SerializeError::DepthLimitExceeded {
                path: frame.render_path(),
                max,
            });
        }
        frame.depth += 1;
        Ok(())
    }
}
