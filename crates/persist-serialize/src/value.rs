//! In-memory object model consumed by the writer and produced by the reader.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard};

use persist_types::{ClassRef, Oid};

/// Attribute table of an object, kept in sorted order.
pub type State = BTreeMap<String, Value>;

/// An attribute value.
#[derive(Clone, Debug)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A persistent object; written as an OID reference, never inlined.
    Persistent(Arc<PersistentObject>),
    /// A persistent object known only by its OID.
    Ref(Oid),
    /// A class used as a value; written as a symbolic name only.
    Class(ClassRef),
    /// A non-persistent instance; written inline.
    Object(Arc<PlainObject>),
    /// A live resource with no encoding.
    Resource(ResourceHandle),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Persistent(_) => "persistent",
            Self::Ref(_) => "ref",
            Self::Class(_) => "class",
            Self::Object(_) => "object",
            Self::Resource(_) => "resource",
        }
    }

    /// Returns `true` if this value is itself a class object.
    pub fn is_class(&self) -> bool {
        matches!(self, Self::Class(_))
    }
}

/// Persistent objects compare by identity (same allocation or same OID);
/// plain objects compare by identity or by class and state.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Persistent(a), Self::Persistent(b)) => {
                Arc::ptr_eq(a, b) || (a.oid().is_some() && a.oid() == b.oid())
            }
            (Self::Ref(a), Self::Ref(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => {
                Arc::ptr_eq(a, b) || (a.class == b.class && *a.state() == *b.state())
            }
            (Self::Resource(a), Self::Resource(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<Oid> for Value {
    fn from(v: Oid) -> Self {
        Self::Ref(v)
    }
}

impl From<Arc<PersistentObject>> for Value {
    fn from(v: Arc<PersistentObject>) -> Self {
        Self::Persistent(v)
    }
}

impl From<&Arc<PersistentObject>> for Value {
    fn from(v: &Arc<PersistentObject>) -> Self {
        Self::Persistent(Arc::clone(v))
    }
}

impl From<Arc<PlainObject>> for Value {
    fn from(v: Arc<PlainObject>) -> Self {
        Self::Object(v)
    }
}

impl From<ResourceHandle> for Value {
    fn from(v: ResourceHandle) -> Self {
        Self::Resource(v)
    }
}

// ---------------------------------------------------------------------------
// PersistentObject
// ---------------------------------------------------------------------------

/// An object with a stable identity in the store.
///
/// The OID slot is write-once: it is either given at construction or bound
/// the first time a writer reaches the object, and never changes after.
pub struct PersistentObject {
    class: ClassRef,
    oid: OnceLock<Oid>,
    state: RwLock<State>,
}

impl PersistentObject {
    /// A new object without an OID.
    pub fn new(class: ClassRef) -> Arc<Self> {
        Arc::new(Self {
            class,
            oid: OnceLock::new(),
            state: RwLock::new(State::new()),
        })
    }

    /// An object that already has an OID (e.g. the root, or a loaded object).
    pub fn with_oid(class: ClassRef, oid: Oid) -> Arc<Self> {
        let obj = Self::new(class);
        obj.bind_oid(oid);
        obj
    }

    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn oid(&self) -> Option<Oid> {
        self.oid.get().copied()
    }

    /// Bind `oid` if the slot is empty; returns whichever OID the object
    /// holds afterwards.
    pub fn bind_oid(&self, oid: Oid) -> Oid {
        *self.oid.get_or_init(|| oid)
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.state
            .write()
            .expect("lock poisoned")
            .insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.state.read().expect("lock poisoned").get(name).cloned()
    }

    /// Read access to the attribute table.
    pub fn state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().expect("lock poisoned")
    }
}

// Attribute values may point back at this object, so only the identity is
// printed.
impl fmt::Debug for PersistentObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentObject")
            .field("class", &self.class.qualified_name())
            .field("oid", &self.oid())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PlainObject
// ---------------------------------------------------------------------------

/// An instance without persistent identity, serialized inline wherever it
/// is referenced.
pub struct PlainObject {
    class: ClassRef,
    state: RwLock<State>,
}

impl PlainObject {
    pub fn new(class: ClassRef) -> Arc<Self> {
        Arc::new(Self {
            class,
            state: RwLock::new(State::new()),
        })
    }

    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.state
            .write()
            .expect("lock poisoned")
            .insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.state.read().expect("lock poisoned").get(name).cloned()
    }

    pub fn state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().expect("lock poisoned")
    }
}

impl fmt::Debug for PlainObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attrs: Vec<String> = self.state().keys().cloned().collect();
        f.debug_struct("PlainObject")
            .field("class", &self.class.qualified_name())
            .field("attributes", &attrs)
            .finish()
    }
}

/// Stand-in for a live resource (open file, socket, lock) held in an
/// attribute. It has no record encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceHandle {
    pub kind: String,
    pub description: String,
}

impl ResourceHandle {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
        }
    }
}
