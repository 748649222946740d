//! Dynamic Value Model
//!
//! State observed by the reactivity runtime is a dynamic tree of [`Value`]s:
//! scalars, settable cells, and containers (objects, arrays, maps, sets).
//!
//! # Raw storage invariant
//!
//! Values stored *inside* containers are always raw: observed views are
//! unwrapped before storage, so the underlying state never holds a proxy of
//! itself. Reads re-wrap lazily on the way out, in the access mode of the
//! handle performing the read.
//!
//! # Equality
//!
//! Two notions of equality exist:
//!
//! - [`PartialEq`] on `Value` is structural for scalars and identity-based
//!   for cells and containers (same target *and* same access mode).
//! - [`same_value`] is the change-detection comparison used by writes: like
//!   `==` but `NaN` equals `NaN`, so re-storing `NaN` does not notify.
//!
//! # JSON bridge
//!
//! [`Value::from_json`] / [`Value::to_json`] convert between `Value` trees
//! and `serde_json::Value`, for hydrating observable state from plain data
//! and for snapshotting it back out. `Value` also implements
//! [`serde::Serialize`] directly. Trees must be acyclic to serialize.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::container::{Cell, ContainerData, RawContainer};
use crate::error::AccessError;
use crate::observe::Observed;

/// A dynamic value in the observable state tree.
#[derive(Clone, Debug)]
pub enum Value {
    /// The absent value. Missing keys and out-of-bounds indices read as Null.
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// An owned string.
    Str(String),
    /// A settable cell: an identity-bearing wrapper around a single value
    /// whose reads and writes are individually tracked.
    Cell(Cell),
    /// A container handle (object, array, map, or set) in some access mode.
    Container(Observed),
}

impl Value {
    /// Build a raw object container from `(key, value)` entries.
    ///
    /// Entries are unwrapped to raw before storage; insertion order is
    /// preserved.
    pub fn object<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let data: IndexMap<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into_raw()))
            .collect();
        Value::Container(Observed::from_raw(RawContainer::new(
            ContainerData::Object(data),
        )))
    }

    /// Build a raw array container.
    pub fn array<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
    {
        let data: Vec<Value> = items.into_iter().map(Value::into_raw).collect();
        Value::Container(Observed::from_raw(RawContainer::new(ContainerData::Array(
            data,
        ))))
    }

    /// Build a raw map container from `(key, value)` entries.
    pub fn map<I>(entries: I) -> Value
    where
        I: IntoIterator<Item = (MapKey, Value)>,
    {
        let data: IndexMap<MapKey, Value> = entries
            .into_iter()
            .map(|(k, v)| (k, v.into_raw()))
            .collect();
        Value::Container(Observed::from_raw(RawContainer::new(ContainerData::Map(
            data,
        ))))
    }

    /// Build a raw set container from its members.
    pub fn set<I>(members: I) -> Value
    where
        I: IntoIterator<Item = MapKey>,
    {
        let data: IndexSet<MapKey> = members.into_iter().collect();
        Value::Container(Observed::from_raw(RawContainer::new(ContainerData::Set(
            data,
        ))))
    }

    /// Whether this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is a container handle.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Container(_))
    }

    /// The integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float payload, if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The container handle, if this is a `Container`.
    pub fn as_container(&self) -> Option<&Observed> {
        match self {
            Value::Container(o) => Some(o),
            _ => None,
        }
    }

    /// Consume the value, returning the container handle if present.
    pub fn into_container(self) -> Option<Observed> {
        match self {
            Value::Container(o) => Some(o),
            _ => None,
        }
    }

    /// The cell handle, if this is a `Cell`.
    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Value::Cell(c) => Some(c),
            _ => None,
        }
    }

    /// Strip the observed view from a container handle, leaving the raw
    /// handle. Scalars and cells pass through unchanged.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Container(o) => Value::Container(o.to_raw()),
            other => other,
        }
    }

    /// Convert a `serde_json::Value` into a raw `Value` tree.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from_json))
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from_json(v))))
            }
        }
    }

    /// Snapshot this value as plain JSON.
    ///
    /// Cells serialize their inner value; map and set keys are stringified.
    /// Non-finite floats become JSON null. The tree must be acyclic.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Cell(c) => c.get_untracked().to_json(),
            Value::Container(o) => {
                let data = o.raw_data();
                match &*data {
                    ContainerData::Object(map) => serde_json::Value::Object(
                        map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
                    ),
                    ContainerData::Array(items) => {
                        serde_json::Value::Array(items.iter().map(Value::to_json).collect())
                    }
                    ContainerData::Map(map) => serde_json::Value::Object(
                        map.iter()
                            .map(|(k, v)| (k.to_string(), v.to_json()))
                            .collect(),
                    ),
                    ContainerData::Set(set) => serde_json::Value::Array(
                        set.iter().map(|k| Value::from(k.clone()).to_json()).collect(),
                    ),
                }
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Cell(a), Value::Cell(b)) => a == b,
            (Value::Container(a), Value::Container(b)) => a == b,
            _ => false,
        }
    }
}

/// SameValueZero comparison: like `==`, except `NaN` equals `NaN`.
///
/// This is the change-detection relation for writes: storing a value that is
/// `same_value`-equal to the previous one does not notify subscribers.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => a == b,
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<Cell> for Value {
    fn from(v: Cell) -> Value {
        Value::Cell(v)
    }
}

impl From<Observed> for Value {
    fn from(v: Observed) -> Value {
        Value::Container(v)
    }
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Value {
        match key {
            MapKey::Null => Value::Null,
            MapKey::Bool(b) => Value::Bool(b),
            MapKey::Int(i) => Value::Int(i),
            MapKey::Float(f) => Value::Float(f.get()),
            MapKey::Str(s) => Value::Str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Cell(c) => c.get_untracked().serialize(serializer),
            Value::Container(o) => {
                let data = o.raw_data();
                match &*data {
                    ContainerData::Object(map) => {
                        let mut ser = serializer.serialize_map(Some(map.len()))?;
                        for (k, v) in map {
                            ser.serialize_entry(k, v)?;
                        }
                        ser.end()
                    }
                    ContainerData::Array(items) => {
                        let mut ser = serializer.serialize_seq(Some(items.len()))?;
                        for item in items {
                            ser.serialize_element(item)?;
                        }
                        ser.end()
                    }
                    ContainerData::Map(map) => {
                        let mut ser = serializer.serialize_map(Some(map.len()))?;
                        for (k, v) in map {
                            ser.serialize_entry(k, v)?;
                        }
                        ser.end()
                    }
                    ContainerData::Set(set) => {
                        let mut ser = serializer.serialize_seq(Some(set.len()))?;
                        for k in set {
                            ser.serialize_element(k)?;
                        }
                        ser.end()
                    }
                }
            }
        }
    }
}

/// A hashable float key, canonicalized so `NaN` is a usable key and
/// `-0.0` aliases `0.0` (SameValueZero key semantics).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatKey(u64);

impl FloatKey {
    /// Canonicalize and wrap a float for use as a key.
    pub fn new(value: f64) -> FloatKey {
        let canonical = if value.is_nan() {
            f64::NAN
        } else if value == 0.0 {
            0.0
        } else {
            value
        };
        FloatKey(canonical.to_bits())
    }

    /// The float this key represents.
    pub fn get(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl fmt::Debug for FloatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.get())
    }
}

/// The hashable subset of [`Value`] usable as a map or set key.
///
/// Containers and cells are rejected as keys: the runtime stores raw values
/// only, and identity keys would alias between raw and observed views.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    /// The null key.
    Null,
    /// A boolean key.
    Bool(bool),
    /// An integer key.
    Int(i64),
    /// A float key (bit-canonical, `NaN` allowed).
    Float(FloatKey),
    /// A string key.
    Str(String),
}

impl MapKey {
    /// Build a float key.
    pub fn float(value: f64) -> MapKey {
        MapKey::Float(FloatKey::new(value))
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Null => write!(f, "null"),
            MapKey::Bool(b) => write!(f, "{b}"),
            MapKey::Int(i) => write!(f, "{i}"),
            MapKey::Float(v) => write!(f, "{}", v.get()),
            MapKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for MapKey {
    fn from(v: bool) -> MapKey {
        MapKey::Bool(v)
    }
}

impl From<i32> for MapKey {
    fn from(v: i32) -> MapKey {
        MapKey::Int(i64::from(v))
    }
}

impl From<i64> for MapKey {
    fn from(v: i64) -> MapKey {
        MapKey::Int(v)
    }
}

impl From<&str> for MapKey {
    fn from(v: &str) -> MapKey {
        MapKey::Str(v.to_string())
    }
}

impl From<String> for MapKey {
    fn from(v: String) -> MapKey {
        MapKey::Str(v)
    }
}

impl TryFrom<Value> for MapKey {
    type Error = AccessError;

    fn try_from(value: Value) -> Result<MapKey, AccessError> {
        match value {
            Value::Null => Ok(MapKey::Null),
            Value::Bool(b) => Ok(MapKey::Bool(b)),
            Value::Int(i) => Ok(MapKey::Int(i)),
            Value::Float(f) => Ok(MapKey::float(f)),
            Value::Str(s) => Ok(MapKey::Str(s)),
            Value::Cell(_) => Err(AccessError::InvalidKey("cell")),
            Value::Container(_) => Err(AccessError::InvalidKey("container")),
        }
    }
}

impl Serialize for MapKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MapKey::Null => serializer.serialize_unit(),
            MapKey::Bool(b) => serializer.serialize_bool(*b),
            MapKey::Int(i) => serializer.serialize_i64(*i),
            MapKey::Float(f) => serializer.serialize_f64(f.get()),
            MapKey::Str(s) => serializer.serialize_str(s),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
