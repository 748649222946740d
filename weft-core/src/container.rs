//! Raw Containers and Cells
//!
//! A container is an observable aggregate: object, array, map, or set. The
//! raw container owns the data; observed views (see [`crate::observe`]) are
//! lightweight handles that pair a raw container with an access mode.
//!
//! Containers are identity-keyed. Each one carries a process-unique
//! [`RuntimeId`] that keys its entry in the dependency graph; the entry is
//! torn down when the container is dropped, so the graph never outlives the
//! state it describes.
//!
//! The container kind is resolved once at construction and never changes;
//! every intercepted operation dispatches on it.

use std::cell::{Cell as Flag, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};

use crate::track::{self, DepKey, TargetKind, TrackOp, TriggerOp};
use crate::value::{same_value, MapKey, Value};

/// Unique identity of a tracked target (container or cell).
///
/// Ids are allocated from a single process-wide counter so containers,
/// cells, and any external primitives built on [`crate::track`] share one
/// identity space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId(u64);

impl RuntimeId {
    /// The raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Allocate a fresh [`RuntimeId`].
///
/// Public so external primitives (computed wrappers, refs) can register
/// their own targets with the tracking engine.
pub fn next_runtime_id() -> RuntimeId {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    RuntimeId(COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// The kind of a container, resolved once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// String-keyed record with preserved insertion order.
    Object,
    /// Integer-indexed sequence.
    Array,
    /// Keyed collection with arbitrary scalar keys.
    Map,
    /// Collection of unique scalar members.
    Set,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerKind::Object => "object",
            ContainerKind::Array => "array",
            ContainerKind::Map => "map",
            ContainerKind::Set => "set",
        };
        f.write_str(name)
    }
}

/// The data of a raw container.
pub(crate) enum ContainerData {
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
    Map(IndexMap<MapKey, Value>),
    Set(IndexSet<MapKey>),
}

impl ContainerData {
    fn kind(&self) -> ContainerKind {
        match self {
            ContainerData::Object(_) => ContainerKind::Object,
            ContainerData::Array(_) => ContainerKind::Array,
            ContainerData::Map(_) => ContainerKind::Map,
            ContainerData::Set(_) => ContainerKind::Set,
        }
    }
}

/// A raw, identity-bearing container.
///
/// Never exposed directly; reached through [`crate::observe::Observed`]
/// handles. The `skip` flag opts the container out of observation entirely
/// (`mark_raw`), the `frozen` flag makes wrapping a pass-through (`freeze`).
pub(crate) struct RawContainer {
    id: RuntimeId,
    kind: ContainerKind,
    data: RefCell<ContainerData>,
    skip: Flag<bool>,
    frozen: Flag<bool>,
}

impl RawContainer {
    pub(crate) fn new(data: ContainerData) -> Rc<RawContainer> {
        Rc::new(RawContainer {
            id: next_runtime_id(),
            kind: data.kind(),
            data: RefCell::new(data),
            skip: Flag::new(false),
            frozen: Flag::new(false),
        })
    }

    pub(crate) fn id(&self) -> RuntimeId {
        self.id
    }

    pub(crate) fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub(crate) fn data(&self) -> Ref<'_, ContainerData> {
        self.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, ContainerData> {
        self.data.borrow_mut()
    }

    pub(crate) fn is_skipped(&self) -> bool {
        self.skip.get()
    }

    pub(crate) fn mark_skipped(&self) {
        self.skip.set(true);
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    pub(crate) fn mark_frozen(&self) {
        self.frozen.set(true);
    }
}

impl Drop for RawContainer {
    fn drop(&mut self) {
        track::drop_target(self.id);
    }
}

/// The raw storage behind a [`Cell`].
struct RawCell {
    id: RuntimeId,
    value: RefCell<Value>,
}

impl Drop for RawCell {
    fn drop(&mut self) {
        track::drop_target(self.id);
    }
}

/// A settable cell: an identity-bearing wrapper around a single value.
///
/// Reads through [`Cell::get`] track the cell itself; writes through
/// [`Cell::set`] notify its subscribers. The observation layer honors cells
/// stored inside containers: deep reads on non-array containers unwrap them
/// in place, and deep writes over an existing cell update the cell instead
/// of replacing the slot, preserving the cell's identity for other holders.
///
/// Richer ref-style conveniences (deep conversion of cell contents, typed
/// accessors) belong to downstream layers built on this primitive.
#[derive(Clone)]
pub struct Cell {
    raw: Rc<RawCell>,
}

impl Cell {
    /// Create a cell holding `value` (unwrapped to raw before storage).
    pub fn new(value: Value) -> Cell {
        Cell {
            raw: Rc::new(RawCell {
                id: next_runtime_id(),
                value: RefCell::new(value.into_raw()),
            }),
        }
    }

    /// The cell's identity.
    pub fn id(&self) -> RuntimeId {
        self.raw.id
    }

    /// Read the inner value, tracking the cell as a dependency of the
    /// active computation.
    pub fn get(&self) -> Value {
        track::track(self.raw.id, TrackOp::Get, DepKey::CellValue);
        self.raw.value.borrow().clone()
    }

    /// Read the inner value without establishing a dependency.
    pub fn get_untracked(&self) -> Value {
        self.raw.value.borrow().clone()
    }

    /// Store a new inner value and notify subscribers.
    ///
    /// The incoming value is unwrapped to raw first. Storing a value equal
    /// to the current one under [`same_value`] does not notify.
    pub fn set(&self, value: Value) {
        let value = value.into_raw();
        let old = self.raw.value.borrow().clone();
        if same_value(&value, &old) {
            return;
        }
        *self.raw.value.borrow_mut() = value.clone();
        track::trigger(
            self.raw.id,
            TargetKind::Cell,
            TriggerOp::Set,
            Some(DepKey::CellValue),
            Some(&value),
            Some(&old),
        );
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Cell) -> bool {
        Rc::ptr_eq(&self.raw, &other.raw)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell").field("id", &self.raw.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
