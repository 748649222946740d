//! Operation kinds and dependency keys.
//!
//! Structural reads (key enumeration) are tracked under dedicated sentinel
//! keys rather than any real key: adding or removing an entry invalidates
//! whoever iterated the container's shape even though no single key was
//! read. Arrays use the `Length` key as their structural key, since adds
//! and removals always move the length.

use crate::container::ContainerKind;
use crate::value::MapKey;

/// The kind of read being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    /// A value read.
    Get,
    /// An existence check.
    Has,
    /// A structural read (key or member enumeration, size).
    Iterate,
}

/// The kind of write being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// An existing slot changed value.
    Set,
    /// A new key, index, or member appeared.
    Add,
    /// A key, index, or member was removed.
    Delete,
    /// The whole collection was emptied.
    Clear,
}

/// The shape of the target a trigger originates from.
///
/// Resolved by the caller (the observation layer knows its container kind);
/// the notification engine uses it to pick the structural keys to invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A plain object.
    Object,
    /// An array.
    Array,
    /// A map.
    Map,
    /// A set.
    Set,
    /// A settable cell.
    Cell,
}

impl From<ContainerKind> for TargetKind {
    fn from(kind: ContainerKind) -> TargetKind {
        match kind {
            ContainerKind::Object => TargetKind::Object,
            ContainerKind::Array => TargetKind::Array,
            ContainerKind::Map => TargetKind::Map,
            ContainerKind::Set => TargetKind::Set,
        }
    }
}

/// A key in a target's dependency map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// An object property.
    Prop(String),
    /// An array index.
    Index(usize),
    /// The array length (also the array's structural key).
    Length,
    /// A map or set entry key.
    Entry(MapKey),
    /// The single value slot of a cell.
    CellValue,
    /// Sentinel: the container's keys/members were enumerated.
    Iterate,
    /// Sentinel: a map's key set was enumerated.
    MapKeyIterate,
}
