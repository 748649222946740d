//! Observation Layer
//!
//! This module turns raw containers into observable views. A view is an
//! [`Observed`] handle: the raw container plus an [`AccessMode`]. Reads
//! through a reactive view are tracked against the running computation;
//! writes through it notify subscribers. Raw-mode handles are the native,
//! uninstrumented access path: they neither track nor notify.
//!
//! Four observed variants exist, mirroring the wrap API: deep and shallow,
//! mutable and read-only. Deep views lazily wrap nested containers in their
//! own mode as they are read, so proxy creation cost is deferred until a
//! subtree is actually touched. Shallow views track the read but hand back
//! the raw nested value unconverted.
//!
//! Wrapping is idempotent and cheap: a handle is a value struct, so the
//! canonical view for a given (container, mode) pair is structural identity
//! rather than a cached allocation. Re-wrapping an already observed view
//! returns it unchanged; asking for a reactive view of a read-only view
//! returns the read-only view (read-only is terminal). Containers flagged
//! with [`mark_raw`] or [`freeze`] are returned unchanged by every wrap.

mod base;
mod collections;

use std::cell::Ref;
use std::fmt;
use std::rc::Rc;

use crate::container::{ContainerData, ContainerKind, RawContainer, RuntimeId};
use crate::error::{AccessError, AccessResult};
use crate::value::Value;

/// How a handle observes its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Native access: no tracking, no notification.
    Raw,
    /// Deep reactive: reads tracked, writes notified, nested containers
    /// wrapped reactive on read.
    Reactive,
    /// Root-level reactive: reads tracked, writes notified, nested values
    /// returned raw.
    ShallowReactive,
    /// Deep read-only: writes are silent no-ops, nested containers wrapped
    /// read-only on read.
    Readonly,
    /// Root-level read-only: writes are silent no-ops, nested values
    /// returned raw.
    ShallowReadonly,
}

impl AccessMode {
    /// Whether writes through this mode are rejected.
    pub fn is_readonly(self) -> bool {
        matches!(self, AccessMode::Readonly | AccessMode::ShallowReadonly)
    }

    /// Whether this mode stops observation at the root level.
    pub fn is_shallow(self) -> bool {
        matches!(self, AccessMode::ShallowReactive | AccessMode::ShallowReadonly)
    }

    /// Whether ordinary value reads through this mode are tracked.
    /// Read-only views record no subscribers for plain reads (`has` and key
    /// enumeration are the exceptions, handled at the call sites).
    pub(crate) fn tracks(self) -> bool {
        matches!(self, AccessMode::Reactive | AccessMode::ShallowReactive)
    }

    /// The mode nested containers are wrapped in by deep reads.
    pub(crate) fn child_mode(self) -> AccessMode {
        match self {
            AccessMode::Readonly => AccessMode::Readonly,
            _ => AccessMode::Reactive,
        }
    }
}

/// An observable view of a container.
///
/// Equality is identity: same raw container, same access mode.
#[derive(Clone)]
pub struct Observed {
    target: Rc<RawContainer>,
    mode: AccessMode,
}

impl Observed {
    pub(crate) fn from_raw(target: Rc<RawContainer>) -> Observed {
        Observed {
            target,
            mode: AccessMode::Raw,
        }
    }

    /// The identity of the underlying container.
    pub fn id(&self) -> RuntimeId {
        self.target.id()
    }

    /// The container kind (resolved at construction).
    pub fn kind(&self) -> ContainerKind {
        self.target.kind()
    }

    /// This handle's access mode.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether this is a (deep or shallow) reactive view.
    pub fn is_reactive(&self) -> bool {
        matches!(self.mode, AccessMode::Reactive | AccessMode::ShallowReactive)
    }

    /// Whether this is a (deep or shallow) read-only view.
    pub fn is_readonly(&self) -> bool {
        self.mode.is_readonly()
    }

    /// Whether this is any observed view (reactive or read-only).
    pub fn is_proxy(&self) -> bool {
        self.mode != AccessMode::Raw
    }

    /// The raw, uninstrumented handle for the same container.
    pub fn to_raw(&self) -> Observed {
        Observed {
            target: Rc::clone(&self.target),
            mode: AccessMode::Raw,
        }
    }

    /// A deep reactive view of this container.
    pub fn reactive(&self) -> Observed {
        self.wrap_as(AccessMode::Reactive)
    }

    /// A root-level reactive view of this container.
    pub fn shallow_reactive(&self) -> Observed {
        self.wrap_as(AccessMode::ShallowReactive)
    }

    /// A deep read-only view of this container.
    pub fn readonly(&self) -> Observed {
        self.wrap_as(AccessMode::Readonly)
    }

    /// A root-level read-only view of this container.
    pub fn shallow_readonly(&self) -> Observed {
        self.wrap_as(AccessMode::ShallowReadonly)
    }

    /// Opt this container out of observation permanently. Subsequent wraps
    /// return the handle unchanged.
    pub fn mark_raw(&self) -> Observed {
        self.target.mark_skipped();
        self.clone()
    }

    /// Flag the container as frozen: wrapping becomes a pass-through.
    pub fn freeze(&self) -> Observed {
        self.target.mark_frozen();
        self.clone()
    }

    fn wrap_as(&self, mode: AccessMode) -> Observed {
        // Read-only views are terminal: re-wrapping in any mode (including
        // asking for a reactive view) returns the read-only view unchanged.
        if self.mode.is_readonly() {
            return self.clone();
        }
        // An already reactive view stays as-is unless escalated to
        // read-only, which layers over it (flattened onto the raw target).
        if self.mode != AccessMode::Raw {
            if mode.is_readonly() {
                return Observed {
                    target: Rc::clone(&self.target),
                    mode,
                };
            }
            return self.clone();
        }
        // Raw target: opted-out and frozen containers pass through.
        if self.target.is_skipped() || self.target.is_frozen() {
            return self.clone();
        }
        Observed {
            target: Rc::clone(&self.target),
            mode,
        }
    }

    pub(crate) fn raw_data(&self) -> Ref<'_, ContainerData> {
        self.target.data()
    }

    pub(crate) fn expect_kind(&self, expected: ContainerKind) -> AccessResult<()> {
        let found = self.target.kind();
        if found == expected {
            Ok(())
        } else {
            Err(AccessError::KindMismatch { expected, found })
        }
    }

    pub(crate) fn target(&self) -> &RawContainer {
        &self.target
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Observed) -> bool {
        Rc::ptr_eq(&self.target, &other.target) && self.mode == other.mode
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Wrap `value` in a deep reactive view.
///
/// Non-containers pass through unchanged; so do containers flagged with
/// [`mark_raw`] or [`freeze`]. Wrapping a read-only view returns the
/// read-only view unchanged.
pub fn reactive(value: Value) -> Value {
    wrap(value, AccessMode::Reactive)
}

/// Wrap `value` in a root-level reactive view (nested values stay raw).
pub fn shallow_reactive(value: Value) -> Value {
    wrap(value, AccessMode::ShallowReactive)
}

/// Wrap `value` in a deep read-only view.
pub fn readonly(value: Value) -> Value {
    wrap(value, AccessMode::Readonly)
}

/// Wrap `value` in a root-level read-only view.
pub fn shallow_readonly(value: Value) -> Value {
    wrap(value, AccessMode::ShallowReadonly)
}

fn wrap(value: Value, mode: AccessMode) -> Value {
    match value {
        Value::Container(handle) => Value::Container(handle.wrap_as(mode)),
        other => other,
    }
}

/// Whether `value` is a reactive view.
pub fn is_reactive(value: &Value) -> bool {
    value.as_container().is_some_and(Observed::is_reactive)
}

/// Whether `value` is a read-only view.
pub fn is_readonly(value: &Value) -> bool {
    value.as_container().is_some_and(Observed::is_readonly)
}

/// Whether `value` is any observed view.
pub fn is_proxy(value: &Value) -> bool {
    value.as_container().is_some_and(Observed::is_proxy)
}

/// Strip any observed view, returning the raw value.
pub fn to_raw(value: Value) -> Value {
    value.into_raw()
}

/// Opt a container out of observation permanently.
///
/// Non-containers pass through unchanged.
pub fn mark_raw(value: Value) -> Value {
    match value {
        Value::Container(handle) => Value::Container(handle.mark_raw()),
        other => other,
    }
}

/// Flag a container as frozen, making wrapping a pass-through.
pub fn freeze(value: Value) -> Value {
    match value {
        Value::Container(handle) => Value::Container(handle.freeze()),
        other => other,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_is_idempotent() {
        let raw = Value::object([("a", Value::Int(1))]);
        let wrapped = reactive(raw.clone());

        assert_eq!(reactive(wrapped.clone()), wrapped);
        assert_eq!(readonly(readonly(raw.clone())), readonly(raw.clone()));
    }

    #[test]
    fn reactive_of_readonly_returns_the_readonly_view() {
        let raw = Value::object([("a", Value::Int(1))]);
        let ro = readonly(raw);

        let rewrapped = reactive(ro.clone());
        assert_eq!(rewrapped, ro);
        assert!(is_readonly(&rewrapped));
        assert!(!is_reactive(&rewrapped));
    }

    #[test]
    fn readonly_of_reactive_escalates() {
        let raw = Value::object([("a", Value::Int(1))]);
        let rx = reactive(raw);

        let ro = readonly(rx.clone());
        assert!(is_readonly(&ro));
        assert_ne!(ro, rx);
    }

    #[test]
    fn to_raw_round_trips() {
        let raw = Value::object([("a", Value::Int(1))]);
        assert_eq!(to_raw(reactive(raw.clone())), raw);
        assert_eq!(to_raw(readonly(reactive(raw.clone()))), raw);
    }

    #[test]
    fn non_containers_pass_through() {
        assert_eq!(reactive(Value::Int(3)), Value::Int(3));
        assert_eq!(readonly(Value::Str("x".into())), Value::Str("x".into()));
        assert!(!is_proxy(&Value::Int(3)));
    }

    #[test]
    fn marked_raw_containers_refuse_wrapping() {
        let raw = mark_raw(Value::object([("a", Value::Int(1))]));
        let wrapped = reactive(raw.clone());

        assert_eq!(wrapped, raw);
        assert!(!is_reactive(&wrapped));
    }

    #[test]
    fn frozen_containers_refuse_wrapping() {
        let raw = freeze(Value::array([Value::Int(1)]));
        let wrapped = reactive(raw.clone());

        assert_eq!(wrapped, raw);
        assert!(!is_proxy(&wrapped));
    }

    #[test]
    fn shallow_modes_are_distinct_views() {
        let raw = Value::object([("a", Value::Int(1))]);
        let shallow = shallow_reactive(raw.clone());
        let deep = reactive(raw);

        assert_ne!(shallow, deep);
        assert!(is_reactive(&shallow));
        assert!(shallow.as_container().unwrap().mode().is_shallow());
    }
}
