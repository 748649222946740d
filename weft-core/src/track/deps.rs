//! Tracking and Notification Engines
//!
//! The dependency graph is a two-level thread-local mapping:
//!
//! ```text
//! RuntimeId (target) -> DepKey -> Dep (set of subscribed effects)
//! ```
//!
//! [`track`] links the active computation to a `(target, key)` pair on read.
//! [`trigger`] computes the exact set of computations a write invalidates
//! and dispatches each one, either synchronously or through its scheduler
//! callback.
//!
//! A target's entry is created lazily on its first tracked read and removed
//! when the target itself is dropped (see [`drop_target`]), so the graph is
//! bounded by the lifetime of the state it describes.
//!
//! # Borrow discipline
//!
//! Subscribers are snapshotted before any of them run: no borrow of the
//! graph (or of any dep set) is held while user code executes, so effects
//! are free to read and write reactive state re-entrantly from inside a
//! dispatch.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::container::RuntimeId;
use crate::effect::{DebugOp, DebuggerEvent, Effect};
use crate::track::context;
use crate::track::ops::{DepKey, TargetKind, TrackOp, TriggerOp};
use crate::value::Value;

/// One subscriber set, shared between the graph and the back-reference
/// lists of the effects it contains.
pub(crate) type Dep = Rc<RefCell<IndexSet<Effect>>>;

thread_local! {
    static TARGET_MAP: RefCell<HashMap<RuntimeId, IndexMap<DepKey, Dep>>> =
        RefCell::new(HashMap::new());
}

/// Record that the active computation read `(target, key)`.
///
/// No-op when tracking is disabled or no computation is running. Idempotent
/// per `(target, key, computation)` triple within one run: the effect is
/// added to the dep set once, and the dep is appended to the effect's
/// back-reference list once.
pub fn track(target: RuntimeId, op: TrackOp, key: DepKey) {
    if !context::tracking_enabled() {
        return;
    }
    let Some(effect) = context::active_effect() else {
        return;
    };

    let new_link = TARGET_MAP.with(|map| {
        let mut map = map.borrow_mut();
        let deps_map = map.entry(target).or_default();
        let dep = deps_map
            .entry(key.clone())
            .or_insert_with(|| Rc::new(RefCell::new(IndexSet::new())))
            .clone();
        let mut subscribers = dep.borrow_mut();
        if subscribers.contains(&effect) {
            false
        } else {
            subscribers.insert(effect.clone());
            effect.push_dep(dep.clone());
            true
        }
    });

    if new_link {
        tracing::trace!(target_id = target.raw(), key = ?key, effect = effect.id(), "tracked read");
        if let Some(hook) = effect.options().on_track.clone() {
            hook(&DebuggerEvent {
                target,
                op: DebugOp::Track(op),
                key: Some(key),
                new_value: None,
                old_value: None,
            });
        }
    }
}

/// Notify every computation subscribed to a write on `target`.
///
/// The subscriber set is derived from the operation kind:
///
/// - `Clear` invalidates every key's subscribers.
/// - An array length change invalidates `Length` subscribers plus every
///   index at or beyond the new length (those entries are being dropped).
/// - Otherwise the exact key's subscribers, plus the structural sentinels:
///   `Iterate` for add/delete on non-arrays and for map sets,
///   `MapKeyIterate` for map add/delete, and `Length` (instead of the
///   generic sentinel) for array add/delete.
///
/// The computation currently running is excluded while tracking is enabled,
/// so a computation mutating its own dependency does not re-trigger itself.
/// Computed-kind subscribers dispatch before plain ones, globally, so
/// derived caches are invalidated before anything reads them.
pub fn trigger(
    target: RuntimeId,
    kind: TargetKind,
    op: TriggerOp,
    key: Option<DepKey>,
    new_value: Option<&Value>,
    old_value: Option<&Value>,
) {
    let tracking = context::tracking_enabled();
    let active = context::active_effect();

    let mut computed_runners: IndexSet<Effect> = IndexSet::new();
    let mut plain: IndexSet<Effect> = IndexSet::new();

    let observed = TARGET_MAP.with(|map| {
        let map = map.borrow();
        let Some(deps_map) = map.get(&target) else {
            // never been tracked
            return false;
        };

        let mut add = |dep: &Dep| {
            for effect in dep.borrow().iter() {
                let is_active_self = active.as_ref().is_some_and(|a| a == effect);
                if is_active_self && tracking {
                    // the computation mutated its own dependency during its
                    // run (count += 1 patterns); re-triggering would loop
                    continue;
                }
                if effect.options().computed {
                    computed_runners.insert(effect.clone());
                } else {
                    plain.insert(effect.clone());
                }
            }
        };

        if op == TriggerOp::Clear {
            for dep in deps_map.values() {
                add(dep);
            }
        } else if kind == TargetKind::Array && key.as_ref() == Some(&DepKey::Length) {
            let new_len = new_value.and_then(Value::as_int).unwrap_or(0).max(0) as usize;
            for (dep_key, dep) in deps_map.iter() {
                match dep_key {
                    DepKey::Length => add(dep),
                    DepKey::Index(i) if *i >= new_len => add(dep),
                    _ => {}
                }
            }
        } else {
            if let Some(key) = &key {
                if let Some(dep) = deps_map.get(key) {
                    add(dep);
                }
            }
            let add_or_delete = matches!(op, TriggerOp::Add | TriggerOp::Delete);
            if kind == TargetKind::Array {
                if add_or_delete {
                    if let Some(dep) = deps_map.get(&DepKey::Length) {
                        add(dep);
                    }
                }
            } else {
                if add_or_delete || (op == TriggerOp::Set && kind == TargetKind::Map) {
                    if let Some(dep) = deps_map.get(&DepKey::Iterate) {
                        add(dep);
                    }
                }
                if add_or_delete && kind == TargetKind::Map {
                    if let Some(dep) = deps_map.get(&DepKey::MapKeyIterate) {
                        add(dep);
                    }
                }
            }
        }
        true
    });

    if !observed || (computed_runners.is_empty() && plain.is_empty()) {
        return;
    }

    tracing::debug!(
        target_id = target.raw(),
        ?op,
        key = ?key,
        computed = computed_runners.len(),
        plain = plain.len(),
        "trigger"
    );

    let event = DebuggerEvent {
        target,
        op: DebugOp::Trigger(op),
        key,
        new_value: new_value.cloned(),
        old_value: old_value.cloned(),
    };

    let run = |effect: &Effect| {
        if let Some(hook) = effect.options().on_trigger.clone() {
            hook(&event);
        }
        if let Some(scheduler) = effect.options().scheduler.clone() {
            scheduler(effect.clone());
        } else {
            effect.run();
        }
    };

    // Computed-kind subscribers first, so derived caches are invalidated
    // before any plain subscriber reads them.
    for effect in &computed_runners {
        run(effect);
    }
    for effect in &plain {
        run(effect);
    }
}

/// Tear down a dropped target's graph entry.
///
/// The entry is detached from the map before it is dropped so that any
/// drops it cascades into (effects released by their last dep set) can
/// re-enter this module without hitting an open borrow.
pub(crate) fn drop_target(target: RuntimeId) {
    let removed = TARGET_MAP
        .try_with(|map| map.borrow_mut().remove(&target))
        .ok()
        .flatten();
    drop(removed);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
