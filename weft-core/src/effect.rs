//! Reactive Computations (Effects)
//!
//! An effect wraps a user function into a re-runnable unit with identity
//! and lifecycle. While the function runs, every read it performs through
//! the observation layer links the effect into the dependency graph; a
//! later write to any of those dependencies re-runs it (or hands it to its
//! scheduler callback).
//!
//! # Dependency cleanup
//!
//! Before every run, the effect detaches itself from all dependency sets it
//! currently belongs to. Dependencies are recomputed from scratch by the
//! run itself: a branch taken last time may not be taken this time, and a
//! stale link would produce ghost re-runs. The back-reference list on the
//! effect makes this cleanup O(number of links).
//!
//! # Re-entrancy
//!
//! An effect already on the call stack is skipped rather than re-entered,
//! so direct self-recursion cannot recurse unboundedly. The call stack and
//! tracking flag are restored through scope guards on every exit path,
//! including panics in the user function.

use std::cell::Cell as Flag;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::container::RuntimeId;
use crate::track::{self, Dep, DepKey, TrackOp, TriggerOp};
use crate::value::Value;

/// Counter for effect ids.
///
/// Ids increase monotonically with creation order; the scheduler sorts
/// queued jobs by them so effects created earlier (parents) flush before
/// effects created later (children).
static EFFECT_UID: AtomicU64 = AtomicU64::new(0);

fn next_effect_id() -> u64 {
    EFFECT_UID.fetch_add(1, Ordering::Relaxed)
}

/// The operation described by a [`DebuggerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugOp {
    /// A read was tracked.
    Track(TrackOp),
    /// A write was dispatched.
    Trigger(TriggerOp),
}

/// Payload passed to the `on_track` / `on_trigger` debug hooks.
///
/// Observation only: these hooks have no effect on the graph.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    /// Identity of the container or cell involved.
    pub target: RuntimeId,
    /// What happened.
    pub op: DebugOp,
    /// The dependency key involved, when the operation carries one.
    pub key: Option<DepKey>,
    /// The incoming value, for writes.
    pub new_value: Option<Value>,
    /// The replaced value, for writes.
    pub old_value: Option<Value>,
}

/// Configuration for an effect.
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Skip the immediate first run; the caller will invoke
    /// [`Effect::run`] itself.
    pub lazy: bool,
    /// Mark this effect as computed-kind: it dispatches before plain
    /// effects in every trigger, so derived caches are invalidated before
    /// their readers run.
    pub computed: bool,
    /// When set, invalidation hands the effect to this callback instead of
    /// re-running it inline. The batching scheduler queues it here.
    pub scheduler: Option<Rc<dyn Fn(Effect)>>,
    /// Debug hook: called when the effect is linked to a new dependency.
    pub on_track: Option<Rc<dyn Fn(&DebuggerEvent)>>,
    /// Debug hook: called when a write dispatches this effect.
    pub on_trigger: Option<Rc<dyn Fn(&DebuggerEvent)>>,
    /// Called exactly once when the effect is stopped.
    pub on_stop: Option<Rc<dyn Fn()>>,
}

struct EffectInner {
    id: u64,
    active: Flag<bool>,
    raw: Rc<dyn Fn()>,
    deps: RefCell<SmallVec<[Dep; 4]>>,
    options: EffectOptions,
}

/// A re-runnable reactive computation.
///
/// Handles are cheap to clone and compare by identity. The dependency graph
/// holds effects strongly: an effect stays alive (and keeps re-running)
/// even if every user handle is dropped, until [`stop`] detaches it.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

/// Create an effect from `fn`, running it once immediately unless
/// `options.lazy` is set.
pub fn effect<F>(f: F, options: EffectOptions) -> Effect
where
    F: Fn() + 'static,
{
    create_effect(Rc::new(f), options)
}

fn create_effect(raw: Rc<dyn Fn()>, options: EffectOptions) -> Effect {
    let handle = Effect {
        inner: Rc::new(EffectInner {
            id: next_effect_id(),
            active: Flag::new(true),
            raw,
            deps: RefCell::new(SmallVec::new()),
            options,
        }),
    };
    if !handle.inner.options.lazy {
        handle.run();
    }
    handle
}

/// Stop an effect: detach it from every dependency set, fire `on_stop`,
/// and deactivate it. Idempotent.
pub fn stop(effect: &Effect) {
    if effect.inner.active.get() {
        cleanup(effect);
        if let Some(hook) = &effect.inner.options.on_stop {
            hook();
        }
        effect.inner.active.set(false);
        tracing::debug!(effect = effect.id(), "effect stopped");
    }
}

/// Detach `effect` from every dependency set in its back-reference list.
fn cleanup(effect: &Effect) {
    let deps: SmallVec<[Dep; 4]> = std::mem::take(&mut *effect.inner.deps.borrow_mut());
    for dep in &deps {
        dep.borrow_mut().swap_remove(effect);
    }
}

impl Effect {
    /// The effect's creation id (ascending with creation order).
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether the effect has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Create a new effect over the same underlying function.
    ///
    /// This is how an existing effect is re-wrapped with different options:
    /// the new effect tracks its own dependencies under its own identity,
    /// starting from the raw function rather than the old runner.
    pub fn rewrap(&self, options: EffectOptions) -> Effect {
        create_effect(Rc::clone(&self.inner.raw), options)
    }

    /// Run the computation.
    ///
    /// A stopped effect with a scheduler is a no-op (a scheduled re-run
    /// arriving after `stop` is dropped); a stopped effect without one runs
    /// the plain function once, without tracking. An effect already on the
    /// call stack is skipped. Otherwise: stale dependencies are detached,
    /// tracking is enabled, the effect is pushed onto the call stack, and
    /// both are restored on every exit path.
    pub fn run(&self) {
        if !self.inner.active.get() {
            if self.inner.options.scheduler.is_some() {
                return;
            }
            let _paused = track::PausedTracking::enter();
            (self.inner.raw)();
            return;
        }
        if track::stack_contains(self.inner.id) {
            return;
        }
        cleanup(self);
        let _scope = track::TrackingScope::enter(self.clone());
        (self.inner.raw)();
    }

    pub(crate) fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    pub(crate) fn push_dep(&self, dep: Dep) {
        self.inner.deps.borrow_mut().push(dep);
    }

    #[cfg(test)]
    fn dep_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Effect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Effect {}

impl Hash for Effect {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.inner.id);
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("active", &self.inner.active.get())
            .field("deps", &self.inner.deps.borrow().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
