//! Integration Tests for the Reactivity Runtime
//!
//! These tests exercise the full pipeline: observed containers feeding the
//! tracking engine, writes dispatching through the notification engine, and
//! batched re-runs draining through the scheduler.

use std::cell::Cell as Counter;
use std::cell::RefCell;
use std::rc::Rc;

use weft_core::scheduler::{queue_job, queue_post_flush_cb, tick, Job};
use weft_core::{
    effect, pause_tracking, reactive, readonly, reset_tracking, stop, DebugOp, EffectOptions,
    MapKey, Observed, TriggerOp, Value,
};

fn counted() -> (Rc<Counter<i32>>, Rc<Counter<i32>>) {
    let counter = Rc::new(Counter::new(0));
    (counter.clone(), counter)
}

fn reactive_object<const N: usize>(entries: [(&str, Value); N]) -> Observed {
    reactive(Value::object(entries)).into_container().unwrap()
}

/// A write to a tracked key re-runs the reader exactly once; a write that
/// stores an equal value re-runs nothing.
#[test]
fn equal_value_writes_are_suppressed() {
    let state = reactive_object([("a", Value::Int(1))]);
    let (runs, runs_inner) = counted();

    let reader = state.clone();
    let _handle = effect(
        move || {
            let _ = reader.get("a").unwrap();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);

    // Same value: no notification
    state.set("a", Value::Int(1)).unwrap();
    assert_eq!(runs.get(), 1);

    // Changed value: exactly one re-run
    state.set("a", Value::Int(2)).unwrap();
    assert_eq!(runs.get(), 2);
}

/// Effects reading an array's length are notified by structural changes.
#[test]
fn push_notifies_length_subscribers() {
    let arr = reactive(Value::array([Value::Int(1), Value::Int(2), Value::Int(3)]))
        .into_container()
        .unwrap();
    let (runs, runs_inner) = counted();

    let reader = arr.clone();
    let _handle = effect(
        move || {
            let _ = reader.len().unwrap();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);

    arr.push(Value::Int(4)).unwrap();
    assert_eq!(runs.get(), 2);
}

/// Shrinking an array invalidates readers of the dropped indices.
#[test]
fn shrinking_invalidates_dropped_indices() {
    let arr = reactive(Value::array([Value::Int(1), Value::Int(2), Value::Int(3)]))
        .into_container()
        .unwrap();
    let (runs, runs_inner) = counted();

    let reader = arr.clone();
    let _handle = effect(
        move || {
            let _ = reader.index(2).unwrap();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);

    // Index 2 is being dropped: the reader re-runs and now sees Null.
    arr.set_len(2).unwrap();
    assert_eq!(runs.get(), 2);
    assert_eq!(arr.to_raw().index(2).unwrap(), Value::Null);

    // Same length again: nothing to notify.
    arr.set_len(2).unwrap();
    assert_eq!(runs.get(), 2);
}

/// Enumerating a map subscribes to its shape: adds and deletes re-run the
/// enumerator, value-only overwrites do not.
#[test]
fn map_key_enumeration_tracks_shape_only() {
    let map = reactive(Value::map([(MapKey::from("a"), Value::Int(1))]))
        .into_container()
        .unwrap();
    let (runs, runs_inner) = counted();

    let reader = map.clone();
    let _handle = effect(
        move || {
            let _ = reader.map_keys().unwrap();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);

    // Overwriting an existing key leaves the key set unchanged
    map.insert(MapKey::from("a"), Value::Int(2)).unwrap();
    assert_eq!(runs.get(), 1);

    map.insert(MapKey::from("b"), Value::Int(1)).unwrap();
    assert_eq!(runs.get(), 2);

    map.remove_entry(&MapKey::from("a")).unwrap();
    assert_eq!(runs.get(), 3);
}

/// Size reads subscribe to the generic iteration sentinel, which map value
/// overwrites also invalidate (iteration observes values, not just keys).
#[test]
fn map_size_subscribes_to_iteration() {
    let map = reactive(Value::map([])).into_container().unwrap();
    let (runs, runs_inner) = counted();

    let reader = map.clone();
    let _handle = effect(
        move || {
            let _ = reader.size().unwrap();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);

    map.insert(MapKey::from("a"), Value::Int(1)).unwrap();
    assert_eq!(runs.get(), 2);
}

/// Clearing a collection invalidates every subscriber of the target.
#[test]
fn clear_invalidates_all_subscribers() {
    let set = reactive(Value::set([MapKey::Int(1), MapKey::Int(2)]))
        .into_container()
        .unwrap();
    let (runs, runs_inner) = counted();

    let reader = set.clone();
    let _handle = effect(
        move || {
            let _ = reader.has_member(&MapKey::Int(1)).unwrap();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);

    set.clear().unwrap();
    assert_eq!(runs.get(), 2);
}

/// An effect that mutates its own dependency does not re-trigger itself;
/// other subscribers of the key are re-run normally.
///
/// The exclusion covers only the single currently running effect. Two
/// distinct effects each writing the other's dependency can still trigger
/// each other indefinitely; that shape is a known limitation, not handled
/// by broader cycle detection.
#[test]
fn self_mutation_does_not_loop() {
    let state = reactive_object([("count", Value::Int(0))]);

    let (observer_runs, observer_inner) = counted();
    let reader = state.clone();
    let _observer = effect(
        move || {
            let _ = reader.get("count").unwrap();
            observer_inner.set(observer_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(observer_runs.get(), 1);

    let (mutator_runs, mutator_inner) = counted();
    let writer = state.clone();
    let _mutator = effect(
        move || {
            let current = writer.get("count").unwrap().as_int().unwrap();
            writer.set("count", Value::Int(current + 1)).unwrap();
            mutator_inner.set(mutator_inner.get() + 1);
        },
        EffectOptions::default(),
    );

    // The mutator ran once and did not re-trigger itself; the observer
    // re-ran exactly once for the increment.
    assert_eq!(mutator_runs.get(), 1);
    assert_eq!(observer_runs.get(), 2);
    assert_eq!(state.get("count").unwrap(), Value::Int(1));
}

/// Many writes inside one tick produce one batched re-run of a
/// scheduler-backed effect.
#[test]
fn scheduler_batches_writes_within_a_tick() {
    let state = reactive_object([("a", Value::Int(0)), ("b", Value::Int(0))]);
    let (runs, runs_inner) = counted();

    let reader = state.clone();
    let _handle = effect(
        move || {
            let _ = reader.get("a").unwrap();
            let _ = reader.get("b").unwrap();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions {
            scheduler: Some(Rc::new(|e| queue_job(Job::for_effect(&e)))),
            ..Default::default()
        },
    );
    assert_eq!(runs.get(), 1);

    state.set("a", Value::Int(1)).unwrap();
    state.set("b", Value::Int(1)).unwrap();

    // Nothing re-ran synchronously; one deduplicated job is pending.
    assert_eq!(runs.get(), 1);
    tick();
    assert_eq!(runs.get(), 2);
}

/// Scheduled effects flush in creation order regardless of enqueue order.
#[test]
fn flush_order_follows_creation_ids() {
    let state = reactive_object([("a", Value::Int(0)), ("b", Value::Int(0))]);
    let order: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));

    let scheduler = |e: weft_core::Effect| queue_job(Job::for_effect(&e));

    let reader = state.clone();
    let log = order.clone();
    let _first = effect(
        move || {
            let _ = reader.get("a").unwrap();
            log.borrow_mut().push("first");
        },
        EffectOptions {
            scheduler: Some(Rc::new(scheduler)),
            ..Default::default()
        },
    );

    let reader = state.clone();
    let log = order.clone();
    let _second = effect(
        move || {
            let _ = reader.get("b").unwrap();
            log.borrow_mut().push("second");
        },
        EffectOptions {
            scheduler: Some(Rc::new(scheduler)),
            ..Default::default()
        },
    );

    order.borrow_mut().clear();

    // Enqueue in reverse creation order
    state.set("b", Value::Int(1)).unwrap();
    state.set("a", Value::Int(1)).unwrap();
    tick();

    assert_eq!(*order.borrow(), vec!["first", "second"]);
}

/// Computed-kind subscribers dispatch before plain ones, so derived caches
/// invalidate before anything reads them.
#[test]
fn computed_subscribers_run_before_plain_ones() {
    let state = reactive_object([("n", Value::Int(0))]);
    let order: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));

    // Plain effect created first: creation order must not win over kind.
    let reader = state.clone();
    let log = order.clone();
    let _plain = effect(
        move || {
            let _ = reader.get("n").unwrap();
            log.borrow_mut().push("plain");
        },
        EffectOptions::default(),
    );

    let reader = state.clone();
    let log = order.clone();
    let _derived = effect(
        move || {
            let _ = reader.get("n").unwrap();
            log.borrow_mut().push("computed");
        },
        EffectOptions {
            computed: true,
            ..Default::default()
        },
    );

    order.borrow_mut().clear();
    state.set("n", Value::Int(1)).unwrap();

    assert_eq!(*order.borrow(), vec!["computed", "plain"]);
}

/// Dependencies are rebuilt on every run: a branch not taken this time is
/// no longer a dependency.
#[test]
fn stale_branch_dependencies_are_cleaned_up() {
    let state = reactive_object([
        ("flag", Value::Bool(true)),
        ("a", Value::Int(1)),
        ("b", Value::Int(2)),
    ]);
    let (runs, runs_inner) = counted();

    let reader = state.clone();
    let _handle = effect(
        move || {
            let flag = reader.get("flag").unwrap().as_bool().unwrap();
            let _ = if flag {
                reader.get("a").unwrap()
            } else {
                reader.get("b").unwrap()
            };
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);

    // The untaken branch is not a dependency
    state.set("b", Value::Int(5)).unwrap();
    assert_eq!(runs.get(), 1);

    state.set("flag", Value::Bool(false)).unwrap();
    assert_eq!(runs.get(), 2);

    // Dependencies flipped: `a` is stale now, `b` is live
    state.set("a", Value::Int(99)).unwrap();
    assert_eq!(runs.get(), 2);
    state.set("b", Value::Int(6)).unwrap();
    assert_eq!(runs.get(), 3);
}

/// Nested runs restore the outer computation as the active one, so reads
/// after the inner run are charged to the outer effect.
#[test]
fn nested_runs_restore_the_outer_computation() {
    let state = reactive_object([
        ("x", Value::Int(0)),
        ("y", Value::Int(0)),
        ("z", Value::Int(0)),
    ]);

    let (inner_runs, inner_counter) = counted();
    let reader = state.clone();
    let inner = effect(
        move || {
            let _ = reader.get("y").unwrap();
            inner_counter.set(inner_counter.get() + 1);
        },
        EffectOptions {
            lazy: true,
            ..Default::default()
        },
    );

    let (outer_runs, outer_counter) = counted();
    let reader = state.clone();
    let inner_handle = inner.clone();
    let _outer = effect(
        move || {
            let _ = reader.get("x").unwrap();
            inner_handle.run();
            let _ = reader.get("z").unwrap();
            outer_counter.set(outer_counter.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(outer_runs.get(), 1);
    assert_eq!(inner_runs.get(), 1);

    // `z` was read after the nested run completed: it belongs to the outer
    // effect.
    state.set("z", Value::Int(1)).unwrap();
    assert_eq!(outer_runs.get(), 2);
    assert_eq!(inner_runs.get(), 2);

    // `y` belongs to the inner effect only.
    state.set("y", Value::Int(1)).unwrap();
    assert_eq!(inner_runs.get(), 3);
    assert_eq!(outer_runs.get(), 2);
}

/// Reads inside a paused-tracking section are not recorded.
#[test]
fn paused_sections_do_not_track() {
    let state = reactive_object([("a", Value::Int(0)), ("b", Value::Int(0))]);
    let (runs, runs_inner) = counted();

    let reader = state.clone();
    let _handle = effect(
        move || {
            let _ = reader.get("a").unwrap();
            pause_tracking();
            let _ = reader.get("b").unwrap();
            reset_tracking();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);

    state.set("b", Value::Int(1)).unwrap();
    assert_eq!(runs.get(), 1);

    state.set("a", Value::Int(1)).unwrap();
    assert_eq!(runs.get(), 2);
}

/// After stop, no write re-runs the computation; a scheduled run arriving
/// late is dropped.
#[test]
fn stopped_effects_never_re_run() {
    let state = reactive_object([("a", Value::Int(0))]);
    let (runs, runs_inner) = counted();

    let reader = state.clone();
    let handle = effect(
        move || {
            let _ = reader.get("a").unwrap();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions {
            scheduler: Some(Rc::new(|e| queue_job(Job::for_effect(&e)))),
            ..Default::default()
        },
    );
    assert_eq!(runs.get(), 1);

    // Queue a re-run, then stop before the flush: the in-flight job is
    // effectively cancelled.
    state.set("a", Value::Int(1)).unwrap();
    stop(&handle);
    tick();
    assert_eq!(runs.get(), 1);

    state.set("a", Value::Int(2)).unwrap();
    tick();
    assert_eq!(runs.get(), 1);
}

/// Writes through a read-only view mutate nothing and notify nobody.
#[test]
fn readonly_views_do_not_notify() {
    let raw = Value::object([("a", Value::Int(1))]);
    let state = reactive(raw.clone()).into_container().unwrap();
    let view = readonly(raw).into_container().unwrap();
    let (runs, runs_inner) = counted();

    let reader = state.clone();
    let _handle = effect(
        move || {
            let _ = reader.get("a").unwrap();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);

    view.set("a", Value::Int(99)).unwrap();
    assert_eq!(runs.get(), 1);
    assert_eq!(state.get("a").unwrap(), Value::Int(1));
}

/// Cells stored in objects auto-unwrap on read and keep their identity on
/// write; both paths notify the cell's subscribers.
#[test]
fn stored_cells_participate_in_tracking() {
    let cell = weft_core::Cell::new(Value::Int(0));
    let state = reactive_object([("c", Value::Cell(cell.clone()))]);
    let (runs, runs_inner) = counted();

    let reader = state.clone();
    let _handle = effect(
        move || {
            let _ = reader.get("c").unwrap();
            runs_inner.set(runs_inner.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);

    // Direct write through the cell
    cell.set(Value::Int(1));
    assert_eq!(runs.get(), 2);

    // Write through the container: updates the cell in place
    state.set("c", Value::Int(2)).unwrap();
    assert_eq!(runs.get(), 3);
    assert_eq!(cell.get_untracked(), Value::Int(2));
}

/// Post-flush callbacks run after the render jobs of the same flush.
#[test]
fn post_flush_callbacks_run_after_scheduled_effects() {
    let state = reactive_object([("a", Value::Int(0))]);
    let order: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));

    let reader = state.clone();
    let log = order.clone();
    let _handle = effect(
        move || {
            let _ = reader.get("a").unwrap();
            log.borrow_mut().push("render");
        },
        EffectOptions {
            scheduler: Some(Rc::new(|e| queue_job(Job::for_effect(&e)))),
            ..Default::default()
        },
    );
    order.borrow_mut().clear();

    state.set("a", Value::Int(1)).unwrap();
    let log = order.clone();
    queue_post_flush_cb(Rc::new(move || log.borrow_mut().push("mounted")));

    tick();
    assert_eq!(*order.borrow(), vec!["render", "mounted"]);
}

/// The debug hooks observe tracking and triggering without affecting them.
#[test]
fn debug_hooks_observe_the_graph() {
    let state = reactive_object([("a", Value::Int(0))]);

    let tracked: Rc<RefCell<Vec<DebugOp>>> = Rc::new(RefCell::new(Vec::new()));
    let triggered: Rc<RefCell<Vec<DebugOp>>> = Rc::new(RefCell::new(Vec::new()));

    let reader = state.clone();
    let track_log = tracked.clone();
    let trigger_log = triggered.clone();
    let _handle = effect(
        move || {
            let _ = reader.get("a").unwrap();
        },
        EffectOptions {
            on_track: Some(Rc::new(move |event| track_log.borrow_mut().push(event.op))),
            on_trigger: Some(Rc::new(move |event| {
                trigger_log.borrow_mut().push(event.op)
            })),
            ..Default::default()
        },
    );
    assert_eq!(tracked.borrow().len(), 1);
    assert!(triggered.borrow().is_empty());

    state.set("a", Value::Int(1)).unwrap();
    assert_eq!(*triggered.borrow(), vec![DebugOp::Trigger(TriggerOp::Set)]);
    // The re-run re-established the dependency
    assert_eq!(tracked.borrow().len(), 2);
}
