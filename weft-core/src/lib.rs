//! Weft Core
//!
//! This crate is the reactivity runtime at the heart of the Weft UI
//! framework: a fine-grained dependency-tracking engine that records which
//! computations read which pieces of state and re-runs exactly the
//! computations a write affects. It is UI-agnostic — rendering, component
//! trees, and templating are downstream consumers of the primitives here.
//!
//! # Architecture
//!
//! - `value`: the dynamic state model (scalars, cells, containers)
//! - `container`: identity-bearing raw containers and settable cells
//! - `observe`: the observation layer — reactive / read-only, deep /
//!   shallow views with an explicit accessor API
//! - `track`: the dependency graph — `track` on read, `trigger` on write,
//!   plus the ambient call stack and tracking flag
//! - `effect`: re-runnable computations with lifecycle and cleanup
//! - `scheduler`: the batching job queue drained at the tick boundary
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use weft_core::{effect, reactive, EffectOptions, Value};
//! use weft_core::scheduler::{queue_job, tick, Job};
//!
//! let state = reactive(Value::object([("count", Value::Int(0))]))
//!     .into_container()
//!     .unwrap();
//!
//! // Re-runs whenever `count` changes, batched through the scheduler.
//! let reader = state.clone();
//! let handle = effect(
//!     move || {
//!         let _ = reader.get("count").unwrap();
//!     },
//!     EffectOptions {
//!         scheduler: Some(Rc::new(|e| queue_job(Job::for_effect(&e)))),
//!         ..Default::default()
//!     },
//! );
//!
//! state.set("count", Value::Int(1)).unwrap();
//! state.set("count", Value::Int(2)).unwrap();
//! tick(); // one batched re-run for both writes
//! # weft_core::effect::stop(&handle);
//! ```
//!
//! # Threading
//!
//! The runtime is single-threaded and cooperative. The dependency graph,
//! call stack, tracking flag, and scheduler queues are thread-local; handles
//! are not `Send`. Sharing reactive state across threads is out of contract.

pub mod container;
pub mod effect;
pub mod error;
pub mod observe;
pub mod scheduler;
pub mod track;
pub mod value;

pub use container::{next_runtime_id, Cell, ContainerKind, RuntimeId};
pub use effect::{effect, stop, DebugOp, DebuggerEvent, Effect, EffectOptions};
pub use error::{AccessError, AccessResult};
pub use observe::{
    freeze, is_proxy, is_reactive, is_readonly, mark_raw, reactive, readonly, shallow_reactive,
    shallow_readonly, to_raw, AccessMode, Observed,
};
pub use scheduler::{
    invalidate_job, next_tick, queue_job, queue_post_flush_cb, queue_post_flush_cbs, tick, Job,
};
pub use track::{
    enable_tracking, pause_tracking, reset_tracking, track, tracking_enabled, trigger, DepKey,
    TargetKind, TrackOp, TriggerOp,
};
pub use value::{same_value, FloatKey, MapKey, Value};
