//! Dependency Tracking
//!
//! This module implements the heart of the runtime: the global dependency
//! graph linking `(target, key)` pairs to subscribed computations, and the
//! ambient context (call stack, tracking flag) that dependency collection
//! reads from.
//!
//! [`track`] and [`trigger`] are public on purpose: the observation layer is
//! their main caller, but downstream primitives (computed wrappers, refs)
//! are thin consumers of exactly these two entry points, registering their
//! own targets via [`crate::container::next_runtime_id`].

mod context;
mod deps;
mod ops;

pub use context::{enable_tracking, pause_tracking, reset_tracking, tracking_enabled};
pub use deps::{track, trigger};
pub use ops::{DepKey, TargetKind, TrackOp, TriggerOp};

pub(crate) use context::{active_effect, stack_contains, PausedTracking, TrackingScope};
pub(crate) use deps::{drop_target, Dep};
