//! Deferred Execution Scheduler
//!
//! A single pending-job queue plus a post-flush callback queue. Many
//! invalidations inside one synchronous tick coalesce into one ordered
//! flush: jobs are identity-deduplicated on enqueue, sorted ascending by id
//! at flush time (jobs without an id sort last), and drained front to back.
//! Post-flush callbacks run after the main queue empties; either queue
//! gaining work during a flush causes another full pass, so a flush is not
//! complete until a pass produces no new work.
//!
//! Because effect ids increase with creation order, id-sorted flushing runs
//! parent computations before the children they created — a parent's re-run
//! can invalidate (tombstone) a child job that no longer needs to run.
//!
//! # The tick boundary
//!
//! In an event-loop host this queue would drain on a microtask boundary
//! after synchronous execution. A library crate has no ambient event loop,
//! so the boundary is explicit: enqueues mark a flush pending, and the
//! embedder drives it with [`next_tick`] or [`tick`] once its synchronous
//! work completes. Everything queued in between coalesces into that single
//! flush.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::effect::Effect;

/// An invokable unit in the job queue.
///
/// Jobs compare equal when they are the same allocation or when both carry
/// the same explicit id, so adapting one effect into a job twice still
/// deduplicates. Ids double as the flush sort key.
#[derive(Clone)]
pub struct Job {
    inner: Rc<JobInner>,
}

struct JobInner {
    id: Option<u64>,
    run: Box<dyn Fn()>,
}

impl Job {
    /// A job with no sort id; it runs after all id-carrying jobs.
    pub fn new<F>(f: F) -> Job
    where
        F: Fn() + 'static,
    {
        Job {
            inner: Rc::new(JobInner {
                id: None,
                run: Box::new(f),
            }),
        }
    }

    /// A job with an explicit sort id.
    pub fn with_id<F>(id: u64, f: F) -> Job
    where
        F: Fn() + 'static,
    {
        Job {
            inner: Rc::new(JobInner {
                id: Some(id),
                run: Box::new(f),
            }),
        }
    }

    /// Adapt an effect into a job: running the job runs the effect, and the
    /// effect's creation id becomes the sort key. Pass this from an
    /// effect's scheduler callback to batch its re-runs:
    ///
    /// ```ignore
    /// let options = EffectOptions {
    ///     scheduler: Some(Rc::new(|e| queue_job(Job::for_effect(&e)))),
    ///     ..Default::default()
    /// };
    /// ```
    pub fn for_effect(effect: &Effect) -> Job {
        let runner = effect.clone();
        Job::with_id(effect.id(), move || runner.run())
    }

    /// The job's sort id, if any.
    pub fn id(&self) -> Option<u64> {
        self.inner.id
    }

    fn invoke(&self) {
        (self.inner.run)();
    }

    fn sort_key(&self) -> u64 {
        self.inner.id.unwrap_or(u64::MAX)
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Job) -> bool {
        if Rc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        matches!((self.inner.id, other.inner.id), (Some(a), Some(b)) if a == b)
    }
}

struct SchedulerState {
    queue: VecDeque<Option<Job>>,
    post_cbs: Vec<Rc<dyn Fn()>>,
    is_flushing: bool,
    is_flush_pending: bool,
}

thread_local! {
    static SCHEDULER: RefCell<SchedulerState> = RefCell::new(SchedulerState {
        queue: VecDeque::new(),
        post_cbs: Vec::new(),
        is_flushing: false,
        is_flush_pending: false,
    });
}

/// Enqueue a job for the next flush. Jobs already queued (by identity or
/// equal id) are not enqueued again.
pub fn queue_job(job: Job) {
    SCHEDULER.with(|state| {
        let mut state = state.borrow_mut();
        let present = state
            .queue
            .iter()
            .any(|slot| slot.as_ref().is_some_and(|queued| *queued == job));
        if !present {
            state.queue.push_back(Some(job));
        }
        if !state.is_flushing && !state.is_flush_pending {
            state.is_flush_pending = true;
        }
    });
}

/// Replace a queued job with a tombstone so it is skipped, not removed —
/// slots keep their position so a flush iterating the queue stays stable.
/// No-op if the job is not queued.
pub fn invalidate_job(job: &Job) {
    SCHEDULER.with(|state| {
        let mut state = state.borrow_mut();
        for slot in state.queue.iter_mut() {
            if slot.as_ref().is_some_and(|queued| queued == job) {
                *slot = None;
                break;
            }
        }
    });
}

/// Enqueue a callback to run after the main queue drains.
///
/// Callbacks are deduplicated by identity at flush time; enqueue the same
/// `Rc` twice and it runs once per flush.
pub fn queue_post_flush_cb(cb: Rc<dyn Fn()>) {
    SCHEDULER.with(|state| {
        let mut state = state.borrow_mut();
        state.post_cbs.push(cb);
        if !state.is_flushing && !state.is_flush_pending {
            state.is_flush_pending = true;
        }
    });
}

/// Enqueue several post-flush callbacks at once.
pub fn queue_post_flush_cbs<I>(cbs: I)
where
    I: IntoIterator<Item = Rc<dyn Fn()>>,
{
    for cb in cbs {
        queue_post_flush_cb(cb);
    }
}

/// Run any pending flush now. The embedder calls this at the end of its
/// synchronous work, standing in for the host's microtask boundary.
pub fn tick() {
    let should_flush = SCHEDULER.with(|state| {
        let state = state.borrow();
        state.is_flush_pending && !state.is_flushing
    });
    if should_flush {
        flush_jobs();
    }
}

/// Drain any pending flush, then invoke `f` — work scheduled before this
/// call is observable from inside `f`.
pub fn next_tick<R>(f: impl FnOnce() -> R) -> R {
    tick();
    f()
}

/// Restores the flushing flag even if a job panics, so the next flush
/// trigger can pick up the jobs the aborted pass left behind.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = SCHEDULER.try_with(|state| {
            if let Ok(mut state) = state.try_borrow_mut() {
                state.is_flushing = false;
            }
        });
    }
}

fn flush_jobs() {
    {
        let _guard = FlushGuard;

        SCHEDULER.with(|state| {
            let mut state = state.borrow_mut();
            state.is_flush_pending = false;
            state.is_flushing = true;
            // Ascending id order: parents (smaller ids) before children.
            state
                .queue
                .make_contiguous()
                .sort_by_key(|slot| slot.as_ref().map_or(u64::MAX, Job::sort_key));
        });
        tracing::trace!("flush start");

        // One slot at a time: a running job may enqueue more jobs, which
        // join this same pass (unsorted, after the sorted prefix).
        loop {
            let next = SCHEDULER.with(|state| state.borrow_mut().queue.pop_front());
            match next {
                None => break,
                Some(None) => continue, // tombstone
                Some(Some(job)) => job.invoke(),
            }
        }

        flush_post_cbs();
    }

    let more = SCHEDULER.with(|state| {
        let state = state.borrow();
        !state.queue.is_empty() || !state.post_cbs.is_empty()
    });
    if more {
        // work queued during the flush: not done until a pass comes up empty
        flush_jobs();
    } else {
        tracing::trace!("flush settled");
    }
}

fn flush_post_cbs() {
    // Snapshot before running: callbacks queued during this drain belong to
    // the next flush, not this one.
    let cbs: Vec<Rc<dyn Fn()>> = SCHEDULER.with(|state| std::mem::take(&mut state.borrow_mut().post_cbs));
    if cbs.is_empty() {
        return;
    }
    let mut seen: Vec<*const ()> = Vec::with_capacity(cbs.len());
    for cb in &cbs {
        let identity = Rc::as_ptr(cb) as *const ();
        if seen.contains(&identity) {
            continue;
        }
        seen.push(identity);
        cb();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
