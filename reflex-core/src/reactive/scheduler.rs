//! Job Queue
//!
//! Deferred work (notably [`DeferredComputed`](crate::refs::DeferredComputed)
//! notifications) is queued here instead of running inside the trigger that
//! caused it. The host drains the queue at its own checkpoint with
//! [`flush_jobs`], typically once per event-loop turn.
//!
//! A flush runs jobs in insertion order, including jobs queued by earlier
//! jobs of the same flush, and only then returns. Calling `flush_jobs` from
//! inside a job is a no-op; the outer flush picks up the work.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use super::runtime::Runtime;

type Job = Box<dyn FnOnce()>;

pub(crate) struct JobQueue {
    jobs: RefCell<VecDeque<Job>>,
    flushing: Cell<bool>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            jobs: RefCell::new(VecDeque::new()),
            flushing: Cell::new(false),
        }
    }

    fn push(&self, job: Job) {
        self.jobs.borrow_mut().push_back(job);
    }

    fn pop(&self) -> Option<Job> {
        self.jobs.borrow_mut().pop_front()
    }

    fn len(&self) -> usize {
        self.jobs.borrow().len()
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        Runtime::with(|rt| rt.jobs.flushing.set(false));
    }
}

/// Queue `job` for the next [`flush_jobs`].
pub fn queue_job(job: impl FnOnce() + 'static) {
    Runtime::with(|rt| rt.jobs.push(Box::new(job)));
}

/// Whether jobs are waiting to be flushed.
pub fn has_pending_jobs() -> bool {
    Runtime::with(|rt| rt.jobs.len() > 0)
}

/// Run every queued job. Returns how many ran.
pub fn flush_jobs() -> usize {
    let already = Runtime::with(|rt| rt.jobs.flushing.replace(true));
    if already {
        return 0;
    }
    let _guard = FlushGuard;

    let mut ran = 0;
    while let Some(job) = Runtime::with(|rt| rt.jobs.pop()) {
        job();
        ran += 1;
    }
    if ran > 0 {
        tracing::debug!(jobs = ran, "flushed job queue");
    }
    ran
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn flush_runs_jobs_in_order_including_new_ones() {
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let log = log.clone();
            queue_job(move || {
                log.borrow_mut().push(1);
                let log = log.clone();
                queue_job(move || log.borrow_mut().push(3));
            });
        }
        {
            let log = log.clone();
            queue_job(move || log.borrow_mut().push(2));
        }

        assert!(has_pending_jobs());
        assert_eq!(flush_jobs(), 3);
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert!(!has_pending_jobs());
    }

    #[test]
    fn nested_flush_is_a_no_op() {
        let inner = Rc::new(Cell::new(usize::MAX));
        {
            let inner = inner.clone();
            queue_job(move || inner.set(flush_jobs()));
        }
        flush_jobs();
        assert_eq!(inner.get(), 0);
    }
}
