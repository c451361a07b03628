//! Ordered page tasks plus the shared claim cursor that distributes them
//! to workers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::ConvertStatus;
use crate::flags::PageFlags;
use crate::source::ImageSource;

/// One-shot completion signal: set exactly once, waitable forever, pollable
/// without blocking.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    state: Mutex<bool>,
    cond: Condvar,
}

impl CompletionSignal {
    pub fn set(&self) {
        let mut done = self.state.lock().unwrap();
        debug_assert!(!*done, "completion signal set twice");
        *done = true;
        self.cond.notify_all();
    }

    /// Block until the signal fires. No timeout: a task that never signals
    /// is a programming defect, not a recoverable condition.
    pub fn wait(&self) {
        let mut done = self.state.lock().unwrap();
        while !*done {
            done = self.cond.wait(done).unwrap();
        }
    }

    /// Zero-timeout poll.
    pub fn is_set(&self) -> bool {
        *self.state.lock().unwrap()
    }
}

#[derive(Debug, Clone, Copy)]
struct TaskOutcome {
    status: ConvertStatus,
    completed: bool,
}

/// Unit of work: one source image, its resolved flags, and the completion
/// state a worker fills in.
pub struct PageTask {
    source: Box<dyn ImageSource>,
    flags: PageFlags,
    done: CompletionSignal,
    outcome: Mutex<TaskOutcome>,
}

impl PageTask {
    pub fn new(source: Box<dyn ImageSource>, flags: PageFlags) -> Self {
        PageTask {
            source,
            flags,
            done: CompletionSignal::default(),
            outcome: Mutex::new(TaskOutcome {
                status: ConvertStatus::Ok,
                completed: false,
            }),
        }
    }

    pub fn source(&self) -> &dyn ImageSource {
        self.source.as_ref()
    }

    pub fn flags(&self) -> &PageFlags {
        &self.flags
    }

    /// Record the conversion result and fire the completion signal.
    pub fn finish(&self, status: ConvertStatus) {
        {
            let mut outcome = self.outcome.lock().unwrap();
            outcome.status = status;
            outcome.completed = true;
        }
        self.done.set();
    }

    /// Fire the completion signal without marking the task completed: the
    /// pool is aborting and this task will never run. The coordinator's
    /// drain loop still needs the signal or it would wait forever.
    pub fn skip(&self) {
        self.done.set();
    }

    pub fn wait_done(&self) {
        self.done.wait();
    }

    /// Recorded status and whether conversion actually ran.
    pub fn outcome(&self) -> (ConvertStatus, bool) {
        let outcome = self.outcome.lock().unwrap();
        (outcome.status, outcome.completed)
    }
}

/// Task array plus a single shared "next index to claim" cursor. The
/// cursor's fetch-and-increment is the sole work-distribution mechanism:
/// no per-thread partitioning, so a slow page automatically borrows
/// capacity from the rest of the pool.
pub struct TaskQueue {
    tasks: Vec<PageTask>,
    next_to_claim: AtomicUsize,
}

impl TaskQueue {
    pub fn new(tasks: Vec<PageTask>) -> Self {
        TaskQueue {
            tasks,
            next_to_claim: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, index: usize) -> &PageTask {
        &self.tasks[index]
    }

    /// Atomically claim the next unclaimed index; `None` once the queue is
    /// exhausted. The cursor is capped at the task count, so it is also a
    /// claimed-so-far counter.
    pub fn claim_next(&self) -> Option<usize> {
        self.next_to_claim
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                if cur < self.tasks.len() {
                    Some(cur + 1)
                } else {
                    None
                }
            })
            .ok()
    }

    /// Number of indices claimed so far; never exceeds [`TaskQueue::len`].
    pub fn claimed(&self) -> usize {
        self.next_to_claim.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::source::{ChannelRequest, RasterImage};

    struct NullSource;

    impl ImageSource for NullSource {
        fn load(&self, _request: ChannelRequest) -> Result<RasterImage> {
            Ok(RasterImage::new(1, 1, 1, vec![0]))
        }

        fn display_name(&self) -> String {
            "null".into()
        }
    }

    fn queue_of(n: usize) -> TaskQueue {
        TaskQueue::new(
            (0..n)
                .map(|_| PageTask::new(Box::new(NullSource), PageFlags::default()))
                .collect(),
        )
    }

    #[test]
    fn claims_every_index_once_then_exhausts() {
        let queue = queue_of(3);
        assert_eq!(queue.claim_next(), Some(0));
        assert_eq!(queue.claim_next(), Some(1));
        assert_eq!(queue.claim_next(), Some(2));
        assert_eq!(queue.claim_next(), None);
        assert_eq!(queue.claim_next(), None);
    }

    #[test]
    fn cursor_never_exceeds_task_count() {
        let queue = queue_of(2);
        // Keep claiming well past exhaustion, as idle workers do.
        for _ in 0..10 {
            queue.claim_next();
        }
        assert_eq!(queue.claimed(), 2);
    }

    #[test]
    fn empty_queue_claims_nothing() {
        let queue = queue_of(0);
        assert_eq!(queue.claim_next(), None);
    }

    #[test]
    fn completion_signal_polls_and_waits() {
        let signal = CompletionSignal::default();
        assert!(!signal.is_set());
        signal.set();
        assert!(signal.is_set());
        signal.wait(); // already set, returns immediately
    }
}
