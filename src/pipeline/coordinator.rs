//! Document coordinator: owns the task queue and the maker backend, runs
//! the two-phase protocol (workers convert in parallel, the coordinator
//! drains results strictly in page order), then finalizes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::error::{ConvertStatus, Result, ScanbindError};
use crate::flags::{DocumentFlags, PageFlags};
use crate::maker::{FinalizeInfo, MakerBackend, resolve_page_title};
use crate::pipeline::queue::{PageTask, TaskQueue};
use crate::pipeline::worker::WorkerPool;
use crate::source::ImageSource;

/// Shared pages-merged counter, safe to poll from another thread while a
/// run is in progress (e.g. a progress bar).
#[derive(Debug, Clone)]
pub struct ProgressHandle(Arc<AtomicUsize>);

impl ProgressHandle {
    pub fn pages_done(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of a run. `status` is the first failure seen while draining in
/// page order, or [`ConvertStatus::Ok`].
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub status: ConvertStatus,
    pub pages_done: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
    Draining,
    Finalizing,
    Done,
    Failed,
}

pub struct DocumentConverter<B: MakerBackend> {
    backend: Arc<B>,
    flags: DocumentFlags,
    pending: Vec<PageTask>,
    progress: Arc<AtomicUsize>,
    state: RunState,
}

impl<B: MakerBackend + 'static> DocumentConverter<B> {
    pub fn new(backend: B, flags: DocumentFlags) -> Self {
        DocumentConverter {
            backend: Arc::new(backend),
            flags,
            pending: Vec::new(),
            progress: Arc::new(AtomicUsize::new(0)),
            state: RunState::Idle,
        }
    }

    /// Append a page. The flags are copied into the task, so later changes
    /// to document defaults do not affect pages already added.
    pub fn add_page(&mut self, source: Box<dyn ImageSource>, flags: PageFlags) {
        self.pending.push(PageTask::new(source, flags));
    }

    pub fn page_count(&self) -> usize {
        self.pending.len()
    }

    pub fn progress(&self) -> ProgressHandle {
        ProgressHandle(Arc::clone(&self.progress))
    }

    /// Shared handle to the backend, usable to inspect it after a run.
    pub fn backend_handle(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    /// Convert, merge, and finalize all added pages.
    ///
    /// `workers` is clamped to at least 1 and to the task count; pass
    /// [`crate::pipeline::default_worker_count`] for hardware-sized pools.
    /// Per-page and merge/finalize failures are reported through
    /// [`RunReport::status`]; `Err` is reserved for failures to start at
    /// all (pool start, reuse of a consumed converter).
    pub fn run(&mut self, workers: usize) -> Result<RunReport> {
        if self.state != RunState::Idle {
            return Err(ScanbindError::PipelineError(ConvertStatus::PoolStart));
        }

        let queue = Arc::new(TaskQueue::new(std::mem::take(&mut self.pending)));
        let error_flag = Arc::new(AtomicBool::new(false));
        let workers = workers.max(1).min(queue.len().max(1));

        self.state = RunState::Running;
        debug!(pages = queue.len(), workers, "starting worker pool");
        let pool = match WorkerPool::start(
            Arc::clone(&queue),
            Arc::clone(&self.backend),
            Arc::clone(&error_flag),
            workers,
        ) {
            Ok(pool) => pool,
            Err(e) => {
                self.state = RunState::Failed;
                return Err(e);
            }
        };

        self.state = RunState::Draining;
        let status = self.drain(&queue, &error_flag);
        pool.join();

        self.state = RunState::Finalizing;
        let status = if status.is_ok() {
            self.finalize(&queue)
        } else {
            status
        };

        self.state = if status.is_ok() {
            RunState::Done
        } else {
            RunState::Failed
        };
        Ok(RunReport {
            status,
            pages_done: self.progress.load(Ordering::Acquire),
        })
    }

    /// Walk tasks strictly in index order, merging successful pages and
    /// recording the first failure. Draining continues past a failure so
    /// every completion signal is consumed and transient artifacts are
    /// still cleaned up.
    fn drain(&self, queue: &TaskQueue, error_flag: &AtomicBool) -> ConvertStatus {
        let mut overall = ConvertStatus::Ok;

        for index in 0..queue.len() {
            let task = queue.task(index);
            task.wait_done();

            let (status, completed) = task.outcome();
            if !completed {
                // The pool aborted before this task ran. The global flag
                // still picks a final status in case no drained task
                // carries a concrete one.
                if overall.is_ok() && error_flag.load(Ordering::Acquire) {
                    overall = ConvertStatus::Generic;
                }
                continue;
            }

            if !status.is_ok() {
                if overall.is_ok() {
                    overall = status;
                }
                continue;
            }

            // Converted successfully. Page 0 is the seed the document
            // grows from; later pages are appended while no failure has
            // been seen.
            if overall.is_ok() {
                if index == 0 {
                    self.progress.fetch_add(1, Ordering::AcqRel);
                } else {
                    match self.backend.merge(index) {
                        Ok(()) => {
                            self.progress.fetch_add(1, Ordering::AcqRel);
                        }
                        Err(e) => {
                            warn!(index, %e, "page merge failed");
                            overall = ConvertStatus::Merge;
                        }
                    }
                }
            }

            // Transient artifacts are deleted even when merging stopped,
            // to bound temp-disk usage. Best-effort: one retry for a
            // briefly locked file, then the failure is dropped; it never
            // overrides a conversion or merge failure.
            if index > 0
                && self.backend.cleanup(index).is_err()
                && let Err(e) = self.backend.cleanup(index)
            {
                warn!(index, %e, "page artifact cleanup failed");
            }
        }

        overall
    }

    fn finalize(&self, queue: &TaskQueue) -> ConvertStatus {
        if !self.flags.wants_finalize() {
            return ConvertStatus::Ok;
        }

        let page_titles = (0..queue.len())
            .map(|index| {
                let task = queue.task(index);
                resolve_page_title(task.flags(), task.source(), self.flags.title_policy)
            })
            .collect();
        let info = FinalizeInfo {
            page_titles,
            outline: self.flags.outline.as_ref(),
        };

        match self.backend.finalize(&info) {
            Ok(()) => ConvertStatus::Ok,
            Err(e) => {
                // Already-merged pages are left intact; finalize is a pure
                // enhancement pass.
                warn!(%e, "document finalize failed");
                ConvertStatus::Generic
            }
        }
    }
}
