//! Fixed pool of worker threads pulling page tasks off the shared queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tracing::debug;

use crate::error::{ConvertStatus, Result, ScanbindError};
use crate::maker::MakerBackend;
use crate::pipeline::queue::TaskQueue;

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` threads over the queue.
    ///
    /// A partially started pool is not a supported state: if a spawn
    /// fails, the error flag is raised so the already-running workers
    /// drain the queue (signaling every remaining task), the pool is
    /// joined, and the failure is reported.
    pub fn start<B: MakerBackend + 'static>(
        queue: Arc<TaskQueue>,
        backend: Arc<B>,
        error_flag: Arc<AtomicBool>,
        workers: usize,
    ) -> Result<WorkerPool> {
        let workers = workers.max(1);
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let queue = Arc::clone(&queue);
            let backend = Arc::clone(&backend);
            let worker_flag = Arc::clone(&error_flag);
            let spawned = std::thread::Builder::new()
                .name(format!("scanbind-worker-{i}"))
                .spawn(move || worker_loop(&queue, backend.as_ref(), &worker_flag));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error_flag.store(true, Ordering::Release);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    debug!(worker = i, %e, "worker spawn failed");
                    return Err(ScanbindError::PipelineError(ConvertStatus::ThreadCreation));
                }
            }
        }
        Ok(WorkerPool { handles })
    }

    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

/// Claim-convert-signal loop.
///
/// Once the global error flag is set, remaining claims are signaled
/// without converting so the coordinator never blocks on a task that will
/// not run; work already claimed before the failure still completes.
fn worker_loop(queue: &TaskQueue, backend: &dyn MakerBackend, error_flag: &AtomicBool) {
    while let Some(index) = queue.claim_next() {
        let task = queue.task(index);
        if error_flag.load(Ordering::Acquire) {
            task.skip();
            continue;
        }

        let status = backend.convert(index, task.flags(), task.source());
        if !status.is_ok() {
            error_flag.store(true, Ordering::Release);
            debug!(index, status = status.message(), "page conversion failed");
        }
        task.finish(status);
    }
}
