//! Parallel page-conversion pipeline: task queue, worker pool, and the
//! coordinator driving them.

pub mod coordinator;
pub mod queue;
pub mod worker;

use std::sync::OnceLock;

/// Ceiling on pool size regardless of reported hardware parallelism.
const MAX_WORKERS: usize = 64;

static DISCOVERED_WORKERS: OnceLock<usize> = OnceLock::new();

/// Hardware-derived worker count, clamped to 1..=64. Platforms without a
/// parallelism primitive fall back to 1. Queried once and cached.
pub fn default_worker_count() -> usize {
    *DISCOVERED_WORKERS.get_or_init(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, MAX_WORKERS)
    })
}
