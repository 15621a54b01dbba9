//! One-level fan-out/fan-in over the rayon pool.
//!
//! Used for geometry parsing and texture loading. Each item becomes one
//! independent task; no task waits on another or spawns dependent work. The
//! caller blocks until every task has finished and gets results back in
//! input order.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

/// Run `task` once per item and collect the results in input order.
///
/// With `parallel == false` the tasks run on the calling thread, which keeps
/// logs ordered when debugging a single document.
pub fn fan_out<T, R, F>(label: &str, items: Vec<T>, parallel: bool, task: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let finished = AtomicUsize::new(0);
    let run = |item: T| {
        let result = task(item);
        if finished.fetch_add(1, Ordering::AcqRel) + 1 == total {
            log::debug!("{}: all {} tasks finished", label, total);
        }
        result
    };

    let results: Vec<R> = if parallel {
        items.into_par_iter().map(run).collect()
    } else {
        items.into_iter().map(run).collect()
    };

    debug_assert_eq!(finished.load(Ordering::Acquire), total);
    results
}
