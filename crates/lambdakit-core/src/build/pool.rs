//! Bounded worker pool for per-candidate work.
//!
//! Candidates are independent, so they run on a dedicated Rayon pool of at
//! most `jobs` threads. The first failure cancels everything else.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use super::context::Cancellation;
use crate::error::{Error, Result};

/// No task has failed yet.
const NONE: usize = usize::MAX;

/// Run `work` over every task on at most `jobs` threads.
///
/// `jobs == 1` runs the tasks in order on one thread; `jobs == 0` uses the
/// host's available parallelism. A task is not started once `cancel` trips,
/// and any task error trips it for the rest.
///
/// Returns results in task order, or the error of the task that failed
/// first. Sibling cancellations are only reported when nothing else failed.
pub(crate) fn run_bounded<T, R, F>(jobs: usize, tasks: &[T], cancel: &Cancellation, work: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("lambdakit-build-{}", i))
        .build()
        .map_err(|e| Error::Config(format!("cannot start worker pool: {}", e)))?;

    tracing::debug!(jobs = pool.current_num_threads(), tasks = tasks.len(), "starting workers");

    let first_failed = AtomicUsize::new(NONE);
    let results: Vec<Result<R>> = pool.install(|| {
        tasks
            .par_iter()
            .enumerate()
            .map(|(index, task)| {
                cancel.check()?;
                let result = work(task);
                if let Err(e) = &result {
                    if !e.is_cancellation() {
                        let _ = first_failed.compare_exchange(
                            NONE,
                            index,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        );
                    }
                    cancel.fail();
                }
                result
            })
            .collect()
    });

    let first_failed = first_failed.load(Ordering::SeqCst);
    first_error(results, (first_failed != NONE).then_some(first_failed))
}

/// Collect successes, or pick the error to report.
///
/// `first_failed` is the index of the task whose failure came first in time;
/// without one the lowest-indexed real failure wins.
fn first_error<R>(results: Vec<Result<R>>, first_failed: Option<usize>) -> Result<Vec<R>> {
    let mut values = Vec::with_capacity(results.len());
    let mut cancelled = None;
    let mut failure = None;

    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => values.push(value),
            Err(e) if e.is_cancellation() => {
                cancelled.get_or_insert(e);
            }
            Err(e) if Some(index) == first_failed => failure = Some(e),
            Err(e) => {
                failure.get_or_insert(e);
            }
        }
    }

    match failure.or(cancelled) {
        Some(e) => Err(e),
        None => Ok(values),
    }
}
