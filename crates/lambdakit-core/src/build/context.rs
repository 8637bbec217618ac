//! Cancellation and progress reporting for a build.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result, Stage};

/// Handle for cancelling a running build from another thread.
///
/// `AbortHandle` can be cloned and shared across threads, and any clone can
/// trigger the abort which will be visible to all other clones. Candidates
/// that have not started are skipped; running `go build` processes are
/// killed.
///
/// # Example
///
/// ```
/// use lambdakit_core::build::AbortHandle;
///
/// let handle = AbortHandle::new();
/// let handle_clone = handle.clone();
///
/// assert!(!handle.is_aborted());
/// handle_clone.abort();
/// assert!(handle.is_aborted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Create a new abort handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if abort has been requested.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Request abort of the build.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    /// Reset the abort flag before reusing the handle for another build.
    pub fn reset(&self) {
        self.aborted.store(false, Ordering::Relaxed);
    }
}

/// Everything that can stop a build early, checked between and during stages.
///
/// Combines the caller's [`AbortHandle`], the overall deadline, and a flag set
/// when any candidate fails so its siblings stop too.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    abort: Option<AbortHandle>,
    deadline: Option<Instant>,
    failed: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new(abort: Option<AbortHandle>, deadline: Option<Instant>) -> Self {
        Self {
            abort,
            deadline,
            failed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `Ok` while the build may continue, otherwise the reason it must stop.
    pub fn check(&self) -> Result<()> {
        if self.abort.as_ref().is_some_and(AbortHandle::is_aborted) {
            return Err(Error::Aborted);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Error::DeadlineExceeded);
        }
        if self.failed.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Record that a candidate failed; every other candidate stops.
    pub fn fail(&self) {
        self.failed.store(true, Ordering::Relaxed);
    }
}

/// Callback trait for build progress reporting.
///
/// Called from worker threads; implementations must be thread-safe.
pub trait BuildCallback: Send + Sync {
    /// Called when a build-wide stage starts.
    fn on_stage(&self, _stage: Stage) {}

    /// Called once the candidate list is known.
    fn on_candidates_discovered(&self, _entrypoints: &[String]) {}

    /// Called when work on a candidate starts.
    fn on_candidate_started(&self, entrypoint: &str);

    /// Called when a candidate has been compiled and packaged.
    fn on_candidate_completed(&self, entrypoint: &str);

    /// Called when a candidate fails.
    fn on_candidate_failed(&self, entrypoint: &str, error: &Error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_abort_handle() {
        let handle = AbortHandle::new();
        let clone = handle.clone();

        clone.abort();
        assert!(handle.is_aborted());

        handle.reset();
        assert!(!clone.is_aborted());
    }

    #[test]
    fn test_cancellation_order() {
        let abort = AbortHandle::new();
        let cancel = Cancellation::new(Some(abort.clone()), None);
        assert!(cancel.check().is_ok());

        cancel.fail();
        assert!(matches!(cancel.check(), Err(Error::Cancelled)));

        // A user abort takes precedence over a sibling failure
        abort.abort();
        assert!(matches!(cancel.check(), Err(Error::Aborted)));
    }

    #[test]
    fn test_deadline() {
        let past = Instant::now()
            .checked_sub(Duration::from_millis(1))
            .unwrap_or_else(Instant::now);
        let cancel = Cancellation::new(None, Some(past));
        assert!(matches!(cancel.check(), Err(Error::DeadlineExceeded)));

        let future = Cancellation::new(None, Some(Instant::now() + Duration::from_secs(3600)));
        assert!(future.check().is_ok());
    }

    #[test]
    fn test_clones_share_failure() {
        let cancel = Cancellation::default();
        let worker = cancel.clone();

        worker.fail();
        assert!(matches!(cancel.check(), Err(Error::Cancelled)));
    }
}
