//! Per-call worker pools and the first-failure slot shared by workers.

use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{panic_message, QuadratureError};

/// Builds a pool of exactly `threads` workers, dropped when the call ends.
pub(crate) fn build_pool(threads: usize) -> Result<ThreadPool, QuadratureError> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("ncquad-worker-{i}"))
        .build()
        .map_err(|e| QuadratureError::ThreadPool(e.to_string()))
}

/// Runs `job` on the calling thread of a parallel call, turning a panic
/// into the same error a worker panic produces.
pub(crate) fn catch_panic<T>(job: impl FnOnce() -> T) -> Result<T, QuadratureError> {
    panic::catch_unwind(AssertUnwindSafe(job))
        .map_err(|payload| QuadratureError::WorkerPanicked(panic_message(payload)))
}

/// Keeps the message of the first panic raised by any worker.
#[derive(Default)]
pub(crate) struct FirstFailure {
    slot: Mutex<Option<String>>,
}

impl FirstFailure {
    /// Runs `job`, recording its panic (if any) instead of unwinding.
    ///
    /// Returns `None` when the job panicked.
    pub(crate) fn catch<T>(&self, job: impl FnOnce() -> T) -> Option<T> {
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(value) => Some(value),
            Err(payload) => {
                let message = panic_message(payload);
                let mut slot = self.slot.lock();
                if slot.is_none() {
                    *slot = Some(message);
                }
                None
            }
        }
    }

    pub(crate) fn into_result(self) -> Result<(), QuadratureError> {
        match self.slot.into_inner() {
            Some(message) => Err(QuadratureError::WorkerPanicked(message)),
            None => Ok(()),
        }
    }
}
