//! Bounded, time-limited execution of client uploads.

use std::cell::RefCell;
use std::time::Duration;

use futures_util::future::{LocalBoxFuture, join_all};
use log::{info, warn};
use tokio::sync::Semaphore;

use super::UploadError;

const MINIMUM_TIMEOUT: Duration = Duration::from_secs(5);
const TASKS_PER_SECOND: u64 = 10;

/// Time allowed to upload `batch_size` tasks: a tenth of a second per task,
/// never less than five seconds.
///
/// ```
/// use std::time::Duration;
/// use geoflag_data::upload::upload_timeout;
///
/// assert_eq!(upload_timeout(3), Duration::from_secs(5));
/// assert_eq!(upload_timeout(2_000), Duration::from_secs(200));
/// ```
#[must_use]
pub fn upload_timeout(batch_size: usize) -> Duration {
    let tasks = u64::try_from(batch_size).unwrap_or(u64::MAX);
    Duration::from_secs(tasks / TASKS_PER_SECOND).max(MINIMUM_TIMEOUT)
}

/// One labelled upload.
pub type UploadJob<'a> = (String, LocalBoxFuture<'a, Result<usize, UploadError>>);

/// Outcome of an [`UploadPool::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Jobs that finished successfully.
    pub succeeded: usize,
    /// Jobs that finished with an error.
    pub failed: usize,
    /// Jobs still running when the pool timed out.
    pub timed_out: usize,
    /// Tasks delivered by successful jobs.
    pub uploaded: usize,
}

impl PoolReport {
    /// Whether every job succeeded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

/// Runs upload jobs with at most `size` in flight, abandoning whatever is
/// left once `timeout` elapses.
#[derive(Debug, Clone)]
pub struct UploadPool {
    name: String,
    size: usize,
    timeout: Duration,
}

impl UploadPool {
    /// A pool named `name` for logs. A size of zero is treated as one.
    #[must_use]
    pub fn new(name: impl Into<String>, size: usize, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            size: size.max(1),
            timeout,
        }
    }

    /// Name used in log messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concurrency limit.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Overall time limit.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `jobs` to completion or until the timeout. Failures are logged and
    /// counted, never propagated.
    pub async fn run(&self, jobs: Vec<UploadJob<'_>>) -> PoolReport {
        let total = jobs.len();
        let permits = Semaphore::new(self.size);
        let report = RefCell::new(PoolReport::default());
        let (permits_ref, report_ref) = (&permits, &report);
        let work = join_all(jobs.into_iter().map(|(label, job)| async move {
            let Ok(_permit) = permits_ref.acquire().await else {
                report_ref.borrow_mut().failed += 1;
                return;
            };
            match job.await {
                Ok(count) => {
                    let mut report = report_ref.borrow_mut();
                    report.succeeded += 1;
                    report.uploaded += count;
                }
                Err(err) => {
                    warn!("{} upload of {label} failed: {err}", self.name);
                    report_ref.borrow_mut().failed += 1;
                }
            }
        }));
        let finished = tokio::time::timeout(self.timeout, work).await.is_ok();

        let mut outcome = report.into_inner();
        if !finished {
            outcome.timed_out = total - outcome.succeeded - outcome.failed;
            warn!(
                "{} timed out after {:?} with {} uploads unfinished",
                self.name, self.timeout, outcome.timed_out
            );
        }
        info!(
            "{} finished: {} succeeded, {} failed, {} tasks uploaded",
            self.name, outcome.succeeded, outcome.failed, outcome.uploaded
        );
        outcome
    }
}
