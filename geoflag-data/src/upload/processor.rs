//! Event processor feeding flags to upload clients.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use futures_util::FutureExt;
use log::{debug, error, warn};
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

use super::{
    PoolReport, SharedClient, Task, UploadError, UploadJob, UploadPool, upload_timeout,
};
use crate::event::{FlagEvent, MetricEvent, Processor};

/// Routes flags to the upload client registered for their check.
///
/// A metric event for a check uploads and retires that check's client. At
/// shutdown every remaining client is uploaded concurrently, with a time
/// limit equal to the sum of the per-client limits.
///
/// # Runtime behaviour
///
/// Uploads block the calling thread until they finish. Inside a
/// multi-threaded Tokio runtime the caller's handle is used through
/// [`tokio::task::block_in_place`]. Inside a current-thread runtime the
/// processor's own runtime drives them on a scoped helper thread, and
/// outside any runtime it drives them directly.
pub struct UploadProcessor {
    clients: Mutex<BTreeMap<String, SharedClient>>,
    runtime: Runtime,
}

impl fmt::Debug for UploadProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadProcessor")
            .field("checks", &self.clients().keys().collect::<Vec<_>>())
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl UploadProcessor {
    /// Create a processor with one client per check name.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Runtime`] if the Tokio runtime cannot be built.
    pub fn new(
        clients: impl IntoIterator<Item = (String, SharedClient)>,
    ) -> Result<Self, UploadError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(UploadError::Runtime)?;
        Ok(Self {
            clients: Mutex::new(clients.into_iter().collect()),
            runtime,
        })
    }

    /// Checks whose clients have not been uploaded yet.
    #[must_use]
    pub fn pending_checks(&self) -> Vec<String> {
        self.clients().keys().cloned().collect()
    }

    /// Upload and retire the client for `check`. Returns `None` when no
    /// client is registered for it.
    pub fn upload_check(&self, check: &str) -> Option<PoolReport> {
        let client = self.clients().remove(check)?;
        let size = client.current_batch_size();
        let pool = UploadPool::new(format!("{check} upload"), 1, upload_timeout(size));
        Some(self.run_pool(&pool, vec![(check.to_owned(), client)]))
    }

    /// Upload and retire every remaining client.
    pub fn upload_all(&self) -> PoolReport {
        let clients = std::mem::take(&mut *self.clients());
        if clients.is_empty() {
            return PoolReport::default();
        }
        let timeout = clients
            .values()
            .map(|client| upload_timeout(client.current_batch_size()))
            .fold(Duration::ZERO, Duration::saturating_add);
        let pool = UploadPool::new("shutdown upload", clients.len(), timeout);
        self.run_pool(&pool, clients.into_iter().collect())
    }

    fn clients(&self) -> MutexGuard<'_, BTreeMap<String, SharedClient>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_pool(&self, pool: &UploadPool, clients: Vec<(String, SharedClient)>) -> PoolReport {
        let count = clients.len();
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(run_jobs(pool, clients)))
            }
            // A runtime cannot be entered from its own thread.
            Ok(_) => thread::scope(|scope| {
                scope
                    .spawn(|| self.runtime.block_on(run_jobs(pool, clients)))
                    .join()
                    .unwrap_or_else(|_| {
                        error!("{} thread panicked", pool.name());
                        PoolReport {
                            failed: count,
                            ..PoolReport::default()
                        }
                    })
            }),
            Err(_) => self.runtime.block_on(run_jobs(pool, clients)),
        }
    }
}

async fn run_jobs(pool: &UploadPool, clients: Vec<(String, SharedClient)>) -> PoolReport {
    let jobs = clients
        .into_iter()
        .map(|(check, client)| upload_job(check, client))
        .collect();
    pool.run(jobs).await
}

fn upload_job(check: String, client: SharedClient) -> UploadJob<'static> {
    (check, async move { client.upload_tasks().await }.boxed_local())
}

impl Processor for UploadProcessor {
    fn process_flag(&self, event: &FlagEvent) {
        let clients = self.clients();
        let Some(client) = clients.get(event.check_name()) else {
            debug!("no upload client for {}", event.check_name());
            return;
        };
        match Task::from_flag(event.flag(), event.category()) {
            Ok(task) => {
                client.add_task(task);
            }
            Err(err) => warn!("skipping upload of flag from {}: {err}", event.check_name()),
        }
    }

    fn process_metric(&self, event: &MetricEvent) {
        if self.upload_check(event.check_name()).is_none() {
            debug!("no upload client for {}", event.check_name());
        }
    }

    fn complete(&self) {
        let report = self.upload_all();
        if !report.is_clean() {
            warn!(
                "shutdown upload incomplete: {} failed, {} timed out",
                report.failed, report.timed_out
            );
        }
    }
}
