//! Clients that collect tasks and the loaders that deliver them.

use std::collections::BTreeMap;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{debug, warn};

use super::{Task, UploadError};

/// Collects tasks for one check and uploads them on demand.
#[async_trait(?Send)]
pub trait UploadClient {
    /// Queue `task`. Returns `false` when a task with the same identifier is
    /// already queued for its project and challenge.
    fn add_task(&self, task: Task) -> bool;

    /// Tasks queued and not yet uploaded.
    fn current_batch_size(&self) -> usize;

    /// Upload everything queued. Returns the number of tasks delivered.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] when any batch fails; failed batches stay
    /// queued.
    async fn upload_tasks(&self) -> Result<usize, UploadError>;
}

/// Client handle shared between the processor and its upload jobs.
pub type SharedClient = Arc<dyn UploadClient + Send + Sync>;

/// Delivers one batch of tasks for a project and challenge.
#[async_trait(?Send)]
pub trait TaskLoader {
    /// Human-readable description of the destination, for logs.
    fn connection_info(&self) -> String;

    /// Upload `tasks` into `challenge` of `project`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] when the batch is not accepted.
    async fn upload_batch(
        &self,
        project: &str,
        challenge: &str,
        tasks: &[Task],
    ) -> Result<(), UploadError>;
}

type BatchKey = (String, String);

/// [`UploadClient`] that groups tasks by project and challenge.
#[derive(Debug)]
pub struct TaskBatchClient<L> {
    loader: L,
    project: Option<String>,
    batches: Mutex<BTreeMap<BatchKey, Vec<Task>>>,
}

impl<L: TaskLoader> TaskBatchClient<L> {
    /// A client delivering through `loader`. Tasks keep their own project.
    #[must_use]
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            project: None,
            batches: Mutex::new(BTreeMap::new()),
        }
    }

    /// Put every task into `project` instead of the flag's country.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// The loader.
    #[must_use]
    pub const fn loader(&self) -> &L {
        &self.loader
    }

    fn batches(&self) -> MutexGuard<'_, BTreeMap<BatchKey, Vec<Task>>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn requeue(&self, key: BatchKey, tasks: Vec<Task>) {
        let mut batches = self.batches();
        let queued = batches.entry(key).or_default();
        for task in tasks {
            if !queued.contains(&task) {
                queued.push(task);
            }
        }
    }
}

#[async_trait(?Send)]
impl<L: TaskLoader> UploadClient for TaskBatchClient<L> {
    fn add_task(&self, task: Task) -> bool {
        let task = match &self.project {
            Some(project) => task.with_project(project.clone()),
            None => task,
        };
        let key = (task.project().to_owned(), task.challenge().to_owned());
        let mut batches = self.batches();
        let queued = batches.entry(key).or_default();
        if queued
            .iter()
            .any(|existing| existing.identifier() == task.identifier())
        {
            debug!(
                "skipping duplicate task {} in {}/{}",
                task.identifier(),
                task.project(),
                task.challenge()
            );
            return false;
        }
        queued.push(task);
        true
    }

    fn current_batch_size(&self) -> usize {
        self.batches().values().map(Vec::len).sum()
    }

    async fn upload_tasks(&self) -> Result<usize, UploadError> {
        let pending = mem::take(&mut *self.batches());
        let attempted = pending.len();
        let mut uploaded = 0;
        let mut failed = 0;
        for ((project, challenge), tasks) in pending {
            if tasks.is_empty() {
                continue;
            }
            match self.loader.upload_batch(&project, &challenge, &tasks).await {
                Ok(()) => {
                    debug!("uploaded {} tasks to {project}/{challenge}", tasks.len());
                    uploaded += tasks.len();
                }
                Err(err) => {
                    warn!(
                        "failed to upload {project}/{challenge} to {}: {err}",
                        self.loader.connection_info()
                    );
                    failed += 1;
                    self.requeue((project, challenge), tasks);
                }
            }
        }
        if failed > 0 {
            return Err(UploadError::Incomplete { failed, attempted });
        }
        Ok(uploaded)
    }
}
