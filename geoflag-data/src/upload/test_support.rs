//! Test doubles for the upload path.
//!
//! [`RecordingLoader`] stands in for the task service: it records every batch
//! it receives and can be told to fail or stall.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{Task, TaskLoader, UploadError};

/// One recorded batch: project, challenge and task identifiers.
pub type RecordedBatch = (String, String, Vec<String>);

#[derive(Debug, Clone, Copy, Default)]
enum Behaviour {
    #[default]
    Accept,
    Reject,
    Stall(Duration),
}

/// [`TaskLoader`] that records batches instead of sending them.
///
/// Clones share one record, so a clone kept by the test sees the uploads of
/// the clone handed to a client.
///
/// ```
/// use geoflag_data::upload::test_support::RecordingLoader;
///
/// let loader = RecordingLoader::default();
/// assert!(loader.uploads().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingLoader {
    uploads: Arc<Mutex<Vec<RecordedBatch>>>,
    behaviour: Behaviour,
}

impl RecordingLoader {
    /// A loader that rejects every batch.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Reject,
            ..Self::default()
        }
    }

    /// A loader that waits `delay` before accepting each batch.
    #[must_use]
    pub fn delayed(delay: Duration) -> Self {
        Self {
            behaviour: Behaviour::Stall(delay),
            ..Self::default()
        }
    }

    /// Batches accepted so far, in arrival order.
    #[must_use]
    pub fn uploads(&self) -> Vec<RecordedBatch> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Identifiers of every accepted task, sorted.
    #[must_use]
    pub fn uploaded_identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self
            .uploads()
            .into_iter()
            .flat_map(|(_, _, identifiers)| identifiers)
            .collect();
        identifiers.sort();
        identifiers
    }
}

#[async_trait(?Send)]
impl TaskLoader for RecordingLoader {
    fn connection_info(&self) -> String {
        "recording loader".to_owned()
    }

    async fn upload_batch(
        &self,
        project: &str,
        challenge: &str,
        tasks: &[Task],
    ) -> Result<(), UploadError> {
        match self.behaviour {
            Behaviour::Accept => {}
            Behaviour::Reject => {
                return Err(UploadError::Rejected {
                    project: project.to_owned(),
                    challenge: challenge.to_owned(),
                    message: "rejected by test loader".to_owned(),
                });
            }
            Behaviour::Stall(delay) => tokio::time::sleep(delay).await,
        }
        let identifiers = tasks.iter().map(|task| task.identifier().to_owned()).collect();
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((project.to_owned(), challenge.to_owned(), identifiers));
        Ok(())
    }
}
