//! Upload of flags to the external task-tracking service.
//!
//! Flags become [`Task`]s collected by an [`UploadClient`] per check. A
//! [`TaskBatchClient`] groups tasks by project and challenge and hands each
//! group to a [`TaskLoader`], normally the [`HttpTaskLoader`]. The
//! [`UploadProcessor`] drains clients through an [`UploadPool`]: one client
//! when its check reports a metric, all remaining clients at shutdown.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use geoflag_data::upload::{HttpTaskLoader, HttpTaskLoaderConfig, TaskBatchClient, UploadProcessor};
//!
//! let loader = HttpTaskLoader::with_config(
//!     HttpTaskLoaderConfig::new("https://tasks.example.org/api/v2").with_api_key("secret"),
//! )?;
//! let processor = UploadProcessor::new([(
//!     "SinkIslandCheck".to_owned(),
//!     Arc::new(TaskBatchClient::new(loader)) as _,
//! )])?;
//! # Ok::<(), geoflag_data::upload::UploadError>(())
//! ```

mod client;
mod http;
mod pool;
mod processor;
mod task;

#[doc(hidden)]
pub mod test_support;

pub use client::{SharedClient, TaskBatchClient, TaskLoader, UploadClient};
pub use http::{DEFAULT_USER_AGENT, HttpTaskLoader, HttpTaskLoaderConfig};
pub use pool::{PoolReport, UploadJob, UploadPool, upload_timeout};
pub use processor::UploadProcessor;
pub use task::Task;

use thiserror::Error;

/// Errors raised while preparing or delivering tasks.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A flag without objects cannot become a task.
    #[error("flag {identifier} has no objects to upload")]
    EmptyTask {
        /// Flag identifier.
        identifier: String,
    },
    /// The service URL could not be built.
    #[error("invalid task service URL {url}: {message}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },
    /// The service answered with an error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The request timed out.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Request URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The request could not be sent.
    #[error("request to {url} failed: {message}")]
    Network {
        /// Request URL.
        url: String,
        /// Error description.
        message: String,
    },
    /// The loader refused a batch.
    #[error("upload of {project}/{challenge} rejected: {message}")]
    Rejected {
        /// Project of the batch.
        project: String,
        /// Challenge of the batch.
        challenge: String,
        /// Reason given.
        message: String,
    },
    /// Some batches of a client failed; they stay queued.
    #[error("{failed} of {attempted} task batches failed to upload")]
    Incomplete {
        /// Batches that failed.
        failed: usize,
        /// Batches attempted.
        attempted: usize,
    },
    /// Building the HTTP client failed.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
    /// Building the Tokio runtime failed.
    #[error("failed to build Tokio runtime")]
    Runtime(#[source] std::io::Error),
}
