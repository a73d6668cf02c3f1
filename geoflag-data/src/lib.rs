//! Delivery of flags produced by the rule engine.
//!
//! Responsibilities:
//! - Fan flag, metric and shutdown events out to registered processors.
//! - Batch serialized flags per category and flush them to files, SQLite or
//!   the task-tracking service.
//! - Write output with bounded retries and an atomic commit step.
//!
//! Boundaries:
//! - Flag construction and the interchange format live in `geoflag-core`.
//! - Publish calls are synchronous; uploads run on an internal Tokio runtime.
//!
//! Invariants:
//! - Every category holding records at shutdown is flushed exactly once.
//! - No global mutable state: clients and sinks are injected.

#![forbid(unsafe_code)]

#[cfg(feature = "sqlite")]
pub mod database;
pub mod event;
pub mod pipeline;
pub mod storage;
pub mod upload;

#[cfg(feature = "sqlite")]
pub use database::{SqliteSink, SqliteSinkError};
pub use event::{EventService, FlagEvent, MetricEvent, Processor};
pub use pipeline::{
    BatchSink, BatchSizePolicy, FeatureBatcher, FileSink, LineDelimitedBatcher,
    MetricFileProcessor, PipelineConfig, SinkError,
};
pub use storage::{FileStore, RetryPolicy, StorageError};
pub use upload::{
    HttpTaskLoader, HttpTaskLoaderConfig, Task, TaskBatchClient, TaskLoader, UploadClient,
    UploadError, UploadPool, UploadProcessor, upload_timeout,
};
