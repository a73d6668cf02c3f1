//! Error types emitted by the geoflag CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geoflag_data::{SinkError, UploadError};
use thiserror::Error;

/// Errors emitted by the geoflag CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The input path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingInput {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// Reading an input log or directory failed.
    #[error("failed to read {path:?}: {source}")]
    ReadInput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The batch size must hold at least one flag.
    #[error("--batch-size must be at least 1, got {value}")]
    InvalidBatchSize { value: usize },
    /// Writing a batch file failed.
    #[error("failed to write batch: {0}")]
    WriteBatch(#[source] SinkError),
    /// The task loader or upload processor could not be built.
    #[error("failed to prepare uploads: {0}")]
    PrepareUpload(#[source] UploadError),
    /// Some uploads failed or timed out.
    #[error("{failed} uploads failed and {timed_out} timed out")]
    UploadIncomplete { failed: usize, timed_out: usize },
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
