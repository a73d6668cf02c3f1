//! Destinations for flushed batches.

use std::sync::{Mutex, PoisonError};

use camino::Utf8PathBuf;
use chrono::Utc;
use log::debug;
use serde_json::{Value, json};
use thiserror::Error;

use crate::storage::{FileStore, StorageError};

/// Errors raised while delivering a batch.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing the batch file failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Encoding the batch failed.
    #[error("failed to encode batch for {category}")]
    Encode {
        /// Category being flushed.
        category: String,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// Encoding metric rows failed.
    #[error("failed to encode metric rows")]
    Metrics {
        /// Source error produced by `csv`.
        #[source]
        source: csv::Error,
    },
    /// Persisting the batch to SQLite failed.
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Database(#[from] crate::database::SqliteSinkError),
}

/// Receives one flushed batch of compact features per call.
pub trait BatchSink: Send + Sync {
    /// Deliver `features` for `category`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the batch cannot be delivered.
    fn write_batch(&self, category: &str, features: Vec<Value>) -> Result<(), SinkError>;
}

/// Milliseconds since the epoch, strictly increasing per instance so two
/// flushes never share a file name.
#[derive(Debug, Default)]
pub(crate) struct MillisClock {
    last: Mutex<i64>,
}

impl MillisClock {
    pub(crate) fn next(&self) -> i64 {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now().timestamp_millis().max(last.saturating_add(1));
        *last = now;
        now
    }
}

/// Replace characters that do not belong in a file name.
pub(crate) fn file_safe(category: &str) -> String {
    category
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Writes each batch as `{category}-{millis}-{count}.geojson`.
#[derive(Debug)]
pub struct FileSink {
    store: FileStore,
    clock: MillisClock,
}

impl FileSink {
    /// Extension of batch files.
    pub const EXTENSION: &'static str = "geojson";

    /// A sink writing into `store`.
    #[must_use]
    pub fn new(store: FileStore) -> Self {
        Self {
            store,
            clock: MillisClock::default(),
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &FileStore {
        &self.store
    }

    fn file_name(&self, category: &str, count: usize) -> String {
        format!(
            "{}-{}-{count}.{}",
            file_safe(category),
            self.clock.next(),
            Self::EXTENSION
        )
    }

    /// Write one batch and return the committed path.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when encoding or writing fails.
    pub fn write_collection(
        &self,
        category: &str,
        features: Vec<Value>,
    ) -> Result<Utf8PathBuf, SinkError> {
        let name = self.file_name(category, features.len());
        let collection = json!({ "type": "FeatureCollection", "features": features });
        let bytes = serde_json::to_vec(&collection).map_err(|source| SinkError::Encode {
            category: category.to_owned(),
            source,
        })?;
        let path = self.store.write(&name, &bytes)?;
        debug!("wrote batch {path}");
        Ok(path)
    }
}

impl BatchSink for FileSink {
    fn write_batch(&self, category: &str, features: Vec<Value>) -> Result<(), SinkError> {
        self.write_collection(category, features).map(|_| ())
    }
}
