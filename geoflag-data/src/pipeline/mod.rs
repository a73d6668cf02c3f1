//! Batched delivery of serialized flags.
//!
//! Each category moves through Empty, Accumulating and Flushing states.
//! Publishers append under a shared guard; the publisher that crosses the
//! batch threshold takes the exclusive guard, re-checks the threshold and
//! flushes synchronously. Metric events force a flush of one category and
//! shutdown flushes every category that still holds records.

mod batcher;
mod buffers;
mod line_delimited;
mod metrics;
mod sink;

pub use batcher::FeatureBatcher;
pub use buffers::CategoryBuffers;
pub use line_delimited::{LINE_BATCH_SIZE, LineDelimitedBatcher};
pub use metrics::{METRIC_HEADER, MetricFileProcessor};
pub use sink::{BatchSink, FileSink, SinkError};


/// Total records the adaptive policy spreads across categories.
pub const ADAPTIVE_BATCH_BUDGET: usize = 25_000;

/// Smallest batch the adaptive policy produces.
pub const MINIMUM_BATCH_SIZE: usize = 100;

/// How many records a category accumulates before it is flushed.
///
/// # Examples
///
/// ```
/// use geoflag_data::BatchSizePolicy;
///
/// assert_eq!(BatchSizePolicy::Adaptive.batch_size(1), 25_000);
/// assert_eq!(BatchSizePolicy::Adaptive.batch_size(50), 500);
/// assert_eq!(BatchSizePolicy::Adaptive.batch_size(1_000), 100);
/// assert_eq!(BatchSizePolicy::Fixed(3).batch_size(1_000), 3);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchSizePolicy {
    /// Shrinks as more categories appear, never below [`MINIMUM_BATCH_SIZE`].
    #[default]
    Adaptive,
    /// A fixed override. Zero is treated as one.
    Fixed(usize),
}

impl BatchSizePolicy {
    /// Threshold given the number of categories seen so far.
    #[must_use]
    pub fn batch_size(self, categories: usize) -> usize {
        match self {
            Self::Fixed(size) => size.max(1),
            Self::Adaptive => ADAPTIVE_BATCH_BUDGET
                .checked_div(categories)
                .unwrap_or(ADAPTIVE_BATCH_BUDGET)
                .max(MINIMUM_BATCH_SIZE),
        }
    }
}

/// Settings shared by the batching processors. Write retries belong to the
/// [`FileStore`](crate::storage::FileStore) a processor is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Threshold policy for feature batches.
    pub batch_size: BatchSizePolicy,
    /// Records per line-delimited log file.
    pub line_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: BatchSizePolicy::Adaptive,
            line_batch_size: LINE_BATCH_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Use a fixed feature batch size instead of the adaptive one.
    #[must_use]
    pub const fn with_batch_size_override(mut self, size: usize) -> Self {
        self.batch_size = BatchSizePolicy::Fixed(size);
        self
    }

    /// Set the number of records per line-delimited log file.
    #[must_use]
    pub const fn with_line_batch_size(mut self, size: usize) -> Self {
        self.line_batch_size = size;
        self
    }
}
