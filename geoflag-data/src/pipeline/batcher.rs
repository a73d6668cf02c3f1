//! Per-category batching of compact flag features.

use geoflag_core::interchange::to_feature;
use log::{debug, error};
use serde_json::Value;

use super::{BatchSink, BatchSizePolicy, CategoryBuffers, PipelineConfig, SinkError};
use crate::event::{FlagEvent, MetricEvent, Processor};

/// Serializes flags to compact features and flushes one feature collection
/// per category into a [`BatchSink`].
#[derive(Debug)]
pub struct FeatureBatcher<S> {
    buffers: CategoryBuffers<Value>,
    sink: S,
}

impl<S: BatchSink> FeatureBatcher<S> {
    /// A batcher using the feature batch policy from `config`.
    #[must_use]
    pub fn new(sink: S, config: &PipelineConfig) -> Self {
        Self::with_policy(sink, config.batch_size)
    }

    /// A batcher with an explicit threshold policy.
    #[must_use]
    pub fn with_policy(sink: S, policy: BatchSizePolicy) -> Self {
        Self {
            buffers: CategoryBuffers::new(policy),
            sink,
        }
    }

    /// The sink receiving batches.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Features waiting in `category`.
    #[must_use]
    pub fn pending(&self, category: &str) -> usize {
        self.buffers.pending(category)
    }

    /// Buffer one flag. Returns `true` when the append triggered a flush.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the triggered flush fails; the batch is
    /// dropped.
    pub fn publish(&self, event: &FlagEvent) -> Result<bool, SinkError> {
        let category = event.category();
        let feature = to_feature(event.flag(), &event.context());
        self.buffers
            .append(category, feature, |features| {
                self.sink.write_batch(category, features)
            })
            .transpose()
            .map(|flushed| flushed.is_some())
    }

    /// Flush `category` regardless of size. Returns `false` when it was
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the flush fails.
    pub fn flush(&self, category: &str) -> Result<bool, SinkError> {
        self.buffers
            .flush(category, |features| self.sink.write_batch(category, features))
            .transpose()
            .map(|flushed| flushed.is_some())
    }

    /// Flush every non-empty category, logging failures. Returns the
    /// number of batches delivered.
    pub fn flush_all(&self) -> usize {
        self.buffers
            .flush_all(|category, features| {
                let count = features.len();
                self.sink
                    .write_batch(category, features)
                    .inspect_err(|err| {
                        error!("dropping {count} features for {category}: {err}");
                    })
                    .is_ok()
            })
            .into_iter()
            .filter(|delivered| *delivered)
            .count()
    }
}

impl<S: BatchSink> Processor for FeatureBatcher<S> {
    fn process_flag(&self, event: &FlagEvent) {
        if let Err(err) = self.publish(event) {
            error!("failed to flush batch for {}: {err}", event.category());
        }
    }

    fn process_metric(&self, event: &MetricEvent) {
        match self.flush(event.check_name()) {
            Ok(true) => debug!("flushed {} on metric", event.check_name()),
            Ok(false) => {}
            Err(err) => error!("failed to flush batch for {}: {err}", event.check_name()),
        }
    }

    fn complete(&self) {
        let delivered = self.flush_all();
        debug!("delivered {delivered} batches at shutdown");
    }
}
