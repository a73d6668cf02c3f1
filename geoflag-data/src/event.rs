//! Events published by rule evaluation and the processors that consume them.
//!
//! Publishing is synchronous: a processor runs in the publisher's thread, so
//! processors must tolerate concurrent calls from many publishers. Shutdown
//! is broadcast once; events published afterwards are dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use geoflag_core::Flag;
use geoflag_core::interchange::{FlagContext, to_line_delimited};
use log::{debug, warn};

/// Metric kind recorded for check run times.
pub const TIMER_KIND: &str = "timer";

/// A flag produced by one check.
#[derive(Debug, Clone)]
pub struct FlagEvent {
    check_name: String,
    flag: Flag,
    timestamp: DateTime<Utc>,
}

impl FlagEvent {
    /// Wrap `flag`, stamped with the current time.
    #[must_use]
    pub fn new(check_name: impl Into<String>, flag: Flag) -> Self {
        Self {
            check_name: check_name.into(),
            flag,
            timestamp: Utc::now(),
        }
    }

    /// Replace the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Name of the check that produced the flag.
    #[must_use]
    pub fn check_name(&self) -> &str {
        &self.check_name
    }

    /// The flag.
    #[must_use]
    pub const fn flag(&self) -> &Flag {
        &self.flag
    }

    /// When the flag was produced.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The timestamp as RFC 3339 text with millisecond precision.
    #[must_use]
    pub fn timestamp_text(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Category used for batching: the flag's challenge, else the check name.
    #[must_use]
    pub fn category(&self) -> &str {
        self.flag.challenge().unwrap_or(&self.check_name)
    }

    /// Serialization context carrying the check name and timestamp.
    #[must_use]
    pub fn context(&self) -> FlagContext {
        FlagContext::default()
            .with_generator(self.check_name.clone())
            .with_timestamp(self.timestamp_text())
    }

    /// One line of line-delimited GeoJSON.
    #[must_use]
    pub fn to_line_delimited(&self) -> String {
        to_line_delimited(&self.flag, &self.check_name, &self.timestamp_text())
    }
}

/// A measurement reported by a check, usually once it has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEvent {
    check_name: String,
    kind: String,
    value: Duration,
}

impl MetricEvent {
    /// A metric of an arbitrary kind.
    #[must_use]
    pub fn new(check_name: impl Into<String>, kind: impl Into<String>, value: Duration) -> Self {
        Self {
            check_name: check_name.into(),
            kind: kind.into(),
            value,
        }
    }

    /// Run time of a check.
    #[must_use]
    pub fn timer(check_name: impl Into<String>, elapsed: Duration) -> Self {
        Self::new(check_name, TIMER_KIND, elapsed)
    }

    /// Check the metric belongs to.
    #[must_use]
    pub fn check_name(&self) -> &str {
        &self.check_name
    }

    /// Metric kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Measured value.
    #[must_use]
    pub const fn value(&self) -> Duration {
        self.value
    }
}

/// Consumer of published events.
pub trait Processor: Send + Sync {
    /// Handle one flag.
    fn process_flag(&self, event: &FlagEvent);

    /// Handle one metric.
    fn process_metric(&self, _event: &MetricEvent) {}

    /// Flush everything still held. Called once per service.
    fn complete(&self);
}

/// Fans events out to registered processors.
#[derive(Default)]
pub struct EventService {
    processors: Vec<Box<dyn Processor>>,
    completed: AtomicBool,
}

impl fmt::Debug for EventService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventService")
            .field("processors", &self.processors.len())
            .field("completed", &self.completed)
            .finish()
    }
}

impl EventService {
    /// A service with no processors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a processor. Processors receive events in registration order.
    pub fn register(&mut self, processor: impl Processor + 'static) {
        self.processors.push(Box::new(processor));
    }

    /// Whether shutdown has been broadcast.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Deliver a flag to every processor.
    pub fn publish_flag(&self, event: &FlagEvent) {
        if self.is_complete() {
            warn!(
                "dropping flag {} from {} published after shutdown",
                event.flag().identifier(),
                event.check_name()
            );
            return;
        }
        for processor in &self.processors {
            processor.process_flag(event);
        }
    }

    /// Deliver a metric to every processor.
    pub fn publish_metric(&self, event: &MetricEvent) {
        if self.is_complete() {
            warn!(
                "dropping metric for {} published after shutdown",
                event.check_name()
            );
            return;
        }
        for processor in &self.processors {
            processor.process_metric(event);
        }
    }

    /// Broadcast shutdown. Returns `false` if it had already been broadcast.
    pub fn complete(&self) -> bool {
        if self.completed.swap(true, Ordering::AcqRel) {
            return false;
        }
        debug!("completing {} processors", self.processors.len());
        for processor in &self.processors {
            processor.complete();
        }
        true
    }
}
