//! Line-delimited GeoJSON logs of every flag, in fixed-size files.

use log::{debug, error};

use super::sink::MillisClock;
use super::{BatchSizePolicy, CategoryBuffers, PipelineConfig};
use crate::event::{FlagEvent, Processor};
use crate::storage::{FileStore, StorageError};

/// Default records per log file.
pub const LINE_BATCH_SIZE: usize = 2_500;

const ALL_FLAGS: &str = "";

/// Appends each flag as one line and writes `{millis}-{count}.log` files.
#[derive(Debug)]
pub struct LineDelimitedBatcher {
    buffer: CategoryBuffers<String>,
    store: FileStore,
    clock: MillisClock,
}

impl LineDelimitedBatcher {
    /// Extension of log files.
    pub const EXTENSION: &'static str = "log";

    /// A batcher writing into `store` with the line batch size from
    /// `config`.
    #[must_use]
    pub fn new(store: FileStore, config: &PipelineConfig) -> Self {
        Self {
            buffer: CategoryBuffers::new(BatchSizePolicy::Fixed(config.line_batch_size)),
            store,
            clock: MillisClock::default(),
        }
    }

    /// Lines not yet written.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.pending(ALL_FLAGS)
    }

    /// Buffer one flag. Returns `true` when a file was written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the triggered write fails.
    pub fn publish(&self, event: &FlagEvent) -> Result<bool, StorageError> {
        self.buffer
            .append(ALL_FLAGS, event.to_line_delimited(), |lines| self.write(&lines))
            .transpose()
            .map(|written| written.is_some())
    }

    /// Write whatever is buffered. Returns `false` when nothing was.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the write fails.
    pub fn flush(&self) -> Result<bool, StorageError> {
        self.buffer
            .flush(ALL_FLAGS, |lines| self.write(&lines))
            .transpose()
            .map(|written| written.is_some())
    }

    fn write(&self, lines: &[String]) -> Result<(), StorageError> {
        let name = format!(
            "{}-{}.{}",
            self.clock.next(),
            lines.len(),
            Self::EXTENSION
        );
        let mut body = lines.join("\n");
        body.push('\n');
        let path = self.store.write(&name, body.as_bytes())?;
        debug!("wrote {} flags to {path}", lines.len());
        Ok(())
    }
}

impl Processor for LineDelimitedBatcher {
    fn process_flag(&self, event: &FlagEvent) {
        if let Err(err) = self.publish(event) {
            error!("failed to write flag log: {err}");
        }
    }

    fn complete(&self) {
        if let Err(err) = self.flush() {
            error!("failed to write flag log at shutdown: {err}");
        }
    }
}
