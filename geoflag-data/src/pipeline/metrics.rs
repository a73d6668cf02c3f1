//! CSV file of the metrics reported during a run.

use std::sync::{Mutex, PoisonError};

use camino::Utf8PathBuf;
use log::{debug, warn};

use super::SinkError;
use super::sink::MillisClock;
use crate::event::{FlagEvent, MetricEvent, Processor};
use crate::storage::FileStore;

/// Header row of metric files.
pub const METRIC_HEADER: [&str; 3] = ["name", "kind", "millis"];

const DEFAULT_SUFFIX: &str = ".csv";
const KNOWN_SUFFIXES: [&str; 5] = [".csv", ".txt", ".log", ".json", ".geojson"];

/// Collects metric rows and writes a single CSV at shutdown.
///
/// A label ending in a known suffix keeps it; any other label gets `.csv`.
/// The file name is `{label}-{millis}{suffix}`.
#[derive(Debug)]
pub struct MetricFileProcessor {
    label: String,
    suffix: &'static str,
    store: FileStore,
    rows: Mutex<Vec<MetricEvent>>,
    clock: MillisClock,
}

impl MetricFileProcessor {
    /// A processor writing into `store` under `label`.
    #[must_use]
    pub fn new(label: &str, store: FileStore) -> Self {
        let (stem, suffix) = KNOWN_SUFFIXES
            .iter()
            .find_map(|suffix| label.strip_suffix(suffix).map(|stem| (stem, *suffix)))
            .unwrap_or((label, DEFAULT_SUFFIX));
        Self {
            label: stem.to_owned(),
            suffix,
            store,
            rows: Mutex::new(Vec::new()),
            clock: MillisClock::default(),
        }
    }

    /// Rows collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no rows have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name for a file written now.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}-{}{}", self.label, self.clock.next(), self.suffix)
    }

    /// Render the header and every collected row.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Metrics`] when encoding fails.
    pub fn render(&self) -> Result<Vec<u8>, SinkError> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(METRIC_HEADER)
            .map_err(|source| SinkError::Metrics { source })?;
        for row in rows.iter() {
            let millis = row.value().as_millis().to_string();
            writer
                .write_record([row.check_name(), row.kind(), millis.as_str()])
                .map_err(|source| SinkError::Metrics { source })?;
        }
        writer.into_inner().map_err(|err| SinkError::Metrics {
            source: err.into_error().into(),
        })
    }

    /// Write the metric file.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when encoding or writing fails.
    pub fn write(&self) -> Result<Utf8PathBuf, SinkError> {
        let bytes = self.render()?;
        let path = self.store.write(&self.file_name(), &bytes)?;
        debug!("wrote {} metrics to {path}", self.len());
        Ok(path)
    }
}

impl Processor for MetricFileProcessor {
    fn process_flag(&self, _event: &FlagEvent) {}

    fn process_metric(&self, event: &MetricEvent) {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    fn complete(&self) {
        if let Err(err) = self.write() {
            warn!("failed to write metric file: {err}");
        }
    }
}
