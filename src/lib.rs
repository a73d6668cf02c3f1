//! Facade crate for the geoflag validation engine.
//!
//! Re-exports the flag model and, behind the `delivery` feature, the
//! pipeline that batches flags and hands them to files, SQLite or the task
//! service.

#![forbid(unsafe_code)]

pub use geoflag_core::{
    ChangeDescriptor, ChangeOperation, CompleteEntity, DeserializeError, Flag, FlagContext,
    FlaggedObject, FixSuggestion, ItemType, Rule, RuleConfig, RuleError, RuleRegistry, Tags,
    interchange,
};

#[cfg(feature = "delivery")]
pub use geoflag_data::{
    EventService, FeatureBatcher, FileSink, FileStore, FlagEvent, LineDelimitedBatcher,
    MetricEvent, PipelineConfig, Processor, UploadProcessor,
};

#[cfg(feature = "sqlite")]
pub use geoflag_data::SqliteSink;
