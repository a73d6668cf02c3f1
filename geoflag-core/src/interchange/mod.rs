//! GeoJSON interchange for flags.
//!
//! Two record shapes are produced: a compact single feature used for batch
//! upload, and a full feature collection with one sub-feature per flagged
//! object that can be read back into a [`crate::Flag`], fix suggestions
//! included.

mod decorator;
mod descriptor;
mod deserialize;
mod serialize;

pub use descriptor::{decode_descriptor, encode_descriptor};
pub use deserialize::{
    DeserializeError, LineDelimitedReader, from_compact_feature, from_feature_collection,
    from_line_delimited, parse_instructions,
};
pub use serialize::{
    FIX_SUGGESTIONS_KEY, FLAG_TYPE_VALUE, fix_suggestions_json, to_feature, to_feature_collection,
    to_line_delimited,
};

/// Name used when the context supplies none and a decoration applies.
pub const DEFAULT_TASK_NAME: &str = "Task";

/// Contextual properties stamped onto serialized flags.
///
/// # Examples
///
/// ```
/// use geoflag_core::interchange::FlagContext;
///
/// let context = FlagContext::default()
///     .with_generator("SinkIslandCheck")
///     .with_timestamp("2024-05-01T00:00:00Z");
/// assert_eq!(context.generator(), Some("SinkIslandCheck"));
/// assert!(context.name().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagContext {
    name: Option<String>,
    generator: Option<String>,
    timestamp: Option<String>,
}

impl FlagContext {
    /// Set the task name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the generating check's name.
    #[must_use]
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = Some(generator.into());
        self
    }

    /// Set the timestamp text.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Task name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Generating check.
    #[must_use]
    pub fn generator(&self) -> Option<&str> {
        self.generator.as_deref()
    }

    /// Timestamp text.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}
