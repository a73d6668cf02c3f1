//! De-duplication of flags arriving from several sources.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::Flag;

/// Collects flags per source, keeping only the first flag seen for each set
/// of member identifiers.
#[derive(Debug, Default)]
pub struct UniqueFlagContainer {
    flags: BTreeMap<String, Vec<Flag>>,
    seen: HashSet<(String, BTreeSet<String>)>,
}

impl UniqueFlagContainer {
    /// An empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `flag` under `source`. Returns `false` if an equivalent flag from
    /// the same source is already held.
    pub fn add(&mut self, source: impl Into<String>, flag: Flag) -> bool {
        let name = source.into();
        let key = (name.clone(), flag.unique_identifiers());
        if !self.seen.insert(key) {
            return false;
        }
        self.flags.entry(name).or_default().push(flag);
        true
    }

    /// Flags held for `source`, in insertion order.
    #[must_use]
    pub fn flags(&self, source: &str) -> &[Flag] {
        self.flags.get(source).map_or(&[], Vec::as_slice)
    }

    /// Iterate `(source, flags)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Flag])> {
        self.flags
            .iter()
            .map(|(source, flags)| (source.as_str(), flags.as_slice()))
    }

    /// Total number of flags held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.values().map(Vec::len).sum()
    }

    /// Whether no flags are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
