//! The flag aggregate: one reported problem over one or more objects.
//!
//! Responsibilities:
//! - Collect flagged objects in insertion order without duplicates.
//! - Render numbered instructions and derive a deterministic identifier.
//! - Compute display bounds and resolve a country code.
//!
//! Boundaries:
//! - A flag is built by a single rule evaluation and then handed off; it has
//!   no interior synchronisation.

mod bounds;
mod container;

use std::collections::BTreeSet;

use geo::{Coord, Rect};

pub use bounds::{MINIMUM_EXTENT_METERS, expand_to_minimum, extent_meters};
pub use container::UniqueFlagContainer;

use crate::entity::Entity;
use crate::fix::FixSuggestion;
use crate::flagged::{COUNTRY_MISSING, FlaggedObject, union_rects};

/// Country reported for flags whose members expose none.
pub const FLAG_COUNTRY_MISSING: &str = "NA";

/// Location used for a flag without members.
pub const NULL_ISLAND: Coord = Coord { x: 0.0, y: 0.0 };

/// A reported data-quality problem.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use geoflag_core::{CompleteEntity, Flag};
///
/// let mut flag = Flag::new("F1");
/// flag.add_object(&CompleteEntity::point(1, Coord { x: 1.0, y: 2.0 }));
/// flag.add_instruction("first");
/// flag.add_instruction("  ");
/// flag.add_instruction("second");
/// assert_eq!(flag.instructions(), "1. first\n2. second");
/// assert_eq!(flag.country(), "NA");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    identifier: String,
    challenge: Option<String>,
    instructions: Vec<String>,
    objects: Vec<FlaggedObject>,
    fix_suggestions: Vec<FixSuggestion>,
}

impl Flag {
    /// An empty flag with the given identifier.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            challenge: None,
            instructions: Vec::new(),
            objects: Vec::new(),
            fix_suggestions: Vec::new(),
        }
    }

    /// A flag seeded with entities.
    #[must_use]
    pub fn with_entities<'a>(
        identifier: impl Into<String>,
        entities: impl IntoIterator<Item = &'a dyn Entity>,
    ) -> Self {
        let mut flag = Self::new(identifier);
        for entity in entities {
            flag.add_object(entity);
        }
        flag
    }

    /// Set the challenge (category) name.
    #[must_use]
    pub fn with_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.challenge = Some(challenge.into());
        self
    }

    /// Replace the challenge (category) name.
    pub fn set_challenge(&mut self, challenge: impl Into<String>) {
        self.challenge = Some(challenge.into());
    }

    /// Flag identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Challenge (category) name.
    #[must_use]
    pub fn challenge(&self) -> Option<&str> {
        self.challenge.as_deref()
    }

    /// Add the flagged-object variant for `entity`.
    ///
    /// Returns `false` when the entity has no placeable shape or an equal
    /// object is already present.
    pub fn add_object(&mut self, entity: &dyn Entity) -> bool {
        FlaggedObject::from_entity(entity).is_some_and(|object| self.push_object(object))
    }

    /// Add a synthetic highlight point.
    pub fn add_point(&mut self, location: Coord) -> bool {
        self.push_object(FlaggedObject::synthetic_point(location))
    }

    /// Add several synthetic highlight points.
    pub fn add_points(&mut self, locations: impl IntoIterator<Item = Coord>) {
        for location in locations {
            self.add_point(location);
        }
    }

    /// Add an already-built flagged object, ignoring duplicates.
    pub fn push_object(&mut self, object: FlaggedObject) -> bool {
        if self.objects.contains(&object) {
            return false;
        }
        self.objects.push(object);
        true
    }

    /// Append an instruction; blank text is ignored.
    pub fn add_instruction(&mut self, instruction: impl Into<String>) {
        let text = instruction.into();
        if !text.trim().is_empty() {
            self.instructions.push(text);
        }
    }

    /// Attach a fix suggestion, ignoring duplicates.
    pub fn add_fix_suggestion(&mut self, suggestion: FixSuggestion) -> bool {
        if self.fix_suggestions.contains(&suggestion) {
            return false;
        }
        self.fix_suggestions.push(suggestion);
        true
    }

    /// Raw instruction list.
    #[must_use]
    pub fn raw_instructions(&self) -> &[String] {
        &self.instructions
    }

    /// Instructions rendered as `"1. a\n2. b"`.
    #[must_use]
    pub fn instructions(&self) -> String {
        self.instructions
            .iter()
            .enumerate()
            .map(|(index, text)| format!("{}. {text}", index.saturating_add(1)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Flagged objects in insertion order.
    #[must_use]
    pub fn objects(&self) -> &[FlaggedObject] {
        &self.objects
    }

    /// Fix suggestions in insertion order.
    #[must_use]
    pub fn fix_suggestions(&self) -> &[FixSuggestion] {
        &self.fix_suggestions
    }

    /// Sorted `{ItemType}{identifier}` of all entity-backed members.
    #[must_use]
    pub fn unique_identifiers(&self) -> BTreeSet<String> {
        self.objects
            .iter()
            .filter_map(FlaggedObject::unique_identifier)
            .collect()
    }

    /// Replace the identifier with the sorted concatenation of member
    /// identifiers. The result does not depend on insertion order.
    pub fn set_identifier_from_members(&mut self) {
        self.identifier = self.unique_identifiers().into_iter().collect();
    }

    /// Union of member bounds, grown to at least
    /// [`MINIMUM_EXTENT_METERS`] per side. Empty flags sit on null island.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let union = self
            .objects
            .iter()
            .filter_map(FlaggedObject::bounds)
            .reduce(union_rects)
            .unwrap_or_else(|| Rect::new(NULL_ISLAND, NULL_ISLAND));
        expand_to_minimum(union)
    }

    /// Country of the first member that has one, else [`FLAG_COUNTRY_MISSING`].
    #[must_use]
    pub fn country(&self) -> &str {
        self.objects
            .iter()
            .map(FlaggedObject::country)
            .find(|country| *country != COUNTRY_MISSING)
            .unwrap_or(FLAG_COUNTRY_MISSING)
    }
}

#[cfg(test)]
mod tests;
