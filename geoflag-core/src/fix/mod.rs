//! Proposed edits attached to flags.
//!
//! A [`FixSuggestion`] either removes an entity or describes a modification
//! as an ordered list of [`ChangeDescriptor`]s against a before view. The
//! after view is always derivable by [`patch::apply`].

mod diff;
pub mod patch;

use std::fmt;
use std::str::FromStr;

use geo::Coord;
use thiserror::Error;

use crate::entity::{CompleteEntity, Entity, ItemType};

/// Operation performed by a descriptor or a whole suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeOperation {
    /// Something is added.
    Add,
    /// Something is removed.
    Remove,
    /// Something is changed in place.
    Update,
}

impl ChangeOperation {
    /// Upper-case interchange name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for unknown operation or descriptor names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {what} {value:?}")]
pub struct UnknownName {
    /// Which vocabulary was being parsed.
    pub what: &'static str,
    /// Offending value.
    pub value: String,
}

impl FromStr for ChangeOperation {
    type Err = UnknownName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ADD" => Ok(Self::Add),
            "REMOVE" => Ok(Self::Remove),
            "UPDATE" => Ok(Self::Update),
            other => Err(UnknownName {
                what: "change operation",
                value: other.to_owned(),
            }),
        }
    }
}

/// Kind of entity facet a descriptor changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorName {
    /// A tag.
    Tag,
    /// A run of coordinates.
    Geometry,
    /// A relation member.
    RelationMember,
}

impl DescriptorName {
    /// Upper-case interchange name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tag => "TAG",
            Self::Geometry => "GEOMETRY",
            Self::RelationMember => "RELATION_MEMBER",
        }
    }
}

impl FromStr for DescriptorName {
    type Err = UnknownName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "TAG" => Ok(Self::Tag),
            "GEOMETRY" => Ok(Self::Geometry),
            "RELATION_MEMBER" => Ok(Self::RelationMember),
            other => Err(UnknownName {
                what: "descriptor name",
                value: other.to_owned(),
            }),
        }
    }
}

/// One ordered change against a before view.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeDescriptor {
    /// Tag change. `value` is the new value for ADD/UPDATE and the removed
    /// value for REMOVE; `original_value` is set for UPDATE.
    Tag {
        /// Operation.
        operation: ChangeOperation,
        /// Tag key.
        key: String,
        /// New or removed value.
        value: Option<String>,
        /// Value before an update.
        original_value: Option<String>,
    },
    /// Coordinate change at a position of the before sequence.
    Geometry {
        /// Operation.
        operation: ChangeOperation,
        /// Index into the before sequence.
        position: usize,
        /// Coordinates being replaced or removed.
        before: Vec<Coord>,
        /// Coordinates being inserted or written.
        after: Vec<Coord>,
    },
    /// Member added to or removed from a relation.
    RelationMember {
        /// Operation; UPDATE is not produced.
        operation: ChangeOperation,
        /// Member identifier.
        identifier: i64,
        /// Member type.
        item_type: ItemType,
        /// Member role.
        role: String,
    },
}

impl ChangeDescriptor {
    /// Descriptor kind.
    #[must_use]
    pub const fn name(&self) -> DescriptorName {
        match self {
            Self::Tag { .. } => DescriptorName::Tag,
            Self::Geometry { .. } => DescriptorName::Geometry,
            Self::RelationMember { .. } => DescriptorName::RelationMember,
        }
    }

    /// Descriptor operation.
    #[must_use]
    pub const fn operation(&self) -> ChangeOperation {
        match self {
            Self::Tag { operation, .. }
            | Self::Geometry { operation, .. }
            | Self::RelationMember { operation, .. } => *operation,
        }
    }

    /// Tag addition.
    #[must_use]
    pub fn tag_add(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Tag {
            operation: ChangeOperation::Add,
            key: key.into(),
            value: Some(value.into()),
            original_value: None,
        }
    }

    /// Tag value change.
    #[must_use]
    pub fn tag_update(
        key: impl Into<String>,
        original: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Tag {
            operation: ChangeOperation::Update,
            key: key.into(),
            value: Some(value.into()),
            original_value: Some(original.into()),
        }
    }

    /// Tag removal.
    #[must_use]
    pub fn tag_remove(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Tag {
            operation: ChangeOperation::Remove,
            key: key.into(),
            value: Some(value.into()),
            original_value: None,
        }
    }

    /// Coordinate insertion before `position`.
    #[must_use]
    pub const fn geometry_add(position: usize, after: Vec<Coord>) -> Self {
        Self::Geometry {
            operation: ChangeOperation::Add,
            position,
            before: Vec::new(),
            after,
        }
    }

    /// Removal of the coordinate at `position`.
    #[must_use]
    pub fn geometry_remove(position: usize, removed: Coord) -> Self {
        Self::Geometry {
            operation: ChangeOperation::Remove,
            position,
            before: vec![removed],
            after: Vec::new(),
        }
    }

    /// Overwrite of the coordinates starting at `position`.
    #[must_use]
    pub const fn geometry_update(position: usize, before: Vec<Coord>, after: Vec<Coord>) -> Self {
        Self::Geometry {
            operation: ChangeOperation::Update,
            position,
            before,
            after,
        }
    }

    /// Member change.
    #[must_use]
    pub fn member(
        operation: ChangeOperation,
        identifier: i64,
        item_type: ItemType,
        role: impl Into<String>,
    ) -> Self {
        Self::RelationMember {
            operation,
            identifier,
            item_type,
            role: role.into(),
        }
    }
}

/// A proposed edit to one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum FixSuggestion {
    /// Delete the entity.
    Remove {
        /// Entity to delete.
        before: CompleteEntity,
    },
    /// Change the entity.
    Modify {
        /// Entity before the change.
        before: CompleteEntity,
        /// Ordered changes.
        descriptors: Vec<ChangeDescriptor>,
        /// Entity after the change.
        after: CompleteEntity,
    },
}

impl FixSuggestion {
    /// Suggest deleting `before`.
    #[must_use]
    pub const fn removal(before: CompleteEntity) -> Self {
        Self::Remove { before }
    }

    /// Suggest changing `before` into `after`, deriving the descriptors.
    ///
    /// # Examples
    ///
    /// ```
    /// use geo::Coord;
    /// use geoflag_core::{ChangeDescriptor, CompleteEntity, FixSuggestion};
    ///
    /// let before = CompleteEntity::node(1, Coord { x: 0.0, y: 0.0 });
    /// let after = before.clone().with_tag("barrier", "gate");
    /// let fix = FixSuggestion::from_views(before, after);
    /// assert_eq!(fix.descriptors(), &[ChangeDescriptor::tag_add("barrier", "gate")]);
    /// ```
    #[must_use]
    pub fn from_views(before: CompleteEntity, after: CompleteEntity) -> Self {
        let descriptors = diff::descriptors(&before, &after);
        Self::Modify {
            before,
            descriptors,
            after,
        }
    }

    /// Suggest changing `before` by the given descriptors.
    ///
    /// Returns `None` when the descriptors cannot be applied to `before`.
    #[must_use]
    pub fn from_descriptors(
        before: CompleteEntity,
        descriptors: Vec<ChangeDescriptor>,
    ) -> Option<Self> {
        let after = patch::apply(&before, &descriptors)?;
        Some(Self::Modify {
            before,
            descriptors,
            after,
        })
    }

    /// Entity the suggestion applies to.
    #[must_use]
    pub const fn before(&self) -> &CompleteEntity {
        match self {
            Self::Remove { before } | Self::Modify { before, .. } => before,
        }
    }

    /// Entity after the change; `None` for removals.
    #[must_use]
    pub const fn after(&self) -> Option<&CompleteEntity> {
        match self {
            Self::Remove { .. } => None,
            Self::Modify { after, .. } => Some(after),
        }
    }

    /// Ordered descriptors; empty for removals.
    #[must_use]
    pub fn descriptors(&self) -> &[ChangeDescriptor] {
        match self {
            Self::Remove { .. } => &[],
            Self::Modify { descriptors, .. } => descriptors,
        }
    }

    /// Suggestion-level operation written to interchange records.
    #[must_use]
    pub const fn operation(&self) -> ChangeOperation {
        match self {
            Self::Remove { .. } => ChangeOperation::Remove,
            Self::Modify { .. } => ChangeOperation::Update,
        }
    }

    /// Interchange key `{ItemType}{identifier}`.
    #[must_use]
    pub fn key(&self) -> String {
        self.before().unique_identifier()
    }
}

#[cfg(test)]
mod tests;
