//! Rebuild an after view from a before view and ordered change descriptors.
//!
//! Tag and relation-member descriptors apply in document order. Geometry
//! descriptors are sorted by operation name, then position, and applied as
//! one group. Positions index the before sequence; earlier insertions and
//! removals shift where later descriptors land:
//!
//! - ADD inserts its coordinates before the before-coordinate at `position`,
//!   after any run already inserted there.
//! - REMOVE deletes the before-coordinate at `position`.
//! - UPDATE overwrites consecutive coordinates starting at `position` and
//!   appends whatever runs past the end.
//!
//! An ADD and an UPDATE at the same position therefore insert the new run and
//! then overwrite the original coordinate, which sits after that run.

use geo::Coord;
use log::warn;

use super::{ChangeDescriptor, ChangeOperation};
use crate::entity::{CompleteEntity, Entity, ItemType, RelationMember};

/// Apply `descriptors` to a copy of `before`.
///
/// Returns `None` when a descriptor cannot be expressed on this entity, such
/// as geometry changes on a relation, an ADD on a single location, or a
/// position outside the sequence.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use geoflag_core::{ChangeDescriptor, CompleteEntity, fix::patch};
///
/// let c = |x: f64| Coord { x, y: 0.0 };
/// let before = CompleteEntity::line(1, vec![c(0.0), c(1.0), c(2.0)]);
/// let add = ChangeDescriptor::geometry_add(1, vec![c(8.0), c(9.0)]);
/// let after = patch::apply(&before, &[add]).expect("applies");
/// assert_eq!(after.coordinates(), &[c(0.0), c(8.0), c(9.0), c(1.0), c(2.0)]);
/// ```
#[must_use]
pub fn apply(before: &CompleteEntity, descriptors: &[ChangeDescriptor]) -> Option<CompleteEntity> {
    let mut after = before.clone();
    if before.item_type().is_edge_like() {
        after.clear_adjacency();
    }
    let mut geometry = Vec::new();
    for descriptor in descriptors {
        match descriptor {
            ChangeDescriptor::Tag {
                operation,
                key,
                value,
                ..
            } => apply_tag(&mut after, *operation, key, value.as_deref()),
            ChangeDescriptor::RelationMember {
                operation,
                identifier,
                item_type,
                role,
            } => {
                let member = RelationMember::new(*identifier, *item_type, role.clone());
                apply_member(before, &mut after, *operation, member)?;
            }
            ChangeDescriptor::Geometry {
                operation,
                position,
                after: coords,
                ..
            } => geometry.push(GeometryEdit {
                operation: *operation,
                position: *position,
                coords: coords.as_slice(),
            }),
        }
    }
    if !geometry.is_empty() {
        apply_geometry(before, &mut after, geometry)?;
    }
    Some(after)
}

fn apply_tag(after: &mut CompleteEntity, operation: ChangeOperation, key: &str, value: Option<&str>) {
    match (operation, value) {
        (ChangeOperation::Add | ChangeOperation::Update, Some(text)) => {
            after.tags_mut().insert(key.to_owned(), text.to_owned());
        }
        (ChangeOperation::Remove, _) => {
            after.tags_mut().remove(key);
        }
        (_, None) => warn!("tag descriptor for {key:?} has no value; skipping"),
    }
}

fn apply_member(
    before: &CompleteEntity,
    after: &mut CompleteEntity,
    operation: ChangeOperation,
    member: RelationMember,
) -> Option<()> {
    if before.item_type() != ItemType::Relation {
        warn!(
            "member descriptor targets non-relation {}",
            before.unique_identifier()
        );
        return None;
    }
    let members = after.members_mut();
    match operation {
        ChangeOperation::Add | ChangeOperation::Update => {
            let coordinates = before
                .members()
                .iter()
                .find(|known| {
                    known.identifier == member.identifier && known.item_type == member.item_type
                })
                .map(|known| known.coordinates.clone())
                .unwrap_or_default();
            members.push(member.with_coordinates(coordinates));
        }
        ChangeOperation::Remove => {
            if let Some(index) = members.iter().position(|known| known.same_reference(&member)) {
                members.remove(index);
            }
        }
    }
    Some(())
}

struct GeometryEdit<'a> {
    operation: ChangeOperation,
    position: usize,
    coords: &'a [Coord],
}

/// Already-applied shifting edits, in before-sequence positions.
#[derive(Default)]
struct Shifts {
    inserted: Vec<(usize, usize)>,
    removed: Vec<usize>,
}

impl Shifts {
    /// Current index of the before-coordinate at `position`.
    fn locate(&self, position: usize) -> usize {
        let inserted: usize = self
            .inserted
            .iter()
            .filter(|(at, _)| *at <= position)
            .map(|(_, count)| *count)
            .sum();
        let removed = self.removed.iter().filter(|at| **at < position).count();
        position.saturating_add(inserted).saturating_sub(removed)
    }
}

fn apply_geometry(
    before: &CompleteEntity,
    after: &mut CompleteEntity,
    mut edits: Vec<GeometryEdit<'_>>,
) -> Option<()> {
    let kind = before.item_type();
    if kind == ItemType::Relation {
        warn!("geometry descriptors on {} are not supported", before.unique_identifier());
        return None;
    }
    let single_location = matches!(kind, ItemType::Point | ItemType::Node);
    edits.sort_by(|a, b| {
        a.operation
            .as_str()
            .cmp(b.operation.as_str())
            .then(a.position.cmp(&b.position))
    });

    let original_len = before.coordinates().len();
    let coords = after.coordinates_mut();
    let mut shifts = Shifts::default();
    for edit in edits {
        match edit.operation {
            ChangeOperation::Add => {
                if single_location || edit.position > original_len {
                    warn!("cannot insert geometry at {} on {kind}", edit.position);
                    return None;
                }
                let index = shifts.locate(edit.position).min(coords.len());
                for coord in edit.coords.iter().rev() {
                    coords.insert(index, *coord);
                }
                shifts.inserted.push((edit.position, edit.coords.len()));
            }
            ChangeOperation::Remove => {
                let index = shifts.locate(edit.position);
                if single_location || edit.position >= original_len || index >= coords.len() {
                    warn!("cannot remove geometry at {} on {kind}", edit.position);
                    return None;
                }
                coords.remove(index);
                shifts.removed.push(edit.position);
            }
            ChangeOperation::Update => {
                let index = shifts.locate(edit.position);
                let overwritten = coords.len().saturating_sub(index).min(edit.coords.len());
                for (slot, coord) in coords.iter_mut().skip(index).zip(edit.coords) {
                    *slot = *coord;
                }
                coords.extend(edit.coords.iter().skip(overwritten).copied());
                if single_location && coords.len() > 1 {
                    warn!("update would give {kind} more than one location");
                    return None;
                }
            }
        }
    }
    Some(())
}
