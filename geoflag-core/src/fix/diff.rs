//! Derive change descriptors from a before and an after view.
//!
//! Geometry is compared after trimming the common prefix and suffix; the
//! differing middle becomes one UPDATE over the overlapping run plus ADD or
//! REMOVE descriptors for the remainder. Positions index the before sequence.

use std::collections::BTreeSet;

use geo::Coord;

use super::{ChangeDescriptor, ChangeOperation};
use crate::entity::{CompleteEntity, Entity, RelationMember};

pub(super) fn descriptors(before: &CompleteEntity, after: &CompleteEntity) -> Vec<ChangeDescriptor> {
    let mut out = tag_descriptors(before, after);
    out.extend(geometry_descriptors(before.coordinates(), after.coordinates()));
    out.extend(member_descriptors(before.members(), after.members()));
    out
}

fn tag_descriptors(before: &CompleteEntity, after: &CompleteEntity) -> Vec<ChangeDescriptor> {
    let keys: BTreeSet<&String> = before.tags().keys().chain(after.tags().keys()).collect();
    keys.into_iter()
        .filter_map(|key| match (before.tags().get(key), after.tags().get(key)) {
            (None, Some(value)) => Some(ChangeDescriptor::tag_add(key, value)),
            (Some(value), None) => Some(ChangeDescriptor::tag_remove(key, value)),
            (Some(old), Some(new)) if old != new => {
                Some(ChangeDescriptor::tag_update(key, old, new))
            }
            _ => None,
        })
        .collect()
}

fn geometry_descriptors(before: &[Coord], after: &[Coord]) -> Vec<ChangeDescriptor> {
    let prefix = before
        .iter()
        .zip(after)
        .take_while(|(a, b)| a == b)
        .count();
    let before_rest = before.get(prefix..).unwrap_or_default();
    let after_rest = after.get(prefix..).unwrap_or_default();
    let suffix = before_rest
        .iter()
        .rev()
        .zip(after_rest.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let removed = before_rest
        .get(..before_rest.len().saturating_sub(suffix))
        .unwrap_or_default();
    let inserted = after_rest
        .get(..after_rest.len().saturating_sub(suffix))
        .unwrap_or_default();

    let overlap = removed.len().min(inserted.len());
    let mut out = Vec::new();
    if overlap > 0 {
        out.push(ChangeDescriptor::geometry_update(
            prefix,
            removed.iter().take(overlap).copied().collect(),
            inserted.iter().take(overlap).copied().collect(),
        ));
    }
    if inserted.len() > overlap {
        out.push(ChangeDescriptor::geometry_add(
            prefix.saturating_add(removed.len()),
            inserted.iter().skip(overlap).copied().collect(),
        ));
    }
    for (offset, coord) in removed.iter().enumerate().skip(overlap) {
        out.push(ChangeDescriptor::geometry_remove(
            prefix.saturating_add(offset),
            *coord,
        ));
    }
    out
}

fn member_descriptors(before: &[RelationMember], after: &[RelationMember]) -> Vec<ChangeDescriptor> {
    let mut unmatched: Vec<&RelationMember> = before.iter().collect();
    let mut added = Vec::new();
    for member in after {
        let Some(index) = unmatched.iter().position(|old| old.same_reference(member)) else {
            added.push(member);
            continue;
        };
        unmatched.swap_remove(index);
    }
    let additions = added.into_iter().map(|member| {
        ChangeDescriptor::member(
            ChangeOperation::Add,
            member.identifier,
            member.item_type,
            member.role.clone(),
        )
    });
    let removals = before
        .iter()
        .filter(|member| unmatched.iter().any(|left| std::ptr::eq(*left, *member)));
    additions
        .chain(removals.map(|member| {
            ChangeDescriptor::member(
                ChangeOperation::Remove,
                member.identifier,
                member.item_type,
                member.role.clone(),
            )
        }))
        .collect()
}
