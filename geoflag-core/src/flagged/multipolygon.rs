//! Multipolygon assembly from relation member geometry.
//!
//! Member ways are stitched end to end into closed rings. Outer rings become
//! polygons; each inner ring is attached to the first outer polygon that
//! contains its first coordinate.

use geo::{Contains, Coord, LineString, MultiPolygon, Polygon};
use thiserror::Error;

use crate::entity::RelationMember;

const OUTER: &str = "outer";
const INNER: &str = "inner";

/// Reasons a relation could not be assembled into a multipolygon.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssemblyError {
    /// No member carried usable outer geometry.
    #[error("relation has no resolvable outer members")]
    NoOuterMembers,
    /// Stitching left a ring open.
    #[error("ring starting at member {member} does not close")]
    UnclosedRing {
        /// First member of the open ring.
        member: i64,
    },
    /// An inner ring sits outside every outer ring.
    #[error("inner ring starting at member {member} has no enclosing outer ring")]
    OrphanInner {
        /// First member of the orphaned ring.
        member: i64,
    },
}

struct Segment {
    member: i64,
    coords: Vec<Coord>,
}

/// Assemble members into a multipolygon.
///
/// Members with an empty role are treated as outer. Members with any other
/// role, or without at least two coordinates, are ignored.
///
/// # Errors
///
/// Returns [`AssemblyError`] when rings cannot be closed or nested.
pub fn assemble(members: &[RelationMember]) -> Result<MultiPolygon, AssemblyError> {
    let (outer, inner): (Vec<_>, Vec<_>) = members
        .iter()
        .filter(|member| member.coordinates.len() >= 2)
        .filter(|member| matches!(member.role.as_str(), "" | OUTER | INNER))
        .partition(|member| member.role != INNER);
    if outer.is_empty() {
        return Err(AssemblyError::NoOuterMembers);
    }
    let outer_rings = stitch(outer)?;
    let inner_rings = stitch(inner)?;
    let mut polygons: Vec<Polygon> = outer_rings
        .into_iter()
        .map(|(_, ring)| Polygon::new(ring, Vec::new()))
        .collect();
    for (member, ring) in inner_rings {
        let anchor = ring.0.first().copied().ok_or(AssemblyError::OrphanInner { member })?;
        let host = polygons
            .iter_mut()
            .find(|polygon| polygon.contains(&anchor))
            .ok_or(AssemblyError::OrphanInner { member })?;
        host.interiors_push(ring);
    }
    Ok(MultiPolygon::new(polygons))
}

fn stitch(members: Vec<&RelationMember>) -> Result<Vec<(i64, LineString)>, AssemblyError> {
    let mut pending: Vec<Segment> = members
        .into_iter()
        .map(|member| Segment {
            member: member.identifier,
            coords: member.coordinates.clone(),
        })
        .collect();
    let mut rings = Vec::new();
    while let Some(seed) = pending.pop() {
        let member = seed.member;
        let mut ring = seed.coords;
        while !is_closed(&ring) {
            let tail = ring.last().copied();
            let next = pending.iter().position(|candidate| {
                candidate.coords.first().copied() == tail || candidate.coords.last().copied() == tail
            });
            let Some(index) = next else {
                return Err(AssemblyError::UnclosedRing { member });
            };
            let mut segment = pending.swap_remove(index).coords;
            if segment.first().copied() != tail {
                segment.reverse();
            }
            ring.extend(segment.into_iter().skip(1));
        }
        rings.push((member, LineString::new(ring)));
    }
    Ok(rings)
}

fn is_closed(ring: &[Coord]) -> bool {
    ring.len() >= 4 && ring.first() == ring.last()
}
