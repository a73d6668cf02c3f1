//! Read-only capability interface over geographic entities.
//!
//! Responsibilities:
//! - Describe the narrow view of an entity that flagging needs: identifier,
//!   type, tags, geometry shape and relation membership.
//! - Provide [`CompleteEntity`], an owned snapshot used for deserialized
//!   flags and for the before/after views of fix suggestions.
//!
//! Boundaries:
//! - Spatial queries and full topology live with the caller's entity model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use geo::{Coord, MultiPolygon};
use thiserror::Error;

/// Tag map keyed by tag name. Ordered so rendered output is stable.
pub type Tags = BTreeMap<String, String>;

/// Tag holding the ISO country code of an entity.
pub const ISO_COUNTRY_TAG: &str = "iso_country_code";

/// Atlas identifiers append six country-slicing digits to the OSM identifier.
const SLICING_FACTOR: i64 = 1_000_000;

/// Entity kinds understood by the flag model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemType {
    /// Standalone point feature.
    Point,
    /// Non-navigable linear feature.
    Line,
    /// Closed polygonal feature.
    Area,
    /// Navigable linear feature with start and end nodes.
    Edge,
    /// Navigable junction.
    Node,
    /// Relation grouping other entities under roles.
    Relation,
}

impl ItemType {
    /// All item types in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Point,
        Self::Line,
        Self::Area,
        Self::Edge,
        Self::Node,
        Self::Relation,
    ];

    /// Capitalised name used in interchange records (`"Edge"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::Line => "Line",
            Self::Area => "Area",
            Self::Edge => "Edge",
            Self::Node => "Node",
            Self::Relation => "Relation",
        }
    }

    /// Whether entities of this type cache adjacency identifiers.
    #[must_use]
    pub const fn is_edge_like(self) -> bool {
        matches!(self, Self::Edge)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`ItemType`] name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown item type {0:?}")]
pub struct UnknownItemType(pub String);

impl FromStr for ItemType {
    type Err = UnknownItemType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownItemType(value.to_owned()))
    }
}

/// A relation member reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationMember {
    /// Member entity identifier.
    pub identifier: i64,
    /// Member entity type.
    pub item_type: ItemType,
    /// Role of the member within the relation.
    pub role: String,
    /// Member geometry when resolved; empty otherwise.
    pub coordinates: Vec<Coord>,
}

impl RelationMember {
    /// Build a member reference without resolved geometry.
    #[must_use]
    pub fn new(identifier: i64, item_type: ItemType, role: impl Into<String>) -> Self {
        Self {
            identifier,
            item_type,
            role: role.into(),
            coordinates: Vec::new(),
        }
    }

    /// Attach resolved member geometry.
    #[must_use]
    pub fn with_coordinates(mut self, coordinates: Vec<Coord>) -> Self {
        self.coordinates = coordinates;
        self
    }

    /// Whether this member refers to the same entity and role as `other`.
    #[must_use]
    pub fn same_reference(&self, other: &Self) -> bool {
        self.identifier == other.identifier
            && self.item_type == other.item_type
            && self.role == other.role
    }
}

/// Geometry shape exposed by an entity, used to pick a flagged-object variant.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityShape {
    /// A single location.
    Location(Coord),
    /// An ordered coordinate sequence. Areas are reported as open rings.
    Polyline(Vec<Coord>),
    /// A relation; geometry comes from its members.
    Relation,
    /// Anything the flag model cannot place.
    Unknown,
}

/// Read-only view of a geographic entity.
pub trait Entity {
    /// Atlas identifier of the entity.
    fn identifier(&self) -> i64;

    /// Source (OSM) identifier. Defaults to stripping the slicing digits.
    fn osm_identifier(&self) -> i64 {
        self.identifier()
            .saturating_abs()
            .div_euclid(SLICING_FACTOR)
    }

    /// Entity kind.
    fn item_type(&self) -> ItemType;

    /// Entity tags.
    fn tags(&self) -> &Tags;

    /// Geometry shape.
    fn shape(&self) -> EntityShape;

    /// Relation members; empty for non-relations.
    fn members(&self) -> &[RelationMember] {
        &[]
    }

    /// Multipolygon geometry already known for a relation.
    fn cached_multipolygon(&self) -> Option<&MultiPolygon> {
        None
    }

    /// Look up a single tag value.
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags().get(key).map(String::as_str)
    }

    /// ISO country code, when tagged.
    fn country(&self) -> Option<&str> {
        self.tag(ISO_COUNTRY_TAG)
    }

    /// Key used for fix suggestions and unique identifiers (`"Edge123"`).
    fn unique_identifier(&self) -> String {
        format!("{}{}", self.item_type(), self.identifier())
    }
}

/// Owned snapshot of an entity.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use geoflag_core::{CompleteEntity, Entity, ItemType};
///
/// let node = CompleteEntity::node(7_000_001, Coord { x: 1.0, y: 2.0 })
///     .with_tag("highway", "crossing");
/// assert_eq!(node.item_type(), ItemType::Node);
/// assert_eq!(node.osm_identifier(), 7);
/// assert_eq!(node.unique_identifier(), "Node7000001");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteEntity {
    identifier: i64,
    osm_identifier: Option<i64>,
    item_type: ItemType,
    tags: Tags,
    coordinates: Vec<Coord>,
    members: Vec<RelationMember>,
    multipolygon: Option<MultiPolygon>,
    adjacency: Vec<i64>,
}

impl CompleteEntity {
    const fn with_shape(identifier: i64, item_type: ItemType, coordinates: Vec<Coord>) -> Self {
        Self {
            identifier,
            osm_identifier: None,
            item_type,
            tags: Tags::new(),
            coordinates,
            members: Vec::new(),
            multipolygon: None,
            adjacency: Vec::new(),
        }
    }

    /// A standalone point.
    #[must_use]
    pub fn point(identifier: i64, location: Coord) -> Self {
        Self::with_shape(identifier, ItemType::Point, vec![location])
    }

    /// A navigable node.
    #[must_use]
    pub fn node(identifier: i64, location: Coord) -> Self {
        Self::with_shape(identifier, ItemType::Node, vec![location])
    }

    /// A non-navigable line.
    #[must_use]
    pub fn line(identifier: i64, coordinates: Vec<Coord>) -> Self {
        Self::with_shape(identifier, ItemType::Line, coordinates)
    }

    /// A navigable edge.
    #[must_use]
    pub fn edge(identifier: i64, coordinates: Vec<Coord>) -> Self {
        Self::with_shape(identifier, ItemType::Edge, coordinates)
    }

    /// An area given as a ring. A repeated closing coordinate is dropped.
    #[must_use]
    pub fn area(identifier: i64, mut ring: Vec<Coord>) -> Self {
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        Self::with_shape(identifier, ItemType::Area, ring)
    }

    /// A relation over the given members.
    #[must_use]
    pub fn relation(identifier: i64, members: Vec<RelationMember>) -> Self {
        let mut relation = Self::with_shape(identifier, ItemType::Relation, Vec::new());
        relation.members = members;
        relation
    }

    /// Add or replace one tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Replace all tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Override the source identifier.
    #[must_use]
    pub const fn with_osm_identifier(mut self, osm_identifier: i64) -> Self {
        self.osm_identifier = Some(osm_identifier);
        self
    }

    /// Attach cached adjacency identifiers (edge start/end nodes).
    #[must_use]
    pub fn with_adjacency(mut self, adjacency: impl IntoIterator<Item = i64>) -> Self {
        self.adjacency = adjacency.into_iter().collect();
        self
    }

    /// Attach a known multipolygon geometry to a relation.
    #[must_use]
    pub fn with_multipolygon(mut self, multipolygon: MultiPolygon) -> Self {
        self.multipolygon = Some(multipolygon);
        self
    }

    /// Coordinate sequence. One entry for locations, empty for relations.
    #[must_use]
    pub fn coordinates(&self) -> &[Coord] {
        &self.coordinates
    }

    /// Cached adjacency identifiers.
    #[must_use]
    pub fn adjacency(&self) -> &[i64] {
        &self.adjacency
    }

    pub(crate) const fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    pub(crate) const fn coordinates_mut(&mut self) -> &mut Vec<Coord> {
        &mut self.coordinates
    }

    pub(crate) const fn members_mut(&mut self) -> &mut Vec<RelationMember> {
        &mut self.members
    }

    pub(crate) fn clear_adjacency(&mut self) {
        self.adjacency.clear();
    }

    /// Snapshot any entity into an owned value.
    #[must_use]
    pub fn snapshot(entity: &dyn Entity) -> Self {
        let coordinates = match entity.shape() {
            EntityShape::Location(location) => vec![location],
            EntityShape::Polyline(coordinates) => coordinates,
            EntityShape::Relation | EntityShape::Unknown => Vec::new(),
        };
        Self {
            identifier: entity.identifier(),
            osm_identifier: Some(entity.osm_identifier()),
            item_type: entity.item_type(),
            tags: entity.tags().clone(),
            coordinates,
            members: entity.members().to_vec(),
            multipolygon: entity.cached_multipolygon().cloned(),
            adjacency: Vec::new(),
        }
    }
}

impl Entity for CompleteEntity {
    fn identifier(&self) -> i64 {
        self.identifier
    }

    fn osm_identifier(&self) -> i64 {
        self.osm_identifier.unwrap_or_else(|| {
            self.identifier
                .saturating_abs()
                .div_euclid(SLICING_FACTOR)
        })
    }

    fn item_type(&self) -> ItemType {
        self.item_type
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn shape(&self) -> EntityShape {
        match (self.item_type, self.coordinates.as_slice()) {
            (ItemType::Relation, _) => EntityShape::Relation,
            (ItemType::Point | ItemType::Node, [location]) => EntityShape::Location(*location),
            (ItemType::Line | ItemType::Edge | ItemType::Area, coordinates)
                if !coordinates.is_empty() =>
            {
                EntityShape::Polyline(coordinates.to_vec())
            }
            _ => EntityShape::Unknown,
        }
    }

    fn members(&self) -> &[RelationMember] {
        &self.members
    }

    fn cached_multipolygon(&self) -> Option<&MultiPolygon> {
        self.multipolygon.as_ref()
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests assert on known failures")]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Edge", ItemType::Edge)]
    #[case("edge", ItemType::Edge)]
    #[case("RELATION", ItemType::Relation)]
    #[case("Area", ItemType::Area)]
    fn item_type_parses_case_insensitively(#[case] raw: &str, #[case] expected: ItemType) {
        assert_eq!(raw.parse::<ItemType>(), Ok(expected));
    }

    #[rstest]
    fn unknown_item_type_is_rejected() {
        let err = "Way".parse::<ItemType>().expect_err("Way is not an item type");
        assert_eq!(err, UnknownItemType("Way".into()));
    }

    #[rstest]
    fn osm_identifier_strips_slicing_digits() {
        let edge = CompleteEntity::edge(-522_211_636_000_001, Vec::new());
        assert_eq!(edge.osm_identifier(), 522_211_636);
        let overridden = CompleteEntity::edge(1, Vec::new()).with_osm_identifier(42);
        assert_eq!(overridden.osm_identifier(), 42);
    }

    #[rstest]
    fn area_drops_repeated_closing_coordinate() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 1.0, y: 0.0 };
        let c = Coord { x: 1.0, y: 1.0 };
        let area = CompleteEntity::area(1, vec![a, b, c, a]);
        assert_eq!(area.coordinates(), &[a, b, c]);
    }

    #[rstest]
    fn shape_reports_unknown_for_empty_geometry() {
        let line = CompleteEntity::line(1, Vec::new());
        assert_eq!(line.shape(), EntityShape::Unknown);
        let relation = CompleteEntity::relation(2, Vec::new());
        assert_eq!(relation.shape(), EntityShape::Relation);
    }

    #[rstest]
    fn snapshot_copies_tags_and_members() {
        let relation = CompleteEntity::relation(
            9,
            vec![RelationMember::new(1, ItemType::Area, "outer")],
        )
        .with_tag("type", "multipolygon");
        let copy = CompleteEntity::snapshot(&relation);
        assert_eq!(copy.tags(), relation.tags());
        assert_eq!(copy.members(), relation.members());
        assert_eq!(copy.unique_identifier(), "Relation9");
    }
}
