//! Serializable wrappers around the entities a flag references.
//!
//! Responsibilities:
//! - Snapshot an entity (or a bare coordinate) together with the identifying
//!   properties interchange consumers rely on.
//! - Expose geometry, bounds and country for aggregation by [`crate::Flag`].
//! - Render a self-contained GeoJSON feature per flagged object.
//!
//! Invariants:
//! - Every entity-backed variant carries `itemType`, `identifier` and
//!   `osmIdentifier` properties; synthetic points carry only the marker.
//! - Equality compares country, geometry and properties.

mod multipolygon;

use geo::{BoundingRect, Coord, LineString, MultiPolygon, Polygon, Rect};
use log::error;
use serde_json::{Map, Value, json};

pub use multipolygon::{AssemblyError, assemble};

use crate::entity::{CompleteEntity, Entity, EntityShape, ItemType, RelationMember, Tags};
use crate::geojson;

/// Property holding the entity type.
pub const ITEM_TYPE_KEY: &str = "itemType";
/// Property holding the atlas identifier.
pub const IDENTIFIER_KEY: &str = "identifier";
/// Property holding the source (OSM) identifier.
pub const OSM_IDENTIFIER_KEY: &str = "osmIdentifier";
/// Legacy short key for the source identifier, read before [`OSM_IDENTIFIER_KEY`].
pub const LEGACY_OSM_IDENTIFIER_KEY: &str = "osmid";
/// Marker property carried by synthetic points.
pub const SYNTHETIC_POINT_KEY: &str = "synthetic_highlight_point";
/// Property listing relation members.
pub const MEMBERS_KEY: &str = "members";
/// Sub-feature property naming the owning flag.
pub const FLAG_ID_KEY: &str = "flag:id";
/// Sub-feature property naming the flagged-object kind.
pub const FLAG_TYPE_KEY: &str = "flag:type";
/// Country sentinel for objects without a country code.
pub const COUNTRY_MISSING: &str = "N/A";

/// Ordered property map of a flagged object.
pub type Properties = Tags;

/// Read the source identifier, trying the legacy key first.
#[must_use]
pub fn osm_identifier_of(properties: &Map<String, Value>) -> Option<&Value> {
    properties
        .get(LEGACY_OSM_IDENTIFIER_KEY)
        .or_else(|| properties.get(OSM_IDENTIFIER_KEY))
}

fn identifying_properties(entity: &dyn Entity) -> Properties {
    let mut properties = entity.tags().clone();
    properties.insert(ITEM_TYPE_KEY.to_owned(), entity.item_type().to_string());
    properties.insert(IDENTIFIER_KEY.to_owned(), entity.identifier().to_string());
    properties.insert(
        OSM_IDENTIFIER_KEY.to_owned(),
        entity.osm_identifier().to_string(),
    );
    properties
}

fn country_of(entity: Option<&CompleteEntity>) -> String {
    entity
        .and_then(Entity::country)
        .map_or_else(|| COUNTRY_MISSING.to_owned(), ToOwned::to_owned)
}

/// A single location, backed by a point/node entity or synthetic.
#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedPoint {
    location: Coord,
    entity: Option<CompleteEntity>,
    properties: Properties,
    country: String,
}

impl FlaggedPoint {
    /// Wrap a point or node entity at `location`.
    #[must_use]
    pub fn from_entity(entity: &dyn Entity, location: Coord) -> Self {
        let snapshot = CompleteEntity::snapshot(entity);
        Self {
            location,
            properties: identifying_properties(entity),
            country: country_of(Some(&snapshot)),
            entity: Some(snapshot),
        }
    }

    /// A highlight-only location with no backing entity.
    #[must_use]
    pub fn synthetic(location: Coord) -> Self {
        let mut properties = Properties::new();
        properties.insert(SYNTHETIC_POINT_KEY.to_owned(), "yes".to_owned());
        Self {
            location,
            entity: None,
            properties,
            country: COUNTRY_MISSING.to_owned(),
        }
    }

    /// Location of the point.
    #[must_use]
    pub const fn location(&self) -> Coord {
        self.location
    }

    /// Whether the point has no backing entity.
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        self.entity.is_none()
    }
}

/// An ordered coordinate sequence. Areas are rendered as closed loops.
#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedPolyline {
    line: LineString,
    entity: CompleteEntity,
    properties: Properties,
    country: String,
}

impl FlaggedPolyline {
    /// Wrap a linear or areal entity.
    #[must_use]
    pub fn from_entity(entity: &dyn Entity, mut coordinates: Vec<Coord>) -> Self {
        if entity.item_type() == ItemType::Area
            && coordinates.len() > 1
            && coordinates.first() != coordinates.last()
            && let Some(first) = coordinates.first().copied()
        {
            coordinates.push(first);
        }
        let snapshot = CompleteEntity::snapshot(entity);
        Self {
            line: LineString::new(coordinates),
            properties: identifying_properties(entity),
            country: country_of(Some(&snapshot)),
            entity: snapshot,
        }
    }

    /// The rendered line; closed for areas.
    #[must_use]
    pub const fn line(&self) -> &LineString {
        &self.line
    }
}

/// Geometry used to depict a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationGeometry {
    /// Assembled or cached multipolygon.
    MultiPolygon(MultiPolygon),
    /// Bounding-rectangle approximation.
    Polygon(Polygon),
}

/// A relation rendered as a multipolygon or its bounding rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedRelation {
    geometry: RelationGeometry,
    entity: CompleteEntity,
    properties: Properties,
    country: String,
    is_multipolygon: bool,
}

impl FlaggedRelation {
    /// Wrap a relation entity.
    ///
    /// Multipolygon relations use cached geometry when available, otherwise
    /// rings assembled from member coordinates. Assembly failures fall back to
    /// the bounding rectangle and are logged.
    #[must_use]
    pub fn from_entity(entity: &dyn Entity) -> Self {
        let is_multipolygon = matches!(entity.tag("type"), Some("multipolygon" | "boundary"));
        let geometry = if is_multipolygon {
            multipolygon_of(entity).map_or_else(
                |err| {
                    error!(
                        "relation {} could not be assembled ({err}); using bounding box",
                        entity.identifier()
                    );
                    bounding_polygon(entity)
                },
                RelationGeometry::MultiPolygon,
            )
        } else {
            bounding_polygon(entity)
        };
        let snapshot = CompleteEntity::snapshot(entity);
        Self {
            geometry,
            properties: identifying_properties(entity),
            country: country_of(Some(&snapshot)),
            entity: snapshot,
            is_multipolygon,
        }
    }

    /// Whether the relation is a genuine multipolygon.
    #[must_use]
    pub const fn is_multipolygon(&self) -> bool {
        self.is_multipolygon
    }

    /// Relation members.
    #[must_use]
    pub fn members(&self) -> &[RelationMember] {
        self.entity.members()
    }

    /// Depicted geometry.
    #[must_use]
    pub const fn geometry(&self) -> &RelationGeometry {
        &self.geometry
    }
}

fn multipolygon_of(entity: &dyn Entity) -> Result<MultiPolygon, AssemblyError> {
    entity
        .cached_multipolygon()
        .map_or_else(|| assemble(entity.members()), |cached| Ok(cached.clone()))
}

fn bounding_polygon(entity: &dyn Entity) -> RelationGeometry {
    let from_cache = entity
        .cached_multipolygon()
        .and_then(|multi| multi.bounding_rect());
    let from_members = entity
        .members()
        .iter()
        .filter_map(|member| LineString::from(member.coordinates.clone()).bounding_rect())
        .reduce(union_rects);
    let polygon = match (from_cache, from_members) {
        (Some(a), Some(b)) => union_rects(a, b).to_polygon(),
        (Some(rect), None) | (None, Some(rect)) => rect.to_polygon(),
        (None, None) => Polygon::new(LineString::new(Vec::new()), Vec::new()),
    };
    RelationGeometry::Polygon(polygon)
}

pub(crate) fn union_rects(a: Rect, b: Rect) -> Rect {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

/// An object referenced by a flag.
#[derive(Debug, Clone)]
pub enum FlaggedObject {
    /// A location.
    Point(FlaggedPoint),
    /// A line or area.
    Polyline(FlaggedPolyline),
    /// A relation.
    Relation(FlaggedRelation),
}

impl PartialEq for FlaggedObject {
    fn eq(&self, other: &Self) -> bool {
        self.country() == other.country()
            && self.properties() == other.properties()
            && self.geometry_json() == other.geometry_json()
    }
}

impl FlaggedObject {
    /// Pick the variant matching the entity's shape. Returns `None` for shapes
    /// the flag model cannot place.
    #[must_use]
    pub fn from_entity(entity: &dyn Entity) -> Option<Self> {
        match entity.shape() {
            EntityShape::Location(location) => {
                Some(Self::Point(FlaggedPoint::from_entity(entity, location)))
            }
            EntityShape::Polyline(coordinates) => Some(Self::Polyline(
                FlaggedPolyline::from_entity(entity, coordinates),
            )),
            EntityShape::Relation => Some(Self::Relation(FlaggedRelation::from_entity(entity))),
            EntityShape::Unknown => None,
        }
    }

    /// A synthetic highlight point.
    #[must_use]
    pub fn synthetic_point(location: Coord) -> Self {
        Self::Point(FlaggedPoint::synthetic(location))
    }

    /// Variant discriminant written as `flag:type`.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "FlaggedPoint",
            Self::Polyline(_) => "FlaggedPolyline",
            Self::Relation(_) => "FlaggedRelation",
        }
    }

    /// Property map including tags and identifying keys.
    #[must_use]
    pub const fn properties(&self) -> &Properties {
        match self {
            Self::Point(point) => &point.properties,
            Self::Polyline(line) => &line.properties,
            Self::Relation(relation) => &relation.properties,
        }
    }

    /// Country code, or [`COUNTRY_MISSING`].
    #[must_use]
    pub fn country(&self) -> &str {
        match self {
            Self::Point(point) => &point.country,
            Self::Polyline(line) => &line.country,
            Self::Relation(relation) => &relation.country,
        }
    }

    /// Backing entity; `None` for synthetic points.
    #[must_use]
    pub const fn entity(&self) -> Option<&CompleteEntity> {
        match self {
            Self::Point(point) => point.entity.as_ref(),
            Self::Polyline(line) => Some(&line.entity),
            Self::Relation(relation) => Some(&relation.entity),
        }
    }

    /// `{ItemType}{identifier}` of the backing entity.
    #[must_use]
    pub fn unique_identifier(&self) -> Option<String> {
        self.entity().map(Entity::unique_identifier)
    }

    /// Bounding rectangle of the geometry; `None` when it has no coordinates.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect> {
        match self {
            Self::Point(point) => Some(Rect::new(point.location, point.location)),
            Self::Polyline(line) => line.line.bounding_rect(),
            Self::Relation(relation) => match &relation.geometry {
                RelationGeometry::MultiPolygon(multi) => multi.bounding_rect(),
                RelationGeometry::Polygon(polygon) => polygon.bounding_rect(),
            },
        }
    }

    /// GeoJSON geometry object.
    #[must_use]
    pub fn geometry_json(&self) -> Value {
        match self {
            Self::Point(point) => geojson::point(point.location),
            Self::Polyline(line) => geojson::line_string(&line.line.0),
            Self::Relation(relation) => match &relation.geometry {
                RelationGeometry::MultiPolygon(multi) => geojson::multi_polygon(multi),
                RelationGeometry::Polygon(polygon) => geojson::polygon(polygon),
            },
        }
    }

    /// Properties as a JSON object; relations also list their members.
    #[must_use]
    pub fn properties_json(&self) -> Map<String, Value> {
        let mut map: Map<String, Value> = self
            .properties()
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        if let Self::Relation(relation) = self {
            let members = relation
                .members()
                .iter()
                .map(|member| {
                    json!({
                        IDENTIFIER_KEY: member.identifier,
                        "role": member.role,
                        ITEM_TYPE_KEY: member.item_type.as_str(),
                    })
                })
                .collect();
            map.insert(MEMBERS_KEY.to_owned(), Value::Array(members));
        }
        map
    }

    /// Self-contained feature tagged with the owning flag.
    #[must_use]
    pub fn to_feature(&self, flag_identifier: &str) -> Value {
        let mut properties = self.properties_json();
        properties.insert(FLAG_ID_KEY.to_owned(), Value::from(flag_identifier));
        properties.insert(FLAG_TYPE_KEY.to_owned(), Value::from(self.type_name()));
        json!({
            "type": "Feature",
            "geometry": self.geometry_json(),
            "properties": properties,
        })
    }
}

#[cfg(test)]
mod tests;
