//! GeoJSON to flag, including fix-suggestion reconstruction.

use std::io::{self, BufRead, Lines};

use geo::{Coord, MultiPolygon};
use log::warn;
use serde_json::{Map, Value};
use thiserror::Error;

use super::descriptor::decode_descriptor;
use super::serialize::{
    CHALLENGE_KEY, CHECK_KEY, FEATURE_PROPERTIES_KEY, FIX_SUGGESTIONS_KEY, INSTRUCTIONS_KEY,
};
use crate::entity::{CompleteEntity, Entity, ItemType, RelationMember, Tags, UnknownItemType};
use crate::fix::{ChangeOperation, FixSuggestion, UnknownName};
use crate::flag::Flag;
use crate::flagged::{
    FLAG_ID_KEY, FLAG_TYPE_KEY, IDENTIFIER_KEY, ITEM_TYPE_KEY, LEGACY_OSM_IDENTIFIER_KEY,
    MEMBERS_KEY, OSM_IDENTIFIER_KEY, SYNTHETIC_POINT_KEY, osm_identifier_of,
};
use crate::geojson::{self, Geometry, GeometryError};
use crate::wkt::WktError;

/// Properties that describe an entity rather than belong to its tags.
const META_PROPERTIES: [&str; 8] = [
    ITEM_TYPE_KEY,
    IDENTIFIER_KEY,
    OSM_IDENTIFIER_KEY,
    LEGACY_OSM_IDENTIFIER_KEY,
    "relations",
    MEMBERS_KEY,
    FLAG_ID_KEY,
    FLAG_TYPE_KEY,
];

/// Start and end node identifiers given to reconstructed edges.
const DEFAULT_NODE_IDENTIFIER: i64 = 0;

/// Errors raised while reading flags from GeoJSON.
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// A required member is absent.
    #[error("missing required property {field:?}")]
    MissingProperty {
        /// Member name.
        field: &'static str,
    },
    /// A member has the wrong JSON type.
    #[error("property {field:?} must be {expected}")]
    InvalidField {
        /// Member name.
        field: &'static str,
        /// Expected shape.
        expected: &'static str,
    },
    /// A sub-feature's geometry does not fit its declared item type.
    #[error("{item_type} feature {identifier} cannot have {geometry} geometry")]
    GeometryMismatch {
        /// Declared item type.
        item_type: ItemType,
        /// Entity identifier.
        identifier: i64,
        /// Geometry kind found.
        geometry: &'static str,
    },
    /// Sub-feature geometry could not be decoded.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// A descriptor view was not valid WKT.
    #[error(transparent)]
    Wkt(#[from] WktError),
    /// An operation or descriptor name is unknown.
    #[error(transparent)]
    UnknownName(#[from] UnknownName),
    /// A relation member names an unknown item type.
    #[error(transparent)]
    UnknownItemType(#[from] UnknownItemType),
    /// A line-delimited record is not JSON.
    #[error("failed to parse flag record at line {line}")]
    Json {
        /// 1-based line number.
        line: usize,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// A line-delimited record could not be read.
    #[error("failed to read flag record at line {line}")]
    Io {
        /// 1-based line number.
        line: usize,
        /// Reader error.
        #[source]
        source: io::Error,
    },
    /// A line-delimited record is JSON but not a valid flag.
    #[error("invalid flag record at line {line}")]
    Record {
        /// 1-based line number.
        line: usize,
        /// Underlying failure.
        #[source]
        source: Box<DeserializeError>,
    },
}

/// Split rendered instructions into lines, dropping `"N. "` ordinals and blank
/// lines.
///
/// # Examples
///
/// ```
/// use geoflag_core::interchange::parse_instructions;
///
/// assert_eq!(
///     parse_instructions("1. Fix the gap\n\n2. Check 3. again"),
///     vec!["Fix the gap".to_owned(), "Check 3. again".to_owned()],
/// );
/// ```
#[must_use]
pub fn parse_instructions(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_ordinal)
        .filter(|line| !line.trim().is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn strip_ordinal(line: &str) -> &str {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return line;
    }
    line.get(digits..)
        .and_then(|rest| rest.strip_prefix(". "))
        .unwrap_or(line)
}

fn object_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Map<String, Value>, DeserializeError> {
    object
        .get(field)
        .ok_or(DeserializeError::MissingProperty { field })?
        .as_object()
        .ok_or(DeserializeError::InvalidField {
            field,
            expected: "an object",
        })
}

fn array_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a [Value], DeserializeError> {
    object
        .get(field)
        .ok_or(DeserializeError::MissingProperty { field })?
        .as_array()
        .map(Vec::as_slice)
        .ok_or(DeserializeError::InvalidField {
            field,
            expected: "an array",
        })
}

fn text_field(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<String, DeserializeError> {
    match object.get(field) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(_) => Err(DeserializeError::InvalidField {
            field,
            expected: "a string",
        }),
        None => Err(DeserializeError::MissingProperty { field }),
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn integer_field(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<i64, DeserializeError> {
    let value = object
        .get(field)
        .ok_or(DeserializeError::MissingProperty { field })?;
    integer(value).ok_or(DeserializeError::InvalidField {
        field,
        expected: "an integer",
    })
}

fn tags_of(properties: &Map<String, Value>) -> Tags {
    properties
        .iter()
        .filter(|(key, _)| !META_PROPERTIES.contains(&key.as_str()))
        .filter_map(|(key, value)| value.as_str().map(|text| (key.clone(), text.to_owned())))
        .collect()
}

fn members_of(properties: &Map<String, Value>) -> Result<Vec<RelationMember>, DeserializeError> {
    let Some(raw) = properties.get(MEMBERS_KEY) else {
        return Ok(Vec::new());
    };
    let entries = raw.as_array().ok_or(DeserializeError::InvalidField {
        field: MEMBERS_KEY,
        expected: "an array",
    })?;
    entries
        .iter()
        .map(|entry| {
            let member = entry.as_object().ok_or(DeserializeError::InvalidField {
                field: MEMBERS_KEY,
                expected: "an array of objects",
            })?;
            let item_type = text_field(member, ITEM_TYPE_KEY)?.parse::<ItemType>()?;
            let role = member
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(RelationMember::new(
                integer_field(member, IDENTIFIER_KEY)?,
                item_type,
                role,
            ))
        })
        .collect()
}

const fn geometry_kind(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPolygon(_) => "MultiPolygon",
    }
}

/// A decoded sub-feature.
enum Member {
    Location(Coord),
    Entity(CompleteEntity),
}

fn convert_entity(
    item_type: ItemType,
    properties: &Map<String, Value>,
    geometry: Geometry,
) -> Result<CompleteEntity, DeserializeError> {
    let identifier = integer_field(properties, IDENTIFIER_KEY)?;
    let mismatch = |found: &Geometry| DeserializeError::GeometryMismatch {
        item_type,
        identifier,
        geometry: geometry_kind(found),
    };
    let bare = match (item_type, geometry) {
        (ItemType::Point, Geometry::Point(location)) => {
            CompleteEntity::point(identifier, location)
        }
        (ItemType::Node, Geometry::Point(location)) => CompleteEntity::node(identifier, location),
        (ItemType::Line, Geometry::LineString(coordinates)) => {
            CompleteEntity::line(identifier, coordinates)
        }
        (ItemType::Edge, Geometry::LineString(coordinates)) => {
            CompleteEntity::edge(identifier, coordinates)
                .with_adjacency([DEFAULT_NODE_IDENTIFIER, DEFAULT_NODE_IDENTIFIER])
        }
        (ItemType::Area, Geometry::LineString(ring)) => CompleteEntity::area(identifier, ring),
        (ItemType::Area, Geometry::Polygon(polygon)) => {
            CompleteEntity::area(identifier, polygon.exterior().0.clone())
        }
        (ItemType::Relation, shape) => {
            let relation = CompleteEntity::relation(identifier, members_of(properties)?);
            match shape {
                Geometry::MultiPolygon(multi) => relation.with_multipolygon(multi),
                Geometry::Polygon(polygon) if !polygon.exterior().0.is_empty() => {
                    relation.with_multipolygon(MultiPolygon::new(vec![polygon]))
                }
                Geometry::Polygon(_) => relation,
                other => return Err(mismatch(&other)),
            }
        }
        (_, other) => return Err(mismatch(&other)),
    };
    let mut entity = bare.with_tags(tags_of(properties));
    if let Some(osm_identifier) = osm_identifier_of(properties).and_then(integer) {
        entity = entity.with_osm_identifier(osm_identifier);
    }
    Ok(entity)
}

fn convert_feature(feature: &Value) -> Result<Option<Member>, DeserializeError> {
    let raw_geometry = feature
        .get("geometry")
        .ok_or(DeserializeError::MissingProperty { field: "geometry" })?;
    let geometry = geojson::decode(raw_geometry)?;
    let Some(properties) = feature
        .get("properties")
        .and_then(Value::as_object)
        .filter(|map| !map.contains_key(SYNTHETIC_POINT_KEY))
    else {
        return match geometry {
            Geometry::Point(location) => Ok(Some(Member::Location(location))),
            _ => Err(DeserializeError::InvalidField {
                field: "geometry",
                expected: "a Point for a synthetic highlight",
            }),
        };
    };
    let Some(raw_type) = properties.get(ITEM_TYPE_KEY).and_then(Value::as_str) else {
        warn!("skipping sub-feature without an item type");
        return Ok(None);
    };
    let Ok(item_type) = raw_type.parse::<ItemType>() else {
        warn!("skipping sub-feature with unrecognised item type {raw_type:?}");
        return Ok(None);
    };
    convert_entity(item_type, properties, geometry).map(|entity| Some(Member::Entity(entity)))
}

fn reconstruct_fix(
    before: CompleteEntity,
    block: &Value,
) -> Result<Option<FixSuggestion>, DeserializeError> {
    let descriptors = match block.get("descriptors").and_then(Value::as_array) {
        Some(raw) => raw.iter().map(decode_descriptor).collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    let is_removal = match block.get("type").and_then(Value::as_str) {
        Some(kind) => kind.parse::<ChangeOperation>()? == ChangeOperation::Remove,
        None => matches!(
            descriptors.as_slice(),
            [only] if only.operation() == ChangeOperation::Remove
        ),
    };
    if is_removal {
        return Ok(Some(FixSuggestion::removal(before)));
    }
    let key = before.unique_identifier();
    let suggestion = FixSuggestion::from_descriptors(before, descriptors);
    if suggestion.is_none() {
        warn!("fix suggestion for {key} does not apply to its entity; dropping it");
    }
    Ok(suggestion)
}

fn add_members<'a>(
    flag: &mut Flag,
    features: impl IntoIterator<Item = &'a Value>,
    fixes: Option<&Map<String, Value>>,
) -> Result<(), DeserializeError> {
    for feature in features {
        match convert_feature(feature)? {
            Some(Member::Location(location)) => {
                flag.add_point(location);
            }
            Some(Member::Entity(entity)) => {
                flag.add_object(&entity);
                if let Some(block) = fixes.and_then(|map| map.get(&entity.unique_identifier()))
                    && let Some(suggestion) = reconstruct_fix(entity, block)?
                {
                    flag.add_fix_suggestion(suggestion);
                }
            }
            None => {}
        }
    }
    Ok(())
}

/// Read a flag from its feature-collection form.
///
/// The category comes from `properties.challenge`, falling back to
/// `properties.generator`. Fix suggestions whose descriptors cannot be
/// applied are dropped with a warning.
///
/// # Errors
///
/// Returns [`DeserializeError`] when required members are missing or a
/// sub-feature or descriptor is malformed.
pub fn from_feature_collection(value: &Value) -> Result<Flag, DeserializeError> {
    let root = value.as_object().ok_or(DeserializeError::InvalidField {
        field: "feature collection",
        expected: "a JSON object",
    })?;
    let properties = object_field(root, "properties")?;
    let identifier = text_field(properties, "id")?;
    let instructions = text_field(properties, "instructions")?;
    let features = array_field(root, "features")?;

    let mut flag = Flag::new(identifier);
    if let Some(category) = ["challenge", "generator"]
        .into_iter()
        .find_map(|key| properties.get(key).and_then(Value::as_str))
    {
        flag.set_challenge(category);
    }
    for instruction in parse_instructions(&instructions) {
        flag.add_instruction(instruction);
    }
    let fixes = root.get(FIX_SUGGESTIONS_KEY).and_then(Value::as_object);
    add_members(&mut flag, features, fixes)?;
    Ok(flag)
}

/// Read a flag from its compact single-feature form.
///
/// Member geometries are paired with `feature_properties` by position.
///
/// # Errors
///
/// Returns [`DeserializeError`] when required members are missing, or when
/// the geometry and property lists disagree in length.
pub fn from_compact_feature(value: &Value) -> Result<Flag, DeserializeError> {
    let root = value.as_object().ok_or(DeserializeError::InvalidField {
        field: "feature",
        expected: "a JSON object",
    })?;
    let properties = object_field(root, "properties")?;
    let identifier = text_field(properties, FLAG_ID_KEY)?;
    let geometry = object_field(root, "geometry")?;
    let member_properties = array_field(properties, FEATURE_PROPERTIES_KEY)?;

    // A member-less flag carries a placeholder point and no properties.
    let geometries: Vec<Value> = if member_properties.is_empty() {
        Vec::new()
    } else if geometry.get("type").and_then(Value::as_str) == Some("GeometryCollection") {
        array_field(geometry, "geometries")?.to_vec()
    } else {
        vec![Value::Object(geometry.clone())]
    };
    if geometries.len() != member_properties.len() {
        return Err(DeserializeError::InvalidField {
            field: FEATURE_PROPERTIES_KEY,
            expected: "one entry per member geometry",
        });
    }

    let mut flag = Flag::new(identifier);
    if let Some(category) = [CHALLENGE_KEY, CHECK_KEY]
        .into_iter()
        .find_map(|key| properties.get(key).and_then(Value::as_str))
    {
        flag.set_challenge(category);
    }
    if let Some(instructions) = properties.get(INSTRUCTIONS_KEY).and_then(Value::as_str) {
        for instruction in parse_instructions(instructions) {
            flag.add_instruction(instruction);
        }
    }
    let features: Vec<Value> = geometries
        .into_iter()
        .zip(member_properties)
        .map(|(member_geometry, member)| {
            serde_json::json!({
                "type": "Feature",
                "geometry": member_geometry,
                "properties": member
            })
        })
        .collect();
    let fixes = properties.get(FIX_SUGGESTIONS_KEY).and_then(Value::as_object);
    add_members(&mut flag, &features, fixes)?;
    Ok(flag)
}

/// Iterator over the flags of a line-delimited log.
///
/// Each record is parsed independently; a failing record yields an error
/// carrying its 1-based line number and does not stop iteration. Blank lines
/// are skipped.
#[derive(Debug)]
pub struct LineDelimitedReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> Iterator for LineDelimitedReader<R> {
    type Item = Result<Flag, DeserializeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let read = self.lines.next()?;
            self.line = self.line.saturating_add(1);
            let line = self.line;
            let text = match read {
                Ok(text) => text,
                Err(source) => return Some(Err(DeserializeError::Io { line, source })),
            };
            if text.trim().is_empty() {
                continue;
            }
            let value: Value = match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(source) => return Some(Err(DeserializeError::Json { line, source })),
            };
            return Some(
                from_compact_feature(&value).map_err(|source| DeserializeError::Record {
                    line,
                    source: Box::new(source),
                }),
            );
        }
    }
}

/// Read flags from a line-delimited log.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use geoflag_core::interchange::{from_line_delimited, to_line_delimited};
/// use geoflag_core::{CompleteEntity, Flag};
///
/// let mut flag = Flag::new("F1").with_challenge("Gaps");
/// flag.add_object(&CompleteEntity::point(1, Coord { x: 1.0, y: 2.0 }));
/// let log = format!("{}\nnot json\n", to_line_delimited(&flag, "Gaps", "0"));
/// let records: Vec<_> = from_line_delimited(log.as_bytes()).collect();
/// assert_eq!(records.len(), 2);
/// assert!(records[0].is_ok());
/// assert!(records[1].is_err());
/// ```
#[must_use]
pub fn from_line_delimited<R: BufRead>(reader: R) -> LineDelimitedReader<R> {
    LineDelimitedReader {
        lines: reader.lines(),
        line: 0,
    }
}
