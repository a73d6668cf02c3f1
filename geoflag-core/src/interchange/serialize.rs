//! Flag to GeoJSON.

use serde_json::{Map, Value, json};

use super::decorator::highway_decoration;
use super::descriptor::encode_descriptor;
use super::{DEFAULT_TASK_NAME, FlagContext};
use crate::flag::{Flag, NULL_ISLAND};
use crate::flagged::{FLAG_ID_KEY, FLAG_TYPE_KEY, FlaggedObject, osm_identifier_of};
use crate::geojson;

/// `flag:type` value of compact features.
pub const FLAG_TYPE_VALUE: &str = "CheckFlag";
/// Key holding the fix-suggestion map.
pub const FIX_SUGGESTIONS_KEY: &str = "fix_suggestions";

pub(super) const INSTRUCTIONS_KEY: &str = "flag:instructions";
pub(super) const CHALLENGE_KEY: &str = "flag:challenge";
pub(super) const CHECK_KEY: &str = "flag:check";
pub(super) const TIMESTAMP_KEY: &str = "flag:timestamp";
pub(super) const FEATURE_PROPERTIES_KEY: &str = "feature_properties";
const FEATURE_OSMIDS_KEY: &str = "feature_osmids";
const FEATURE_COUNT_KEY: &str = "feature_count";

/// Fix suggestions keyed `"{ItemType}{identifier}"`, each holding the
/// suggestion-level `type` and its descriptor list.
#[must_use]
pub fn fix_suggestions_json(flag: &Flag) -> Map<String, Value> {
    flag.fix_suggestions()
        .iter()
        .map(|suggestion| {
            let descriptors: Vec<Value> = suggestion
                .descriptors()
                .iter()
                .map(encode_descriptor)
                .collect();
            (
                suggestion.key(),
                json!({
                    "type": suggestion.operation().as_str(),
                    "descriptors": descriptors
                }),
            )
        })
        .collect()
}

fn compact_geometry(objects: &[FlaggedObject]) -> Value {
    match objects {
        [] => geojson::point(NULL_ISLAND),
        [single] => single.geometry_json(),
        many => {
            geojson::geometry_collection(many.iter().map(FlaggedObject::geometry_json).collect())
        }
    }
}

fn task_name(context: &FlagContext, properties: &[Map<String, Value>]) -> Option<String> {
    highway_decoration(properties).map_or_else(
        || context.name().map(ToOwned::to_owned),
        |decoration| {
            Some(format!(
                "{} ({decoration})",
                context.name().unwrap_or(DEFAULT_TASK_NAME)
            ))
        },
    )
}

fn insert_context(properties: &mut Map<String, Value>, context: &FlagContext) {
    if let Some(generator) = context.generator() {
        properties.insert("generator".to_owned(), Value::from(generator));
    }
    if let Some(timestamp) = context.timestamp() {
        properties.insert("timestamp".to_owned(), Value::from(timestamp));
    }
}

/// Compact single-feature form used for batch upload.
///
/// The geometry is the single member's geometry, or a `GeometryCollection`
/// holding every member's geometry in insertion order. A flag without
/// members is a null-island point. `bbox` carries the flag's display bounds.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use geoflag_core::interchange::{FlagContext, to_feature};
/// use geoflag_core::{CompleteEntity, Flag};
///
/// let mut flag = Flag::new("F1");
/// flag.add_object(&CompleteEntity::point(1, Coord { x: 1.0, y: 2.0 }));
/// let feature = to_feature(&flag, &FlagContext::default());
/// assert_eq!(feature["id"], "F1");
/// assert_eq!(feature["geometry"]["type"], "Point");
/// assert_eq!(feature["properties"]["feature_count"], 1);
/// ```
#[must_use]
pub fn to_feature(flag: &Flag, context: &FlagContext) -> Value {
    let member_properties: Vec<Map<String, Value>> = flag
        .objects()
        .iter()
        .map(FlaggedObject::properties_json)
        .collect();
    let mut osm_identifiers: Vec<Value> = Vec::new();
    for identifier in member_properties.iter().filter_map(osm_identifier_of) {
        if !osm_identifiers.contains(identifier) {
            osm_identifiers.push(identifier.clone());
        }
    }

    let mut properties = Map::new();
    properties.insert(FLAG_TYPE_KEY.to_owned(), Value::from(FLAG_TYPE_VALUE));
    properties.insert(FLAG_ID_KEY.to_owned(), Value::from(flag.identifier()));
    properties.insert(INSTRUCTIONS_KEY.to_owned(), Value::from(flag.instructions()));
    if let Some(challenge) = flag.challenge() {
        properties.insert(CHALLENGE_KEY.to_owned(), Value::from(challenge));
    }
    if let Some(name) = task_name(context, &member_properties) {
        properties.insert("name".to_owned(), Value::from(name));
    }
    insert_context(&mut properties, context);
    properties.insert(
        FEATURE_COUNT_KEY.to_owned(),
        Value::from(member_properties.len()),
    );
    properties.insert(FEATURE_OSMIDS_KEY.to_owned(), Value::Array(osm_identifiers));
    properties.insert(
        FEATURE_PROPERTIES_KEY.to_owned(),
        Value::Array(member_properties.into_iter().map(Value::Object).collect()),
    );
    let fixes = fix_suggestions_json(flag);
    if !fixes.is_empty() {
        properties.insert(FIX_SUGGESTIONS_KEY.to_owned(), Value::Object(fixes));
    }

    json!({
        "type": "Feature",
        "id": flag.identifier(),
        "bbox": geojson::bbox(flag.bounds()),
        "geometry": compact_geometry(flag.objects()),
        "properties": properties
    })
}

/// Full feature-collection form, one sub-feature per flagged object, with the
/// flag's display bounds as `bbox`.
#[must_use]
pub fn to_feature_collection(flag: &Flag, context: &FlagContext) -> Value {
    let features: Vec<Value> = flag
        .objects()
        .iter()
        .map(|object| object.to_feature(flag.identifier()))
        .collect();
    let identifiers: Vec<Value> = flag
        .unique_identifiers()
        .into_iter()
        .map(Value::from)
        .collect();

    let mut properties = Map::new();
    properties.insert("id".to_owned(), Value::from(flag.identifier()));
    properties.insert("instructions".to_owned(), Value::from(flag.instructions()));
    properties.insert("identifiers".to_owned(), Value::Array(identifiers));
    insert_context(&mut properties, context);
    if let Some(challenge) = flag.challenge() {
        properties.insert("challenge".to_owned(), Value::from(challenge));
    }

    let mut collection = Map::new();
    collection.insert("type".to_owned(), Value::from("FeatureCollection"));
    collection.insert("bbox".to_owned(), geojson::bbox(flag.bounds()));
    collection.insert("features".to_owned(), Value::Array(features));
    collection.insert("properties".to_owned(), Value::Object(properties));
    let fixes = fix_suggestions_json(flag);
    if !fixes.is_empty() {
        collection.insert(FIX_SUGGESTIONS_KEY.to_owned(), Value::Object(fixes));
    }
    Value::Object(collection)
}

/// One line of a line-delimited flag log: the compact feature stamped with
/// the producing check and the event time.
#[must_use]
pub fn to_line_delimited(flag: &Flag, check: &str, timestamp: &str) -> String {
    let mut feature = to_feature(flag, &FlagContext::default());
    if let Some(properties) = feature.get_mut("properties").and_then(Value::as_object_mut) {
        properties.insert(CHECK_KEY.to_owned(), Value::from(check));
        properties.insert(TIMESTAMP_KEY.to_owned(), Value::from(timestamp));
    }
    feature.to_string()
}
