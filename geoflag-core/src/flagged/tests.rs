//! Unit tests for flagged-object construction and rendering.
#![expect(clippy::expect_used, reason = "fixture entities always have a shape")]

use super::*;
use crate::entity::ISO_COUNTRY_TAG;
use rstest::{fixture, rstest};

fn c(x: f64, y: f64) -> Coord {
    Coord { x, y }
}

#[fixture]
fn edge() -> CompleteEntity {
    CompleteEntity::edge(123_000_001, vec![c(0.0, 0.0), c(1.0, 1.0)])
        .with_tag("highway", "primary")
        .with_tag(ISO_COUNTRY_TAG, "DEU")
}

#[rstest]
fn entity_properties_include_identifying_keys(edge: CompleteEntity) {
    let flagged = FlaggedObject::from_entity(&edge).expect("edge has a shape");
    let properties = flagged.properties();
    assert_eq!(properties.get(ITEM_TYPE_KEY).map(String::as_str), Some("Edge"));
    assert_eq!(
        properties.get(IDENTIFIER_KEY).map(String::as_str),
        Some("123000001")
    );
    assert_eq!(
        properties.get(OSM_IDENTIFIER_KEY).map(String::as_str),
        Some("123")
    );
    assert_eq!(properties.get("highway").map(String::as_str), Some("primary"));
    assert_eq!(flagged.country(), "DEU");
    assert_eq!(flagged.type_name(), "FlaggedPolyline");
}

#[rstest]
fn synthetic_point_carries_only_the_marker() {
    let flagged = FlaggedObject::synthetic_point(c(3.0, 4.0));
    let keys: Vec<&str> = flagged.properties().keys().map(String::as_str).collect();
    assert_eq!(keys, vec![SYNTHETIC_POINT_KEY]);
    assert_eq!(flagged.country(), COUNTRY_MISSING);
    assert!(flagged.entity().is_none());
}

#[rstest]
fn area_renders_as_closed_loop() {
    let area = CompleteEntity::area(5, vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0)]);
    let Some(FlaggedObject::Polyline(polyline)) = FlaggedObject::from_entity(&area) else {
        panic!("area should become a polyline");
    };
    assert_eq!(polyline.line().0.first(), polyline.line().0.last());
    assert_eq!(polyline.line().0.len(), 4);
}

#[rstest]
fn unknown_shapes_are_not_flagged() {
    let empty = CompleteEntity::line(1, Vec::new());
    assert!(FlaggedObject::from_entity(&empty).is_none());
}

#[rstest]
fn equal_entities_produce_equal_objects(edge: CompleteEntity) {
    let first = FlaggedObject::from_entity(&edge).expect("shape");
    let second = FlaggedObject::from_entity(&edge.clone()).expect("shape");
    assert_eq!(first, second);
    let retagged = edge.with_tag("name", "Main Street");
    let third = FlaggedObject::from_entity(&retagged).expect("shape");
    assert_ne!(first, third);
}

#[rstest]
fn broken_multipolygon_falls_back_to_bounding_box() {
    let relation = CompleteEntity::relation(
        77,
        vec![
            RelationMember::new(1, ItemType::Line, "outer")
                .with_coordinates(vec![c(0.0, 0.0), c(2.0, 0.0), c(2.0, 3.0)]),
        ],
    )
    .with_tag("type", "multipolygon");
    let Some(FlaggedObject::Relation(flagged)) = FlaggedObject::from_entity(&relation) else {
        panic!("relation expected");
    };
    assert!(flagged.is_multipolygon());
    let RelationGeometry::Polygon(polygon) = flagged.geometry() else {
        panic!("expected bounding polygon fallback");
    };
    let rect = polygon.bounding_rect().expect("non-empty rectangle");
    assert_eq!(rect.min(), c(0.0, 0.0));
    assert_eq!(rect.max(), c(2.0, 3.0));
}

#[rstest]
fn relation_feature_lists_members() {
    let relation = CompleteEntity::relation(
        9,
        vec![
            RelationMember::new(1, ItemType::Area, "outer"),
            RelationMember::new(2, ItemType::Area, "inner"),
        ],
    );
    let flagged = FlaggedObject::from_entity(&relation).expect("relation");
    let feature = flagged.to_feature("flag-1");
    assert_eq!(feature.pointer("/properties/flag:id"), Some(&json!("flag-1")));
    assert_eq!(feature.pointer("/properties/flag:type"), Some(&json!("FlaggedRelation")));
    assert_eq!(feature.pointer("/properties/members/1/role"), Some(&json!("inner")));
    assert_eq!(feature.pointer("/properties/members/0/itemType"), Some(&json!("Area")));
}

#[rstest]
fn legacy_osm_key_wins_over_new_key() {
    let mut map = Map::new();
    map.insert(OSM_IDENTIFIER_KEY.to_owned(), Value::from("2"));
    map.insert(LEGACY_OSM_IDENTIFIER_KEY.to_owned(), Value::from("1"));
    assert_eq!(osm_identifier_of(&map), Some(&Value::from("1")));
    map.remove(LEGACY_OSM_IDENTIFIER_KEY);
    assert_eq!(osm_identifier_of(&map), Some(&Value::from("2")));
}
