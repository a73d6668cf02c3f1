//! Unit tests for the flag aggregate.
#![expect(clippy::expect_used, reason = "fixtures are known to be populated")]

use super::*;
use crate::entity::{CompleteEntity, ISO_COUNTRY_TAG, ItemType, RelationMember};
use proptest::prelude::*;
use rstest::{fixture, rstest};

fn c(x: f64, y: f64) -> Coord {
    Coord { x, y }
}

fn sample_entities() -> Vec<CompleteEntity> {
    vec![
        CompleteEntity::edge(1_000_000, vec![c(0.0, 0.0), c(0.001, 0.0)]),
        CompleteEntity::edge(2_000_000, vec![c(0.001, 0.0), c(0.002, 0.0)]),
        CompleteEntity::node(3_000_000, c(0.002, 0.0)),
        CompleteEntity::relation(4_000_000, vec![RelationMember::new(1, ItemType::Edge, "")]),
    ]
}

#[fixture]
fn entities() -> Vec<CompleteEntity> {
    sample_entities()
}

#[rstest]
fn adding_an_equal_object_twice_is_a_no_op(entities: Vec<CompleteEntity>) {
    let mut flag = Flag::new("dup");
    let first = entities.first().expect("fixture has entities");
    assert!(flag.add_object(first));
    assert!(!flag.add_object(first));
    assert!(!flag.add_object(&first.clone()));
    assert_eq!(flag.objects().len(), 1);
}

#[rstest]
fn shapeless_entities_are_skipped() {
    let mut flag = Flag::new("x");
    assert!(!flag.add_object(&CompleteEntity::line(1, Vec::new())));
    assert!(flag.objects().is_empty());
}

#[rstest]
fn synthetic_points_deduplicate_by_location() {
    let mut flag = Flag::new("points");
    flag.add_points([c(1.0, 1.0), c(1.0, 1.0), c(2.0, 2.0)]);
    assert_eq!(flag.objects().len(), 2);
    assert!(flag.unique_identifiers().is_empty());
}

#[rstest]
fn identifier_from_members_is_sorted_concatenation(entities: Vec<CompleteEntity>) {
    let mut flag = Flag::with_entities("tmp", entities.iter().map(|e| e as &dyn Entity));
    flag.set_identifier_from_members();
    assert_eq!(
        flag.identifier(),
        "Edge1000000Edge2000000Node3000000Relation4000000"
    );
}

#[rstest]
#[expect(clippy::float_arithmetic, reason = "tolerance checks on computed bounds")]
fn single_point_bounds_span_ten_meters_around_it() {
    let mut flag = Flag::new("F1");
    flag.add_object(&CompleteEntity::point(1, c(1.0, 2.0)));
    let bounds = flag.bounds();
    let (width, height) = extent_meters(bounds);
    assert!(width >= MINIMUM_EXTENT_METERS - 1e-6, "width {width}");
    assert!(height >= MINIMUM_EXTENT_METERS - 1e-6, "height {height}");
    let center = bounds.center();
    assert!((center.x - 1.0).abs() < 1e-9);
    assert!((center.y - 2.0).abs() < 1e-9);
}

#[rstest]
fn wide_bounds_are_not_shrunk() {
    let mut flag = Flag::new("wide");
    flag.add_object(&CompleteEntity::line(1, vec![c(0.0, 0.0), c(1.0, 1.0)]));
    let bounds = flag.bounds();
    assert_eq!(bounds.min(), c(0.0, 0.0));
    assert_eq!(bounds.max(), c(1.0, 1.0));
}

#[rstest]
fn empty_flag_sits_on_null_island() {
    let bounds = Flag::new("empty").bounds();
    let center = bounds.center();
    assert!(center.x.abs() < 1e-12 && center.y.abs() < 1e-12);
}

#[rstest]
fn country_comes_from_first_member_that_has_one() {
    let mut flag = Flag::new("countries");
    flag.add_object(&CompleteEntity::point(1, c(0.0, 0.0)));
    flag.add_object(&CompleteEntity::point(2, c(1.0, 0.0)).with_tag(ISO_COUNTRY_TAG, "FRA"));
    flag.add_object(&CompleteEntity::point(3, c(2.0, 0.0)).with_tag(ISO_COUNTRY_TAG, "DEU"));
    assert_eq!(flag.country(), "FRA");
}

#[rstest]
fn country_defaults_when_no_member_has_one() {
    let mut flag = Flag::new("none");
    flag.add_point(c(0.0, 0.0));
    assert_eq!(flag.country(), FLAG_COUNTRY_MISSING);
}

#[rstest]
fn duplicate_fix_suggestions_are_ignored(entities: Vec<CompleteEntity>) {
    let mut flag = Flag::new("fix");
    let node = entities.get(2).cloned().expect("node fixture");
    assert!(flag.add_fix_suggestion(FixSuggestion::removal(node.clone())));
    assert!(!flag.add_fix_suggestion(FixSuggestion::removal(node)));
    assert_eq!(flag.fix_suggestions().len(), 1);
}

#[rstest]
fn unique_container_drops_repeats_per_source(entities: Vec<CompleteEntity>) {
    let refs: Vec<&dyn Entity> = entities.iter().map(|e| e as &dyn Entity).collect();
    let mut container = UniqueFlagContainer::new();
    assert!(container.add("CheckA", Flag::with_entities("1", refs.clone())));
    assert!(!container.add("CheckA", Flag::with_entities("2", refs.clone())));
    assert!(container.add("CheckB", Flag::with_entities("3", refs)));
    assert_eq!(container.len(), 2);
    assert_eq!(container.flags("CheckA").len(), 1);
}

proptest! {
    #[test]
    fn derived_identifier_ignores_insertion_order(
        order in Just((0..4usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let pool = sample_entities();
        let mut forward = Flag::with_entities("a", pool.iter().map(|e| e as &dyn Entity));
        let mut shuffled = Flag::with_entities(
            "b",
            order.iter().filter_map(|index| pool.get(*index)).map(|e| e as &dyn Entity),
        );
        forward.set_identifier_from_members();
        shuffled.set_identifier_from_members();
        prop_assert_eq!(forward.identifier(), shuffled.identifier());
    }
}
