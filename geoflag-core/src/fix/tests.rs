//! Tests for descriptor derivation and the patch engine.
#![expect(clippy::expect_used, reason = "descriptors under test are known to apply")]

use super::*;
use crate::entity::RelationMember;
use proptest::prelude::*;
use rstest::{fixture, rstest};

fn c(x: f64) -> Coord {
    Coord { x, y: 0.0 }
}

#[fixture]
fn line() -> CompleteEntity {
    // A, B, C
    CompleteEntity::line(10, vec![c(1.0), c(2.0), c(3.0)]).with_tag("highway", "path")
}

#[rstest]
fn tag_add_leaves_geometry_untouched(line: CompleteEntity) {
    let after = patch::apply(&line, &[ChangeDescriptor::tag_add("surface", "gravel")])
        .expect("tag add applies");
    assert_eq!(after.tag("surface"), Some("gravel"));
    assert_eq!(after.coordinates(), line.coordinates());
}

#[rstest]
fn geometry_add_lands_in_forward_order(line: CompleteEntity) {
    let add = ChangeDescriptor::geometry_add(1, vec![c(8.0), c(9.0)]);
    let after = patch::apply(&line, &[add]).expect("add applies");
    assert_eq!(
        after.coordinates(),
        &[c(1.0), c(8.0), c(9.0), c(2.0), c(3.0)]
    );
}

#[rstest]
fn add_and_update_at_same_position_keep_the_inserted_run(line: CompleteEntity) {
    let descriptors = vec![
        ChangeDescriptor::geometry_update(1, vec![c(2.0)], vec![c(5.0)]),
        ChangeDescriptor::geometry_add(1, vec![c(8.0)]),
    ];
    let after = patch::apply(&line, &descriptors).expect("applies");
    assert_eq!(after.coordinates(), &[c(1.0), c(8.0), c(5.0), c(3.0)]);
}

#[rstest]
fn removals_use_before_positions(line: CompleteEntity) {
    let descriptors = vec![
        ChangeDescriptor::geometry_remove(2, c(3.0)),
        ChangeDescriptor::geometry_remove(0, c(1.0)),
    ];
    let after = patch::apply(&line, &descriptors).expect("applies");
    assert_eq!(after.coordinates(), &[c(2.0)]);
}

#[rstest]
fn update_appends_overflow(line: CompleteEntity) {
    let update = ChangeDescriptor::geometry_update(2, vec![c(3.0)], vec![c(6.0), c(7.0)]);
    let after = patch::apply(&line, &[update]).expect("applies");
    assert_eq!(after.coordinates(), &[c(1.0), c(2.0), c(6.0), c(7.0)]);
}

#[rstest]
fn remove_out_of_range_is_no_fix(line: CompleteEntity) {
    assert!(patch::apply(&line, &[ChangeDescriptor::geometry_remove(3, c(0.0))]).is_none());
}

#[rstest]
fn geometry_add_on_node_is_no_fix() {
    let node = CompleteEntity::node(1, c(0.0));
    let add = ChangeDescriptor::geometry_add(0, vec![c(1.0)]);
    assert!(patch::apply(&node, &[add]).is_none());
}

#[rstest]
fn node_location_update_moves_the_node() {
    let node = CompleteEntity::node(1, c(0.0));
    let update = ChangeDescriptor::geometry_update(0, vec![c(0.0)], vec![c(4.0)]);
    let after = patch::apply(&node, &[update]).expect("applies");
    assert_eq!(after.coordinates(), &[c(4.0)]);
}

#[rstest]
fn geometry_on_relation_is_no_fix() {
    let relation = CompleteEntity::relation(1, Vec::new());
    let update = ChangeDescriptor::geometry_update(0, Vec::new(), vec![c(1.0)]);
    assert!(patch::apply(&relation, &[update]).is_none());
}

#[rstest]
fn edge_adjacency_is_cleared_in_after_view() {
    let edge = CompleteEntity::edge(1, vec![c(0.0), c(1.0)]).with_adjacency([100, 200]);
    let after = patch::apply(&edge, &[ChangeDescriptor::tag_add("oneway", "yes")])
        .expect("applies");
    assert!(after.adjacency().is_empty());
    assert_eq!(edge.adjacency(), &[100, 200]);
}

#[rstest]
fn tag_diff_covers_add_update_and_remove() {
    let before = CompleteEntity::point(1, c(0.0))
        .with_tag("name", "Old")
        .with_tag("amenity", "cafe");
    let after = CompleteEntity::point(1, c(0.0))
        .with_tag("name", "New")
        .with_tag("cuisine", "coffee_shop");
    let fix = FixSuggestion::from_views(before, after);
    assert_eq!(
        fix.descriptors(),
        &[
            ChangeDescriptor::tag_remove("amenity", "cafe"),
            ChangeDescriptor::tag_add("cuisine", "coffee_shop"),
            ChangeDescriptor::tag_update("name", "Old", "New"),
        ]
    );
}

#[rstest]
fn geometry_diff_trims_the_shared_prefix_and_suffix() {
    let before = CompleteEntity::line(7, vec![c(0.0), c(1.0), c(2.0), c(3.0)]);
    let after = CompleteEntity::line(7, vec![c(0.0), c(9.0), c(3.0)]);
    let fix = FixSuggestion::from_views(before, after);
    assert_eq!(
        fix.descriptors(),
        &[
            ChangeDescriptor::geometry_update(1, vec![c(1.0)], vec![c(9.0)]),
            ChangeDescriptor::geometry_remove(2, c(2.0)),
        ]
    );
}

#[rstest]
fn member_role_change_is_add_then_remove() {
    let before = CompleteEntity::relation(
        123,
        vec![RelationMember::new(1, ItemType::Node, "not_real")],
    );
    let after = CompleteEntity::relation(
        123,
        vec![RelationMember::new(1, ItemType::Node, "still_not_real")],
    );
    let fix = FixSuggestion::from_views(before.clone(), after.clone());
    assert_eq!(
        fix.descriptors(),
        &[
            ChangeDescriptor::member(ChangeOperation::Add, 1, ItemType::Node, "still_not_real"),
            ChangeDescriptor::member(ChangeOperation::Remove, 1, ItemType::Node, "not_real"),
        ]
    );
    let rebuilt = patch::apply(&before, fix.descriptors()).expect("applies");
    assert_eq!(rebuilt, after);
}

#[rstest]
fn removal_has_no_descriptors_or_after_view(line: CompleteEntity) {
    let fix = FixSuggestion::removal(line);
    assert!(fix.descriptors().is_empty());
    assert!(fix.after().is_none());
    assert_eq!(fix.operation(), ChangeOperation::Remove);
    assert_eq!(fix.key(), "Line10");
}

#[rstest]
fn from_descriptors_rejects_unappliable_changes(line: CompleteEntity) {
    let descriptors = vec![ChangeDescriptor::geometry_add(9, vec![c(0.0)])];
    assert!(FixSuggestion::from_descriptors(line, descriptors).is_none());
}

#[rstest]
#[case("ADD", ChangeOperation::Add)]
#[case("REMOVE", ChangeOperation::Remove)]
#[case("UPDATE", ChangeOperation::Update)]
fn operations_parse_from_interchange_names(#[case] raw: &str, #[case] expected: ChangeOperation) {
    assert_eq!(raw.parse::<ChangeOperation>(), Ok(expected));
    assert_eq!(expected.as_str(), raw);
}

fn coords(values: Vec<u8>) -> Vec<Coord> {
    values.into_iter().map(|v| c(f64::from(v))).collect()
}

proptest! {
    #[test]
    fn derived_descriptors_rebuild_the_after_geometry(
        old_coords in proptest::collection::vec(0u8..4, 1..8),
        new_coords in proptest::collection::vec(0u8..4, 1..8),
    ) {
        let before = CompleteEntity::line(1, coords(old_coords));
        let after = CompleteEntity::line(1, coords(new_coords));
        let fix = FixSuggestion::from_views(before.clone(), after.clone());
        let rebuilt = patch::apply(&before, fix.descriptors());
        prop_assert_eq!(rebuilt.as_ref().map(CompleteEntity::coordinates), Some(after.coordinates()));
    }

    #[test]
    fn derived_descriptors_rebuild_the_after_tags(
        old_tags in proptest::collection::btree_map("[a-d]", "[x-z]", 0..4),
        new_tags in proptest::collection::btree_map("[a-d]", "[x-z]", 0..4),
    ) {
        let before = CompleteEntity::point(1, c(0.0)).with_tags(old_tags);
        let after = CompleteEntity::point(1, c(0.0)).with_tags(new_tags);
        let fix = FixSuggestion::from_views(before.clone(), after.clone());
        let rebuilt = patch::apply(&before, fix.descriptors()).expect("tags always apply");
        prop_assert_eq!(rebuilt.tags(), after.tags());
    }
}
