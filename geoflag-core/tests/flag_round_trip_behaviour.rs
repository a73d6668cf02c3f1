//! Behavioural tests for writing flags as feature collections and reading
//! them back.
#![expect(clippy::expect_used, reason = "steps should fail fast on missing state")]

use std::cell::RefCell;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use geoflag_core::interchange::{FlagContext, from_feature_collection, to_feature_collection};
use geoflag_core::{
    ChangeDescriptor, CompleteEntity, Entity, FixSuggestion, Flag, ItemType, RelationMember,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

fn c(x: f64, y: f64) -> Coord {
    Coord { x, y }
}

fn polyline() -> CompleteEntity {
    CompleteEntity::line(5_000_001, vec![c(0.0, 0.0), c(1.0, 0.0), c(2.0, 0.0)])
        .with_tag("highway", "residential")
}

fn multipolygon_relation() -> CompleteEntity {
    let ring = vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0), c(0.0, 1.0), c(0.0, 0.0)];
    CompleteEntity::relation(
        9_000_001,
        vec![RelationMember::new(7_000_001, ItemType::Area, "outer")],
    )
    .with_tag("type", "multipolygon")
    .with_multipolygon(MultiPolygon::new(vec![Polygon::new(
        LineString::new(ring),
        Vec::new(),
    )]))
}

#[fixture]
fn flag() -> RefCell<Option<Flag>> {
    RefCell::new(None)
}

#[fixture]
fn read() -> RefCell<Option<Flag>> {
    RefCell::new(None)
}

#[fixture]
fn suggested() -> RefCell<Vec<Coord>> {
    RefCell::new(Vec::new())
}

#[given("a flag over a single point")]
fn given_point(#[from(flag)] flag: &RefCell<Option<Flag>>) {
    let mut built = Flag::new("F1").with_challenge("Points");
    built.add_object(&CompleteEntity::point(1_000_000, c(1.0, 2.0)).with_tag("amenity", "cafe"));
    built.add_instruction("Check the cafe");
    *flag.borrow_mut() = Some(built);
}

#[given("a flag over a polyline and a multipolygon relation")]
fn given_polyline_and_relation(#[from(flag)] flag: &RefCell<Option<Flag>>) {
    let mut built = Flag::new("F2").with_challenge("Mixed");
    built.add_object(&polyline());
    built.add_object(&multipolygon_relation());
    built.add_instruction("first");
    built.add_instruction("second");
    *flag.borrow_mut() = Some(built);
}

#[given("a flag over a route relation")]
fn given_route(#[from(flag)] flag: &RefCell<Option<Flag>>) {
    let members = vec![
        RelationMember::new(1, ItemType::Node, "stop").with_coordinates(vec![c(3.0, 4.0)]),
        RelationMember::new(2, ItemType::Line, "").with_coordinates(vec![c(5.0, 6.0), c(7.0, 8.0)]),
    ];
    let relation = CompleteEntity::relation(42_000_000, members).with_tag("type", "route");
    let mut built = Flag::new("F3").with_challenge("Routes");
    built.add_object(&relation);
    *flag.borrow_mut() = Some(built);
}

#[given("a flag over a polyline with an inserted coordinate suggested")]
fn given_geometry_fix(
    #[from(flag)] flag: &RefCell<Option<Flag>>,
    #[from(suggested)] suggested: &RefCell<Vec<Coord>>,
) {
    let before = polyline();
    let mut coordinates = before.coordinates().to_vec();
    coordinates.insert(1, c(0.5, 0.5));
    let after = CompleteEntity::line(before.identifier(), coordinates.clone())
        .with_tags(before.tags().clone());
    let mut built = Flag::new("F4");
    built.add_object(&before);
    built.add_fix_suggestion(FixSuggestion::from_views(before, after));
    *flag.borrow_mut() = Some(built);
    *suggested.borrow_mut() = coordinates;
}

#[given("a flag over a multipolygon relation with a geometry fix")]
fn given_relation_geometry_fix(#[from(flag)] flag: &RefCell<Option<Flag>>) {
    let before = multipolygon_relation();
    let after = before.clone().with_multipolygon(MultiPolygon::new(Vec::new()));
    let mut built = Flag::new("F5");
    built.add_object(&before);
    built.add_fix_suggestion(FixSuggestion::Modify {
        descriptors: vec![ChangeDescriptor::geometry_add(0, vec![c(9.0, 9.0)])],
        before,
        after,
    });
    *flag.borrow_mut() = Some(built);
}

#[when("the flag is written and read back")]
fn when_round_trip(
    #[from(flag)] flag: &RefCell<Option<Flag>>,
    #[from(read)] read: &RefCell<Option<Flag>>,
) {
    let context = FlagContext::default()
        .with_generator("BehaviourCheck")
        .with_timestamp("2024-05-01T00:00:00Z");
    let value = {
        let borrowed = flag.borrow();
        let written = borrowed.as_ref().expect("flag given");
        to_feature_collection(written, &context)
    };
    let parsed = from_feature_collection(&value).expect("written flag reads back");
    *read.borrow_mut() = Some(parsed);
}

#[then("the read flag has the same members")]
fn then_same_members(
    #[from(flag)] flag: &RefCell<Option<Flag>>,
    #[from(read)] read: &RefCell<Option<Flag>>,
) {
    let flag = flag.borrow();
    let read = read.borrow();
    let (written, parsed) = (
        flag.as_ref().expect("flag given"),
        read.as_ref().expect("flag read"),
    );
    assert_eq!(parsed.identifier(), written.identifier());
    assert_eq!(parsed.objects(), written.objects());
}

#[then("the read flag has the same instructions")]
fn then_same_instructions(
    #[from(flag)] flag: &RefCell<Option<Flag>>,
    #[from(read)] read: &RefCell<Option<Flag>>,
) {
    let flag = flag.borrow();
    let read = read.borrow();
    assert_eq!(
        read.as_ref().expect("flag read").instructions(),
        flag.as_ref().expect("flag given").instructions()
    );
}

#[then("the read flag has the same unique identifiers")]
fn then_same_identifiers(
    #[from(flag)] flag: &RefCell<Option<Flag>>,
    #[from(read)] read: &RefCell<Option<Flag>>,
) {
    let flag = flag.borrow();
    let read = read.borrow();
    assert_eq!(
        read.as_ref().expect("flag read").unique_identifiers(),
        flag.as_ref().expect("flag given").unique_identifiers()
    );
}

#[then("the read fix suggestion rebuilds the suggested geometry")]
fn then_fix_rebuilt(
    #[from(read)] read: &RefCell<Option<Flag>>,
    #[from(suggested)] suggested: &RefCell<Vec<Coord>>,
) {
    let read = read.borrow();
    let fix = read
        .as_ref()
        .and_then(|flag| flag.fix_suggestions().first())
        .expect("one fix suggestion read");
    let expected = suggested.borrow();
    assert_eq!(
        fix.after().map(CompleteEntity::coordinates),
        Some(expected.as_slice())
    );
}

#[then("the read flag has no fix suggestions")]
fn then_no_fixes(#[from(read)] read: &RefCell<Option<Flag>>) {
    let held = read.borrow();
    assert!(held.as_ref().expect("flag read").fix_suggestions().is_empty());
}

#[scenario(path = "tests/features/flag_round_trip.feature", index = 0)]
fn single_point(flag: RefCell<Option<Flag>>, read: RefCell<Option<Flag>>) {
    let _ = (flag, read);
}

#[scenario(path = "tests/features/flag_round_trip.feature", index = 1)]
fn polyline_and_relation(flag: RefCell<Option<Flag>>, read: RefCell<Option<Flag>>) {
    let _ = (flag, read);
}

#[scenario(path = "tests/features/flag_round_trip.feature", index = 2)]
fn relation_only(flag: RefCell<Option<Flag>>, read: RefCell<Option<Flag>>) {
    let _ = (flag, read);
}

#[scenario(path = "tests/features/flag_round_trip.feature", index = 3)]
fn geometry_fix(
    flag: RefCell<Option<Flag>>,
    read: RefCell<Option<Flag>>,
    suggested: RefCell<Vec<Coord>>,
) {
    let _ = (flag, read, suggested);
}

#[scenario(path = "tests/features/flag_round_trip.feature", index = 4)]
fn inapplicable_fix(flag: RefCell<Option<Flag>>, read: RefCell<Option<Flag>>) {
    let _ = (flag, read);
}
