//! Name decoration with the most important road classification.

use std::str::FromStr;

use serde_json::{Map, Value};

const HIGHWAY_KEY: &str = "highway";

/// Road classes ordered from most to least important.
const HIGHWAY_RANKING: [&str; 26] = [
    "motorway",
    "motorway_link",
    "trunk",
    "trunk_link",
    "primary",
    "primary_link",
    "secondary",
    "secondary_link",
    "tertiary",
    "tertiary_link",
    "unclassified",
    "residential",
    "service",
    "living_street",
    "pedestrian",
    "track",
    "bus_guideway",
    "road",
    "footway",
    "bridleway",
    "steps",
    "path",
    "cycleway",
    "construction",
    "proposed",
    "no",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HighwayClass(usize);

impl HighwayClass {
    fn value(self) -> &'static str {
        HIGHWAY_RANKING.get(self.0).copied().unwrap_or("no")
    }
}

impl FromStr for HighwayClass {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        HIGHWAY_RANKING
            .iter()
            .position(|known| known.eq_ignore_ascii_case(value))
            .map(Self)
            .ok_or(())
    }
}

/// Find the most important `highway` value across member properties.
///
/// Returns `"highway=<value>"`, or `None` when no member is classified or any
/// member carries an unrecognised classification.
pub(crate) fn highway_decoration<'a>(
    properties: impl IntoIterator<Item = &'a Map<String, Value>>,
) -> Option<String> {
    let mut best: Option<HighwayClass> = None;
    for map in properties {
        let Some(raw) = map.get(HIGHWAY_KEY).and_then(Value::as_str) else {
            continue;
        };
        let class = raw.parse::<HighwayClass>().ok()?;
        best = Some(best.map_or(class, |current| current.min(class)));
    }
    best.map(|class| format!("{HIGHWAY_KEY}={}", class.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[rstest]
    fn picks_most_important_class() {
        let maps = [
            props(json!({"highway": "residential"})),
            props(json!({"highway": "primary"})),
            props(json!({"name": "unclassified feature"})),
        ];
        assert_eq!(
            highway_decoration(maps.iter()),
            Some("highway=primary".to_owned())
        );
    }

    #[rstest]
    fn unknown_class_aborts_decoration() {
        let maps = [
            props(json!({"highway": "primary"})),
            props(json!({"highway": "superhighway"})),
        ];
        assert_eq!(highway_decoration(maps.iter()), None);
    }

    #[rstest]
    fn unclassified_members_yield_nothing() {
        let maps = [props(json!({"building": "yes"}))];
        assert_eq!(highway_decoration(maps.iter()), None);
    }
}
