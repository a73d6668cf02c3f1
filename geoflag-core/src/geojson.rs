//! GeoJSON geometry encoding and decoding over `serde_json` values.

use geo::{Coord, LineString, MultiPolygon, Polygon, Rect};
use serde_json::{Value, json};
use thiserror::Error;

/// Errors raised while decoding a GeoJSON geometry object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// The geometry object lacks a `type` member.
    #[error("geometry has no type")]
    MissingType,
    /// The geometry type is not one the flag model produces.
    #[error("unsupported geometry type {0:?}")]
    UnsupportedType(String),
    /// Coordinates were absent or malformed.
    #[error("malformed coordinates for {kind} geometry")]
    MalformedCoordinates {
        /// Geometry type being decoded.
        kind: &'static str,
    },
}

/// A decoded geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// `Point`
    Point(Coord),
    /// `LineString`
    LineString(Vec<Coord>),
    /// `Polygon`
    Polygon(Polygon),
    /// `MultiPolygon`
    MultiPolygon(MultiPolygon),
}

fn position(coord: Coord) -> Value {
    json!([coord.x, coord.y])
}

fn positions(coords: &[Coord]) -> Value {
    Value::Array(coords.iter().copied().map(position).collect())
}

fn rings(polygon: &Polygon) -> Value {
    let mut rings = vec![positions(&polygon.exterior().0)];
    rings.extend(polygon.interiors().iter().map(|ring| positions(&ring.0)));
    Value::Array(rings)
}

/// Encode a point geometry.
#[must_use]
pub fn point(coord: Coord) -> Value {
    json!({ "type": "Point", "coordinates": position(coord) })
}

/// Encode a line string geometry.
#[must_use]
pub fn line_string(coords: &[Coord]) -> Value {
    json!({ "type": "LineString", "coordinates": positions(coords) })
}

/// Encode a polygon geometry.
#[must_use]
pub fn polygon(polygon: &Polygon) -> Value {
    json!({ "type": "Polygon", "coordinates": rings(polygon) })
}

/// Encode a multipolygon geometry.
#[must_use]
pub fn multi_polygon(multi: &MultiPolygon) -> Value {
    let polygons: Vec<Value> = multi.0.iter().map(rings).collect();
    json!({ "type": "MultiPolygon", "coordinates": polygons })
}

/// Encode `rect` as a `bbox` member: `[min x, min y, max x, max y]`.
#[must_use]
pub fn bbox(rect: Rect) -> Value {
    json!([rect.min().x, rect.min().y, rect.max().x, rect.max().y])
}

/// Wrap several geometries in a `GeometryCollection`.
#[must_use]
pub fn geometry_collection(geometries: Vec<Value>) -> Value {
    json!({ "type": "GeometryCollection", "geometries": geometries })
}

fn decode_position(value: &Value) -> Option<Coord> {
    match value.as_array()?.as_slice() {
        [x, y, ..] => Some(Coord {
            x: x.as_f64()?,
            y: y.as_f64()?,
        }),
        _ => None,
    }
}

fn decode_positions(value: &Value) -> Option<Vec<Coord>> {
    value.as_array()?.iter().map(decode_position).collect()
}

fn decode_polygon(value: &Value) -> Option<Polygon> {
    let mut rings = value
        .as_array()?
        .iter()
        .map(|ring| decode_positions(ring).map(LineString::new));
    let exterior = rings.next().unwrap_or_else(|| Some(LineString::new(Vec::new())))?;
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}

/// Decode a geometry object.
///
/// # Errors
///
/// Returns [`GeometryError`] when the type is missing or unsupported, or when
/// the coordinates are malformed.
pub fn decode(value: &Value) -> Result<Geometry, GeometryError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(GeometryError::MissingType)?;
    let coordinates = value.get("coordinates").unwrap_or(&Value::Null);
    match kind {
        "Point" => decode_position(coordinates)
            .map(Geometry::Point)
            .ok_or(GeometryError::MalformedCoordinates { kind: "Point" }),
        "LineString" => decode_positions(coordinates)
            .map(Geometry::LineString)
            .ok_or(GeometryError::MalformedCoordinates { kind: "LineString" }),
        "Polygon" => decode_polygon(coordinates)
            .map(Geometry::Polygon)
            .ok_or(GeometryError::MalformedCoordinates { kind: "Polygon" }),
        "MultiPolygon" => coordinates
            .as_array()
            .and_then(|polygons| polygons.iter().map(decode_polygon).collect::<Option<Vec<_>>>())
            .map(|polygons| Geometry::MultiPolygon(MultiPolygon::new(polygons)))
            .ok_or(GeometryError::MalformedCoordinates {
                kind: "MultiPolygon",
            }),
        other => Err(GeometryError::UnsupportedType(other.to_owned())),
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "geometry fixtures are known to be valid")]
mod tests {
    use super::*;
    use geo::polygon;
    use rstest::rstest;

    #[rstest]
    fn point_encodes_lon_lat_order() {
        let value = point(Coord { x: 1.5, y: -2.0 });
        assert_eq!(value, json!({"type": "Point", "coordinates": [1.5, -2.0]}));
    }

    #[rstest]
    fn multipolygon_survives_decoding() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let multi = MultiPolygon::new(vec![square]);
        let decoded = decode(&multi_polygon(&multi)).expect("decodes");
        assert_eq!(decoded, Geometry::MultiPolygon(multi));
    }

    #[rstest]
    #[case(json!({"coordinates": [0.0, 0.0]}), GeometryError::MissingType)]
    #[case(
        json!({"type": "Point", "coordinates": ["a", 0.0]}),
        GeometryError::MalformedCoordinates { kind: "Point" }
    )]
    #[case(
        json!({"type": "MultiLineString", "coordinates": []}),
        GeometryError::UnsupportedType("MultiLineString".into())
    )]
    fn decode_rejects_bad_geometry(#[case] value: Value, #[case] expected: GeometryError) {
        assert_eq!(decode(&value), Err(expected));
    }
}
