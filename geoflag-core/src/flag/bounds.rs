//! Minimum-size bounds for map display.

use geo::{Coord, Rect};

/// Smallest width and height, in meters, a flag's bounds may have.
pub const MINIMUM_EXTENT_METERS: f64 = 10.0;

const METERS_PER_DEGREE: f64 = 111_319.490_793_273_57;
/// Keeps longitude scaling finite near the poles.
const MIN_LATITUDE_SCALE: f64 = 1e-6;

/// Grow `rect` around its center until each side spans at least
/// [`MINIMUM_EXTENT_METERS`].
#[must_use]
#[expect(clippy::float_arithmetic, reason = "bounds are grown in degree space")]
pub fn expand_to_minimum(rect: Rect) -> Rect {
    let center = rect.center();
    let latitude_scale = center.y.to_radians().cos().abs().max(MIN_LATITUDE_SCALE);
    let min_height = MINIMUM_EXTENT_METERS / METERS_PER_DEGREE;
    let min_width = min_height / latitude_scale;
    let half_width = rect.width().max(min_width) / 2.0;
    let half_height = rect.height().max(min_height) / 2.0;
    Rect::new(
        Coord {
            x: center.x - half_width,
            y: center.y - half_height,
        },
        Coord {
            x: center.x + half_width,
            y: center.y + half_height,
        },
    )
}

/// Width and height of `rect` in meters, measured through its center.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "degrees are converted to meters")]
pub fn extent_meters(rect: Rect) -> (f64, f64) {
    let latitude_scale = rect.center().y.to_radians().cos().abs();
    (
        rect.width() * METERS_PER_DEGREE * latitude_scale,
        rect.height() * METERS_PER_DEGREE,
    )
}
