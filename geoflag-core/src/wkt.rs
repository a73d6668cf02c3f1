//! Well-known-text rendering of coordinate sequences.
//!
//! Geometry change descriptors carry their before and after views as WKT.
//! One coordinate renders as `POINT (x y)`, longer sequences as
//! `LINESTRING (x y, ...)`. Parsing also accepts `MULTIPOINT`.

use geo::Coord;
use thiserror::Error;

/// Errors raised while parsing a WKT coordinate sequence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WktError {
    /// The text does not start with a supported geometry keyword.
    #[error("unsupported WKT geometry in {0:?}")]
    Unsupported(String),
    /// The coordinate list could not be parsed.
    #[error("malformed WKT coordinates in {0:?}")]
    Malformed(String),
}

/// Render a coordinate sequence as WKT. Empty sequences render as
/// `LINESTRING EMPTY`.
#[must_use]
pub fn to_wkt(coords: &[Coord]) -> String {
    let body = coords
        .iter()
        .map(|c| format!("{} {}", c.x, c.y))
        .collect::<Vec<_>>()
        .join(", ");
    match coords {
        [] => "LINESTRING EMPTY".to_owned(),
        [_] => format!("POINT ({body})"),
        _ => format!("LINESTRING ({body})"),
    }
}

/// Parse a WKT `POINT`, `LINESTRING` or `MULTIPOINT` into coordinates.
///
/// # Errors
///
/// Returns [`WktError`] for other geometry kinds or malformed numbers.
pub fn from_wkt(text: &str) -> Result<Vec<Coord>, WktError> {
    let trimmed = text.trim();
    let upper = trimmed.to_ascii_uppercase();
    let keyword = ["MULTIPOINT", "LINESTRING", "POINT"]
        .into_iter()
        .find(|keyword| upper.starts_with(keyword))
        .ok_or_else(|| WktError::Unsupported(trimmed.to_owned()))?;
    let rest = trimmed.get(keyword.len()..).unwrap_or_default().trim();
    if rest.eq_ignore_ascii_case("EMPTY") {
        return Ok(Vec::new());
    }
    let inner = rest
        .strip_prefix('(')
        .and_then(|body| body.strip_suffix(')'))
        .ok_or_else(|| WktError::Malformed(trimmed.to_owned()))?;
    inner
        .split(',')
        .map(|pair| parse_pair(pair).ok_or_else(|| WktError::Malformed(trimmed.to_owned())))
        .collect()
}

fn parse_pair(pair: &str) -> Option<Coord> {
    let cleaned = pair.trim().trim_start_matches('(').trim_end_matches(')');
    let mut numbers = cleaned.split_whitespace().map(str::parse::<f64>);
    let x = numbers.next()?.ok()?;
    let y = numbers.next()?.ok()?;
    Some(Coord { x, y })
}
