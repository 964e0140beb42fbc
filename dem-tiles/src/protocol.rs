//! Line-based text protocol for batch queries.
//!
//! Requests carry one point per line as `lat lon` separated by whitespace.
//! Responses carry one value per line in request order, `NULL` for no data.

use thiserror::Error;

use crate::addressing::Point;

/// Largest accepted request body, in bytes.
pub const MAX_INPUT_SIZE: usize = 250_000;

/// Largest accepted number of points in one request.
pub const MAX_INPUT_POINTS: usize = 10_000;

/// Token written for a point without elevation.
pub const NULL_TOKEN: &str = "NULL";

/// Errors for malformed requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A line does not hold exactly two numbers.
    #[error("Invalid request format at line {line}")]
    InvalidLine { line: usize },

    /// The request holds more points than allowed.
    #[error("Too many points: {count} (max {max})")]
    TooManyPoints { count: usize, max: usize },
}

/// Parse a request body into points.
///
/// Empty lines are skipped. A line holding only whitespace is invalid.
///
/// # Example
///
/// ```
/// use dem_tiles::protocol::parse_points;
///
/// let points = parse_points("55.0 58.9\n\n-12.5 -77\n", 10).unwrap();
/// assert_eq!(points.len(), 2);
/// assert_eq!(points[1].lon, -77.0);
/// assert!(parse_points("55.0\n", 10).is_err());
/// ```
pub fn parse_points(body: &str, max_points: usize) -> Result<Vec<Point>, ProtocolError> {
    let mut points = Vec::new();

    for (i, line) in body.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let invalid = || ProtocolError::InvalidLine { line: i + 1 };

        let mut fields = line.split_whitespace();
        let (lat, lon) = match (fields.next(), fields.next(), fields.next()) {
            (Some(lat), Some(lon), None) => (lat, lon),
            _ => return Err(invalid()),
        };
        let lat: f64 = lat.parse().map_err(|_| invalid())?;
        let lon: f64 = lon.parse().map_err(|_| invalid())?;

        points.push(Point::new(lat, lon));
    }

    if points.len() > max_points {
        return Err(ProtocolError::TooManyPoints {
            count: points.len(),
            max: max_points,
        });
    }

    Ok(points)
}

/// Format one elevation for the response.
pub fn format_elevation(elevation: Option<f64>) -> String {
    match elevation {
        Some(e) => e.to_string(),
        None => NULL_TOKEN.to_string(),
    }
}

/// Format a whole response body, one value per line.
pub fn format_elevations(elevations: &[Option<f64>]) -> String {
    elevations
        .iter()
        .map(|e| format_elevation(*e))
        .collect::<Vec<_>>()
        .join("\n")
}
