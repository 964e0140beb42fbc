//! Mapping from geographic coordinates to tile samples.
//!
//! [`locate`] turns a `(lat, lon)` query into the four grid samples that
//! surround it and the fractional offsets used to interpolate between them.
//! No I/O happens here.
//!
//! # Convention
//!
//! - Columns run west to east: `col = floor(frac_lon * N)`.
//! - Rows run north to south: `row = N - ceil(frac_lat * N)`. A point lying
//!   exactly on a cell's southern edge is row 0 of the cell below.
//! - The base sample is the one at or north-west of the point. Its
//!   neighbours are one column east, one row south, and both.
//!
//! The same row/column/sub-tile numbering is used by the builder through
//! [`GridConfig::sample_ref`].

use std::fmt;

use crate::grid::{GridConfig, SampleRef};

/// Positions closer than this (in samples) to a grid line are treated as
/// lying on it.
const SNAP_EPSILON: f64 = 1e-7;

/// Key of one stored tile: a 1° cell plus the sub-tile index inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    /// Latitude of the cell's southern edge.
    pub cell_lat: i32,
    /// Longitude of the cell's western edge.
    pub cell_lon: i32,
    /// Row-major sub-tile index, 0 = north-west.
    pub sub_tile: u8,
}

impl TileId {
    pub fn new(cell_lat: i32, cell_lon: i32, sub_tile: u8) -> Self {
        Self {
            cell_lat,
            cell_lon,
            sub_tile,
        }
    }

    /// Parse the `{lat}_{lon}_{sub_tile}` form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('_');
        let cell_lat = parts.next()?.parse().ok()?;
        let cell_lon = parts.next()?.parse().ok()?;
        let sub_tile = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(cell_lat, cell_lon, sub_tile))
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.cell_lat, self.cell_lon, self.sub_tile)
    }
}

/// A query point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<(f64, f64)> for Point {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// The four samples around a point plus the interpolation weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilinearStencil {
    /// Corners in the order base, east, south, south-east.
    pub samples: [SampleRef; 4],
    /// Fractional distance from the base sample towards the eastern one.
    pub dx: f64,
    /// Fractional distance from the base sample towards the southern one.
    pub dy: f64,
}

/// Check that a coordinate can be located at all.
///
/// Whether a tile exists for it is a separate question answered by the store.
pub fn is_valid_coord(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

/// Compute the bilinear stencil for a point.
///
/// The caller is expected to reject coordinates that fail
/// [`is_valid_coord`] first.
///
/// # Example
///
/// ```
/// use dem_tiles::{addressing::locate, GridConfig};
///
/// let stencil = locate(&GridConfig::default(), 39.5, 2.0);
/// assert_eq!(stencil.samples[0].tile.cell_lat, 39);
/// assert_eq!(stencil.samples[0].tile.cell_lon, 2);
/// assert_eq!(stencil.dx, 0.0);
/// assert_eq!(stencil.dy, 0.0);
/// ```
pub fn locate(grid: &GridConfig, lat: f64, lon: f64) -> BilinearStencil {
    let n = grid.samples_per_degree;
    let scale = n as f64;

    let mut cell_lat = lat.floor() as i32;
    let mut cell_lon = lon.floor() as i32;
    let lat_pos = snap((lat - lat.floor()) * scale);
    let mut lon_pos = snap((lon - lon.floor()) * scale);
    // On the eastern edge, or frac rounded up to 1.0 for a tiny negative lon
    if lon_pos >= scale {
        cell_lon += 1;
        lon_pos = 0.0;
    }

    let col = (lon_pos.floor() as usize).min(n - 1);
    let dx = lon_pos - col as f64;

    let north = lat_pos.ceil();
    let dy = north - lat_pos;
    let mut row = n - (north as usize).min(n);
    if row == n {
        row = 0;
        cell_lat -= 1;
    }

    debug_assert!((0.0..=1.0).contains(&dx), "dx out of range: {dx}");
    debug_assert!((0.0..=1.0).contains(&dy), "dy out of range: {dy}");

    let (east_lon, east_col) = step_east(cell_lon, col, n);
    let (south_lat, south_row) = step_south(cell_lat, row, n);

    BilinearStencil {
        samples: [
            grid.sample_ref(cell_lat, cell_lon, row, col),
            grid.sample_ref(cell_lat, east_lon, row, east_col),
            grid.sample_ref(south_lat, cell_lon, south_row, col),
            grid.sample_ref(south_lat, east_lon, south_row, east_col),
        ],
        dx: dx.clamp(0.0, 1.0),
        dy: dy.clamp(0.0, 1.0),
    }
}

/// Round a sample position to the nearest grid line when within
/// [`SNAP_EPSILON`], so grid-aligned queries get `dx`/`dy` of exactly zero.
fn snap(pos: f64) -> f64 {
    let nearest = pos.round();
    if (pos - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        pos
    }
}

/// One column east, wrapping into column 0 of the next cell.
fn step_east(cell_lon: i32, col: usize, n: usize) -> (i32, usize) {
    if col + 1 < n {
        (cell_lon, col + 1)
    } else {
        (cell_lon + 1, 0)
    }
}

/// One row south, wrapping into row 0 of the cell below.
fn step_south(cell_lat: i32, row: usize, n: usize) -> (i32, usize) {
    if row + 1 < n {
        (cell_lat, row + 1)
    } else {
        (cell_lat - 1, 0)
    }
}
