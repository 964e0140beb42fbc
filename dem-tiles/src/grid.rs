//! Grid geometry shared by the query path and the tile builder.
//!
//! A 1° × 1° cell holds `samples_per_degree` rows and columns. Row 0 is the
//! northern edge of the cell and column 0 its western edge. The cell is cut
//! into a `tiles_per_side × tiles_per_side` array of square sub-tiles,
//! numbered row-major from the north-west corner.

use serde::{Deserialize, Serialize};

use crate::addressing::TileId;
use crate::error::{DemError, Result};

/// Samples per degree of the 3 arc-second grid.
const DEFAULT_SAMPLES_PER_DEGREE: usize = 1200;

/// Sub-tiles along each side of a cell.
const DEFAULT_TILES_PER_SIDE: usize = 4;

/// Resolution and partitioning of the elevation grid.
///
/// Both [`crate::addressing::locate`] and [`crate::builder::TileBuilder`]
/// take a `GridConfig`, and the store manifest records the one it was built
/// with, so readers and writers always agree on the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Samples per row/column of one 1° cell (after trimming the overlap).
    pub samples_per_degree: usize,
    /// Number of sub-tiles along each side of a cell.
    pub tiles_per_side: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            samples_per_degree: DEFAULT_SAMPLES_PER_DEGREE,
            tiles_per_side: DEFAULT_TILES_PER_SIDE,
        }
    }
}

impl GridConfig {
    /// Create a grid configuration, checking that it partitions evenly.
    pub fn new(samples_per_degree: usize, tiles_per_side: usize) -> Result<Self> {
        let grid = Self {
            samples_per_degree,
            tiles_per_side,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Check that the sub-tiles cover the cell exactly.
    pub fn validate(&self) -> Result<()> {
        if self.samples_per_degree == 0 || self.tiles_per_side == 0 {
            return Err(DemError::InvalidGridConfig {
                reason: format!(
                    "samples_per_degree ({}) and tiles_per_side ({}) must be non-zero",
                    self.samples_per_degree, self.tiles_per_side
                ),
            });
        }
        if self.samples_per_degree % self.tiles_per_side != 0 {
            return Err(DemError::InvalidGridConfig {
                reason: format!(
                    "{} samples cannot be split into {} equal sub-tiles",
                    self.samples_per_degree, self.tiles_per_side
                ),
            });
        }
        if self.tiles_per_side * self.tiles_per_side > usize::from(u8::MAX) + 1 {
            return Err(DemError::InvalidGridConfig {
                reason: format!("{} sub-tiles per side is too many", self.tiles_per_side),
            });
        }
        Ok(())
    }

    /// Samples per row/column of one sub-tile.
    pub fn tile_size(&self) -> usize {
        self.samples_per_degree / self.tiles_per_side
    }

    /// Number of samples in one sub-tile.
    pub fn tile_len(&self) -> usize {
        self.tile_size() * self.tile_size()
    }

    /// Number of sub-tiles in one cell.
    pub fn tiles_per_cell(&self) -> usize {
        self.tiles_per_side * self.tiles_per_side
    }

    /// Samples per row/column of a raw source file, which repeats the
    /// neighbouring cell's first row and column.
    pub fn source_samples(&self) -> usize {
        self.samples_per_degree + 1
    }

    /// Map a cell-level sample position to the tile holding it.
    ///
    /// `row` counts from the northern edge and `col` from the western edge;
    /// both must be below `samples_per_degree`. Returns the tile and the
    /// sample's local `(x, y)` inside it.
    pub fn sample_ref(&self, cell_lat: i32, cell_lon: i32, row: usize, col: usize) -> SampleRef {
        debug_assert!(row < self.samples_per_degree && col < self.samples_per_degree);

        let size = self.tile_size();
        let sub_tile = (row / size) * self.tiles_per_side + col / size;

        SampleRef {
            tile: TileId::new(cell_lat, cell_lon, sub_tile as u8),
            x: col % size,
            y: row % size,
        }
    }
}

/// One grid sample, addressed by its tile and its position inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRef {
    /// Tile holding the sample.
    pub tile: TileId,
    /// Column inside the tile (0 = west).
    pub x: usize,
    /// Row inside the tile (0 = north).
    pub y: usize,
}
