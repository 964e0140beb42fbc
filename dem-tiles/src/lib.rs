//! # dem-tiles - Tiled elevation store
//!
//! Point elevation queries over a global digital elevation model that has
//! been cut into small compressed tiles.
//!
//! ## Features
//!
//! - **Offline build**: Converts raw `.hgt` / `.hgt.zip` grids into a tile
//!   store, one source file per worker
//! - **Small reads**: Each query touches at most four 300×300 tiles
//! - **LRU cache**: Recently used tiles stay decoded between points
//! - **Bilinear**: Elevations are interpolated between the four surrounding
//!   samples; a void sample makes the result `None`
//!
//! ## Quick Start
//!
//! ```ignore
//! use dem_tiles::{ElevationQueryEngine, GridConfig, TileBuilder};
//!
//! // Once, offline
//! TileBuilder::new(GridConfig::default()).build("/data/hgt", "/data/dem_tiles")?;
//!
//! // Then query
//! let mut engine = ElevationQueryEngine::open("/data/dem_tiles")?;
//! if let Some(e) = engine.elevation(55.0000001, 58.96684) {
//!     println!("Elevation: {e}m");
//! }
//! ```
//!
//! ## Source Data Format
//!
//! Source files hold a 1201×1201 grid of 16-bit big-endian signed integers
//! (3 arc-seconds) covering one 1° cell, north row first. The special value
//! -32768 indicates void (no data). The last row and column overlap the next
//! cells and are dropped by the builder.

pub mod addressing;
pub mod builder;
pub mod cache;
pub mod engine;
pub mod error;
pub mod filename;
pub mod grid;
pub mod interpolate;
pub mod protocol;
pub mod store;
pub mod tile;

// Re-export main types at crate root for convenience
pub use addressing::{locate, BilinearStencil, Point, TileId};
pub use builder::{BuildReport, ProgressSink, TileBuilder};
pub use cache::{CacheStats, TileCache};
pub use engine::{query_batch, ElevationQueryEngine, QueryEngineBuilder};
pub use error::{DemError, Result};
pub use grid::GridConfig;
pub use store::{DirTileStore, MemoryTileStore, StoreStats, TileStore};
pub use tile::{Tile, VOID_VALUE};
