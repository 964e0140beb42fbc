//! Point elevation queries over a tile store.
//!
//! [`ElevationQueryEngine`] ties the pieces together: it locates the four
//! samples around each point, fetches them through a [`TileCache`] and
//! interpolates. Opening the store is the only step that can fail; after
//! that every point yields either an elevation or `None`.
//!
//! # Example
//!
//! ```ignore
//! use dem_tiles::{ElevationQueryEngine, Point};
//!
//! let mut engine = ElevationQueryEngine::open("/data/dem_tiles")?;
//! let elevations = engine.query_batch(&[
//!     Point::new(39.7781, 2.8215),
//!     Point::new(55.0000001, 58.96684),
//! ]);
//! for e in elevations {
//!     match e {
//!         Some(meters) => println!("{meters}"),
//!         None => println!("NULL"),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};

use crate::addressing::{is_valid_coord, locate, Point};
use crate::cache::{CacheStats, TileCache, DEFAULT_CACHE_SIZE};
use crate::error::{DemError, Result};
use crate::grid::{GridConfig, SampleRef};
use crate::interpolate::interpolate;
use crate::store::{DirTileStore, TileStore};

/// Environment variable naming the store directory.
pub const STORE_PATH_ENV: &str = "DEM_STORE_PATH";

/// Environment variable overriding the cache size.
pub const CACHE_SIZE_ENV: &str = "DEM_CACHE_SIZE";

/// Bilinear elevation queries with a per-session tile cache.
///
/// An engine is one query session: it is used from one thread at a time and
/// its cache is dropped with it. Run independent sessions for concurrent
/// batches; they can share the underlying store.
pub struct ElevationQueryEngine<S = DirTileStore> {
    grid: GridConfig,
    cache: TileCache<S>,
}

impl ElevationQueryEngine<DirTileStore> {
    /// Open the store at `path` with the default cache size.
    ///
    /// # Errors
    ///
    /// Returns [`DemError::StorageUnavailable`] if the store cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        QueryEngineBuilder::new(path).build()
    }

    /// Create a builder for more configuration options.
    pub fn builder<P: AsRef<Path>>(path: P) -> QueryEngineBuilder {
        QueryEngineBuilder::new(path)
    }
}

impl<S: TileStore> ElevationQueryEngine<S> {
    /// Run queries against any tile store.
    pub fn with_store(store: S, cache_size: usize) -> Self {
        Self {
            grid: store.grid(),
            cache: TileCache::new(store, cache_size),
        }
    }

    /// Bilinear elevation at a point, in meters.
    ///
    /// Returns `None` if the point is not a valid coordinate, if any of the
    /// four surrounding samples is void, or if a tile holding one is absent.
    pub fn elevation(&mut self, lat: f64, lon: f64) -> Option<f64> {
        if !is_valid_coord(lat, lon) {
            tracing::debug!(lat, lon, "Invalid coordinate");
            return None;
        }

        let stencil = locate(&self.grid, lat, lon);
        let [base, east, south, south_east] = &stencil.samples;

        // Stop fetching as soon as one corner is missing
        let v00 = self.sample(base)?;
        let v10 = self.sample(east)?;
        let v01 = self.sample(south)?;
        let v11 = self.sample(south_east)?;

        interpolate(
            Some(v00),
            Some(v10),
            Some(v01),
            Some(v11),
            stencil.dx,
            stencil.dy,
        )
    }

    /// Elevations for a batch of points, in input order.
    ///
    /// The same cache is used for the whole batch, so clustered points only
    /// decode each tile once.
    pub fn query_batch(&mut self, points: &[Point]) -> Vec<Option<f64>> {
        let results: Vec<Option<f64>> = points
            .iter()
            .map(|p| self.elevation(p.lat, p.lon))
            .collect();

        tracing::debug!(
            points = points.len(),
            missing = results.iter().filter(|e| e.is_none()).count(),
            "Batch query complete"
        );

        results
    }

    fn sample(&mut self, r: &SampleRef) -> Option<i16> {
        self.cache.get_tile(r.tile)?.sample(r.x, r.y)
    }

    /// Get cache statistics for this session.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Get the maximum cache size.
    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Grid layout of the underlying store.
    pub fn grid(&self) -> GridConfig {
        self.grid
    }
}

/// Builder for an [`ElevationQueryEngine`] over a directory store.
///
/// # Example
///
/// ```ignore
/// use dem_tiles::QueryEngineBuilder;
///
/// let engine = QueryEngineBuilder::new("/data/dem_tiles")
///     .cache_size(8)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct QueryEngineBuilder {
    store_path: PathBuf,
    cache_size: usize,
}

impl QueryEngineBuilder {
    /// Create a new builder for the store at `store_path`.
    pub fn new<P: AsRef<Path>>(store_path: P) -> Self {
        Self {
            store_path: store_path.as_ref().to_path_buf(),
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `DEM_STORE_PATH` | Tile store directory | Required |
    /// | `DEM_CACHE_SIZE` | Maximum tiles in cache | 4 |
    ///
    /// # Errors
    ///
    /// Returns [`DemError::StorageUnavailable`] if `DEM_STORE_PATH` is not set.
    pub fn from_env() -> Result<Self> {
        let store_path =
            std::env::var(STORE_PATH_ENV).map_err(|_| DemError::StorageUnavailable {
                path: PathBuf::new(),
                reason: format!("{STORE_PATH_ENV} environment variable not set"),
            })?;

        let cache_size = std::env::var(CACHE_SIZE_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE);

        Ok(Self::new(store_path).cache_size(cache_size))
    }

    /// Set the store directory.
    pub fn store_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.store_path = path.as_ref().to_path_buf();
        self
    }

    /// Set the maximum number of tiles to keep in cache.
    ///
    /// Default is 4 tiles.
    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Open the store and build the engine.
    pub fn build(self) -> Result<ElevationQueryEngine<DirTileStore>> {
        let store = DirTileStore::open(&self.store_path)?;
        Ok(ElevationQueryEngine::with_store(store, self.cache_size))
    }
}

/// Answer a batch of point queries against the store at `store_path`.
///
/// Each element of the result is an elevation in meters or `None` for no
/// data, in the same order as `points`.
///
/// # Errors
///
/// Only opening the store can fail.
pub fn query_batch<P: AsRef<Path>>(store_path: P, points: &[Point]) -> Result<Vec<Option<f64>>> {
    let mut engine = ElevationQueryEngine::open(store_path)?;
    Ok(engine.query_batch(points))
}
