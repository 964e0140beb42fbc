//! Persistent key-value storage of compressed tiles.
//!
//! [`TileStore`] is the seam between the query path and the storage
//! backend. Two backends ship with the crate:
//!
//! - [`DirTileStore`]: one file per tile under a store directory, plus a
//!   JSON manifest recording the grid the store was built with.
//! - [`MemoryTileStore`]: the same contract kept in memory.
//!
//! Tiles are write-once. A second `put` for the same key fails with
//! [`DemError::DuplicateKey`], and a tile is either fully stored or absent.
//!
//! # Directory layout
//!
//! ```text
//! <root>/manifest.json
//! <root>/tiles/<cell_lat>_<cell_lon>_<sub_tile>.z
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::addressing::TileId;
use crate::error::{DemError, Result};
use crate::grid::GridConfig;
use crate::tile::{check_compression_level, Tile, DEFAULT_COMPRESSION_LEVEL};

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const TILES_DIR: &str = "tiles";
const TILE_EXT: &str = ".z";

/// Keyed storage of compressed tiles.
pub trait TileStore: Send + Sync {
    /// Grid layout of the tiles in this store.
    fn grid(&self) -> GridConfig;

    /// Fetch and decompress one tile. `Ok(None)` means the tile is absent.
    fn get(&self, id: TileId) -> Result<Option<Tile>>;

    /// Store a new tile.
    ///
    /// # Errors
    ///
    /// Returns [`DemError::DuplicateKey`] if the key is already present.
    fn put(&self, id: TileId, tile: &Tile) -> Result<()>;

    /// Store several tiles through one handle. Each tile is written
    /// atomically on its own.
    fn put_batch(&self, tiles: &[(TileId, Tile)]) -> Result<()> {
        for (id, tile) in tiles {
            self.put(*id, tile)?;
        }
        Ok(())
    }
}

impl<S: TileStore + ?Sized> TileStore for &S {
    fn grid(&self) -> GridConfig {
        (**self).grid()
    }

    fn get(&self, id: TileId) -> Result<Option<Tile>> {
        (**self).get(id)
    }

    fn put(&self, id: TileId, tile: &Tile) -> Result<()> {
        (**self).put(id, tile)
    }

    fn put_batch(&self, tiles: &[(TileId, Tile)]) -> Result<()> {
        (**self).put_batch(tiles)
    }
}

impl<S: TileStore + ?Sized> TileStore for Arc<S> {
    fn grid(&self) -> GridConfig {
        (**self).grid()
    }

    fn get(&self, id: TileId) -> Result<Option<Tile>> {
        (**self).get(id)
    }

    fn put(&self, id: TileId, tile: &Tile) -> Result<()> {
        (**self).put(id, tile)
    }

    fn put_batch(&self, tiles: &[(TileId, Tile)]) -> Result<()> {
        (**self).put_batch(tiles)
    }
}

/// Reject tiles that do not fit the store's grid.
fn check_fits(grid: &GridConfig, id: TileId, tile: &Tile) -> Result<()> {
    if tile.size() != grid.tile_size() {
        return Err(DemError::InvalidTile {
            reason: format!(
                "tile {id} has size {}, store expects {}",
                tile.size(),
                grid.tile_size()
            ),
        });
    }
    if usize::from(id.sub_tile) >= grid.tiles_per_cell() {
        return Err(DemError::InvalidTile {
            reason: format!(
                "sub-tile index {} out of range (0..{})",
                id.sub_tile,
                grid.tiles_per_cell()
            ),
        });
    }
    Ok(())
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    grid: GridConfig,
    compression_level: u32,
}

/// Summary of the tiles held by a [`DirTileStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Number of stored tiles.
    pub tile_count: u64,
    /// Number of distinct 1° cells with at least one tile.
    pub cell_count: u64,
    /// Total size of the compressed blobs in bytes.
    pub total_bytes: u64,
}

/// A tile store backed by a directory with one file per tile.
///
/// The handle is cheap and `Sync`; several readers (or builder workers) can
/// share one through `&DirTileStore` or `Arc<DirTileStore>`.
///
/// # Example
///
/// ```ignore
/// use dem_tiles::{DirTileStore, TileStore};
///
/// let store = DirTileStore::open("/data/dem_tiles")?;
/// println!("Tile size: {}", store.grid().tile_size());
/// ```
#[derive(Debug)]
pub struct DirTileStore {
    /// Store root directory.
    root: PathBuf,
    /// Directory holding the tile blobs.
    tiles_dir: PathBuf,
    /// Grid the store was built with.
    grid: GridConfig,
    /// zlib level used for new tiles.
    compression_level: u32,
}

impl DirTileStore {
    /// Create a new, empty store at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`DemError::DestinationExists`] if anything already exists at
    /// `root`, so tile generations are never mixed, and
    /// [`DemError::InvalidCompressionLevel`] for levels above 9.
    pub fn create<P: AsRef<Path>>(root: P, grid: GridConfig, compression_level: u32) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        grid.validate()?;
        check_compression_level(compression_level)?;

        if fs::symlink_metadata(&root).is_ok() {
            return Err(DemError::DestinationExists { path: root });
        }
        if let Some(parent) = root.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        match fs::create_dir(&root) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DemError::DestinationExists { path: root });
            }
            Err(e) => return Err(e.into()),
        }

        let tiles_dir = root.join(TILES_DIR);
        fs::create_dir(&tiles_dir)?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            grid,
            compression_level,
        };
        let mut tmp = NamedTempFile::new_in(&root)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), &manifest)?;
        tmp.as_file_mut().flush()?;
        tmp.persist(root.join(MANIFEST_FILE))
            .map_err(|e| DemError::Io(e.error))?;

        tracing::debug!(root = %root.display(), ?grid, "Created tile store");

        Ok(Self {
            root,
            tiles_dir,
            grid,
            compression_level,
        })
    }

    /// Open an existing store.
    ///
    /// # Errors
    ///
    /// Returns [`DemError::StorageUnavailable`] if the directory or its
    /// manifest is missing or unreadable.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let unavailable = |reason: String| DemError::StorageUnavailable {
            path: root.clone(),
            reason,
        };

        let text = fs::read_to_string(root.join(MANIFEST_FILE))
            .map_err(|e| unavailable(format!("cannot read {MANIFEST_FILE}: {e}")))?;
        let manifest: Manifest = serde_json::from_str(&text)
            .map_err(|e| unavailable(format!("invalid {MANIFEST_FILE}: {e}")))?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(unavailable(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        manifest
            .grid
            .validate()
            .map_err(|e| unavailable(e.to_string()))?;
        check_compression_level(manifest.compression_level)
            .map_err(|e| unavailable(e.to_string()))?;

        let tiles_dir = root.join(TILES_DIR);
        if !tiles_dir.is_dir() {
            return Err(unavailable(format!("missing {TILES_DIR}/ directory")));
        }

        Ok(Self {
            root,
            tiles_dir,
            grid: manifest.grid,
            compression_level: manifest.compression_level,
        })
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// zlib level used for new tiles.
    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    fn tile_path(&self, id: TileId) -> PathBuf {
        self.tiles_dir.join(format!("{id}{TILE_EXT}"))
    }

    /// List the keys of all stored tiles, sorted.
    pub fn tile_ids(&self) -> Result<Vec<TileId>> {
        let mut ids: Vec<TileId> = fs::read_dir(&self.tiles_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                TileId::parse(name.strip_suffix(TILE_EXT)?)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Count tiles, cells and bytes in the store.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        let mut cells = HashSet::new();

        for id in self.tile_ids()? {
            stats.tile_count += 1;
            cells.insert((id.cell_lat, id.cell_lon));
            if let Ok(meta) = fs::metadata(self.tile_path(id)) {
                stats.total_bytes += meta.len();
            }
        }
        stats.cell_count = cells.len() as u64;

        Ok(stats)
    }
}

impl TileStore for DirTileStore {
    fn grid(&self) -> GridConfig {
        self.grid
    }

    fn get(&self, id: TileId) -> Result<Option<Tile>> {
        let blob = match fs::read(self.tile_path(id)) {
            Ok(blob) => blob,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Tile::decode(id, &blob, self.grid.tile_size()).map(Some)
    }

    fn put(&self, id: TileId, tile: &Tile) -> Result<()> {
        check_fits(&self.grid, id, tile)?;
        let blob = tile.encode(self.compression_level)?;

        // Write aside, then move into place without replacing an existing key
        let mut tmp = NamedTempFile::new_in(&self.tiles_dir)?;
        tmp.write_all(&blob)?;
        tmp.flush()?;
        tmp.persist_noclobber(self.tile_path(id)).map_err(|e| {
            if e.error.kind() == ErrorKind::AlreadyExists {
                DemError::DuplicateKey { id }
            } else {
                DemError::Io(e.error)
            }
        })?;

        Ok(())
    }
}

/// An in-memory tile store holding compressed blobs.
///
/// Follows the same write-once contract as [`DirTileStore`].
#[derive(Debug)]
pub struct MemoryTileStore {
    grid: GridConfig,
    compression_level: u32,
    tiles: RwLock<HashMap<TileId, Vec<u8>>>,
}

impl MemoryTileStore {
    /// Create an empty store for the given grid.
    pub fn new(grid: GridConfig) -> Self {
        Self {
            grid,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            tiles: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored tiles.
    pub fn len(&self) -> usize {
        self.tiles.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted keys of all stored tiles.
    pub fn tile_ids(&self) -> Vec<TileId> {
        let mut ids: Vec<TileId> = self
            .tiles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }
}

impl TileStore for MemoryTileStore {
    fn grid(&self) -> GridConfig {
        self.grid
    }

    fn get(&self, id: TileId) -> Result<Option<Tile>> {
        let tiles = self.tiles.read().unwrap_or_else(|e| e.into_inner());
        match tiles.get(&id) {
            Some(blob) => Tile::decode(id, blob, self.grid.tile_size()).map(Some),
            None => Ok(None),
        }
    }

    fn put(&self, id: TileId, tile: &Tile) -> Result<()> {
        check_fits(&self.grid, id, tile)?;
        let blob = tile.encode(self.compression_level)?;

        let mut tiles = self.tiles.write().unwrap_or_else(|e| e.into_inner());
        if tiles.contains_key(&id) {
            return Err(DemError::DuplicateKey { id });
        }
        tiles.insert(id, blob);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::VOID_VALUE;
    use tempfile::TempDir;

    fn small_grid() -> GridConfig {
        GridConfig::new(8, 2).unwrap()
    }

    fn filled_tile(size: usize, value: i16) -> Tile {
        Tile::from_samples(size, vec![value; size * size]).unwrap()
    }

    #[test]
    fn test_create_and_open() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("store");

        let store = DirTileStore::create(&root, small_grid(), 6).unwrap();
        assert_eq!(store.grid(), small_grid());
        drop(store);

        let store = DirTileStore::open(&root).unwrap();
        assert_eq!(store.grid(), small_grid());
        assert_eq!(store.compression_level(), 6);
        assert_eq!(store.root(), root.as_path());
    }

    #[test]
    fn test_create_existing_destination() {
        let temp_dir = TempDir::new().unwrap();

        // The temp dir itself already exists
        let result = DirTileStore::create(temp_dir.path(), small_grid(), 6);
        assert!(matches!(result, Err(DemError::DestinationExists { .. })));

        // A plain file is also an existing destination
        let file = temp_dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        let result = DirTileStore::create(&file, small_grid(), 6);
        assert!(matches!(result, Err(DemError::DestinationExists { .. })));
    }

    #[test]
    fn test_open_missing_store() {
        let temp_dir = TempDir::new().unwrap();

        let result = DirTileStore::open(temp_dir.path().join("nope"));
        assert!(matches!(result, Err(DemError::StorageUnavailable { .. })));

        // Directory without a manifest
        let result = DirTileStore::open(temp_dir.path());
        assert!(matches!(result, Err(DemError::StorageUnavailable { .. })));
    }

    #[test]
    fn test_open_bad_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("store");
        DirTileStore::create(&root, small_grid(), 6).unwrap();

        fs::write(root.join(MANIFEST_FILE), b"{ not json").unwrap();
        let result = DirTileStore::open(&root);
        assert!(matches!(result, Err(DemError::StorageUnavailable { .. })));

        fs::write(
            root.join(MANIFEST_FILE),
            br#"{"format_version":99,"grid":{"samples_per_degree":8,"tiles_per_side":2},"compression_level":6}"#,
        )
        .unwrap();
        match DirTileStore::open(&root) {
            Err(DemError::StorageUnavailable { reason, .. }) => assert!(reason.contains("99")),
            other => panic!("Expected StorageUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_compression_level_out_of_range() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("store");

        let result = DirTileStore::create(&root, small_grid(), 200);
        assert!(matches!(
            result,
            Err(DemError::InvalidCompressionLevel { level: 200 })
        ));
        assert!(!root.exists());

        // A hand-edited manifest is refused on open instead of failing on put
        DirTileStore::create(&root, small_grid(), 9).unwrap();
        fs::write(
            root.join(MANIFEST_FILE),
            br#"{"format_version":1,"grid":{"samples_per_degree":8,"tiles_per_side":2},"compression_level":200}"#,
        )
        .unwrap();
        match DirTileStore::open(&root) {
            Err(DemError::StorageUnavailable { reason, .. }) => assert!(reason.contains("200")),
            other => panic!("Expected StorageUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_put_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirTileStore::create(temp_dir.path().join("s"), small_grid(), 6).unwrap();
        let id = TileId::new(39, 2, 3);

        assert!(store.get(id).unwrap().is_none());

        let tile = Tile::from_samples(4, (0..16).collect()).unwrap();
        store.put(id, &tile).unwrap();

        let fetched = store.get(id).unwrap().unwrap();
        assert_eq!(fetched, tile);
        assert_eq!(fetched.sample(3, 3), Some(15));
    }

    #[test]
    fn test_put_duplicate_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirTileStore::create(temp_dir.path().join("s"), small_grid(), 6).unwrap();
        let id = TileId::new(-1, -1, 0);

        store.put(id, &filled_tile(4, 10)).unwrap();
        match store.put(id, &filled_tile(4, 20)) {
            Err(DemError::DuplicateKey { id: got }) => assert_eq!(got, id),
            other => panic!("Expected DuplicateKey, got {:?}", other),
        }

        // The first write wins
        let fetched = store.get(id).unwrap().unwrap();
        assert_eq!(fetched.sample(0, 0), Some(10));
    }

    #[test]
    fn test_put_rejects_mismatched_tile() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirTileStore::create(temp_dir.path().join("s"), small_grid(), 6).unwrap();

        let result = store.put(TileId::new(0, 0, 0), &filled_tile(5, 1));
        assert!(matches!(result, Err(DemError::InvalidTile { .. })));

        let result = store.put(TileId::new(0, 0, 4), &filled_tile(4, 1));
        assert!(matches!(result, Err(DemError::InvalidTile { .. })));
    }

    #[test]
    fn test_corrupt_blob() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirTileStore::create(temp_dir.path().join("s"), small_grid(), 6).unwrap();
        let id = TileId::new(5, 5, 1);

        fs::write(store.tile_path(id), b"garbage").unwrap();
        assert!(matches!(store.get(id), Err(DemError::CorruptTile { .. })));
    }

    #[test]
    fn test_tile_ids_and_stats() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirTileStore::create(temp_dir.path().join("s"), small_grid(), 6).unwrap();

        store.put(TileId::new(1, 1, 2), &filled_tile(4, 1)).unwrap();
        store.put(TileId::new(1, 1, 0), &filled_tile(4, 1)).unwrap();
        store.put(TileId::new(-3, 7, 1), &filled_tile(4, VOID_VALUE)).unwrap();

        let ids = store.tile_ids().unwrap();
        assert_eq!(
            ids,
            vec![
                TileId::new(-3, 7, 1),
                TileId::new(1, 1, 0),
                TileId::new(1, 1, 2)
            ]
        );

        let stats = store.stats().unwrap();
        assert_eq!(stats.tile_count, 3);
        assert_eq!(stats.cell_count, 2);
        assert!(stats.total_bytes > 0);
    }

    #[test]
    fn test_concurrent_put_same_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirTileStore::create(temp_dir.path().join("s"), small_grid(), 6).unwrap();
        let id = TileId::new(0, 0, 0);

        let results: Vec<Result<()>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = &store;
                    s.spawn(move || store.put(id, &filled_tile(4, i)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, DemError::DuplicateKey { .. })));
        assert_eq!(store.tile_ids().unwrap().len(), 1);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTileStore::new(small_grid());
        let id = TileId::new(10, 20, 1);
        assert!(store.is_empty());
        assert!(store.get(id).unwrap().is_none());

        store
            .put_batch(&[(id, filled_tile(4, 7)), (TileId::new(10, 20, 0), filled_tile(4, 8))])
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(id).unwrap().unwrap().sample(1, 1), Some(7));
        assert!(matches!(
            store.put(id, &filled_tile(4, 9)),
            Err(DemError::DuplicateKey { .. })
        ));
        assert_eq!(store.tile_ids()[0], TileId::new(10, 20, 0));
    }

    #[test]
    fn test_shared_store_impls() {
        let store = Arc::new(MemoryTileStore::new(small_grid()));
        let id = TileId::new(0, 0, 0);

        let by_ref: &MemoryTileStore = &store;
        TileStore::put(&by_ref, id, &filled_tile(4, 3)).unwrap();

        let shared: Arc<MemoryTileStore> = Arc::clone(&store);
        assert_eq!(TileStore::grid(&shared), small_grid());
        assert!(TileStore::get(&shared, id).unwrap().is_some());
    }
}
