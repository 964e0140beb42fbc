//! Offline conversion of raw `.hgt` grids into a tile store.
//!
//! Each source file covers one 1° cell as `(N+1) × (N+1)` big-endian `i16`
//! samples, north row first. The last row and column repeat the first row
//! and column of the neighbouring cells and are dropped. The remaining
//! `N × N` grid is cut into sub-tiles with [`GridConfig::sample_ref`], the
//! same mapping the query path uses, and every sub-tile is compressed and
//! stored on its own.
//!
//! Files are independent of each other (disjoint keys), so they are
//! processed in parallel by a [`FileExecutor`].

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use memmap2::Mmap;
use rayon::prelude::*;

use crate::addressing::TileId;
use crate::error::{DemError, Result};
use crate::filename::{filename_to_lat_lon, SourceKind};
use crate::grid::GridConfig;
use crate::store::{DirTileStore, TileStore};
use crate::tile::{Tile, DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL};

/// Receives per-file build outcomes. Calls come from worker threads and
/// must return quickly.
pub trait ProgressSink: Sync {
    /// Called once per source file, when its tiles are written or it failed.
    fn file_done(&self, path: &Path, outcome: &Result<usize>);
}

/// A [`ProgressSink`] that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn file_done(&self, _path: &Path, _outcome: &Result<usize>) {}
}

/// Per-file operation handed to a [`FileExecutor`].
pub type FileOp<'a> = dyn Fn(&Path) -> Result<usize> + Sync + 'a;

/// Applies a per-file operation over a list of files.
///
/// Results are returned in the order of `files`.
pub trait FileExecutor: Send + Sync {
    fn run(&self, files: &[PathBuf], op: &FileOp<'_>) -> Vec<Result<usize>>;
}

/// Runs files on a rayon pool.
///
/// With no explicit thread count the global pool is used, which is sized to
/// the available cores.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonExecutor {
    threads: Option<usize>,
}

impl RayonExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a dedicated pool with `threads` workers.
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: Some(threads.max(1)),
        }
    }
}

impl FileExecutor for RayonExecutor {
    fn run(&self, files: &[PathBuf], op: &FileOp<'_>) -> Vec<Result<usize>> {
        let run_all = || -> Vec<Result<usize>> { files.par_iter().map(|f| op(f)).collect() };

        match self.threads {
            None => run_all(),
            Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => pool.install(run_all),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not create build pool, using global pool");
                    run_all()
                }
            },
        }
    }
}

/// Runs files one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl FileExecutor for SequentialExecutor {
    fn run(&self, files: &[PathBuf], op: &FileOp<'_>) -> Vec<Result<usize>> {
        files.iter().map(|f| op(f)).collect()
    }
}

/// Outcome of a [`TileBuilder::build`] run.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Number of source files found.
    pub files_total: usize,
    /// Number of files whose tiles were all written.
    pub files_built: usize,
    /// Number of tiles written.
    pub tiles_written: usize,
    /// Files that failed, with the reason.
    pub failures: Vec<(PathBuf, DemError)>,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

impl BuildReport {
    /// Whether every source file was built.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds a tile store from a directory of raw grid files.
///
/// # Example
///
/// ```ignore
/// use dem_tiles::{GridConfig, TileBuilder};
///
/// let report = TileBuilder::new(GridConfig::default())
///     .compression_level(8)
///     .build("/data/hgt", "/data/dem_tiles")?;
/// println!("{} tiles from {} files", report.tiles_written, report.files_built);
/// ```
pub struct TileBuilder {
    grid: GridConfig,
    compression_level: u32,
    executor: Box<dyn FileExecutor>,
}

impl TileBuilder {
    /// Create a builder for the given grid, running on the global rayon pool.
    pub fn new(grid: GridConfig) -> Self {
        Self {
            grid,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            executor: Box::new(RayonExecutor::new()),
        }
    }

    /// Set the zlib level (0-9) for stored tiles. Default is 8.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(MAX_COMPRESSION_LEVEL);
        self
    }

    /// Replace the executor that dispatches per-file work.
    pub fn executor<E: FileExecutor + 'static>(mut self, executor: E) -> Self {
        self.executor = Box::new(executor);
        self
    }

    /// Run on a dedicated rayon pool of `threads` workers.
    pub fn threads(self, threads: usize) -> Self {
        self.executor(RayonExecutor::with_threads(threads))
    }

    /// Grid the builder partitions into.
    pub fn grid(&self) -> GridConfig {
        self.grid
    }

    /// Build a new store at `destination` from the files in `source_dir`.
    ///
    /// # Errors
    ///
    /// Fails before writing anything with [`DemError::DestinationExists`] if
    /// `destination` already exists, or with an IO error if `source_dir`
    /// cannot be listed. Problems with individual files do not abort the
    /// build; they are collected in [`BuildReport::failures`].
    pub fn build<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source_dir: P,
        destination: Q,
    ) -> Result<BuildReport> {
        self.build_with_progress(source_dir, destination, &NoProgress)
    }

    /// Like [`Self::build`], reporting each finished file to `progress`.
    pub fn build_with_progress<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source_dir: P,
        destination: Q,
        progress: &dyn ProgressSink,
    ) -> Result<BuildReport> {
        let start = Instant::now();
        let destination = destination.as_ref();
        self.grid.validate()?;

        if fs::symlink_metadata(destination).is_ok() {
            return Err(DemError::DestinationExists {
                path: destination.to_path_buf(),
            });
        }

        let files = discover_sources(source_dir.as_ref())?;
        let store = DirTileStore::create(destination, self.grid, self.compression_level)?;

        tracing::info!(
            source_dir = %source_dir.as_ref().display(),
            destination = %destination.display(),
            files = files.len(),
            "Building tile store"
        );

        let op = |path: &Path| {
            let outcome = self.build_file(path, &store);
            progress.file_done(path, &outcome);
            outcome
        };
        let results = self.executor.run(&files, &op);

        let mut report = BuildReport {
            files_total: files.len(),
            ..Default::default()
        };
        for (path, result) in files.into_iter().zip(results) {
            match result {
                Ok(tiles) => {
                    report.files_built += 1;
                    report.tiles_written += tiles;
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Source file skipped");
                    report.failures.push((path, e));
                }
            }
        }
        report.elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            files_built = report.files_built,
            files_failed = report.failures.len(),
            tiles_written = report.tiles_written,
            elapsed_ms = report.elapsed_ms,
            "Build complete"
        );

        Ok(report)
    }

    /// Convert one source file and write its tiles to `store`.
    ///
    /// Returns the number of tiles written.
    pub fn build_file(&self, path: &Path, store: &dyn TileStore) -> Result<usize> {
        let malformed = |reason: &str| DemError::MalformedSourceFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| malformed("file name is not valid UTF-8"))?;
        let kind = SourceKind::from_name(name)
            .ok_or_else(|| malformed("expected a .hgt or .hgt.zip file"))?;
        let (cell_lat, cell_lon) = filename_to_lat_lon(name)
            .ok_or_else(|| malformed("name does not match [NS]DD[EW]DDD"))?;

        let samples = read_source(path, kind, &self.grid)?;
        let tiles = split_cell(&self.grid, cell_lat, cell_lon, &samples)?;
        store.put_batch(&tiles)?;

        tracing::debug!(file = name, cell_lat, cell_lon, tiles = tiles.len(), "Cell built");

        Ok(tiles.len())
    }
}

/// List the source files a build of `dir` would process, sorted by path.
///
/// Symlinks are followed, so a directory of links to source files builds
/// the same store as one holding the files themselves.
pub fn discover_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(SourceKind::from_name)
                .is_some()
        })
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Read a source file and return its trimmed `N × N` native-order grid.
fn read_source(path: &Path, kind: SourceKind, grid: &GridConfig) -> Result<Vec<i16>> {
    match kind {
        SourceKind::Hgt => {
            let file = File::open(path)?;

            // SAFETY: Memory mapping is safe as long as the file is not modified
            // while mapped. We open the file read-only and drop the mapping
            // before returning.
            let mmap = unsafe { Mmap::map(&file)? };
            trim_source(path, &mmap, grid)
        }
        SourceKind::HgtZip => {
            let bytes = read_zipped_hgt(path, grid)?;
            trim_source(path, &bytes, grid)
        }
    }
}

/// Extract the first `.hgt` entry of a ZIP archive.
fn read_zipped_hgt(path: &Path, grid: &GridConfig) -> Result<Vec<u8>> {
    let malformed = |reason: String| DemError::MalformedSourceFile {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| malformed(format!("invalid ZIP archive: {e}")))?;

    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| malformed(format!("unreadable ZIP entry: {e}")))?;
        if !entry.name().to_ascii_lowercase().ends_with(".hgt") {
            continue;
        }

        // Refuse to inflate entries of the wrong size
        let expected = source_len(grid);
        if entry.size() != expected as u64 {
            return Err(malformed(format!(
                "{} is {} bytes, expected {}",
                entry.name(),
                entry.size(),
                expected
            )));
        }

        let mut bytes = Vec::with_capacity(expected);
        entry.take(expected as u64).read_to_end(&mut bytes)?;
        return Ok(bytes);
    }

    Err(malformed("no .hgt entry in archive".to_string()))
}

/// Size in bytes of a raw source file for `grid`.
fn source_len(grid: &GridConfig) -> usize {
    grid.source_samples() * grid.source_samples() * 2
}

/// Drop the overlap row and column and convert to native order.
fn trim_source(path: &Path, bytes: &[u8], grid: &GridConfig) -> Result<Vec<i16>> {
    let expected = source_len(grid);
    if bytes.len() != expected {
        return Err(DemError::MalformedSourceFile {
            path: path.to_path_buf(),
            reason: format!("{} bytes, expected {}", bytes.len(), expected),
        });
    }

    let n = grid.samples_per_degree;
    let stride = grid.source_samples();
    let mut samples = Vec::with_capacity(n * n);
    for row in 0..n {
        let line = &bytes[row * stride * 2..(row * stride + n) * 2];
        samples.extend(line.chunks_exact(2).map(|b| i16::from_be_bytes([b[0], b[1]])));
    }

    Ok(samples)
}

/// Cut a trimmed cell grid into its sub-tiles.
fn split_cell(
    grid: &GridConfig,
    cell_lat: i32,
    cell_lon: i32,
    samples: &[i16],
) -> Result<Vec<(TileId, Tile)>> {
    let n = grid.samples_per_degree;
    let size = grid.tile_size();
    debug_assert_eq!(samples.len(), n * n);

    let mut parts = vec![vec![0i16; size * size]; grid.tiles_per_cell()];
    for row in 0..n {
        for col in 0..n {
            let r = grid.sample_ref(cell_lat, cell_lon, row, col);
            parts[usize::from(r.tile.sub_tile)][r.y * size + r.x] = samples[row * n + col];
        }
    }

    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| {
            let id = TileId::new(cell_lat, cell_lon, i as u8);
            Ok((id, Tile::from_samples(size, part)?))
        })
        .collect()
}
