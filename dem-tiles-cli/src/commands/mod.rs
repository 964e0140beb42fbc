pub mod batch;
pub mod build;
pub mod info;
pub mod list;
pub mod query;

use anyhow::{Context, Result};
use dem_tiles::{DirTileStore, ElevationQueryEngine};
use std::path::PathBuf;

/// Resolve the store directory from `--store` or `DEM_STORE_PATH`.
pub fn store_path(store: Option<PathBuf>) -> Result<PathBuf> {
    store.context("No tile store given. Use --store or set DEM_STORE_PATH")
}

/// Open the store and wrap it in a query engine.
pub fn open_engine(store: Option<PathBuf>, cache_size: usize) -> Result<ElevationQueryEngine> {
    let path = store_path(store)?;
    ElevationQueryEngine::builder(&path)
        .cache_size(cache_size)
        .build()
        .with_context(|| format!("Failed to open tile store {}", path.display()))
}

/// Open the store for inspection.
pub fn open_store(store: Option<PathBuf>) -> Result<DirTileStore> {
    let path = store_path(store)?;
    DirTileStore::open(&path)
        .with_context(|| format!("Failed to open tile store {}", path.display()))
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
