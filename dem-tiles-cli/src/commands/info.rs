use anyhow::{Context, Result};
use dem_tiles::TileStore;
use std::path::PathBuf;

use super::{format_size, open_store};

pub fn run(store: Option<PathBuf>) -> Result<()> {
    let store = open_store(store)?;
    let grid = store.grid();
    let stats = store.stats().context("Failed to scan tile store")?;

    println!("Store: {}", store.root().display());
    println!();
    println!(
        "Grid: {}x{} samples per degree, {}x{} tiles of {}x{}",
        grid.samples_per_degree,
        grid.samples_per_degree,
        grid.tiles_per_side,
        grid.tiles_per_side,
        grid.tile_size(),
        grid.tile_size()
    );
    println!("Compression level: {}", store.compression_level());
    println!();
    println!("Cells: {}", stats.cell_count);
    println!("Tiles: {}", stats.tile_count);
    println!("Total size: {}", format_size(stats.total_bytes));

    let expected = stats.cell_count * grid.tiles_per_cell() as u64;
    if stats.tile_count < expected {
        println!(
            "Incomplete cells: {} tiles missing",
            expected - stats.tile_count
        );
    }

    Ok(())
}
