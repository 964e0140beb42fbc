use anyhow::{Context, Result};
use dem_tiles::filename::cell_name;
use dem_tiles::TileStore;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::open_store;

pub fn run(store: Option<PathBuf>) -> Result<()> {
    let store = open_store(store)?;
    let ids = store.tile_ids().context("Failed to read tile store")?;

    if ids.is_empty() {
        println!("No tiles found in: {}", store.root().display());
        return Ok(());
    }

    // Tiles per cell, ordered by (lat, lon)
    let mut cells: BTreeMap<(i32, i32), usize> = BTreeMap::new();
    for id in &ids {
        *cells.entry((id.cell_lat, id.cell_lon)).or_default() += 1;
    }

    let per_cell = store.grid().tiles_per_cell();

    println!("{:<10} {:>8} {:>30}", "CELL", "TILES", "COVERAGE");
    println!("{}", "-".repeat(50));

    for (&(lat, lon), &count) in &cells {
        let lat_prefix = if lat >= 0 { "N" } else { "S" };
        let lon_prefix = if lon >= 0 { "E" } else { "W" };
        let next_lat_prefix = if lat + 1 >= 0 { "N" } else { "S" };
        let next_lon_prefix = if lon + 1 >= 0 { "E" } else { "W" };
        let coverage = format!(
            "{}{:02} to {}{:02}, {}{:03} to {}{:03}",
            lat_prefix,
            lat.abs(),
            next_lat_prefix,
            (lat + 1).abs(),
            lon_prefix,
            lon.abs(),
            next_lon_prefix,
            (lon + 1).abs()
        );
        let tiles = if count == per_cell {
            count.to_string()
        } else {
            format!("{}/{}", count, per_cell)
        };

        println!("{:<10} {:>8} {:>30}", cell_name(lat, lon), tiles, coverage);
    }

    // Summary
    println!();
    println!("Summary:");
    println!("  Total cells: {}", cells.len());
    println!("  Total tiles: {}", ids.len());
    println!("  Store: {}", store.root().display());

    Ok(())
}
