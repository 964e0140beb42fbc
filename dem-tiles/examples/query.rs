//! Query a built tile store.
//!
//! Run with: cargo run --example query -- /path/to/dem_tiles

use dem_tiles::{DemError, ElevationQueryEngine, Point};
use std::env;

fn main() -> Result<(), DemError> {
    let store_path = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example query -- /path/to/dem_tiles");
        std::process::exit(1);
    });

    let mut engine = ElevationQueryEngine::open(&store_path)?;

    // Query some famous peaks
    let locations = [
        ("Mount Fuji, Japan", 35.3606, 138.7274),
        ("Mount Everest, Nepal", 27.9881, 86.9250),
        ("Denali, Alaska", 63.0695, -151.0074),
    ];

    println!("Elevation queries (bilinear):");
    println!("{:-<50}", "");

    let points: Vec<Point> = locations
        .iter()
        .map(|(_, lat, lon)| Point::new(*lat, *lon))
        .collect();
    for ((name, _, _), elevation) in locations.iter().zip(engine.query_batch(&points)) {
        match elevation {
            Some(e) => println!("{}: {:.1}m", name, e),
            None => println!("{}: no data", name),
        }
    }

    // Show cache statistics
    let stats = engine.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached tiles: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
