use anyhow::Result;
use dem_tiles::protocol::format_elevation;
use serde::Serialize;
use std::path::PathBuf;

use super::open_engine;

#[derive(Serialize)]
struct ElevationResponse {
    lat: f64,
    lon: f64,
    elevation: Option<f64>,
}

pub fn run(
    store: Option<PathBuf>,
    cache_size: usize,
    lat: f64,
    lon: f64,
    json: bool,
) -> Result<()> {
    let mut engine = open_engine(store, cache_size)?;
    let elevation = engine.elevation(lat, lon);

    if json {
        let response = ElevationResponse {
            lat,
            lon,
            elevation,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{}", format_elevation(elevation));
    }

    Ok(())
}
