use std::io::Write;
use std::path::{Path, PathBuf};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dem_tiles::filename::cell_name;
use dem_tiles::{ElevationQueryEngine, GridConfig, Point, TileBuilder};
use tempfile::TempDir;

const SOURCE_SAMPLES: usize = 1201;

/// Create a synthetic source cell with a simple elevation gradient.
fn create_source(dir: &Path, lat: i32, lon: i32) {
    let mut data = Vec::with_capacity(SOURCE_SAMPLES * SOURCE_SAMPLES * 2);
    for row in 0..SOURCE_SAMPLES {
        for col in 0..SOURCE_SAMPLES {
            let elev = ((row + col) % 4000) as i16;
            data.extend_from_slice(&elev.to_be_bytes());
        }
    }
    let path = dir.join(format!("{}.hgt", cell_name(lat, lon)));
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(&data).unwrap();
}

/// Build a store from the given cells.
fn build_store(tmp: &TempDir, cells: &[(i32, i32)]) -> PathBuf {
    let src = tmp.path().join("hgt");
    std::fs::create_dir(&src).unwrap();
    for (lat, lon) in cells {
        create_source(&src, *lat, *lon);
    }
    let dest = tmp.path().join("tiles");
    TileBuilder::new(GridConfig::default())
        .build(&src, &dest)
        .unwrap();
    dest
}

fn bench_single_cached(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = build_store(&tmp, &[(35, 138)]);
    let mut engine = ElevationQueryEngine::open(&store).unwrap();

    // Warm the cache
    let _ = engine.elevation(35.3606, 138.7274);

    c.bench_function("single_cached", |b| {
        b.iter(|| black_box(engine.elevation(black_box(35.3606), black_box(138.7274))));
    });
}

fn bench_batch_same_tile(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = build_store(&tmp, &[(35, 138)]);
    let mut engine = ElevationQueryEngine::open(&store).unwrap();

    // 1000 points inside one sub-tile
    let points: Vec<Point> = (0..1000)
        .map(|i| {
            let frac = i as f64 / 1000.0;
            Point::new(35.76 + frac * 0.23, 138.01 + frac * 0.23)
        })
        .collect();

    c.bench_function("batch_1000_same_tile", |b| {
        b.iter(|| black_box(engine.query_batch(black_box(&points))));
    });
}

fn bench_batch_multi_cell(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = build_store(&tmp, &[(35, 138), (36, 138), (35, 139)]);

    // 1000 points spread across 3 cells, so the cache keeps cycling
    let points: Vec<Point> = (0..1000)
        .map(|i| match i % 3 {
            0 => Point::new(35.0 + (i as f64 / 3000.0) * 0.99, 138.5),
            1 => Point::new(36.0 + (i as f64 / 3000.0) * 0.99, 138.5),
            _ => Point::new(35.0 + (i as f64 / 3000.0) * 0.99, 139.5),
        })
        .collect();

    c.bench_function("batch_1000_multi_cell_cold", |b| {
        b.iter(|| {
            let mut engine = ElevationQueryEngine::open(&store).unwrap();
            black_box(engine.query_batch(black_box(&points)))
        });
    });
}

fn bench_build_cell(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("hgt");
    std::fs::create_dir(&src).unwrap();
    create_source(&src, 39, 2);

    let mut run = 0;
    c.bench_function("build_one_cell", |b| {
        b.iter(|| {
            run += 1;
            let dest = tmp.path().join(format!("tiles-{run}"));
            black_box(
                TileBuilder::new(GridConfig::default())
                    .build(&src, &dest)
                    .unwrap(),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_single_cached,
    bench_batch_same_tile,
    bench_batch_multi_cell,
    bench_build_cell,
);
criterion_main!(benches);
