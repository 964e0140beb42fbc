use anyhow::{bail, Context, Result};
use dem_tiles::builder::discover_sources;
use dem_tiles::{GridConfig, ProgressSink, TileBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::format_size;

/// Progress bar advanced once per finished source file.
struct BarProgress {
    bar: ProgressBar,
}

impl ProgressSink for BarProgress {
    fn file_done(&self, path: &Path, outcome: &dem_tiles::Result<usize>) {
        if let Err(e) = outcome {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            self.bar.println(format!("skipped {}: {}", name, e));
        }
        self.bar.inc(1);
    }
}

pub fn run(
    source_dir: PathBuf,
    destination: PathBuf,
    threads: Option<usize>,
    level: u32,
) -> Result<()> {
    if !source_dir.is_dir() {
        bail!("Source directory does not exist: {}", source_dir.display());
    }

    let total = discover_sources(&source_dir)
        .context("Failed to read source directory")?
        .len();
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(200));

    let mut builder = TileBuilder::new(GridConfig::default()).compression_level(level);
    if let Some(n) = threads {
        builder = builder.threads(n);
    }

    let progress = BarProgress { bar };
    let report = builder
        .build_with_progress(&source_dir, &destination, &progress)
        .context("Build failed")?;
    progress.bar.finish_with_message("done");

    let size = dem_tiles::DirTileStore::open(&destination)
        .and_then(|store| store.stats())
        .map(|stats| format_size(stats.total_bytes))
        .unwrap_or_else(|_| "unknown".to_string());

    println!();
    println!("Summary:");
    println!("  Source files: {}", report.files_total);
    println!("  Built: {}", report.files_built);
    println!("  Failed: {}", report.failures.len());
    println!("  Tiles written: {}", report.tiles_written);
    println!("  Store size: {}", size);
    println!("  Elapsed: {:.1}s", report.elapsed_ms as f64 / 1000.0);
    println!("  Store: {}", destination.display());

    if !report.is_success() {
        for (path, e) in &report.failures {
            eprintln!("  {}: {}", path.display(), e);
        }
        bail!("{} source file(s) failed", report.failures.len());
    }

    Ok(())
}
