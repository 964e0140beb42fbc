use anyhow::{Context, Result};
use dem_tiles::protocol::{format_elevation, parse_points};
use dem_tiles::{ElevationQueryEngine, Point};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::open_engine;

pub fn run(
    store: Option<PathBuf>,
    cache_size: usize,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    lat_col: String,
    lon_col: String,
) -> Result<()> {
    let mut engine = open_engine(store, cache_size)?;

    let is_csv = input
        .as_deref()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    match input {
        Some(input) if is_csv => process_csv(&mut engine, &input, output, &lat_col, &lon_col),
        input => process_lines(&mut engine, input.as_deref(), output.as_deref()),
    }
}

fn process_csv(
    engine: &mut ElevationQueryEngine,
    input: &Path,
    output: Option<PathBuf>,
    lat_col: &str,
    lon_col: &str,
) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    // Find column indices
    let headers = reader.headers()?.clone();
    let lat_idx = headers
        .iter()
        .position(|h| h == lat_col)
        .with_context(|| format!("Column '{}' not found in CSV", lat_col))?;
    let lon_idx = headers
        .iter()
        .position(|h| h == lon_col)
        .with_context(|| format!("Column '{}' not found in CSV", lon_col))?;

    // Collect records for progress bar
    let records: Vec<_> = reader.records().collect::<Result<_, _>>()?;
    let total = records.len() as u64;

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    // Prepare output
    let output_path = output.unwrap_or_else(|| default_csv_output(input));
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    // Write header
    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.push("elevation");
    writer.write_record(&new_headers)?;

    // Process records
    for (i, record) in records.iter().enumerate() {
        let lat: f64 = parse_field(record.get(lat_idx), "latitude", i)?;
        let lon: f64 = parse_field(record.get(lon_idx), "longitude", i)?;

        let elevation = format_elevation(engine.elevation(lat, lon));

        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.push(&elevation);
        writer.write_record(&new_record)?;

        pb.inc(1);
    }

    pb.finish_with_message("done");
    writer.flush()?;

    let stats = engine.cache_stats();
    tracing::info!(
        records = total,
        hit_rate = stats.hit_rate(),
        "CSV batch complete"
    );

    eprintln!("Output written to: {}", output_path.display());
    Ok(())
}

fn parse_field(field: Option<&str>, what: &str, record: usize) -> Result<f64> {
    field
        .with_context(|| format!("Missing {} in record {}", what, record + 1))?
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} in record {}", what, record + 1))
}

/// `points.csv` becomes `points_elevation.csv` next to it.
fn default_csv_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_elevation.csv", stem))
}

/// Line protocol: one "lat lon" per line in, one value per line out.
fn process_lines(
    engine: &mut ElevationQueryEngine,
    input: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let mut body = String::new();
    match input {
        Some(path) => {
            File::open(path)
                .context("Failed to open input file")?
                .read_to_string(&mut body)
                .context("Failed to read input file")?;
        }
        None => {
            io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read stdin")?;
        }
    }

    // No size or count limits outside the service
    let points: Vec<Point> = parse_points(&body, usize::MAX)?;
    let elevations = engine.query_batch(&points);

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).context("Failed to create output file")?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    for elevation in elevations {
        writeln!(out, "{}", format_elevation(elevation))?;
    }
    out.flush()?;

    Ok(())
}
