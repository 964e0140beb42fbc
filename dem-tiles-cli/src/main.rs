use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Tiled DEM build and query tool
#[derive(Parser)]
#[command(name = "demtiles")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Tile store directory
    #[arg(short, long, env = "DEM_STORE_PATH", global = true)]
    store: Option<PathBuf>,

    /// Maximum tiles in cache
    #[arg(
        short,
        long,
        env = "DEM_CACHE_SIZE",
        default_value = "4",
        global = true
    )]
    cache_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a tile store from a directory of .hgt / .hgt.zip files
    Build {
        /// Directory containing the source files
        source_dir: PathBuf,

        /// Destination of the new store (must not exist)
        destination: PathBuf,

        /// Number of worker threads (default: all cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Compression level, 0-9
        #[arg(short, long, default_value = "8", value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,
    },

    /// Query elevation for a single coordinate
    Query {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Query elevation for many coordinates from a file or stdin
    Batch {
        /// Input file: CSV, or one "lat lon" per line (stdin if omitted)
        input: Option<PathBuf>,

        /// Output file (stdout for line input, <input>_elevation.csv for CSV)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for latitude (CSV only)
        #[arg(long, default_value = "lat")]
        lat_col: String,

        /// Column name for longitude (CSV only)
        #[arg(long, default_value = "lon")]
        lon_col: String,
    },

    /// Display information about a tile store
    Info,

    /// List the cells held by a tile store
    List,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for results
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            source_dir,
            destination,
            threads,
            level,
        } => commands::build::run(source_dir, destination, threads, level),
        Commands::Query { lat, lon, json } => {
            commands::query::run(cli.store, cli.cache_size, lat, lon, json)
        }
        Commands::Batch {
            input,
            output,
            lat_col,
            lon_col,
        } => commands::batch::run(cli.store, cli.cache_size, input, output, lat_col, lon_col),
        Commands::Info => commands::info::run(cli.store),
        Commands::List => commands::list::run(cli.store),
    }
}
