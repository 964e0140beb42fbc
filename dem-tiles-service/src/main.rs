//! dem-tiles service - HTTP microservice for batch elevation queries.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DEM_STORE_PATH` | Tile store directory | Required |
//! | `DEM_CACHE_SIZE` | Tiles cached per request | 4 |
//! | `DEM_PORT` | HTTP server port | 8051 |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `POST /` - Batch elevation query, one `lat lon` per line
//! - `GET /health` - Health check
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use dem_tiles::cache::DEFAULT_CACHE_SIZE;
use dem_tiles::engine::{CACHE_SIZE_ENV, STORE_PATH_ENV};
use dem_tiles::{DirTileStore, TileStore};
use dem_tiles_service::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PORT_ENV: &str = "DEM_PORT";
const DEFAULT_PORT: u16 = 8051;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dem_tiles_service=info,dem_tiles=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var(PORT_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let cache_size: usize = std::env::var(CACHE_SIZE_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CACHE_SIZE);

    let store_path = std::env::var(STORE_PATH_ENV)
        .map_err(|_| format!("{STORE_PATH_ENV} environment variable not set"))?;

    // Opened once; a bad store aborts startup
    let store = DirTileStore::open(&store_path)?;
    let stats = store.stats()?;

    tracing::info!(
        store = %store.root().display(),
        tile_size = store.grid().tile_size(),
        cells = stats.cell_count,
        tiles = stats.tile_count,
        cache_size,
        port,
        "Starting elevation service"
    );

    let state = Arc::new(AppState {
        store: Arc::new(store),
        cache_size,
    });
    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
