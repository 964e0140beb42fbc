//! Error types for the dem-tiles library.
//!
//! A missing elevation (a no-data sample or an absent tile) is never an
//! error. It is reported as `None` by the query API.

use std::path::PathBuf;
use thiserror::Error;

use crate::addressing::TileId;

/// Errors that can occur when building or opening a tile store.
#[derive(Error, Debug)]
pub enum DemError {
    /// IO error when reading or writing files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The build destination already holds a store (or anything else).
    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// A tile was written twice. Tiles are write-once.
    #[error("Tile {id} already exists in the store")]
    DuplicateKey { id: TileId },

    /// A raw grid file has an unparseable name or an unexpected size.
    #[error("Malformed source file {path}: {reason}")]
    MalformedSourceFile { path: PathBuf, reason: String },

    /// The store cannot be opened.
    #[error("Storage unavailable at {path}: {reason}")]
    StorageUnavailable { path: PathBuf, reason: String },

    /// Grid resolution and sub-tile count do not partition evenly.
    #[error("Invalid grid configuration: {reason}")]
    InvalidGridConfig { reason: String },

    /// A tile does not fit the grid it is stored under.
    #[error("Invalid tile: {reason}")]
    InvalidTile { reason: String },

    /// zlib only knows levels 0 to 9.
    #[error("Invalid compression level {level} (expected 0-9)")]
    InvalidCompressionLevel { level: u32 },

    /// A stored blob does not decode to a full tile.
    #[error("Corrupt tile {id}: {reason}")]
    CorruptTile { id: TileId, reason: String },

    /// The store manifest could not be (de)serialized.
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Result type alias using [`DemError`].
pub type Result<T> = std::result::Result<T, DemError>;
