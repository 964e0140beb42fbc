//! Decoded elevation tiles and their compressed blob format.
//!
//! A stored tile is a zlib stream that inflates to `size × size` signed
//! 16-bit samples in native byte order, row-major, row 0 at the north.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::addressing::TileId;
use crate::error::{DemError, Result};

/// Value indicating no data (void) in source files and stored tiles.
pub const VOID_VALUE: i16 = -32768;

/// Default zlib level used when writing tiles.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 8;

/// Highest zlib level.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Reject zlib levels flate2 cannot encode with.
pub fn check_compression_level(level: u32) -> Result<u32> {
    if level > MAX_COMPRESSION_LEVEL {
        return Err(DemError::InvalidCompressionLevel { level });
    }
    Ok(level)
}

/// An immutable square grid of elevation samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// Samples per row/column.
    size: usize,
    /// Row-major samples, `size * size` of them.
    samples: Vec<i16>,
}

impl Tile {
    /// Wrap a row-major sample vector.
    ///
    /// # Errors
    ///
    /// Returns [`DemError::InvalidTile`] if the vector does not hold
    /// exactly `size * size` samples.
    pub fn from_samples(size: usize, samples: Vec<i16>) -> Result<Self> {
        if samples.len() != size * size {
            return Err(DemError::InvalidTile {
                reason: format!(
                    "tile of size {size} needs {} samples, got {}",
                    size * size,
                    samples.len()
                ),
            });
        }
        Ok(Self { size, samples })
    }

    /// Samples per row/column.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Elevation at local `(x, y)`, or `None` for a void sample.
    ///
    /// `x` counts columns from the west edge, `y` rows from the north edge.
    pub fn sample(&self, x: usize, y: usize) -> Option<i16> {
        debug_assert!(x < self.size && y < self.size);
        match self.samples[y * self.size + x] {
            VOID_VALUE => None,
            v => Some(v),
        }
    }

    /// Raw samples, including void markers.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Compress the tile into its stored form.
    ///
    /// # Errors
    ///
    /// Returns [`DemError::InvalidCompressionLevel`] for levels above 9.
    pub fn encode(&self, level: u32) -> Result<Vec<u8>> {
        let level = check_compression_level(level)?;
        let mut raw = Vec::with_capacity(self.samples.len() * 2);
        for v in &self.samples {
            raw.extend_from_slice(&v.to_ne_bytes());
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }

    /// Inflate a stored blob into a tile of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`DemError::CorruptTile`] if the blob is not a valid zlib
    /// stream or does not inflate to exactly `size * size` samples.
    pub fn decode(id: TileId, blob: &[u8], size: usize) -> Result<Self> {
        let expected = size * size * 2;
        let mut raw = Vec::with_capacity(expected);

        // Read one byte past the expected length to detect oversized blobs
        ZlibDecoder::new(blob)
            .take(expected as u64 + 1)
            .read_to_end(&mut raw)
            .map_err(|e| DemError::CorruptTile {
                id,
                reason: e.to_string(),
            })?;

        if raw.len() != expected {
            return Err(DemError::CorruptTile {
                id,
                reason: format!("expected {expected} bytes, inflated to {}", raw.len()),
            });
        }

        let samples = raw
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect();

        Ok(Self { size, samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_tile(size: usize) -> Tile {
        let samples = (0..size * size).map(|i| (i % 4000) as i16).collect();
        Tile::from_samples(size, samples).unwrap()
    }

    #[test]
    fn test_from_samples_wrong_len() {
        assert!(matches!(
            Tile::from_samples(3, vec![0; 8]),
            Err(DemError::InvalidTile { .. })
        ));
        assert!(Tile::from_samples(3, vec![0; 9]).is_ok());
    }

    #[test]
    fn test_sample_row_major() {
        let tile = Tile::from_samples(3, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        assert_eq!(tile.sample(0, 0), Some(1));
        assert_eq!(tile.sample(2, 0), Some(3));
        assert_eq!(tile.sample(0, 1), Some(4));
        assert_eq!(tile.sample(2, 2), Some(9));
    }

    #[test]
    fn test_void_sample_is_none() {
        let tile = Tile::from_samples(2, vec![10, VOID_VALUE, -5, 0]).unwrap();
        assert_eq!(tile.sample(0, 0), Some(10));
        assert_eq!(tile.sample(1, 0), None);
        assert_eq!(tile.sample(0, 1), Some(-5));
        assert_eq!(tile.sample(1, 1), Some(0));
    }

    #[test]
    fn test_encode_decode() {
        let tile = ramp_tile(300);
        let blob = tile.encode(DEFAULT_COMPRESSION_LEVEL).unwrap();
        assert!(blob.len() < 300 * 300 * 2);

        let decoded = Tile::decode(TileId::new(0, 0, 0), &blob, 300).unwrap();
        assert_eq!(decoded, tile);
    }

    #[test]
    fn test_encode_rejects_bad_level() {
        let tile = ramp_tile(4);
        assert!(tile.encode(MAX_COMPRESSION_LEVEL).is_ok());
        assert!(matches!(
            tile.encode(200),
            Err(DemError::InvalidCompressionLevel { level: 200 })
        ));
    }

    #[test]
    fn test_decode_wrong_size() {
        let blob = ramp_tile(10).encode(6).unwrap();
        let id = TileId::new(1, 2, 3);

        match Tile::decode(id, &blob, 11) {
            Err(DemError::CorruptTile { id: got, .. }) => assert_eq!(got, id),
            other => panic!("Expected CorruptTile, got {:?}", other),
        }
        assert!(matches!(
            Tile::decode(id, &blob, 9),
            Err(DemError::CorruptTile { .. })
        ));
    }

    #[test]
    fn test_decode_garbage() {
        let result = Tile::decode(TileId::new(0, 0, 0), b"not a zlib stream", 10);
        assert!(matches!(result, Err(DemError::CorruptTile { .. })));
    }
}
