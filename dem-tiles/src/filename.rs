//! Raw grid filename utilities.
//!
//! Source files follow the SRTM naming convention `{N|S}{lat}{E|W}{lon}.hgt`:
//!
//! - Latitude: 2 digits with N/S prefix (e.g., N39, S12)
//! - Longitude: 3 digits with E/W prefix (e.g., E002, W077)
//!
//! The name gives the **southwest corner** of the 1° × 1° cell. Files may
//! also be zipped as `.hgt.zip`.

/// Container format of a source file, from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Raw big-endian grid (`.hgt`)
    Hgt,
    /// ZIP archive holding one `.hgt` file (`.hgt.zip`)
    HgtZip,
}

impl SourceKind {
    /// Detect the source kind from a filename (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use dem_tiles::filename::SourceKind;
    ///
    /// assert_eq!(SourceKind::from_name("N39E002.hgt"), Some(SourceKind::Hgt));
    /// assert_eq!(SourceKind::from_name("n39e002.HGT.ZIP"), Some(SourceKind::HgtZip));
    /// assert_eq!(SourceKind::from_name("readme.txt"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".hgt.zip") {
            Some(SourceKind::HgtZip)
        } else if lower.ends_with(".hgt") {
            Some(SourceKind::Hgt)
        } else {
            None
        }
    }
}

/// Format a cell's southwest corner as a tile name without extension.
///
/// # Examples
///
/// ```
/// use dem_tiles::filename::cell_name;
///
/// assert_eq!(cell_name(39, 2), "N39E002");
/// assert_eq!(cell_name(-13, -78), "S13W078");
/// ```
pub fn cell_name(lat: i32, lon: i32) -> String {
    let lat_prefix = if lat >= 0 { 'N' } else { 'S' };
    let lon_prefix = if lon >= 0 { 'E' } else { 'W' };

    format!(
        "{}{:02}{}{:03}",
        lat_prefix,
        lat.abs(),
        lon_prefix,
        lon.abs()
    )
}

/// Parse a source filename to extract the cell's southwest corner.
///
/// # Arguments
///
/// * `filename` - The filename (with or without path, with or without extension)
///
/// # Returns
///
/// The (latitude, longitude) of the southwest corner, or `None` if parsing fails.
///
/// # Examples
///
/// ```
/// use dem_tiles::filename::filename_to_lat_lon;
///
/// assert_eq!(filename_to_lat_lon("N39E002.hgt"), Some((39, 2)));
/// assert_eq!(filename_to_lat_lon("S12W077.hgt.zip"), Some((-12, -77)));
/// assert_eq!(filename_to_lat_lon("/path/to/N00E000.hgt"), Some((0, 0)));
/// assert_eq!(filename_to_lat_lon("invalid"), None);
/// ```
pub fn filename_to_lat_lon(filename: &str) -> Option<(i32, i32)> {
    // Extract just the filename if a path is given
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    // Remove extension if present
    let name = match name.find('.') {
        Some(dot) => &name[..dot],
        None => name,
    };

    // Must be exactly 7 ASCII characters: N00E000
    if name.len() != 7 || !name.is_ascii() {
        return None;
    }

    let bytes = name.as_bytes();

    let lat_sign = match bytes[0] {
        b'N' | b'n' => 1,
        b'S' | b's' => -1,
        _ => return None,
    };
    let lon_sign = match bytes[3] {
        b'E' | b'e' => 1,
        b'W' | b'w' => -1,
        _ => return None,
    };

    let lat_digits = &name[1..3];
    let lon_digits = &name[4..7];
    if !lat_digits.bytes().all(|b| b.is_ascii_digit())
        || !lon_digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let lat: i32 = lat_digits.parse().ok()?;
    let lon: i32 = lon_digits.parse().ok()?;

    Some((lat * lat_sign, lon * lon_sign))
}
