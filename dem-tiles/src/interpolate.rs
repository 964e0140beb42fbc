//! Bilinear interpolation with void propagation.

/// Interpolate between the four corners of a grid cell.
///
/// Corners are given as (low-x, low-y), (high-x, low-y), (low-x, high-y),
/// (high-x, high-y); `dx` and `dy` are the fractional offsets from the
/// low corner. If any corner is `None` the result is `None`: a void
/// sample is never partially interpolated.
///
/// # Example
///
/// ```
/// use dem_tiles::interpolate::interpolate;
///
/// assert_eq!(interpolate(Some(100), Some(200), Some(100), Some(200), 0.5, 0.5), Some(150.0));
/// assert_eq!(interpolate(Some(100), None, Some(100), Some(200), 0.5, 0.5), None);
/// ```
pub fn interpolate(
    v00: Option<i16>,
    v10: Option<i16>,
    v01: Option<i16>,
    v11: Option<i16>,
    dx: f64,
    dy: f64,
) -> Option<f64> {
    let (v00, v10, v01, v11) = (
        f64::from(v00?),
        f64::from(v10?),
        f64::from(v01?),
        f64::from(v11?),
    );

    Some(
        v00 * (1.0 - dx) * (1.0 - dy)
            + v10 * dx * (1.0 - dy)
            + v01 * (1.0 - dx) * dy
            + v11 * dx * dy,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_corners() {
        let (a, b, c, d) = (Some(10), Some(20), Some(30), Some(40));
        assert_eq!(interpolate(a, b, c, d, 0.0, 0.0), Some(10.0));
        assert_eq!(interpolate(a, b, c, d, 1.0, 0.0), Some(20.0));
        assert_eq!(interpolate(a, b, c, d, 0.0, 1.0), Some(30.0));
        assert_eq!(interpolate(a, b, c, d, 1.0, 1.0), Some(40.0));
    }

    #[test]
    fn test_center_is_mean() {
        let e = interpolate(Some(10), Some(20), Some(30), Some(40), 0.5, 0.5).unwrap();
        assert!((e - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights() {
        // 100 at the base corner only
        let e = interpolate(Some(100), Some(0), Some(0), Some(0), 0.25, 0.75).unwrap();
        assert!((e - 100.0 * 0.75 * 0.25).abs() < 1e-12);

        // Linear along x when both rows match
        let e = interpolate(Some(0), Some(100), Some(0), Some(100), 0.3, 0.9).unwrap();
        assert!((e - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_elevations() {
        let e = interpolate(Some(-10), Some(-10), Some(-20), Some(-20), 0.7, 0.5).unwrap();
        assert!((e + 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_any_void_is_none() {
        let v = Some(1);
        assert_eq!(interpolate(None, v, v, v, 0.0, 0.0), None);
        assert_eq!(interpolate(v, None, v, v, 0.0, 0.0), None);
        assert_eq!(interpolate(v, v, None, v, 0.0, 0.0), None);
        assert_eq!(interpolate(v, v, v, None, 0.0, 0.0), None);
    }
}
