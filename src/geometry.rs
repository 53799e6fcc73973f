//! Great-circle helpers on a spherical Earth.
//!
//! Inputs are degrees. Nothing is validated here: out-of-range coordinates
//! simply produce NaN or wrapped results.

/// Earth's radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two coordinates, in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let d_lat = lat2_rad - lat1_rad;
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_METERS * c
}

/// Initial bearing (forward azimuth) from the first coordinate to the second,
/// normalized to `[0, 360)`.
pub fn bearing(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let from_lat_rad = from_lat.to_radians();
    let to_lat_rad = to_lat.to_radians();
    let delta_lon = (to_lon - from_lon).to_radians();

    let y = delta_lon.sin() * to_lat_rad.cos();
    let x = from_lat_rad.cos() * to_lat_rad.sin() - from_lat_rad.sin() * to_lat_rad.cos() * delta_lon.cos();

    let mut bearing_deg = y.atan2(x).to_degrees();
    if bearing_deg < 0.0 {
        bearing_deg += 360.0;
    }
    // -0.0 + 360.0 style rounding can land exactly on 360
    if bearing_deg >= 360.0 {
        bearing_deg -= 360.0;
    }
    bearing_deg
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, HaversineDistance};

    #[test]
    fn test_tokyo_to_yokohama() {
        let distance = haversine_distance(35.6762, 139.6503, 35.4437, 139.6380);
        assert!(distance >= 25_000.0 && distance <= 30_000.0, "got {}", distance);
    }

    #[test]
    fn test_same_point_is_zero() {
        assert_eq!(haversine_distance(35.0, 138.0, 35.0, 138.0), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let ab = haversine_distance(35.3606, 138.7274, 35.3780, 138.7430);
        let ba = haversine_distance(35.3780, 138.7430, 35.3606, 138.7274);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_matches_geo_crate_within_radius_difference() {
        // geo uses the mean radius 6371008.8 m, so only the radius ratio separates us
        let ours = haversine_distance(48.8566, 2.3522, 51.5074, -0.1278);
        let theirs = point!(x: 2.3522, y: 48.8566).haversine_distance(&point!(x: -0.1278, y: 51.5074));
        let expected = theirs * EARTH_RADIUS_METERS / 6_371_008.8;
        assert!((ours - expected).abs() < 1.0, "ours={} expected={}", ours, expected);
    }

    #[test]
    fn test_nan_propagates() {
        assert!(haversine_distance(f64::NAN, 0.0, 1.0, 1.0).is_nan());
    }

    #[test]
    fn test_cardinal_bearings() {
        assert!((bearing(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((bearing(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((bearing(1.0, 0.0, 0.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((bearing(0.0, 1.0, 0.0, 0.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_range() {
        for &(lat, lon) in &[(10.0, -20.0), (-45.0, 170.0), (60.0, -179.0), (0.0, 0.5)] {
            let b = bearing(0.0, 0.0, lat, lon);
            assert!(b >= 0.0 && b < 360.0, "bearing {} out of range", b);
        }
    }
}
