//! Great-circle computations on a spherical Earth.

use std::f64::consts::PI;

/// Mean Earth radius in kilometers (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Default number of vertices used when drawing a circle.
pub const DEFAULT_CIRCLE_POINTS: usize = 100;

/// Haversine great-circle distance in kilometers between two points given in degrees.
///
/// No range checks are done; out-of-range coordinates give meaningless (possibly NaN)
/// results.
///
/// # Examples
///
/// ```
/// use xema::distance_km;
///
/// assert_eq!(distance_km(41.39, 2.17, 41.39, 2.17), 0.0);
/// let quarter = distance_km(0.0, 0.0, 0.0, 90.0);
/// assert!((quarter - 10_007.5).abs() < 0.1);
/// ```
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Point reached from `(lat, lon)` after travelling `distance_km` along `bearing` (radians,
/// clockwise from north). Returns `(lat, lon)` in degrees.
pub fn destination_point(lat: f64, lon: f64, bearing: f64, distance_km: f64) -> (f64, f64) {
    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();
    let angular_distance = distance_km / EARTH_RADIUS_KM;

    let lat2 = (lat_rad.sin() * angular_distance.cos()
        + lat_rad.cos() * angular_distance.sin() * bearing.cos())
    .asin();
    let lon2 = lon_rad
        + (bearing.sin() * angular_distance.sin() * lat_rad.cos())
            .atan2(angular_distance.cos() - lat_rad.sin() * lat2.sin());

    (lat2.to_degrees(), lon2.to_degrees())
}

/// Vertices of the circle of `radius_km` around a center, as parallel latitude and
/// longitude vectors.
///
/// The `point_count` vertices sit at evenly spaced bearings over `[0, 2π)`. The ring is
/// open; use [`close_ring`] when a renderer needs the first point repeated at the end.
pub fn circle(
    center_lat: f64,
    center_lon: f64,
    radius_km: f64,
    point_count: usize,
) -> (Vec<f64>, Vec<f64>) {
    (0..point_count)
        .map(|i| {
            let bearing = 2.0 * PI * i as f64 / point_count as f64;
            destination_point(center_lat, center_lon, bearing, radius_km)
        })
        .unzip()
}

/// Repeats the first vertex at the end of both sequences.
pub fn close_ring(latitudes: &mut Vec<f64>, longitudes: &mut Vec<f64>) {
    if let (Some(&lat), Some(&lon)) = (latitudes.first(), longitudes.first()) {
        latitudes.push(lat);
        longitudes.push(lon);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(distance_km(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_quarter_circumference() {
        let distance = distance_km(0.0, 0.0, 0.0, 90.0);
        let expected = EARTH_RADIUS_KM * PI / 2.0;
        assert!((distance - expected).abs() < 1e-6);
        assert!((distance - 10_007.5).abs() < 0.1);
    }

    #[test]
    fn test_distance_is_symmetric() {
        // Barcelona to Girona
        let there = distance_km(41.3874, 2.1686, 41.9794, 2.8214);
        let back = distance_km(41.9794, 2.8214, 41.3874, 2.1686);
        assert!((there - back).abs() < 1e-9);
        assert!(there > 80.0 && there < 90.0, "{}", there);
    }

    #[test]
    fn test_circle_points_lie_on_radius() {
        let (lats, lons) = circle(41.39, 2.17, 25.0, 36);
        assert_eq!(lats.len(), 36);
        assert_eq!(lons.len(), 36);
        for (lat, lon) in lats.iter().zip(lons.iter()) {
            let distance = distance_km(41.39, 2.17, *lat, *lon);
            assert!((distance - 25.0).abs() < 1e-6, "{}", distance);
        }
        // First vertex is due north of the center.
        assert!(lats[0] > 41.39);
        assert!((lons[0] - 2.17).abs() < 1e-9);
    }

    #[test]
    fn test_circle_is_open_until_closed() {
        let (mut lats, mut lons) = circle(0.0, 0.0, 10.0, 4);
        assert_ne!((lats[0], lons[0]), (lats[3], lons[3]));

        close_ring(&mut lats, &mut lons);
        assert_eq!(lats.len(), 5);
        assert_eq!((lats[0], lons[0]), (lats[4], lons[4]));
    }

    #[test]
    fn test_empty_circle() {
        let (lats, lons) = circle(0.0, 0.0, 10.0, 0);
        assert!(lats.is_empty() && lons.is_empty());
    }
}
