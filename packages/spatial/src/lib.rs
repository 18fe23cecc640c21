#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Great-circle math for hitchhiking rides.
//!
//! Distances use the haversine formula on a spherical Earth of radius
//! 6371 km. Bearings are initial bearings in degrees in `(-180, 180]`,
//! where 0 is due north and 90 is due east. A missing destination is
//! propagated as `None` rather than a zero distance.

use hitchmap_point_models::Coordinate;

/// Mean Earth radius used for all distances, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Rides shorter than this are treated as "no meaningful destination".
pub const MIN_RIDE_KM: f64 = 1.0;

/// Distance and direction from a pickup spot to a ride's destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RideVector {
    /// Great-circle distance in kilometers.
    pub distance_km: f64,
    /// Initial bearing in degrees, `(-180, 180]`.
    pub bearing_deg: f64,
}

/// Haversine distance in kilometers between two points given in degrees.
#[must_use]
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Initial bearing in degrees from the first point toward the second.
///
/// The result lies in `(-180, 180]`; due south is reported as `180`.
#[must_use]
pub fn bearing_deg(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos().mul_add(lat2.sin(), -(lat1.sin() * lat2.cos() * dlon.cos()));

    let bearing = x.atan2(y).to_degrees();
    if bearing <= -180.0 { bearing + 360.0 } else { bearing }
}

/// Haversine distance between two coordinates.
#[must_use]
pub fn distance_between(from: Coordinate, to: Coordinate) -> f64 {
    haversine_km(from.lon, from.lat, to.lon, to.lat)
}

/// Computes the ride vector from `origin` to `destination`.
///
/// Returns `None` when there is no destination or the result is not a
/// finite number.
#[must_use]
pub fn ride_vector(origin: Coordinate, destination: Option<Coordinate>) -> Option<RideVector> {
    let dest = destination?;
    let distance_km = distance_between(origin, dest);
    let bearing_deg = bearing_deg(origin.lon, origin.lat, dest.lon, dest.lat);

    (distance_km.is_finite() && bearing_deg.is_finite()).then_some(RideVector {
        distance_km,
        bearing_deg,
    })
}

/// Like [`ride_vector`], but drops rides shorter than `min_km`.
#[must_use]
pub fn significant_ride(
    origin: Coordinate,
    destination: Option<Coordinate>,
    min_km: f64,
) -> Option<RideVector> {
    ride_vector(origin, destination).filter(|ride| ride.distance_km >= min_km)
}

/// Batch form of [`ride_vector`]: one result per `(origin, destination)`
/// pair, in input order.
pub fn ride_vectors<I>(pairs: I) -> Vec<Option<RideVector>>
where
    I: IntoIterator<Item = (Coordinate, Option<Coordinate>)>,
{
    pairs
        .into_iter()
        .map(|(origin, destination)| ride_vector(origin, destination))
        .collect()
}

/// Returns the arrow for the nearest of the eight compass directions.
///
/// The bearing is snapped to a multiple of 45 degrees with ties rounding to
/// the even multiple, so 22.5 snaps to north and 67.5 snaps to east.
#[must_use]
pub fn compass_arrow(bearing_deg: f64) -> Option<&'static str> {
    if !bearing_deg.is_finite() {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)]
    let step = (bearing_deg / 45.0).round_ties_even() as i64;

    match step {
        0 => Some("↑"),
        1 => Some("↗"),
        2 => Some("→"),
        3 => Some("↘"),
        4 | -4 => Some("↓"),
        -3 => Some("↙"),
        -2 => Some("←"),
        -1 => Some("↖"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BERLIN: Coordinate = Coordinate::new(52.52, 13.405);
    const HAMBURG: Coordinate = Coordinate::new(53.5511, 9.9937);

    #[test]
    fn distance_is_symmetric() {
        let ab = distance_between(BERLIN, HAMBURG);
        let ba = distance_between(HAMBURG, BERLIN);
        assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert!(distance_between(BERLIN, BERLIN).abs() < f64::EPSILON);
    }

    #[test]
    fn berlin_hamburg_distance() {
        let km = distance_between(BERLIN, HAMBURG);
        assert!((km - 255.0).abs() < 2.0, "unexpected distance {km}");
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let km = haversine_km(0.0, 0.0, 1.0, 0.0);
        let expected = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;
        assert!((km - expected).abs() < 1e-9);
    }

    #[test]
    fn cardinal_bearings() {
        assert!((bearing_deg(0.0, 0.0, 0.0, 1.0)).abs() < 1e-9);
        assert!((bearing_deg(0.0, 0.0, 1.0, 0.0) - 90.0).abs() < 1e-9);
        assert!((bearing_deg(0.0, 0.0, -1.0, 0.0) + 90.0).abs() < 1e-9);
        assert!((bearing_deg(0.0, 1.0, 0.0, 0.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn bearing_never_reaches_minus_180() {
        let b = bearing_deg(0.0, 1.0, -0.0, 0.0);
        assert!(b > -180.0 && b <= 180.0, "{b}");
    }

    #[test]
    fn missing_destination_propagates_none() {
        assert!(ride_vector(BERLIN, None).is_none());
        let batch = ride_vectors([(BERLIN, None), (BERLIN, Some(HAMBURG))]);
        assert!(batch[0].is_none());
        assert!(batch[1].is_some());
    }

    #[test]
    fn short_rides_are_not_significant() {
        // ~0.6 km north
        let near = Coordinate::new(BERLIN.lat + 0.0054, BERLIN.lon);
        let ride = ride_vector(BERLIN, Some(near)).unwrap();
        assert!((ride.distance_km - 0.6).abs() < 0.01);
        assert!(significant_ride(BERLIN, Some(near), MIN_RIDE_KM).is_none());
        assert!(significant_ride(BERLIN, Some(HAMBURG), MIN_RIDE_KM).is_some());
    }

    #[test]
    fn compass_boundary_is_at_22_5_degrees() {
        assert_eq!(compass_arrow(22.4), Some("↑"));
        assert_eq!(compass_arrow(22.6), Some("↗"));
        assert_eq!(compass_arrow(44.9), Some("↗"));
        assert_eq!(compass_arrow(-22.6), Some("↖"));
    }

    #[test]
    fn compass_south_from_both_sides() {
        assert_eq!(compass_arrow(180.0), Some("↓"));
        assert_eq!(compass_arrow(-179.0), Some("↓"));
        assert_eq!(compass_arrow(170.0), Some("↓"));
        assert_eq!(compass_arrow(-135.0), Some("↙"));
        assert_eq!(compass_arrow(f64::NAN), None);
    }
}
