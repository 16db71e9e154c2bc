use geo::{Distance, Haversine, Point};

use crate::gpx_types::Coordinate;

/// Haversine distance in meters between two coordinates, using `geo`'s mean
/// Earth radius.
///
/// ```rust
/// use gpx_tracker_wasm::gpx_types::Coordinate;
/// use gpx_tracker_wasm::geo_utils;
///
/// let a = Coordinate::new(0.0, 0.0).unwrap();
/// let b = Coordinate::new(0.0, 0.001).unwrap();
/// let d = geo_utils::haversine_distance(&a, &b);
/// assert!((d - 111.2).abs() < 1.0);
/// ```
#[inline]
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let p1 = Point::new(a.longitude(), a.latitude());
    let p2 = Point::new(b.longitude(), b.latitude());
    Haversine::distance(p1, p2)
}
