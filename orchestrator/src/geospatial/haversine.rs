//! Implementation of the Haversine formula for calculating the distance
//! between two points on a sphere.
//!
//! See [Wikipedia](https://en.wikipedia.org/wiki/Haversine_formula) for
//! more.
//!
//! **Distance is returned in kilometers**.

use super::Coordinate;
use svc_siting_client_rest::types::ScoredLocation;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate the distance between two points on a sphere.
///
/// Uses `d = 2R·asin(√(sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)))`.
pub fn distance(start: &Coordinate, end: &Coordinate) -> f64 {
    let d_lat = (end.latitude - start.latitude).to_radians();
    let d_lon = (end.longitude - start.longitude).to_radians();
    let lat1 = start.latitude.to_radians();
    let lat2 = end.latitude.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    // rounding can push `a` a hair above 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Keep the items lying within `radius_km` of `center`, paired with their
/// distance and ordered nearest first.
pub fn within_radius<'a, T, F>(
    center: &Coordinate,
    radius_km: f64,
    items: &'a [T],
    position: F,
) -> Vec<(&'a T, f64)>
where
    F: Fn(&T) -> Coordinate,
{
    let mut hits: Vec<(&'a T, f64)> = items
        .iter()
        .map(|item| (item, distance(center, &position(item))))
        .filter(|(_, d)| *d <= radius_km)
        .collect();

    hits.sort_by(|a, b| a.1.total_cmp(&b.1));
    hits
}

/// Fill in `distance_from_center` for every location the backend left
/// unannotated. Returns how many were filled.
pub fn annotate_distances(center: &Coordinate, locations: &mut [ScoredLocation]) -> usize {
    let mut filled = 0;
    for location in locations
        .iter_mut()
        .filter(|l| l.distance_from_center.is_none())
    {
        location.distance_from_center = Some(distance(center, &location.coordinate));
        filled += 1;
    }

    if filled > 0 {
        geo_debug!(
            "(annotate_distances) computed {} missing distance(s) locally.",
            filled
        );
    }

    filled
}
