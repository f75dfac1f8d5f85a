use std::cmp::Ordering;

use crate::models::courier::{Candidate, GeoPoint};

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Default search radius around the pickup point.
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub distance_km: f64,
}

/// Keeps the candidates within `radius_km` of `pickup`, nearest first.
///
/// Equal distances fall back to courier id so the output never depends on
/// the order the directory returned them in.
pub fn rank_within(
    pickup: &GeoPoint,
    candidates: Vec<Candidate>,
    radius_km: f64,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .map(|candidate| RankedCandidate {
            distance_km: haversine_km(pickup, &candidate.location),
            candidate,
        })
        .filter(|ranked| ranked.distance_km <= radius_km)
        .collect();

    ranked.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.candidate.courier_id.cmp(&b.candidate.courier_id))
    });

    ranked
}
