use crate::matching::domain::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometres (Haversine).
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Point `distance_km` due north of `origin`. Handy for building fixtures at exact distances.
pub fn offset_north(origin: GeoPoint, distance_km: f64) -> GeoPoint {
    let delta = (distance_km / EARTH_RADIUS_KM).to_degrees();
    GeoPoint::new(origin.latitude + delta, origin.longitude)
}
