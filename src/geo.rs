//! Geofence evaluation: great-circle distance on a spherical Earth.
//!
//! Branch geofences are sub-kilometer, so the haversine approximation is
//! more than accurate enough; this is not meant to be geodetically exact.

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GeofenceCheck {
    pub within: bool,
    pub distance_m: f64,
}

/// Haversine distance between two points, in meters.
pub fn distance_m(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Whether `point` lies within `radius_m` of `center`. Returns `None` when
/// either coordinate is not a finite number (location unavailable).
pub fn evaluate(center: Coordinates, point: Coordinates, radius_m: f64) -> Option<GeofenceCheck> {
    if !center.is_finite() || !point.is_finite() || !radius_m.is_finite() {
        return None;
    }

    let distance_m = distance_m(center, point);
    Some(GeofenceCheck {
        within: distance_m <= radius_m,
        distance_m,
    })
}
