use glam::DVec3;
use std::f64::consts::PI;

use crate::error::DataError;

/// Radius of the globe mesh in world units.
pub const EARTH_RADIUS: f64 = 5.0;

/// Height of office markers above the surface.
pub const MARKER_ALTITUDE: f64 = 0.05;

/// Height of geographic labels above the surface.
pub const LABEL_ALTITUDE: f64 = 0.1;

/// A latitude/longitude/altitude tuple. Validated on construction, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
    altitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Result<Self, DataError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(DataError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(DataError::Longitude(longitude));
        }
        if !altitude.is_finite() || altitude < 0.0 {
            return Err(DataError::Altitude(altitude));
        }
        Ok(Self { latitude, longitude, altitude })
    }

    /// Surface point (altitude 0).
    pub fn surface(latitude: f64, longitude: f64) -> Result<Self, DataError> {
        Self::new(latitude, longitude, 0.0)
    }

    /// Same coordinates lifted to a different altitude.
    pub fn with_altitude(self, altitude: f64) -> Result<Self, DataError> {
        Self::new(self.latitude, self.longitude, altitude)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn altitude(&self) -> f64 {
        self.altitude
    }
}

/// Convert a geographic point to a position on (or above) a sphere centred at the origin.
///
/// Colatitude `phi = 90 - lat`, azimuth `theta = lng + 180`. The sign convention puts
/// longitude 0 on +X, the north pole on +Y and east longitudes on -Z, which is what the
/// equirectangular Earth texture expects.
#[inline(always)]
pub fn to_cartesian(point: &GeoPoint, sphere_radius: f64) -> DVec3 {
    lat_lng_to_vec3(point.latitude, point.longitude, sphere_radius + point.altitude)
}

/// Unchecked variant used for bulk coastline data that is already in range.
#[inline(always)]
pub fn lat_lng_to_vec3(lat: f64, lng: f64, radius: f64) -> DVec3 {
    let phi = (90.0 - lat) * (PI / 180.0);
    let theta = (lng + 180.0) * (PI / 180.0);
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta, cos_theta) = theta.sin_cos();

    DVec3::new(
        -(radius * sin_phi * cos_theta),
        radius * cos_phi,
        radius * sin_phi * sin_theta,
    )
}

/// Inverse of [`lat_lng_to_vec3`]: returns (lat, lng) in degrees for any non-zero vector.
pub fn vec3_to_lat_lng(p: DVec3) -> (f64, f64) {
    let r = p.length();
    let lat = 90.0 - (p.y / r).clamp(-1.0, 1.0).acos().to_degrees();
    let theta = p.z.atan2(-p.x).to_degrees();
    (lat, wrap_lng(theta - 180.0))
}

/// Normalize longitude into [-180, 180)
#[inline(always)]
pub fn wrap_lng(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}
