//! Reference ellipsoid and geodetic/Cartesian conversion.
//!
//! Model coordinates are Earth-centered with Y along the polar axis, Z through latitude 0
//! and longitude 0, and X through longitude 90 east.

use glam::DVec3;

use crate::location::Position;

/// An oblate ellipsoid of revolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipsoid {
    equatorial_radius: f64,
    polar_radius: f64,
    eccentricity_squared: f64,
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        equatorial_radius: 6_378_137.0,
        polar_radius: 6_356_752.3142,
        eccentricity_squared: 0.006_694_379_990_13,
    };

    /// A sphere of the given radius.
    pub fn sphere(radius: f64) -> Self {
        Self {
            equatorial_radius: radius,
            polar_radius: radius,
            eccentricity_squared: 0.0,
        }
    }

    pub fn equatorial_radius(&self) -> f64 {
        self.equatorial_radius
    }

    pub fn polar_radius(&self) -> f64 {
        self.polar_radius
    }

    pub fn eccentricity_squared(&self) -> f64 {
        self.eccentricity_squared
    }

    /// Radius of curvature in the prime vertical at `lat_rad`.
    fn prime_vertical_radius(&self, lat_rad: f64) -> f64 {
        let s = lat_rad.sin();
        self.equatorial_radius / (1.0 - self.eccentricity_squared * s * s).sqrt()
    }

    /// Model-coordinate point for a geodetic latitude/longitude (degrees) and altitude (m).
    pub fn compute_point(&self, latitude: f64, longitude: f64, altitude: f64) -> DVec3 {
        let mut out = DVec3::ZERO;
        self.compute_point_into(latitude, longitude, altitude, &mut out);
        out
    }

    /// Like [`Ellipsoid::compute_point`] but writes into `out`.
    pub fn compute_point_into(&self, latitude: f64, longitude: f64, altitude: f64, out: &mut DVec3) {
        let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
        let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
        let rpm = self.prime_vertical_radius(latitude.to_radians());
        out.x = (rpm + altitude) * cos_lat * sin_lon;
        out.y = (rpm * (1.0 - self.eccentricity_squared) + altitude) * sin_lat;
        out.z = (rpm + altitude) * cos_lat * cos_lon;
    }

    /// Geodetic position of a model-coordinate point.
    pub fn compute_position(&self, point: DVec3) -> Position {
        let p = (point.x * point.x + point.z * point.z).sqrt();
        let longitude = point.x.atan2(point.z).to_degrees();

        if p < 1e-9 {
            let latitude = if point.y >= 0.0 { 90.0 } else { -90.0 };
            return Position::new(latitude, 0.0, point.y.abs() - self.polar_radius);
        }

        let es = self.eccentricity_squared;
        let mut lat = point.y.atan2(p * (1.0 - es));
        let mut alt = 0.0;
        for _ in 0..6 {
            let n = self.prime_vertical_radius(lat);
            alt = p / lat.cos() - n;
            lat = point.y.atan2(p * (1.0 - es * n / (n + alt)));
        }
        Position::new(lat.to_degrees(), longitude, alt)
    }

    /// Unit surface normal at a geodetic latitude/longitude (degrees).
    pub fn surface_normal(&self, latitude: f64, longitude: f64) -> DVec3 {
        let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
        let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
        DVec3::new(cos_lat * sin_lon, sin_lat, cos_lat * cos_lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equator_prime_meridian_on_z_axis() {
        let e = Ellipsoid::WGS84;
        let p = e.compute_point(0.0, 0.0, 0.0);
        assert!((p.z - e.equatorial_radius()).abs() < 1e-6);
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
    }

    #[test]
    fn test_north_pole_on_y_axis() {
        let e = Ellipsoid::WGS84;
        let p = e.compute_point(90.0, 0.0, 0.0);
        assert!((p.y - e.polar_radius()).abs() < 1e-3);
    }

    #[test]
    fn test_point_position_round_trip() {
        let e = Ellipsoid::WGS84;
        for &(lat, lon, alt) in &[
            (45.0, 120.0, 1000.0),
            (-33.9, 18.4, 0.0),
            (89.0, -170.0, 250.0),
            (0.0, 90.0, -100.0),
        ] {
            let pos = e.compute_position(e.compute_point(lat, lon, alt));
            assert!((pos.latitude - lat).abs() < 1e-7, "lat {lat}");
            assert!((pos.longitude - lon).abs() < 1e-7, "lon {lon}");
            assert!((pos.altitude - alt).abs() < 1e-3, "alt {alt}");
        }
    }

    #[test]
    fn test_sphere_normal_matches_point_direction() {
        let e = Ellipsoid::sphere(10.0);
        let n = e.surface_normal(30.0, 60.0);
        let p = e.compute_point(30.0, 60.0, 0.0).normalize();
        assert!((n - p).length() < 1e-12);
    }
}
