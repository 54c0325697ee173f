//! Navigators: live, mutable camera controllers that snapshot into [`NavigatorState`].

use glam::{DMat4, DVec3};
use orbis_geom::{Ellipsoid, GeomError, Location, Viewport};

use crate::state::NavigatorState;

/// A camera controller that can produce a fresh snapshot for a viewport.
pub trait Navigator {
    fn current_state(&self, viewport: Viewport) -> Result<NavigatorState, GeomError>;
}

/// Looks at a point on the ellipsoid from `range` meters away.
///
/// `heading` is clockwise from north and `tilt` is measured from straight down, both in
/// degrees. `field_of_view` is the vertical field of view in degrees.
#[derive(Clone, Debug)]
pub struct LookAtNavigator {
    pub look_at: Location,
    pub range: f64,
    pub heading: f64,
    pub tilt: f64,
    pub field_of_view: f64,
    pub ellipsoid: Ellipsoid,
}

impl Default for LookAtNavigator {
    fn default() -> Self {
        Self {
            look_at: Location::new(0.0, 0.0),
            range: 1.5e7,
            heading: 0.0,
            tilt: 0.0,
            field_of_view: 45.0,
            ellipsoid: Ellipsoid::WGS84,
        }
    }
}

impl LookAtNavigator {
    pub fn new(look_at: Location, range: f64) -> Self {
        Self {
            look_at,
            range,
            ..Default::default()
        }
    }

    /// Eye point and camera up vector in model coordinates.
    pub fn eye_and_up(&self) -> (DVec3, DVec3) {
        let Location {
            latitude,
            longitude,
        } = self.look_at;
        let target = self.ellipsoid.compute_point(latitude, longitude, 0.0);
        let up = self.ellipsoid.surface_normal(latitude, longitude);
        let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
        let east = DVec3::new(cos_lon, 0.0, -sin_lon);
        let north = up.cross(east);

        let (sin_h, cos_h) = self.heading.to_radians().sin_cos();
        let (sin_t, cos_t) = self.tilt.to_radians().sin_cos();
        let facing = north * cos_h + east * sin_h;

        let eye = target + (up * cos_t - facing * sin_t) * self.range;
        let camera_up = facing * cos_t + up * sin_t;
        (eye, camera_up)
    }

    /// Near and far clip distances that keep the visible ellipsoid within the frustum.
    pub fn clip_distances(&self, eye: DVec3) -> (f64, f64) {
        let altitude = self.ellipsoid.compute_position(eye).altitude.max(1.0);
        let radius = self.ellipsoid.equatorial_radius();
        let horizon = (altitude * (2.0 * radius + altitude)).sqrt();
        let near = (altitude * 0.25).max(1.0);
        let far = horizon.max(self.range) * 1.1;
        (near, far)
    }

    pub fn modelview(&self) -> DMat4 {
        let (eye, up) = self.eye_and_up();
        let target = self
            .ellipsoid
            .compute_point(self.look_at.latitude, self.look_at.longitude, 0.0);
        DMat4::look_at_rh(eye, target, up)
    }

    pub fn projection(&self, viewport: Viewport) -> DMat4 {
        let (eye, _) = self.eye_and_up();
        let (near, far) = self.clip_distances(eye);
        DMat4::perspective_rh(
            self.field_of_view.to_radians(),
            viewport.aspect_ratio(),
            near,
            far,
        )
    }
}

impl Navigator for LookAtNavigator {
    fn current_state(&self, viewport: Viewport) -> Result<NavigatorState, GeomError> {
        if !self.range.is_finite() || self.range <= 0.0 {
            return Err(GeomError::InvalidArgument(format!(
                "navigator range {} must be positive",
                self.range
            )));
        }
        if !(self.field_of_view > 0.0 && self.field_of_view < 180.0) {
            return Err(GeomError::InvalidArgument(format!(
                "field of view {} must be in (0, 180)",
                self.field_of_view
            )));
        }
        NavigatorState::new(self.modelview(), self.projection(viewport), viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_down_eye_above_target() {
        let nav = LookAtNavigator::new(Location::new(0.0, 0.0), 1000.0);
        let (eye, up) = nav.eye_and_up();
        let r = Ellipsoid::WGS84.equatorial_radius();
        assert!((eye - DVec3::new(0.0, 0.0, r + 1000.0)).length() < 1e-6);
        assert!((up - DVec3::Y).length() < 1e-12);
    }

    #[test]
    fn test_state_looks_at_target() {
        let nav = LookAtNavigator::new(Location::new(30.0, 45.0), 5.0e5);
        let state = nav.current_state(Viewport::new(0, 0, 640, 480)).unwrap();
        let target = Ellipsoid::WGS84.compute_point(30.0, 45.0, 0.0);
        let w = state.project(target).unwrap();
        assert!((w.x - 320.0).abs() < 1e-6);
        assert!((w.y - 240.0).abs() < 1e-6);
        assert!((0.0..=1.0).contains(&w.z));
        assert!((state.eye_point().distance(target) - 5.0e5).abs() < 1e-3);
    }

    #[test]
    fn test_tilted_eye_keeps_range() {
        let mut nav = LookAtNavigator::new(Location::new(-10.0, 100.0), 2.0e4);
        nav.heading = 30.0;
        nav.tilt = 60.0;
        let (eye, _) = nav.eye_and_up();
        let target = Ellipsoid::WGS84.compute_point(-10.0, 100.0, 0.0);
        assert!((eye.distance(target) - 2.0e4).abs() < 1e-6);
        let state = nav.current_state(Viewport::new(0, 0, 100, 100)).unwrap();
        assert!(state.frustum_in_model_coordinates().contains_point(target));
    }

    #[test]
    fn test_invalid_range_rejected() {
        let nav = LookAtNavigator::new(Location::new(0.0, 0.0), 0.0);
        assert!(matches!(
            nav.current_state(Viewport::new(0, 0, 10, 10)),
            Err(GeomError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_whole_globe_in_frustum_from_default_range() {
        let nav = LookAtNavigator::default();
        let state = nav.current_state(Viewport::new(0, 0, 800, 600)).unwrap();
        let center = Ellipsoid::WGS84.compute_point(0.0, 0.0, 0.0);
        assert!(state.frustum_in_model_coordinates().contains_point(center));
    }
}
