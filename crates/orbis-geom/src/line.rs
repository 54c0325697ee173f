//! Rays in model coordinates.

use glam::DVec3;

/// A ray `origin + t * direction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Line {
    /// Barycentric slack allowed by [`Line::intersect_triangle`].
    pub const EDGE_TOLERANCE: f64 = 1e-5;

    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self { origin, direction }
    }

    /// Ray from `a` through `b`.
    pub fn from_segment(a: DVec3, b: DVec3) -> Self {
        Self::new(a, b - a)
    }

    pub fn point_at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Moller-Trumbore ray/triangle test. Returns the ray parameter of the hit when it lies
    /// in front of the origin. Both triangle windings are accepted.
    ///
    /// Hits up to [`Line::EDGE_TOLERANCE`] outside the triangle, in barycentric units, are
    /// accepted. Neighboring meshes stored in `f32` do not share edges exactly.
    pub fn intersect_triangle(&self, a: DVec3, b: DVec3, c: DVec3) -> Option<f64> {
        const EPS: f64 = 1e-12;
        const TOL: f64 = Line::EDGE_TOLERANCE;
        let e1 = b - a;
        let e2 = c - a;
        let p = self.direction.cross(e2);
        let det = e1.dot(p);
        if det.abs() < EPS {
            return None;
        }
        let inv = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv;
        if !(-TOL..=1.0 + TOL).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = self.direction.dot(q) * inv;
        if v < -TOL || u + v > 1.0 + TOL {
            return None;
        }
        let t = e2.dot(q) * inv;
        (t >= 0.0).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_hits_triangle() {
        let ray = Line::new(DVec3::new(0.25, 0.25, 5.0), DVec3::NEG_Z);
        let t = ray
            .intersect_triangle(DVec3::ZERO, DVec3::X, DVec3::Y)
            .unwrap();
        assert!((t - 5.0).abs() < 1e-12);
        assert!((ray.point_at(t).z).abs() < 1e-12);
    }

    #[test]
    fn test_ray_misses_triangle() {
        let ray = Line::new(DVec3::new(2.0, 2.0, 5.0), DVec3::NEG_Z);
        assert!(ray.intersect_triangle(DVec3::ZERO, DVec3::X, DVec3::Y).is_none());
    }

    #[test]
    fn test_ray_through_shared_vertex_and_edge_hits() {
        let down = |x: f64, y: f64| Line::new(DVec3::new(x, y, 5.0), DVec3::NEG_Z);
        assert!(down(0.0, 0.0).intersect_triangle(DVec3::ZERO, DVec3::X, DVec3::Y).is_some());
        assert!(down(0.5, 0.5).intersect_triangle(DVec3::ZERO, DVec3::X, DVec3::Y).is_some());
        assert!(down(0.5, 0.0).intersect_triangle(DVec3::ZERO, DVec3::X, DVec3::Y).is_some());
        // A hairline crack between neighbors still counts as a hit on either side.
        let crack = 1e-7;
        assert!(down(-crack, 0.5).intersect_triangle(DVec3::ZERO, DVec3::X, DVec3::Y).is_some());
        assert!(down(-1e-3, 0.5).intersect_triangle(DVec3::ZERO, DVec3::X, DVec3::Y).is_none());
    }

    #[test]
    fn test_triangle_behind_origin_is_ignored() {
        let ray = Line::new(DVec3::new(0.25, 0.25, 5.0), DVec3::Z);
        assert!(ray.intersect_triangle(DVec3::ZERO, DVec3::X, DVec3::Y).is_none());
    }
}
