//! Axis-aligned bounding volumes in model coordinates (f64).

use glam::DVec3;

use crate::frustum::Frustum;
use crate::line::Line;

/// An axis-aligned box in model coordinates, used as a tile's extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: DVec3::ZERO,
            max: DVec3::ZERO,
        }
    }
}

impl BoundingBox {
    /// Create a box from two corners. Components are sorted so `min <= max` per axis.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box enclosing `points`. Returns `None` for an empty slice.
    pub fn from_points(points: &[DVec3]) -> Option<Self> {
        let mut bb = Self::default();
        if bb.set_to_points(points) { Some(bb) } else { None }
    }

    /// Recompute this box in place to enclose `points`. Leaves the box untouched and
    /// returns `false` when `points` is empty.
    pub fn set_to_points(&mut self, points: &[DVec3]) -> bool {
        let Some(first) = points.first() else {
            return false;
        };
        let (mut min, mut max) = (*first, *first);
        for p in &points[1..] {
            min = min.min(*p);
            max = max.max(*p);
        }
        self.min = min;
        self.max = max;
        true
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the diagonal length.
    pub fn radius(&self) -> f64 {
        (self.max - self.min).length() * 0.5
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Euclidean distance from `p` to the nearest point of the box; zero inside.
    pub fn distance_to(&self, p: DVec3) -> f64 {
        let clamped = p.clamp(self.min, self.max);
        (p - clamped).length()
    }

    /// Slab test: whether the ray enters the box at a non-negative parameter.
    pub fn intersects_line(&self, line: &Line) -> bool {
        let mut t_min = 0.0_f64;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            let o = line.origin[axis];
            let d = line.direction[axis];
            if d.abs() < f64::EPSILON {
                if o < self.min[axis] || o > self.max[axis] {
                    return false;
                }
                continue;
            }
            let t1 = (self.min[axis] - o) / d;
            let t2 = (self.max[axis] - o) / d;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
            if t_min > t_max {
                return false;
            }
        }
        true
    }

    /// Grow the box by `amount` along every axis in both directions.
    pub fn inflate(&mut self, amount: f64) {
        self.min -= DVec3::splat(amount);
        self.max += DVec3::splat(amount);
    }

    /// Conservative frustum test: may accept boxes just outside a frustum corner.
    pub fn intersects_frustum(&self, frustum: &Frustum) -> bool {
        frustum.intersects_box(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_encloses_all() {
        let pts = [
            DVec3::new(1.0, -2.0, 3.0),
            DVec3::new(-4.0, 5.0, 0.0),
            DVec3::new(2.0, 1.0, -6.0),
        ];
        let bb = BoundingBox::from_points(&pts).unwrap();
        assert_eq!(bb.min, DVec3::new(-4.0, -2.0, -6.0));
        assert_eq!(bb.max, DVec3::new(2.0, 5.0, 3.0));
        for p in pts {
            assert!(bb.contains_point(p));
        }
    }

    #[test]
    fn test_from_points_empty_is_none() {
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_distance_to_outside_and_inside() {
        let bb = BoundingBox::new(DVec3::ZERO, DVec3::ONE);
        assert_eq!(bb.distance_to(DVec3::splat(0.5)), 0.0);
        assert!((bb.distance_to(DVec3::new(3.0, 0.5, 0.5)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_line_slab_test() {
        let bb = BoundingBox::new(DVec3::ZERO, DVec3::ONE);
        assert!(bb.intersects_line(&Line::new(DVec3::new(0.5, 0.5, 5.0), DVec3::NEG_Z)));
        assert!(!bb.intersects_line(&Line::new(DVec3::new(0.5, 0.5, 5.0), DVec3::Z)));
        assert!(!bb.intersects_line(&Line::new(DVec3::new(2.0, 0.5, 5.0), DVec3::NEG_Z)));
        assert!(bb.intersects_line(&Line::new(DVec3::splat(0.5), DVec3::X)));
    }

    #[test]
    fn test_center_and_radius() {
        let bb = BoundingBox::new(DVec3::new(2.0, 2.0, 2.0), DVec3::new(-2.0, -2.0, -2.0));
        assert_eq!(bb.center(), DVec3::ZERO);
        assert!((bb.radius() - 12f64.sqrt()).abs() < 1e-12);
    }
}
