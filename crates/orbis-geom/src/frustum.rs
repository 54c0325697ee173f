//! View frustum in model coordinates, extracted from a combined modelview-projection matrix.
//!
//! Planes follow the Griggs-Hartmann extraction for a right-handed projection with a
//! `[0, 1]` clip-space depth range (the convention of `DMat4::perspective_rh`).

use glam::{DMat4, DVec3, DVec4};

use crate::bounding_box::BoundingBox;

const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// Six inward-facing planes `(a, b, c, d)` with unit normals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    planes: [DVec4; 6],
}

impl Frustum {
    /// Extract planes from `projection * modelview`. The planes are in whatever frame the
    /// matrix's input points live in: pass a projection alone for eye coordinates.
    pub fn from_matrix(m: &DMat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [DVec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    pub fn planes(&self) -> &[DVec4; 6] {
        &self.planes
    }

    pub fn near(&self) -> DVec4 {
        self.planes[NEAR]
    }

    pub fn far(&self) -> DVec4 {
        self.planes[FAR]
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(p) + plane.w >= 0.0)
    }

    /// Positive-vertex test: a box is rejected only when its corner furthest along some
    /// plane normal is still behind that plane.
    pub fn intersects_box(&self, bb: &BoundingBox) -> bool {
        for plane in &self.planes {
            let n = plane.truncate();
            let p = DVec3::new(
                if n.x >= 0.0 { bb.max.x } else { bb.min.x },
                if n.y >= 0.0 { bb.max.y } else { bb.min.y },
                if n.z >= 0.0 { bb.max.z } else { bb.min.z },
            );
            if n.dot(p) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}
