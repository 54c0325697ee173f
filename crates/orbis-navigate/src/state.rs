//! Immutable camera snapshot shared by every pass of a frame.

use glam::{DMat4, DVec3, DVec4};
use orbis_geom::{Frustum, GeomError, Line, Viewport, matrix};

/// A frozen view of the camera: matrices, their inverses, the eye, and the frustum, all in
/// model coordinates. Everything is computed in [`NavigatorState::new`]; accessors only read.
#[derive(Clone, Debug, PartialEq)]
pub struct NavigatorState {
    modelview: DMat4,
    projection: DMat4,
    modelview_projection: DMat4,
    modelview_inv: DMat4,
    projection_inv: DMat4,
    modelview_projection_inv: DMat4,
    viewport: Viewport,
    eye_point: DVec3,
    forward: DVec3,
    forward_ray: Line,
    frustum: Frustum,
    pixel_size_scale: f64,
    pixel_size_offset: f64,
}

impl NavigatorState {
    /// Build a snapshot.
    ///
    /// Fails with `InvalidArgument` for non-finite matrices or a zero-area viewport, and
    /// with `NumericDegenerate` when a matrix cannot be inverted.
    pub fn new(modelview: DMat4, projection: DMat4, viewport: Viewport) -> Result<Self, GeomError> {
        if !modelview.is_finite() {
            return Err(GeomError::InvalidArgument(
                "modelview matrix is not finite".to_string(),
            ));
        }
        if !projection.is_finite() {
            return Err(GeomError::InvalidArgument(
                "projection matrix is not finite".to_string(),
            ));
        }
        if viewport.is_empty() {
            return Err(GeomError::InvalidArgument(format!(
                "viewport {}x{} has zero area",
                viewport.width, viewport.height
            )));
        }

        let modelview_projection = projection * modelview;
        let modelview_inv = matrix::try_inverse(&modelview)?;
        let projection_inv = matrix::try_inverse(&projection)?;
        let modelview_projection_inv = matrix::try_inverse(&modelview_projection)?;

        let eye_point = matrix::translation(&modelview_inv);
        let forward = modelview_inv.transform_vector3(DVec3::NEG_Z).normalize_or_zero();
        let forward_ray = Line::new(eye_point, forward);
        let frustum = Frustum::from_matrix(&modelview_projection);

        let (pixel_size_scale, pixel_size_offset) =
            pixel_size_coefficients(&projection_inv, viewport);

        Ok(Self {
            modelview,
            projection,
            modelview_projection,
            modelview_inv,
            projection_inv,
            modelview_projection_inv,
            viewport,
            eye_point,
            forward,
            forward_ray,
            frustum,
            pixel_size_scale,
            pixel_size_offset,
        })
    }

    pub fn modelview(&self) -> &DMat4 {
        &self.modelview
    }

    pub fn projection(&self) -> &DMat4 {
        &self.projection
    }

    pub fn modelview_projection(&self) -> &DMat4 {
        &self.modelview_projection
    }

    pub fn modelview_inv(&self) -> &DMat4 {
        &self.modelview_inv
    }

    pub fn projection_inv(&self) -> &DMat4 {
        &self.projection_inv
    }

    pub fn modelview_projection_inv(&self) -> &DMat4 {
        &self.modelview_projection_inv
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Eye position in model coordinates.
    pub fn eye_point(&self) -> DVec3 {
        self.eye_point
    }

    /// Unit viewing direction in model coordinates.
    pub fn forward(&self) -> DVec3 {
        self.forward
    }

    pub fn forward_ray(&self) -> Line {
        self.forward_ray
    }

    pub fn frustum_in_model_coordinates(&self) -> &Frustum {
        &self.frustum
    }

    /// Model-coordinate width of one viewport pixel on a plane `distance` meters in front
    /// of the eye.
    pub fn pixel_size_at_distance(&self, distance: f64) -> f64 {
        self.pixel_size_scale * distance + self.pixel_size_offset
    }

    /// Map a model point to window coordinates `(x, y, depth)` with a bottom-left origin.
    /// Returns `None` for points at or behind the eye plane.
    pub fn project(&self, point: DVec3) -> Option<DVec3> {
        let clip = self.modelview_projection * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let vp = self.viewport;
        Some(DVec3::new(
            vp.x as f64 + (ndc.x + 1.0) * 0.5 * vp.width as f64,
            vp.y as f64 + (ndc.y + 1.0) * 0.5 * vp.height as f64,
            ndc.z,
        ))
    }

    /// Inverse of [`NavigatorState::project`]: window `(x, y, depth)` to a model point.
    pub fn unproject(&self, window: DVec3) -> Option<DVec3> {
        let vp = self.viewport;
        let ndc = DVec4::new(
            2.0 * (window.x - vp.x as f64) / vp.width as f64 - 1.0,
            2.0 * (window.y - vp.y as f64) / vp.height as f64 - 1.0,
            window.z,
            1.0,
        );
        let p = self.modelview_projection_inv * ndc;
        if p.w.abs() < f64::EPSILON {
            return None;
        }
        Some(p.truncate() / p.w)
    }

    /// Ray from the near plane through a bottom-left-origin window point, unit direction.
    pub fn ray_through_screen_point(&self, x: f64, y: f64) -> Option<Line> {
        let near = self.unproject(DVec3::new(x, y, 0.0))?;
        let far = self.unproject(DVec3::new(x, y, 1.0))?;
        let direction = (far - near).try_normalize()?;
        Some(Line::new(near, direction))
    }
}

/// Fit `width(d) = scale * d + offset` for the frustum's per-pixel width at eye distance
/// `d`, sampling the near and far clip planes.
fn pixel_size_coefficients(projection_inv: &DMat4, viewport: Viewport) -> (f64, f64) {
    let sample = |ndc_z: f64| {
        let left = projection_inv.project_point3(DVec3::new(-1.0, 0.0, ndc_z));
        let right = projection_inv.project_point3(DVec3::new(1.0, 0.0, ndc_z));
        (-left.z, (right - left).length())
    };
    let (near_d, near_w) = sample(0.0);
    let (far_d, far_w) = sample(1.0);

    let width = viewport.width as f64;
    let span = far_d - near_d;
    if span.abs() < f64::EPSILON {
        return (0.0, near_w / width);
    }
    let scale = (far_w - near_w) / span;
    let offset = near_w - scale * near_d;
    (scale / width, offset / width)
}
