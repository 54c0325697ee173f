//! Shapes drawn in the back-to-front pass after all layers.

use std::sync::Arc;

use glam::{DMat4, DVec3};
use orbis_geom::Position;

use crate::draw_context::DrawContext;
use crate::error::RenderError;
use crate::graphics::Color;
use crate::pick::{PickTarget, PickedObject, ShapeId};

/// A shape queued by a layer and drawn after every layer has rendered,
/// farthest first.
pub trait OrderedRenderable {
    /// Distance from the frame's eye point, used for the back-to-front sort.
    fn eye_distance(&self) -> f64;

    fn render(&self, dc: &mut DrawContext) -> Result<(), RenderError>;
}

/// A screen-aligned square marker at a geographic position.
///
/// The altitude is absolute and scaled by the frame's vertical exaggeration.
#[derive(Clone, Debug, PartialEq)]
pub struct Placemark {
    id: ShapeId,
    position: Position,
    /// Edge length in pixels.
    size: f64,
    color: Color,
    pickable: bool,
}

impl Placemark {
    pub const DEFAULT_SIZE: f64 = 16.0;

    #[must_use]
    pub fn new(id: ShapeId, position: Position) -> Self {
        Self {
            id,
            position,
            size: Self::DEFAULT_SIZE,
            color: Color::WHITE,
            pickable: true,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_pickable(mut self, pickable: bool) -> Self {
        self.pickable = pickable;
        self
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_pickable(&self) -> bool {
        self.pickable
    }

    /// Snapshot of this placemark for the current frame, or `None` when it is
    /// outside the view frustum.
    pub(crate) fn make_ordered_renderable(
        &self,
        dc: &DrawContext,
        layer_name: &str,
    ) -> Result<Option<PlacemarkRenderable>, RenderError> {
        let state = dc.navigator_state()?;
        let p = self.position;
        let point = dc.ellipsoid().compute_point(
            p.latitude,
            p.longitude,
            p.altitude * dc.vertical_exaggeration(),
        );
        if !state.frustum_in_model_coordinates().contains_point(point) {
            return Ok(None);
        }
        Ok(Some(PlacemarkRenderable {
            id: self.id,
            position: p,
            point,
            size: self.size,
            color: self.color,
            eye_distance: point.distance(state.eye_point()),
            layer_name: Arc::from(layer_name),
        }))
    }
}

/// Per-frame snapshot of a [`Placemark`], queued as an ordered renderable.
#[derive(Clone, Debug)]
pub(crate) struct PlacemarkRenderable {
    id: ShapeId,
    position: Position,
    point: DVec3,
    size: f64,
    color: Color,
    eye_distance: f64,
    layer_name: Arc<str>,
}

impl OrderedRenderable for PlacemarkRenderable {
    fn eye_distance(&self) -> f64 {
        self.eye_distance
    }

    fn render(&self, dc: &mut DrawContext) -> Result<(), RenderError> {
        let state = Arc::clone(dc.navigator_state()?);
        let quad = dc.unit_quad()?;

        // Billboard basis from the camera axes, scaled to `size` pixels.
        let scale = state.pixel_size_at_distance(self.eye_distance) * self.size;
        let camera = state.modelview_inv();
        let model = DMat4::from_cols(
            (camera.x_axis.truncate() * scale).extend(0.0),
            (camera.y_axis.truncate() * scale).extend(0.0),
            camera.z_axis.truncate().extend(0.0),
            self.point.extend(1.0),
        );
        let mvp = *state.modelview_projection() * model;

        let color = if dc.is_picking() {
            let (code, color) = dc.unique_pick_color();
            dc.add_pickable_object(
                PickedObject::new(code, PickTarget::Shape(self.id), Some(self.position))
                    .with_layer_name(&*self.layer_name),
            );
            color
        } else {
            self.color
        };
        dc.draw_mesh(quad, &mvp, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu_cache::GpuResourceCache;
    use crate::graphics::Graphics;
    use crate::software::SoftwareGraphics;
    use orbis_geom::{Ellipsoid, Location, Viewport};
    use orbis_navigate::{LookAtNavigator, Navigator};

    fn frame() -> DrawContext {
        let graphics = SoftwareGraphics::new(64, 64).unwrap();
        let cache = GpuResourceCache::new(1 << 20, 1 << 19).unwrap();
        let mut dc = DrawContext::new(Box::new(graphics), cache);
        let viewport = Viewport::new(0, 0, 64, 64);
        let nav = LookAtNavigator::new(Location::new(0.0, 0.0), 1.0e7);
        dc.reset(Arc::new(nav.current_state(viewport).unwrap()));
        dc.set_ellipsoid(Ellipsoid::WGS84);
        dc.graphics_mut().begin_frame(viewport, Color::BLACK).unwrap();
        dc
    }

    #[test]
    fn test_placemark_behind_globe_is_culled_by_frustum() {
        let dc = frame();
        let visible = Placemark::new(ShapeId(1), Position::new(0.0, 0.0, 1000.0));
        let behind = Placemark::new(ShapeId(2), Position::new(0.0, 180.0, 0.0));
        assert!(visible.make_ordered_renderable(&dc, "marks").unwrap().is_some());
        assert!(behind.make_ordered_renderable(&dc, "marks").unwrap().is_none());
    }

    #[test]
    fn test_placemark_renders_at_its_projected_point() {
        let mut dc = frame();
        let red = Color::new(1.0, 0.0, 0.0, 1.0);
        let mark = Placemark::new(ShapeId(1), Position::new(0.0, 0.0, 1000.0))
            .with_size(10.0)
            .with_color(red);
        let renderable = mark.make_ordered_renderable(&dc, "marks").unwrap().unwrap();
        renderable.render(&mut dc).unwrap();

        assert_eq!(dc.graphics_mut().read_pixel(32, 32).unwrap(), [255, 0, 0, 255]);
        assert_eq!(dc.graphics_mut().read_pixel(32, 45).unwrap(), [0, 0, 0, 255]);
    }

    #[test]
    fn test_placemark_registers_pick_identity() {
        let mut dc = frame();
        dc.begin_picking(glam::DVec2::new(32.0, 32.0));
        let mark = Placemark::new(ShapeId(9), Position::new(0.0, 0.0, 1000.0)).with_size(10.0);
        let renderable = mark.make_ordered_renderable(&dc, "marks").unwrap().unwrap();
        renderable.render(&mut dc).unwrap();

        let pixel = dc.graphics_mut().read_pixel(32, 32).unwrap();
        let picked = dc.pick_support().resolve(pixel).unwrap();
        assert_eq!(picked.target(), PickTarget::Shape(ShapeId(9)));
        assert_eq!(picked.layer_name(), Some("marks"));
        assert_eq!(picked.position(), Some(Position::new(0.0, 0.0, 1000.0)));
    }
}
