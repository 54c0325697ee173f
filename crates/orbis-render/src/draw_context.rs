//! Per-frame state shared by the scene controller, layers, and renderables.

use std::sync::Arc;

use glam::{DMat4, DVec2};
use orbis_geom::Ellipsoid;
use orbis_navigate::NavigatorState;
use orbis_terrain::{ElevationStamp, Terrain, TerrainGeometry};

use crate::error::RenderError;
use crate::gpu_cache::{GpuResource, GpuResourceCache};
use crate::graphics::{Color, GpuHandle, Graphics, Topology};
use crate::pick::{PickSupport, PickedObject, code_to_color};
use crate::renderable::OrderedRenderable;
use crate::stats::FrameStatistics;

const UNIT_QUAD_KEY: &str = "orbis/unit-quad";

/// Everything a layer or renderable needs to draw into the current frame.
///
/// The graphics context and GPU resource cache live for the controller's
/// lifetime. Everything else is scratch state cleared by
/// [`DrawContext::reset`] at the start of each frame.
pub struct DrawContext {
    graphics: Box<dyn Graphics>,
    gpu_cache: GpuResourceCache,
    navigator_state: Option<Arc<NavigatorState>>,
    terrain: Terrain,
    ellipsoid: Ellipsoid,
    vertical_exaggeration: f64,
    clear_color: Color,
    picking: bool,
    /// Pick point in window coordinates, bottom-left origin.
    pick_point: Option<DVec2>,
    pick_support: PickSupport,
    ordered_renderables: Vec<Box<dyn OrderedRenderable>>,
    current_layer: Option<String>,
    statistics: FrameStatistics,
}

impl DrawContext {
    pub fn new(graphics: Box<dyn Graphics>, gpu_cache: GpuResourceCache) -> Self {
        Self {
            graphics,
            gpu_cache,
            navigator_state: None,
            terrain: Terrain::default(),
            ellipsoid: Ellipsoid::default(),
            vertical_exaggeration: 1.0,
            clear_color: Color::BLACK,
            picking: false,
            pick_point: None,
            pick_support: PickSupport::new(),
            ordered_renderables: Vec::new(),
            current_layer: None,
            statistics: FrameStatistics::default(),
        }
    }

    /// Clears per-frame scratch state and installs the frame's camera.
    pub fn reset(&mut self, navigator_state: Arc<NavigatorState>) {
        self.navigator_state = Some(navigator_state);
        self.terrain = Terrain::default();
        self.picking = false;
        self.pick_point = None;
        self.pick_support.clear();
        self.ordered_renderables.clear();
        self.current_layer = None;
    }

    /// The camera snapshot for this frame.
    pub fn navigator_state(&self) -> Result<&Arc<NavigatorState>, RenderError> {
        self.navigator_state.as_ref().ok_or_else(|| {
            RenderError::PreconditionViolation("no navigator state installed".into())
        })
    }

    pub fn graphics(&self) -> &dyn Graphics {
        &*self.graphics
    }

    pub fn graphics_mut(&mut self) -> &mut dyn Graphics {
        &mut *self.graphics
    }

    pub fn gpu_cache(&self) -> &GpuResourceCache {
        &self.gpu_cache
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn set_terrain(&mut self, terrain: Terrain) {
        self.terrain = terrain;
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    pub fn set_ellipsoid(&mut self, ellipsoid: Ellipsoid) {
        self.ellipsoid = ellipsoid;
    }

    pub fn vertical_exaggeration(&self) -> f64 {
        self.vertical_exaggeration
    }

    pub fn set_vertical_exaggeration(&mut self, vertical_exaggeration: f64) {
        self.vertical_exaggeration = vertical_exaggeration;
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    pub fn is_picking(&self) -> bool {
        self.picking
    }

    pub fn pick_point(&self) -> Option<DVec2> {
        self.pick_point
    }

    pub(crate) fn begin_picking(&mut self, pick_point: DVec2) {
        self.picking = true;
        self.pick_point = Some(pick_point);
    }

    pub fn pick_support(&self) -> &PickSupport {
        &self.pick_support
    }

    /// Allocates a pick code and the opaque color that encodes it.
    pub fn unique_pick_color(&mut self) -> (u32, Color) {
        let code = self.pick_support.unique_color_code();
        (code, code_to_color(code))
    }

    /// Registers an object drawn in this pick frame, tagging it with the layer
    /// currently rendering when it carries no layer name of its own.
    pub fn add_pickable_object(&mut self, object: PickedObject) {
        let object = match (&self.current_layer, object.layer_name()) {
            (Some(layer), None) => object.with_layer_name(layer.clone()),
            _ => object,
        };
        self.pick_support.add_pickable_object(object);
    }

    pub fn current_layer_name(&self) -> Option<&str> {
        self.current_layer.as_deref()
    }

    pub(crate) fn set_current_layer_name(&mut self, name: Option<String>) {
        self.current_layer = name;
    }

    /// Queues a shape for the back-to-front pass after all layers.
    pub fn add_ordered_renderable(&mut self, renderable: Box<dyn OrderedRenderable>) {
        self.ordered_renderables.push(renderable);
    }

    pub fn ordered_renderable_count(&self) -> usize {
        self.ordered_renderables.len()
    }

    /// Drains the queue sorted farthest first. The sort is stable, so equal
    /// distances keep insertion order.
    pub(crate) fn take_ordered_renderables(&mut self) -> Vec<Box<dyn OrderedRenderable>> {
        let mut queue = std::mem::take(&mut self.ordered_renderables);
        queue.sort_by(|a, b| b.eye_distance().total_cmp(&a.eye_distance()));
        queue
    }

    pub fn statistics(&self) -> &FrameStatistics {
        &self.statistics
    }

    pub(crate) fn statistics_mut(&mut self) -> &mut FrameStatistics {
        &mut self.statistics
    }

    pub fn draw_mesh(
        &mut self,
        handle: GpuHandle,
        mvp: &DMat4,
        color: Color,
    ) -> Result<(), RenderError> {
        self.graphics.draw_mesh(handle, mvp, color)
    }

    /// Draws every visible terrain tile that has geometry. Returns the number
    /// of tiles drawn.
    pub fn draw_terrain(&mut self, topology: Topology, color: Color) -> Result<usize, RenderError> {
        let state = Arc::clone(self.navigator_state()?);
        let mut drawn = 0;
        for tile in self.terrain.tiles() {
            let Some(geometry) = tile.geometry() else {
                continue;
            };
            let handle = terrain_mesh(
                &mut *self.graphics,
                &self.gpu_cache,
                tile.gpu_cache_key(),
                geometry,
                topology,
            )?;
            // Vertices are relative to the tile's reference center.
            let mvp = *state.modelview_projection()
                * DMat4::from_translation(geometry.reference_center);
            self.graphics.draw_mesh(handle, &mvp, color)?;
            drawn += 1;
        }
        Ok(drawn)
    }

    /// A unit square in the XY plane centered on the origin, shared by
    /// screen-aligned shapes.
    pub fn unit_quad(&mut self) -> Result<GpuHandle, RenderError> {
        if let Some(resource) = self.gpu_cache.get(UNIT_QUAD_KEY, 0) {
            return Ok(resource.handle);
        }
        let vertices = [
            [-0.5, -0.5, 0.0],
            [0.5, -0.5, 0.0],
            [0.5, 0.5, 0.0],
            [-0.5, 0.5, 0.0],
        ];
        let indices = [0, 1, 2, 0, 2, 3];
        let handle = self
            .graphics
            .create_mesh(&vertices, &indices, Topology::Triangles)?;
        let resource = GpuResource {
            handle,
            version: 0,
            size: std::mem::size_of_val(&vertices) + std::mem::size_of_val(&indices),
        };
        Ok(self
            .gpu_cache
            .put_uploaded(&mut *self.graphics, UNIT_QUAD_KEY, resource)?)
    }

    /// Deletes GPU resources evicted from the cache since the last call.
    pub(crate) fn release_evicted(&mut self) -> usize {
        self.gpu_cache.release_evicted(&mut *self.graphics)
    }
}

/// Version of a terrain mesh built from geometry with `stamp`.
fn geometry_version(stamp: ElevationStamp) -> u64 {
    stamp.timestamp.rotate_left(32) ^ stamp.vertical_exaggeration.to_bits()
}

/// Uploads terrain geometry for `topology` unless an up-to-date mesh is
/// already cached.
fn terrain_mesh(
    graphics: &mut dyn Graphics,
    cache: &GpuResourceCache,
    tile_key: &str,
    geometry: &TerrainGeometry,
    topology: Topology,
) -> Result<GpuHandle, RenderError> {
    let (suffix, indices) = match topology {
        Topology::Triangles => ("surface", &geometry.indices),
        Topology::Lines => ("wireframe", &geometry.wireframe_indices),
    };
    let key = format!("{tile_key}/{suffix}");
    let version = geometry_version(geometry.stamp);
    if let Some(resource) = cache.get(&key, version) {
        return Ok(resource.handle);
    }

    let handle = graphics.create_mesh(&geometry.vertices, indices, topology)?;
    let size = std::mem::size_of_val(geometry.vertices.as_slice())
        + std::mem::size_of_val(indices.as_slice());
    let resource = GpuResource {
        handle,
        version,
        size,
    };
    Ok(cache.put_uploaded(graphics, key, resource)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pick::{PickTarget, ShapeId};
    use crate::software::SoftwareGraphics;
    use glam::DVec3;
    use orbis_geom::Viewport;

    struct Marker {
        id: u32,
        distance: f64,
        rendered: Arc<parking_lot::Mutex<Vec<u32>>>,
    }

    impl OrderedRenderable for Marker {
        fn eye_distance(&self) -> f64 {
            self.distance
        }

        fn render(&self, _dc: &mut DrawContext) -> Result<(), RenderError> {
            self.rendered.lock().push(self.id);
            Ok(())
        }
    }

    fn context() -> DrawContext {
        let graphics = SoftwareGraphics::new(16, 16).unwrap();
        let cache = GpuResourceCache::new(1 << 20, 1 << 19).unwrap();
        DrawContext::new(Box::new(graphics), cache)
    }

    fn state() -> Arc<NavigatorState> {
        let modelview = DMat4::look_at_rh(DVec3::new(0.0, 0.0, 10.0), DVec3::ZERO, DVec3::Y);
        let projection = DMat4::perspective_rh(1.0, 1.0, 1.0, 100.0);
        Arc::new(NavigatorState::new(modelview, projection, Viewport::new(0, 0, 16, 16)).unwrap())
    }

    #[test]
    fn test_navigator_state_required() {
        let mut dc = context();
        assert!(dc.navigator_state().unwrap_err().is_precondition_violation());
        dc.reset(state());
        assert!(dc.navigator_state().is_ok());
    }

    #[test]
    fn test_ordered_renderables_sort_back_to_front_with_stable_ties() {
        let mut dc = context();
        let rendered = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for (id, distance) in [(0, 5.0), (1, 9.0), (2, 5.0), (3, 1.0), (4, 9.0)] {
            dc.add_ordered_renderable(Box::new(Marker {
                id,
                distance,
                rendered: Arc::clone(&rendered),
            }));
        }
        for r in dc.take_ordered_renderables() {
            r.render(&mut dc).unwrap();
        }
        assert_eq!(*rendered.lock(), [1, 4, 0, 2, 3]);
        assert_eq!(dc.ordered_renderable_count(), 0);
    }

    #[test]
    fn test_reset_clears_scratch_state() {
        let mut dc = context();
        dc.begin_picking(DVec2::new(1.0, 1.0));
        let (code, _) = dc.unique_pick_color();
        dc.add_pickable_object(PickedObject::new(code, PickTarget::Terrain, None));
        dc.add_ordered_renderable(Box::new(Marker {
            id: 0,
            distance: 1.0,
            rendered: Arc::default(),
        }));

        dc.reset(state());
        assert!(!dc.is_picking());
        assert!(dc.pick_point().is_none());
        assert_eq!(dc.pick_support().object_count(), 0);
        assert_eq!(dc.ordered_renderable_count(), 0);
        assert_eq!(dc.unique_pick_color().0, 1);
    }

    #[test]
    fn test_pickable_objects_take_layer_name() {
        let mut dc = context();
        dc.set_current_layer_name(Some("Placemarks".into()));
        let (code, color) = dc.unique_pick_color();
        dc.add_pickable_object(PickedObject::new(code, PickTarget::Shape(ShapeId(3)), None));
        let picked = dc.pick_support().resolve(color.to_rgba8()).unwrap();
        assert_eq!(picked.layer_name(), Some("Placemarks"));
    }

    #[test]
    fn test_unit_quad_is_cached() {
        let mut dc = context();
        let a = dc.unit_quad().unwrap();
        let b = dc.unit_quad().unwrap();
        assert_eq!(a, b);
        assert_eq!(dc.graphics().mesh_count(), 1);
    }

    #[test]
    fn test_mesh_refused_by_cache_is_deleted() {
        let graphics = SoftwareGraphics::new(16, 16).unwrap();
        let mut dc = DrawContext::new(Box::new(graphics), GpuResourceCache::new(64, 32).unwrap());
        assert!(dc.unit_quad().is_err());
        assert!(dc.unit_quad().is_err());
        assert_eq!(dc.graphics().mesh_count(), 0);
        assert_eq!(dc.gpu_cache().entry_count(), 0);
    }
}
