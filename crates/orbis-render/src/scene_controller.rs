//! The frame state machine: render and pick frames over the globe.

use std::sync::Arc;
use std::time::Instant;

use glam::DVec2;
use orbis_geom::{Position, Viewport};
use orbis_navigate::Navigator;
use orbis_terrain::{Globe, Terrain};

use crate::draw_context::DrawContext;
use crate::error::RenderError;
use crate::gpu_cache::GpuResourceCache;
use crate::graphics::{Color, Graphics, Topology};
use crate::layer::{Layer, LayerList};
use crate::pick::{PickTarget, PickedObject, PickedObjectList};
use crate::stats::FrameStatistics;

/// Where a frame is in its pipeline. Every frame returns to `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameState {
    Idle,
    FrameBegin,
    TerrainGenerated,
    LayersDrawn,
    RenderablesDrawn,
    FrameEnd,
}

/// Scene-wide settings applied to every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneOptions {
    pub clear_color: Color,
    pub vertical_exaggeration: f64,
    pub gpu_cache_capacity: usize,
    pub gpu_cache_low_water: usize,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            clear_color: Color::BLACK,
            vertical_exaggeration: 1.0,
            gpu_cache_capacity: 64 * 1024 * 1024,
            gpu_cache_low_water: 48 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum FrameMode {
    Render,
    /// Color-coded pick at a bottom-left-origin pixel.
    Pick { column: u32, row: u32, point: DVec2 },
    /// Terrain-only pick at a bottom-left-origin point.
    PickTerrain { point: DVec2 },
}

/// Drives render and pick frames for one globe, navigator and layer list.
///
/// Not re-entrant: frames must be issued one at a time from the thread that
/// owns the graphics context.
pub struct SceneController<N> {
    globe: Globe,
    navigator: N,
    layers: LayerList,
    dc: DrawContext,
    state: FrameState,
    frame_begun: bool,
    frame_started: Option<Instant>,
}

impl<N: Navigator> SceneController<N> {
    pub fn new(
        graphics: Box<dyn Graphics>,
        globe: Globe,
        navigator: N,
        options: &SceneOptions,
    ) -> Result<Self, RenderError> {
        let gpu_cache =
            GpuResourceCache::new(options.gpu_cache_capacity, options.gpu_cache_low_water)?;
        let mut dc = DrawContext::new(graphics, gpu_cache);
        dc.set_ellipsoid(*globe.ellipsoid());
        dc.set_clear_color(options.clear_color);
        dc.set_vertical_exaggeration(options.vertical_exaggeration);
        Ok(Self {
            globe,
            navigator,
            layers: LayerList::new(),
            dc,
            state: FrameState::Idle,
            frame_begun: false,
            frame_started: None,
        })
    }

    pub fn frame_state(&self) -> FrameState {
        self.state
    }

    pub fn globe(&self) -> &Globe {
        &self.globe
    }

    pub fn globe_mut(&mut self) -> &mut Globe {
        &mut self.globe
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut N {
        &mut self.navigator
    }

    pub fn layers(&self) -> &LayerList {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerList {
        &mut self.layers
    }

    pub fn draw_context(&self) -> &DrawContext {
        &self.dc
    }

    pub fn graphics_mut(&mut self) -> &mut dyn Graphics {
        self.dc.graphics_mut()
    }

    /// Statistics for the most recent frame.
    pub fn statistics(&self) -> &FrameStatistics {
        self.dc.statistics()
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.dc.set_clear_color(color);
    }

    pub fn set_vertical_exaggeration(&mut self, vertical_exaggeration: f64) {
        self.dc.set_vertical_exaggeration(vertical_exaggeration);
    }

    /// The terrain produced by the most recent frame.
    pub fn terrain(&self) -> &Terrain {
        self.dc.terrain()
    }

    /// Renders one frame into `viewport`.
    pub fn render(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        let outcome = self.run_frame(viewport, FrameMode::Render).map(|_| ());
        self.finish_frame();
        outcome
    }

    /// Picks the topmost object under `pick_point`, given with a top-left
    /// origin. A point outside the viewport, or over nothing, yields an empty
    /// list.
    pub fn pick(
        &mut self,
        viewport: Viewport,
        pick_point: DVec2,
    ) -> Result<PickedObjectList, RenderError> {
        self.check_preconditions(viewport)?;
        let Some((column, row, point)) = self.pick_pixel(viewport, pick_point) else {
            return Ok(PickedObjectList::new());
        };
        let outcome = self.run_frame(viewport, FrameMode::Pick { column, row, point });
        self.finish_frame();
        outcome
    }

    /// Resolves only the terrain position under `pick_point` (top-left origin).
    pub fn pick_terrain(
        &mut self,
        viewport: Viewport,
        pick_point: DVec2,
    ) -> Result<PickedObjectList, RenderError> {
        self.check_preconditions(viewport)?;
        let Some((_, _, point)) = self.pick_pixel(viewport, pick_point) else {
            return Ok(PickedObjectList::new());
        };
        let outcome = self.run_frame(viewport, FrameMode::PickTerrain { point });
        self.finish_frame();
        outcome
    }

    /// Releases every GPU resource the controller holds. The controller stays
    /// usable; resources are recreated on demand.
    pub fn dispose(&mut self) -> Result<(), RenderError> {
        if !self.dc.graphics().is_current() {
            return Err(RenderError::PreconditionViolation(
                "graphics context is not current".into(),
            ));
        }
        self.dc.gpu_cache().clear();
        let released = self.dc.release_evicted();
        log::debug!("Disposed scene controller, released {released} GPU resources");
        Ok(())
    }

    fn check_preconditions(&self, viewport: Viewport) -> Result<(), RenderError> {
        if viewport.is_empty() {
            return Err(RenderError::InvalidArgument(format!(
                "viewport {}x{} has zero area",
                viewport.width, viewport.height
            )));
        }
        if !self.dc.graphics().is_current() {
            return Err(RenderError::PreconditionViolation(
                "graphics context is not current".into(),
            ));
        }
        Ok(())
    }

    /// Converts a top-left-origin pick point to the bottom-left-origin point
    /// and the pixel containing it. `None` when the pixel lies outside the
    /// viewport or the color target.
    fn pick_pixel(&self, viewport: Viewport, pick_point: DVec2) -> Option<(u32, u32, DVec2)> {
        if !pick_point.is_finite() {
            return None;
        }
        let (_, target_height) = self.dc.graphics().target_size();
        let point = DVec2::new(pick_point.x, f64::from(target_height) - pick_point.y);
        let column = point.x.floor();
        let row = point.y.ceil() - 1.0;
        if !viewport.contains(column + 0.5, row + 0.5) || column < 0.0 || row < 0.0 {
            return None;
        }
        let (target_width, _) = self.dc.graphics().target_size();
        if column >= f64::from(target_width) || row >= f64::from(target_height) {
            return None;
        }
        Some((column as u32, row as u32, point))
    }

    fn run_frame(
        &mut self,
        viewport: Viewport,
        mode: FrameMode,
    ) -> Result<PickedObjectList, RenderError> {
        self.check_preconditions(viewport)?;
        self.frame_started = Some(Instant::now());
        self.dc.statistics_mut().begin();

        self.reset_draw_context(viewport, mode)?;
        self.begin_frame(viewport)?;
        self.create_terrain();

        match mode {
            FrameMode::Render => {
                self.draw_layers();
                self.draw_ordered_renderables();
                Ok(PickedObjectList::new())
            }
            FrameMode::Pick { column, row, point } => {
                self.draw_terrain_for_pick()?;
                self.draw_layers();
                self.draw_ordered_renderables();
                self.resolve_pick(column, row, point)
            }
            FrameMode::PickTerrain { point } => Ok(self.resolve_terrain_pick(point)),
        }
    }

    fn reset_draw_context(
        &mut self,
        viewport: Viewport,
        mode: FrameMode,
    ) -> Result<(), RenderError> {
        let state = self.navigator.current_state(viewport)?;
        self.dc.reset(Arc::new(state));
        match mode {
            FrameMode::Render => {}
            FrameMode::Pick { point, .. } | FrameMode::PickTerrain { point } => {
                self.dc.begin_picking(point);
            }
        }
        Ok(())
    }

    fn begin_frame(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        let picking = self.dc.is_picking();
        let clear = if picking {
            Color::TRANSPARENT
        } else {
            self.dc.clear_color()
        };
        let graphics = self.dc.graphics_mut();
        graphics.begin_frame(viewport, clear)?;
        graphics.set_picking(picking);
        self.frame_begun = true;
        self.state = FrameState::FrameBegin;
        Ok(())
    }

    /// Tessellation failures leave the frame without terrain.
    fn create_terrain(&mut self) {
        let started = Instant::now();
        let ve = self.dc.vertical_exaggeration();
        let terrain = match self.dc.navigator_state() {
            Ok(state) => match self.globe.tessellate(state, ve) {
                Ok(terrain) => terrain,
                Err(e) => {
                    log::error!("Terrain creation failed: {e}");
                    Terrain::default()
                }
            },
            Err(e) => {
                log::error!("Terrain creation skipped: {e}");
                Terrain::default()
            }
        };
        let stats = self.dc.statistics_mut();
        stats.terrain_tile_count = terrain.len();
        stats.terrain_time = started.elapsed();
        self.dc.set_terrain(terrain);
        self.state = FrameState::TerrainGenerated;
    }

    fn draw_terrain_for_pick(&mut self) -> Result<(), RenderError> {
        let (code, color) = self.dc.unique_pick_color();
        self.dc
            .add_pickable_object(PickedObject::new(code, PickTarget::Terrain, None));
        self.dc.draw_terrain(Topology::Triangles, color)?;
        Ok(())
    }

    fn draw_layers(&mut self) {
        let picking = self.dc.is_picking();
        let mut drawn = 0;
        for layer in self.layers.iter_mut() {
            if !layer.is_enabled() || (picking && !layer.is_pick_enabled()) {
                continue;
            }
            self.dc.set_current_layer_name(Some(layer.name().to_string()));
            if let Err(e) = layer.render(&mut self.dc) {
                log::error!("Layer '{}' failed to render: {e}", layer.name());
            }
            drawn += 1;
        }
        self.dc.set_current_layer_name(None);
        self.dc.statistics_mut().layer_count = drawn;
        self.state = FrameState::LayersDrawn;
    }

    fn draw_ordered_renderables(&mut self) {
        let queue = self.dc.take_ordered_renderables();
        self.dc.statistics_mut().ordered_renderable_count = queue.len();
        for renderable in queue {
            if let Err(e) = renderable.render(&mut self.dc) {
                log::error!("Ordered renderable failed to render: {e}");
            }
        }
        self.state = FrameState::RenderablesDrawn;
    }

    fn resolve_pick(
        &mut self,
        column: u32,
        row: u32,
        point: DVec2,
    ) -> Result<PickedObjectList, RenderError> {
        let pixel = self.dc.graphics_mut().read_pixel(column, row)?;
        let mut list = PickedObjectList::new();
        let Some(mut object) = self.dc.pick_support().resolve(pixel).cloned() else {
            return Ok(list);
        };
        if object.is_terrain() {
            object.set_position(self.terrain_position(point));
        }
        object.set_on_top(true);
        list.add(object);
        Ok(list)
    }

    fn resolve_terrain_pick(&self, point: DVec2) -> PickedObjectList {
        let mut list = PickedObjectList::new();
        if let Some(position) = self.terrain_position(point) {
            let mut object = PickedObject::new(0, PickTarget::Terrain, Some(position));
            object.set_on_top(true);
            list.add(object);
        }
        list
    }

    fn terrain_position(&self, point: DVec2) -> Option<Position> {
        let state = self.dc.navigator_state().ok()?;
        let ray = state.ray_through_screen_point(point.x, point.y)?;
        self.dc.terrain().pick_position(&ray)
    }

    /// Ends the frame whatever happened inside it and returns to `Idle`.
    fn finish_frame(&mut self) {
        if self.frame_begun {
            if let Err(e) = self.dc.graphics_mut().end_frame() {
                log::error!("Failed to end frame: {e}");
            }
            self.frame_begun = false;
        }
        self.state = FrameState::FrameEnd;

        let released = if self.dc.graphics().is_current() {
            self.dc.release_evicted()
        } else {
            0
        };
        let frame_time = self.frame_started.take().map(|t| t.elapsed());
        let used = self.dc.gpu_cache().used_capacity();
        let capacity = self.dc.gpu_cache().capacity();
        let stats = self.dc.statistics_mut();
        stats.gpu_resources_released = released;
        stats.gpu_cache_used = used;
        stats.gpu_cache_capacity = capacity;
        if let Some(frame_time) = frame_time {
            stats.frame_time = frame_time;
        }
        log::trace!("Frame finished: {:?}", self.dc.statistics());

        self.state = FrameState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerAttributes, RenderableLayer, SurfaceLayer};
    use crate::pick::ShapeId;
    use crate::renderable::{OrderedRenderable, Placemark};
    use crate::software::SoftwareGraphics;
    use orbis_geom::{Ellipsoid, Location};
    use orbis_navigate::LookAtNavigator;
    use orbis_terrain::{TessellatorConfig, ZeroElevationModel};
    use parking_lot::Mutex;

    const SIZE: u32 = 64;

    fn viewport() -> Viewport {
        Viewport::new(0, 0, SIZE, SIZE)
    }

    fn controller() -> SceneController<LookAtNavigator> {
        let config = TessellatorConfig {
            max_level: 4,
            worker_count: 0,
            ..Default::default()
        };
        let globe = Globe::new(Ellipsoid::WGS84, Arc::new(ZeroElevationModel), &config).unwrap();
        let navigator = LookAtNavigator::new(Location::new(0.0, 0.0), 1.0e7);
        let graphics = SoftwareGraphics::new(SIZE, SIZE).unwrap();
        SceneController::new(Box::new(graphics), globe, navigator, &SceneOptions::default())
            .unwrap()
    }

    /// A globe with a surface layer and one placemark above the view center.
    fn populated() -> SceneController<LookAtNavigator> {
        let mut c = controller();
        c.layers_mut()
            .add(Box::new(SurfaceLayer::new(Color::new(0.0, 0.0, 1.0, 1.0))));
        let mut marks = RenderableLayer::new("Placemarks");
        marks.add_placemark(
            Placemark::new(ShapeId(1), Position::new(0.0, 0.0, 5.0e4)).with_size(30.0),
        );
        c.layers_mut().add(Box::new(marks));
        c
    }

    struct Recorder {
        id: u32,
        distance: f64,
        log: Arc<Mutex<Vec<u32>>>,
    }

    impl OrderedRenderable for Recorder {
        fn eye_distance(&self) -> f64 {
            self.distance
        }

        fn render(&self, _dc: &mut DrawContext) -> Result<(), RenderError> {
            self.log.lock().push(self.id);
            Ok(())
        }
    }

    /// Queues fixed ordered renderables, or fails when `fail` is set.
    struct ScriptedLayer {
        attributes: LayerAttributes,
        items: Vec<(u32, f64)>,
        fail: bool,
        renders: Arc<Mutex<Vec<u32>>>,
        log: Arc<Mutex<Vec<u32>>>,
    }

    impl ScriptedLayer {
        fn new(name: &str, log: &Arc<Mutex<Vec<u32>>>, renders: &Arc<Mutex<Vec<u32>>>) -> Self {
            Self {
                attributes: LayerAttributes::new(name),
                items: Vec::new(),
                fail: false,
                renders: Arc::clone(renders),
                log: Arc::clone(log),
            }
        }
    }

    impl Layer for ScriptedLayer {
        fn attributes(&self) -> &LayerAttributes {
            &self.attributes
        }

        fn attributes_mut(&mut self) -> &mut LayerAttributes {
            &mut self.attributes
        }

        fn render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
            self.renders.lock().push(self.items.len() as u32);
            if self.fail {
                return Err(RenderError::InvalidArgument("scripted failure".into()));
            }
            for &(id, distance) in &self.items {
                dc.add_ordered_renderable(Box::new(Recorder {
                    id,
                    distance,
                    log: Arc::clone(&self.log),
                }));
            }
            Ok(())
        }
    }

    #[test]
    fn test_pick_pixel_conversion() {
        let c = controller();
        let vp = viewport();
        // Top-left corner pixel is the top row in bottom-left coordinates.
        let (col, row, point) = c.pick_pixel(vp, DVec2::new(0.0, 0.0)).unwrap();
        assert_eq!((col, row), (0, 63));
        assert_eq!(point, DVec2::new(0.0, 64.0));
        let (col, row, _) = c.pick_pixel(vp, DVec2::new(63.9, 63.9)).unwrap();
        assert_eq!((col, row), (63, 0));

        assert!(c.pick_pixel(vp, DVec2::new(-0.1, 5.0)).is_none());
        assert!(c.pick_pixel(vp, DVec2::new(64.0, 5.0)).is_none());
        assert!(c.pick_pixel(vp, DVec2::new(5.0, 64.0)).is_none());
        assert!(c.pick_pixel(vp, DVec2::new(f64::NAN, 5.0)).is_none());
        assert!(
            c.pick_pixel(Viewport::new(0, 0, 32, 32), DVec2::new(48.0, 10.0))
                .is_none()
        );
    }

    #[test]
    fn test_render_returns_to_idle_and_records_statistics() {
        let mut c = populated();
        c.render(viewport()).unwrap();
        assert_eq!(c.frame_state(), FrameState::Idle);
        let stats = *c.statistics();
        assert_eq!(stats.frame_count, 1);
        assert!(stats.terrain_tile_count > 0);
        assert_eq!(stats.layer_count, 2);
        assert_eq!(stats.ordered_renderable_count, 1);
        assert!(stats.gpu_cache_used > 0);
        assert!(!c.terrain().is_empty());
    }

    #[test]
    fn test_render_draws_surface_and_placemark() {
        let mut c = populated();
        c.render(viewport()).unwrap();
        let g = c.graphics_mut();
        assert_eq!(g.read_pixel(32, 32).unwrap(), [255, 255, 255, 255]);
        assert_eq!(g.read_pixel(10, 32).unwrap(), [0, 0, 255, 255]);
        assert_eq!(g.read_pixel(1, 1).unwrap(), [0, 0, 0, 255]);
    }

    #[test]
    fn test_zero_area_viewport_is_rejected() {
        let mut c = controller();
        let err = c.render(Viewport::new(0, 0, 0, 32)).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(c.frame_state(), FrameState::Idle);
        assert_eq!(c.statistics().frame_count, 0);
        let err = c
            .pick(Viewport::new(0, 0, 32, 0), DVec2::new(1.0, 1.0))
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(c.frame_state(), FrameState::Idle);
    }

    #[test]
    fn test_context_not_current_is_a_precondition_violation() {
        let mut c = controller();
        c.graphics_mut().release_current();
        assert!(c.render(viewport()).unwrap_err().is_precondition_violation());
        assert_eq!(c.frame_state(), FrameState::Idle);
        assert_eq!(c.statistics().frame_count, 0);
        assert!(c.dispose().unwrap_err().is_precondition_violation());

        c.graphics_mut().make_current();
        c.render(viewport()).unwrap();
        assert_eq!(c.frame_state(), FrameState::Idle);
    }

    #[test]
    fn test_pick_outside_viewport_is_empty() {
        let mut c = populated();
        let picked = c
            .pick(Viewport::new(0, 0, 32, 32), DVec2::new(48.0, 10.0))
            .unwrap();
        assert!(picked.is_empty());
        // No frame ran.
        assert_eq!(c.statistics().frame_count, 0);
    }

    #[test]
    fn test_pick_placemark_at_center() {
        let mut c = populated();
        let picked = c.pick(viewport(), DVec2::new(32.0, 32.0)).unwrap();
        assert_eq!(picked.len(), 1);
        let top = picked.top_picked_object().unwrap();
        assert_eq!(top.target(), PickTarget::Shape(ShapeId(1)));
        assert_eq!(top.layer_name(), Some("Placemarks"));
        assert!(top.is_on_top());
        assert_eq!(c.frame_state(), FrameState::Idle);
    }

    #[test]
    fn test_pick_terrain_off_center() {
        let mut c = populated();
        let picked = c.pick(viewport(), DVec2::new(10.0, 32.0)).unwrap();
        assert_eq!(picked.len(), 1);
        let terrain = picked.terrain_object().unwrap();
        assert!(terrain.is_on_top());
        let position = terrain.position().unwrap();
        assert!(position.longitude < 0.0, "west of center: {position:?}");
        assert!(position.latitude.abs() < 1.0);
        assert!(position.altitude.abs() < 1.0e4);
    }

    #[test]
    fn test_pick_over_empty_space_is_empty() {
        let mut c = populated();
        assert!(c.pick(viewport(), DVec2::new(1.0, 1.0)).unwrap().is_empty());
    }

    #[test]
    fn test_pick_ignores_unpickable_placemarks() {
        let mut c = controller();
        let mut marks = RenderableLayer::new("Placemarks");
        marks.add_placemark(
            Placemark::new(ShapeId(5), Position::new(0.0, 0.0, 5.0e4))
                .with_size(30.0)
                .with_pickable(false),
        );
        c.layers_mut().add(Box::new(marks));
        let picked = c.pick(viewport(), DVec2::new(32.0, 32.0)).unwrap();
        assert!(picked.top_picked_object().unwrap().is_terrain());
    }

    #[test]
    fn test_pick_terrain_only() {
        let mut c = populated();
        let picked = c.pick_terrain(viewport(), DVec2::new(32.0, 32.0)).unwrap();
        let position = picked.terrain_object().unwrap().position().unwrap();
        assert!(position.latitude.abs() < 1.0 && position.longitude.abs() < 1.0);
        assert!(c.pick_terrain(viewport(), DVec2::new(1.0, 1.0)).unwrap().is_empty());
    }

    #[test]
    fn test_pick_on_tile_seams_hits_terrain() {
        let mut c = populated();
        // The view center sits on the corner shared by four tiles, and the
        // middle pixel rows run along the equator seam.
        for (x, y) in [(32.0, 32.0), (31.0, 32.0), (5.0, 32.0), (32.0, 20.0)] {
            let picked = c.pick_terrain(viewport(), DVec2::new(x, y)).unwrap();
            assert!(picked.terrain_object().is_some(), "no terrain at ({x}, {y})");
        }

        let mut bare = controller();
        bare.layers_mut()
            .add(Box::new(SurfaceLayer::new(Color::new(0.0, 0.0, 1.0, 1.0))));
        let picked = bare.pick(viewport(), DVec2::new(32.0, 32.0)).unwrap();
        let terrain = picked.terrain_object().unwrap();
        let position = terrain.position().unwrap();
        assert!(position.latitude.abs() < 1.0 && position.longitude.abs() < 1.0);
    }

    #[test]
    fn test_meshes_too_large_for_gpu_cache_are_not_leaked() {
        let config = TessellatorConfig {
            max_level: 4,
            worker_count: 0,
            ..Default::default()
        };
        let globe = Globe::new(Ellipsoid::WGS84, Arc::new(ZeroElevationModel), &config).unwrap();
        let navigator = LookAtNavigator::new(Location::new(0.0, 0.0), 1.0e7);
        let graphics = SoftwareGraphics::new(SIZE, SIZE).unwrap();
        let options = SceneOptions {
            gpu_cache_capacity: 1000,
            gpu_cache_low_water: 500,
            ..Default::default()
        };
        let mut c = SceneController::new(Box::new(graphics), globe, navigator, &options).unwrap();
        c.layers_mut()
            .add(Box::new(SurfaceLayer::new(Color::new(0.0, 0.0, 1.0, 1.0))));

        for _ in 0..3 {
            c.render(viewport()).unwrap();
            assert_eq!(c.draw_context().graphics().mesh_count(), 0);
        }
        c.dispose().unwrap();
        assert_eq!(c.draw_context().graphics().mesh_count(), 0);
        assert_eq!(c.draw_context().gpu_cache().entry_count(), 0);
    }

    #[test]
    fn test_ordered_renderables_draw_back_to_front() {
        let mut c = controller();
        let log = Arc::new(Mutex::new(Vec::new()));
        let renders = Arc::new(Mutex::new(Vec::new()));
        let mut first = ScriptedLayer::new("first", &log, &renders);
        first.items = vec![(0, 5.0), (1, 9.0)];
        let mut second = ScriptedLayer::new("second", &log, &renders);
        second.items = vec![(2, 5.0), (3, 1.0), (4, 9.0)];
        c.layers_mut().add(Box::new(first));
        c.layers_mut().add(Box::new(second));

        c.render(viewport()).unwrap();
        assert_eq!(*log.lock(), [1, 4, 0, 2, 3]);
    }

    #[test]
    fn test_failing_layer_does_not_stop_the_frame() {
        let mut c = controller();
        let log = Arc::new(Mutex::new(Vec::new()));
        let renders = Arc::new(Mutex::new(Vec::new()));
        let mut broken = ScriptedLayer::new("broken", &log, &renders);
        broken.fail = true;
        broken.items = vec![(7, 1.0)];
        let mut healthy = ScriptedLayer::new("healthy", &log, &renders);
        healthy.items = vec![(8, 1.0), (9, 2.0)];
        c.layers_mut().add(Box::new(broken));
        c.layers_mut().add(Box::new(healthy));

        c.render(viewport()).unwrap();
        assert_eq!(*renders.lock(), [1, 2]);
        assert_eq!(*log.lock(), [9, 8]);
        assert_eq!(c.frame_state(), FrameState::Idle);
    }

    #[test]
    fn test_disabled_layers_are_skipped() {
        let mut c = controller();
        let log = Arc::new(Mutex::new(Vec::new()));
        let renders = Arc::new(Mutex::new(Vec::new()));
        let mut layer = ScriptedLayer::new("off", &log, &renders);
        layer.set_enabled(false);
        c.layers_mut().add(Box::new(layer));
        c.render(viewport()).unwrap();
        assert!(renders.lock().is_empty());
        assert_eq!(c.statistics().layer_count, 0);
    }

    #[test]
    fn test_dispose_releases_meshes_and_controller_stays_usable() {
        let mut c = populated();
        c.render(viewport()).unwrap();
        assert!(c.draw_context().graphics().mesh_count() > 0);

        c.dispose().unwrap();
        assert_eq!(c.draw_context().graphics().mesh_count(), 0);
        assert_eq!(c.draw_context().gpu_cache().entry_count(), 0);

        c.render(viewport()).unwrap();
        assert!(c.draw_context().graphics().mesh_count() > 0);
    }
}
