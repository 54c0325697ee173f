//! View-dependent terrain tessellation by quadtree descent.

use std::collections::HashSet;
use std::sync::Arc;

use orbis_cache::MemoryCache;
use orbis_geom::{Location, Sector};
use orbis_navigate::NavigatorState;

use crate::error::TerrainError;
use crate::geometry::build_geometry;
use crate::globe::{GlobeSurface, TessellatorId};
use crate::level::LevelSet;
use crate::pipeline::{GeometryPipeline, GeometryTask};
use crate::terrain::Terrain;
use crate::terrain_tile::{TerrainTile, TerrainTileFactory};
use crate::tile::{ElevationStamp, TileKey, create_tiles_for_level};

/// Tessellator tuning.
#[derive(Clone, Debug)]
pub struct TessellatorConfig {
    /// Tile size in degrees at the coarsest level. Must divide 180 evenly.
    pub level_zero_delta: f64,
    /// Levels in the level set, each halving the previous tile delta.
    pub num_levels: usize,
    /// Deepest level the descent may reach; clamped to the level set.
    pub max_level: usize,
    /// Pixels a terrain cell may span before its tile is refined.
    pub detail_factor: f64,
    /// Mesh cells per tile along a meridian.
    pub num_lat_cells: u32,
    /// Mesh cells per tile along a parallel.
    pub num_lon_cells: u32,
    /// Bytes of tile geometry the tile cache may hold.
    pub tile_cache_capacity: usize,
    /// Size the tile cache trims down to once it overflows.
    pub tile_cache_low_water: usize,
    /// Geometry worker threads. Zero builds everything on the calling thread.
    pub worker_count: usize,
    /// Geometry builds allowed in flight at once.
    pub task_budget: usize,
}

impl Default for TessellatorConfig {
    fn default() -> Self {
        Self {
            level_zero_delta: 45.0,
            num_levels: 16,
            max_level: 12,
            detail_factor: 2.0,
            num_lat_cells: 16,
            num_lon_cells: 16,
            tile_cache_capacity: 64 * 1024 * 1024,
            tile_cache_low_water: 48 * 1024 * 1024,
            worker_count: num_cpus::get().saturating_sub(1).max(1),
            task_budget: 64,
        }
    }
}

/// Produces the visible [`TerrainTile`] list for a navigator snapshot.
///
/// Descent starts at the level-zero tiling and refines any tile that intersects the view
/// frustum and whose cells look too coarse, until the tile is fine enough or the maximum
/// level is reached. Refined tiles are kept in a [`MemoryCache`] so extents and geometry
/// survive from frame to frame.
pub struct Tessellator {
    id: TessellatorId,
    level_set: LevelSet,
    top_tiles: Vec<TerrainTile>,
    tile_cache: MemoryCache<TileKey, TerrainTile>,
    factory: TerrainTileFactory,
    detail_factor: f64,
    max_level: usize,
    pipeline: Option<GeometryPipeline>,
    pending: HashSet<TileKey>,
}

struct Descent<'s, 'a> {
    surface: &'s GlobeSurface<'a>,
    state: &'s NavigatorState,
    vertical_exaggeration: f64,
    stamp: ElevationStamp,
}

impl Tessellator {
    /// Create a tessellator registered as `id` on its globe.
    ///
    /// Fails when the level-zero delta does not tile the globe evenly, when the tile cache
    /// bounds are inconsistent, or when `num_levels` is zero. Workers are started only for
    /// a non-zero `worker_count`.
    pub fn new(id: TessellatorId, config: &TessellatorConfig) -> Result<Self, TerrainError> {
        let delta = Location::new(config.level_zero_delta, config.level_zero_delta);
        let level_set = LevelSet::new(
            Sector::FULL_SPHERE,
            delta,
            config.num_levels,
            config.num_lon_cells,
            config.num_lat_cells,
        )?;
        let tile_cache = MemoryCache::new(config.tile_cache_capacity, config.tile_cache_low_water)?;
        let pipeline = (config.worker_count > 0)
            .then(|| GeometryPipeline::new(config.worker_count, config.task_budget));
        Ok(Self {
            id,
            max_level: config.max_level.min(level_set.num_levels() - 1),
            level_set,
            top_tiles: Vec::new(),
            tile_cache,
            factory: TerrainTileFactory {
                tessellator: id,
                num_lat_cells: config.num_lat_cells,
                num_lon_cells: config.num_lon_cells,
            },
            detail_factor: config.detail_factor,
            pipeline,
            pending: HashSet::new(),
        })
    }

    /// Arena index of this tessellator on its globe.
    pub fn id(&self) -> TessellatorId {
        self.id
    }

    /// Levels the descent walks, coarsest first.
    pub fn level_set(&self) -> &LevelSet {
        &self.level_set
    }

    /// Refined tiles kept between frames, keyed by level, row and column.
    pub fn tile_cache(&self) -> &MemoryCache<TileKey, TerrainTile> {
        &self.tile_cache
    }

    /// Pixels a terrain cell may span on screen before its tile is refined.
    pub fn detail_factor(&self) -> f64 {
        self.detail_factor
    }

    pub fn set_detail_factor(&mut self, detail_factor: f64) {
        self.detail_factor = detail_factor;
    }

    /// Deepest level the descent may reach.
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Clamped to the last level of the level set.
    pub fn set_max_level(&mut self, max_level: usize) {
        self.max_level = max_level.min(self.level_set.num_levels() - 1);
    }

    /// Geometry builds submitted to workers and not yet published.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Refine the quadtree for `state` and return the visible tiles.
    pub fn tessellate(
        &mut self,
        surface: &GlobeSurface<'_>,
        state: &NavigatorState,
        vertical_exaggeration: f64,
    ) -> Result<Terrain, TerrainError> {
        let descent = Descent {
            surface,
            state,
            vertical_exaggeration,
            stamp: ElevationStamp {
                timestamp: surface.elevation_timestamp(),
                vertical_exaggeration,
            },
        };
        self.publish_results(descent.stamp);

        if self.top_tiles.is_empty() {
            self.top_tiles = create_tiles_for_level(self.level_set.first_level(), &self.factory)?;
        }

        let mut visible = Vec::new();
        let mut top = std::mem::take(&mut self.top_tiles);
        let mut outcome = Ok(());
        for tile in &mut top {
            if let Err(e) = self.add_tile_or_descendants(tile, &descent, &mut visible) {
                outcome = Err(e);
                break;
            }
        }
        self.top_tiles = top;
        outcome?;

        log::trace!(
            "Tessellated {} tiles, {} geometry builds pending",
            visible.len(),
            self.pending.len()
        );
        Ok(Terrain::new(visible, *surface.ellipsoid(), vertical_exaggeration))
    }

    fn add_tile_or_descendants(
        &mut self,
        tile: &mut TerrainTile,
        descent: &Descent<'_, '_>,
        visible: &mut Vec<TerrainTile>,
    ) -> Result<(), TerrainError> {
        tile.tile_mut()
            .update_extent(descent.surface, descent.vertical_exaggeration);
        if !tile
            .tile()
            .extent()
            .intersects_frustum(descent.state.frustum_in_model_coordinates())
        {
            return Ok(());
        }

        let level_number = tile.tile().level().level_number();
        let next_level = if level_number < self.max_level {
            self.level_set.level(level_number + 1).copied()
        } else {
            None
        };

        match next_level {
            Some(next) if tile.tile().must_subdivide(descent.state, self.detail_factor) => {
                let children = tile
                    .tile()
                    .subdivide_cached(&next, &self.tile_cache, &self.factory)?;
                for mut child in children {
                    self.add_tile_or_descendants(&mut child, descent, visible)?;
                    let key = child.tile().key();
                    self.tile_cache.put_cacheable(child, key)?;
                }
            }
            _ => {
                self.ensure_geometry(tile, descent);
                visible.push(tile.clone());
            }
        }
        Ok(())
    }

    /// Give `tile` geometry for the current elevation state. A tile without any geometry is
    /// built immediately; stale geometry is rebuilt on a worker and stays in place until
    /// the replacement is published.
    fn ensure_geometry(&mut self, tile: &mut TerrainTile, descent: &Descent<'_, '_>) {
        let current = tile.geometry_stamp();
        if current == Some(descent.stamp) {
            return;
        }

        let key = tile.tile().key();
        if let (Some(_), Some(pipeline)) = (current, &self.pipeline) {
            if !self.pending.contains(&key) {
                let task = GeometryTask {
                    key,
                    sector: *tile.tile().sector(),
                    num_lat_cells: tile.num_lat_cells(),
                    num_lon_cells: tile.num_lon_cells(),
                    ellipsoid: *descent.surface.ellipsoid(),
                    elevation_model: Arc::clone(descent.surface.elevation_model()),
                    vertical_exaggeration: descent.vertical_exaggeration,
                };
                if pipeline.submit(task) {
                    self.pending.insert(key);
                }
            }
            return;
        }

        let geometry = build_geometry(
            tile.tile().sector(),
            tile.num_lat_cells(),
            tile.num_lon_cells(),
            descent.surface.ellipsoid(),
            descent.surface.elevation_model().as_ref(),
            descent.vertical_exaggeration,
        );
        tile.set_geometry(Arc::new(geometry));
    }

    /// Swap finished worker geometry into its tile. Results built for an elevation state
    /// other than `stamp` are dropped.
    fn publish_results(&mut self, stamp: ElevationStamp) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        for result in pipeline.drain_results() {
            self.pending.remove(&result.key);
            if result.geometry.stamp != stamp {
                log::trace!("Dropping stale terrain geometry for tile {}", result.key);
                continue;
            }
            let geometry = Arc::new(result.geometry);

            if let Some(top) = self
                .top_tiles
                .iter_mut()
                .find(|t| t.tile().key() == result.key)
            {
                top.set_geometry(geometry);
            } else if let Some(mut cached) = self.tile_cache.get(&result.key) {
                cached.set_geometry(geometry);
                if let Err(e) = self.tile_cache.put_cacheable(cached, result.key) {
                    log::warn!("Failed to publish terrain geometry for tile {}: {e}", result.key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::{ElevationModel, ProceduralElevationModel, ZeroElevationModel};
    use glam::{DMat4, DVec3};
    use orbis_geom::{Ellipsoid, Viewport};
    use std::time::{Duration, Instant};

    fn config(worker_count: usize) -> TessellatorConfig {
        TessellatorConfig {
            num_levels: 10,
            max_level: 6,
            num_lat_cells: 4,
            num_lon_cells: 4,
            worker_count,
            ..Default::default()
        }
    }

    fn state_above(e: &Ellipsoid, lat: f64, lon: f64, altitude: f64) -> NavigatorState {
        let target = e.compute_point(lat, lon, 0.0);
        let eye = e.compute_point(lat, lon, altitude);
        let far = altitude + e.equatorial_radius() * 2.0;
        NavigatorState::new(
            DMat4::look_at_rh(eye, target, DVec3::Y),
            DMat4::perspective_rh(45f64.to_radians(), 1.0, altitude * 0.1, far),
            Viewport::new(0, 0, 512, 512),
        )
        .unwrap()
    }

    #[test]
    fn test_level_zero_delta_must_tile_the_globe() {
        let uneven = TessellatorConfig {
            level_zero_delta: 40.0,
            ..config(0)
        };
        assert!(Tessellator::new(TessellatorId(0), &uneven).is_err());

        let even = TessellatorConfig {
            level_zero_delta: 36.0,
            ..config(0)
        };
        let t = Tessellator::new(TessellatorId(0), &even).unwrap();
        let top = t.level_set().first_level();
        assert_eq!((top.row_count(), top.column_count()), (5, 10));
    }

    #[test]
    fn test_far_view_stays_coarse() {
        let e = Ellipsoid::WGS84;
        let m: Arc<dyn ElevationModel> = Arc::new(ZeroElevationModel);
        let mut t = Tessellator::new(TessellatorId(0), &config(0)).unwrap();
        let terrain = t
            .tessellate(&GlobeSurface::new(&e, &m), &state_above(&e, 20.0, 20.0, 2.0e8), 1.0)
            .unwrap();
        assert!(!terrain.is_empty());
        assert!(terrain.tiles().iter().all(|tile| tile.tile().level().level_number() == 0));
        assert!(terrain.tiles().iter().all(|tile| tile.geometry().is_some()));
    }

    #[test]
    fn test_near_view_refines_to_max_level() {
        let e = Ellipsoid::WGS84;
        let m: Arc<dyn ElevationModel> = Arc::new(ZeroElevationModel);
        let mut t = Tessellator::new(TessellatorId(0), &config(0)).unwrap();
        let terrain = t
            .tessellate(&GlobeSurface::new(&e, &m), &state_above(&e, 20.0, 20.0, 2.0e3), 1.0)
            .unwrap();
        let deepest = terrain
            .tiles()
            .iter()
            .map(|tile| tile.tile().level().level_number())
            .max()
            .unwrap();
        assert_eq!(deepest, 6);
        assert!(t.tile_cache().entry_count() > 0);
        assert!(terrain.sector().contains_location(20.0, 20.0));
        assert!(terrain.tiles().iter().all(|tile| tile.tessellator() == TessellatorId(0)));
    }

    #[test]
    fn test_visible_tiles_do_not_overlap() {
        let e = Ellipsoid::WGS84;
        let m: Arc<dyn ElevationModel> = Arc::new(ZeroElevationModel);
        let mut t = Tessellator::new(TessellatorId(0), &config(0)).unwrap();
        let terrain = t
            .tessellate(&GlobeSurface::new(&e, &m), &state_above(&e, -30.0, 60.0, 5.0e5), 1.0)
            .unwrap();
        let tiles = terrain.tiles();
        for (i, a) in tiles.iter().enumerate() {
            for b in &tiles[i + 1..] {
                assert!(!a.tile().sector().overlaps(b.tile().sector()));
            }
        }
    }

    #[test]
    fn test_repeat_frame_reuses_cached_geometry() {
        let e = Ellipsoid::WGS84;
        let m: Arc<dyn ElevationModel> = Arc::new(ZeroElevationModel);
        let mut t = Tessellator::new(TessellatorId(0), &config(0)).unwrap();
        let surface = GlobeSurface::new(&e, &m);
        let state = state_above(&e, 20.0, 20.0, 5.0e4);
        let first = t.tessellate(&surface, &state, 1.0).unwrap();
        let second = t.tessellate(&surface, &state, 1.0).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.tiles().iter().zip(second.tiles()) {
            assert!(Arc::ptr_eq(a.geometry().unwrap(), b.geometry().unwrap()));
        }
    }

    /// Stale geometry stays visible until the worker's replacement is published.
    #[test]
    fn test_worker_refresh_swaps_geometry() {
        let e = Ellipsoid::WGS84;
        let model = Arc::new(ProceduralElevationModel::new(100.0, 10.0));
        let m: Arc<dyn ElevationModel> = model.clone();
        let mut t = Tessellator::new(TessellatorId(0), &config(2)).unwrap();
        let surface = GlobeSurface::new(&e, &m);
        let state = state_above(&e, 20.0, 20.0, 2.0e8);

        let first = t.tessellate(&surface, &state, 1.0).unwrap();
        let old_stamp = first.tiles()[0].geometry_stamp().unwrap();

        model.set_amplitude(300.0);
        let stale = t.tessellate(&surface, &state, 1.0).unwrap();
        assert!(stale.tiles().iter().all(|tile| tile.geometry().is_some()));
        assert!(stale.tiles().iter().all(|tile| tile.geometry_stamp() == Some(old_stamp)));

        let start = Instant::now();
        loop {
            let terrain = t.tessellate(&surface, &state, 1.0).unwrap();
            let fresh = terrain
                .tiles()
                .iter()
                .all(|tile| tile.geometry_stamp().map(|s| s.timestamp) == Some(model.timestamp()));
            if fresh {
                break;
            }
            assert!(start.elapsed().as_secs() < 10, "Timed out waiting for refreshed geometry");
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(t.pending_count(), 0);
    }
}
