//! Quadtree tiles: identity, subdivision, extent maintenance, and the refinement test.

use std::fmt;
use std::hash::{Hash, Hasher};

use glam::DVec3;
use orbis_cache::{Cacheable, MemoryCache};
use orbis_geom::{BoundingBox, GeomError, Sector};
use orbis_navigate::NavigatorState;

use crate::addressing::{compute_column, compute_row, compute_sector};
use crate::error::TerrainError;
use crate::globe::GlobeSurface;
use crate::level::Level;

/// Samples per side when bounding a tile's surface.
const EXTENT_SAMPLES: usize = 5;

/// Identity of a tile: `(level number, row, column)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub level: usize,
    pub row: u32,
    pub column: u32,
}

impl TileKey {
    pub fn new(level: usize, row: u32, column: u32) -> Self {
        Self { level, row, column }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.level, self.row, self.column)
    }
}

/// The elevation state a cached value was computed against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElevationStamp {
    pub timestamp: u64,
    pub vertical_exaggeration: f64,
}

/// Builds the concrete tile type for a `(sector, level, row, column)` cell.
pub trait TileFactory {
    type Tile;

    fn create_tile(&self, sector: Sector, level: &Level, row: u32, column: u32) -> Self::Tile;
}

/// A quadtree node covering one sector at one level.
///
/// Equality and hashing use only the [`TileKey`].
#[derive(Clone, Debug)]
pub struct Tile {
    sector: Sector,
    level: Level,
    row: u32,
    column: u32,
    reference_points: [DVec3; 5],
    extent: BoundingBox,
    extent_stamp: Option<ElevationStamp>,
    cell_size: f64,
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Tile {}

impl Hash for Tile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Tile {
    pub fn new(sector: Sector, level: Level, row: u32, column: u32) -> Self {
        Self {
            sector,
            level,
            row,
            column,
            reference_points: [DVec3::ZERO; 5],
            extent: BoundingBox::default(),
            extent_stamp: None,
            cell_size: 0.0,
        }
    }

    /// The tile at `level` containing the centroid of `sector`.
    pub fn containing(sector: &Sector, level: &Level) -> Result<Self, GeomError> {
        let delta = level.tile_delta();
        let row = compute_row(delta.latitude, sector.centroid_lat())?;
        let column = compute_column(delta.longitude, sector.centroid_lon())?;
        Ok(Self::new(compute_sector(level, row, column)?, *level, row, column))
    }

    pub fn key(&self) -> TileKey {
        TileKey::new(self.level.level_number(), self.row, self.column)
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn tile_width(&self) -> u32 {
        self.level.tile_width()
    }

    pub fn tile_height(&self) -> u32 {
        self.level.tile_height()
    }

    /// Angular texel size in radians.
    pub fn texel_size(&self) -> f64 {
        self.level.texel_size()
    }

    /// Corner points (SW, SE, NE, NW) then the center, in model coordinates.
    pub fn reference_points(&self) -> &[DVec3; 5] {
        &self.reference_points
    }

    pub fn extent(&self) -> &BoundingBox {
        &self.extent
    }

    pub fn extent_stamp(&self) -> Option<ElevationStamp> {
        self.extent_stamp
    }

    /// The four children at `next_level`, ordered SW, SE, NW, NE. Each child's sector comes
    /// from addressing, not from halving this sector.
    pub fn subdivide<F: TileFactory>(
        &self,
        next_level: &Level,
        factory: &F,
    ) -> Result<[F::Tile; 4], GeomError> {
        let [a, b, c, d] = self.child_addresses(next_level)?;
        let make = |(row, column): (u32, u32)| -> Result<F::Tile, GeomError> {
            let sector = compute_sector(next_level, row, column)?;
            Ok(factory.create_tile(sector, next_level, row, column))
        };
        Ok([make(a)?, make(b)?, make(c)?, make(d)?])
    }

    /// Like [`Tile::subdivide`] but consults `cache` first. A hit reuses the cached tile
    /// with whatever extent and geometry it already carries; a miss creates the child and
    /// adds it to the cache.
    pub fn subdivide_cached<F>(
        &self,
        next_level: &Level,
        cache: &MemoryCache<TileKey, F::Tile>,
        factory: &F,
    ) -> Result<[F::Tile; 4], TerrainError>
    where
        F: TileFactory,
        F::Tile: Clone + Cacheable,
    {
        let [a, b, c, d] = self.child_addresses(next_level)?;
        let make = |(row, column): (u32, u32)| -> Result<F::Tile, TerrainError> {
            let key = TileKey::new(next_level.level_number(), row, column);
            if let Some(tile) = cache.get(&key) {
                return Ok(tile);
            }
            let sector = compute_sector(next_level, row, column)?;
            let tile = factory.create_tile(sector, next_level, row, column);
            cache.put_cacheable(tile.clone(), key)?;
            Ok(tile)
        };
        Ok([make(a)?, make(b)?, make(c)?, make(d)?])
    }

    fn child_addresses(&self, next_level: &Level) -> Result<[(u32, u32); 4], GeomError> {
        if next_level.level_number() != self.level.level_number() + 1 {
            return Err(GeomError::InvalidArgument(format!(
                "cannot subdivide a level {} tile into level {}",
                self.level.level_number(),
                next_level.level_number()
            )));
        }
        let (r, c) = (self.row * 2, self.column * 2);
        Ok([(r, c), (r, c + 1), (r + 1, c), (r + 1, c + 1)])
    }

    /// Whether this tile's cells appear coarser on screen than `detail_factor` pixels,
    /// judged at the reference point nearest the eye. Assumes [`Tile::update_extent`] has
    /// run for the current globe state.
    pub fn must_subdivide(&self, state: &NavigatorState, detail_factor: f64) -> bool {
        let eye = state.eye_point();
        let nearest = self
            .reference_points
            .iter()
            .map(|p| p.distance_squared(eye))
            .fold(f64::INFINITY, f64::min)
            .sqrt();
        let pixel_size = state.pixel_size_at_distance(nearest);
        self.cell_size > pixel_size * detail_factor
    }

    /// Refresh reference points. Currently does nothing: [`Tile::update_extent`] keeps the
    /// reference points current.
    pub fn update_reference_points(&mut self, _surface: &GlobeSurface<'_>, _vertical_exaggeration: f64) {}

    /// Recompute the extent and reference points unless they were last computed for the
    /// same elevation timestamp and vertical exaggeration.
    pub fn update_extent(&mut self, surface: &GlobeSurface<'_>, vertical_exaggeration: f64) {
        let stamp = ElevationStamp {
            timestamp: surface.elevation_timestamp(),
            vertical_exaggeration,
        };
        if self.extent_stamp == Some(stamp) {
            return;
        }

        let (min_e, max_e) = surface.min_max_elevations(&self.sector);
        let (min_e, max_e) = (min_e * vertical_exaggeration, max_e * vertical_exaggeration);

        let s = &self.sector;
        let mut points = Vec::with_capacity(EXTENT_SAMPLES * EXTENT_SAMPLES * 2);
        let mut p = DVec3::ZERO;
        for i in 0..EXTENT_SAMPLES {
            let lat = s.min_latitude + s.delta_lat() * i as f64 / (EXTENT_SAMPLES - 1) as f64;
            for j in 0..EXTENT_SAMPLES {
                let lon = s.min_longitude + s.delta_lon() * j as f64 / (EXTENT_SAMPLES - 1) as f64;
                for elevation in [min_e, max_e] {
                    surface.ellipsoid().compute_point_into(lat, lon, elevation, &mut p);
                    points.push(p);
                }
            }
        }
        self.extent.set_to_points(&points);

        // Surface bulges outward between samples.
        let radius = surface.ellipsoid().equatorial_radius() + max_e.max(0.0);
        let spacing = s.delta_lat().max(s.delta_lon()).to_radians() / (EXTENT_SAMPLES - 1) as f64;
        self.extent.inflate(radius * (1.0 - (0.5 * spacing).cos()));

        for (out, loc) in self
            .reference_points
            .iter_mut()
            .zip(s.corners_and_center().iter())
        {
            let elevation = surface.elevation_at(loc.latitude, loc.longitude) * vertical_exaggeration;
            surface
                .ellipsoid()
                .compute_point_into(loc.latitude, loc.longitude, elevation, out);
        }

        self.cell_size = surface.ellipsoid().equatorial_radius() * self.texel_size();
        self.extent_stamp = Some(stamp);
    }
}

/// One tile per row/column cell of `level` over the whole globe, south to north, west to east.
pub fn create_tiles_for_level<F: TileFactory>(
    level: &Level,
    factory: &F,
) -> Result<Vec<F::Tile>, GeomError> {
    let delta = level.tile_delta();
    let first_row = compute_row(delta.latitude, -90.0)?;
    let last_row = compute_row(delta.latitude, 90.0)?;
    let first_col = compute_column(delta.longitude, -180.0)?;
    let last_col = compute_column(delta.longitude, 180.0)?;

    let mut tiles = Vec::with_capacity(((last_row - first_row + 1) * (last_col - first_col + 1)) as usize);
    for row in first_row..=last_row {
        for column in first_col..=last_col {
            let sector = compute_sector(level, row, column)?;
            tiles.push(factory.create_tile(sector, level, row, column));
        }
    }
    Ok(tiles)
}
