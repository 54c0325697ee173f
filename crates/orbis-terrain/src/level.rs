//! Level-of-detail tiers and the ordered level sequence.

use orbis_geom::{GeomError, Location, Sector};

use crate::addressing::{compute_column, compute_row};

/// One level-of-detail tier. Immutable once built; copied freely into tiles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Level {
    level_number: usize,
    tile_delta: Location,
    tile_width: u32,
    tile_height: u32,
    texel_size: f64,
    row_count: u32,
    column_count: u32,
}

/// Number of whole tiles of `delta` degrees in `span`, or `None` when they do not tile
/// it exactly.
fn tile_count(span: f64, delta: f64) -> Option<u32> {
    let count = span / delta;
    let rounded = count.round();
    let exact = (count - rounded).abs() <= 1e-9 * rounded.max(1.0);
    (exact && rounded >= 1.0).then_some(rounded as u32)
}

impl Level {
    /// Create a level. `tile_delta` is the angular size of a tile in degrees and
    /// `tile_width`/`tile_height` its pixel (or cell) dimensions.
    ///
    /// The delta must divide 180 degrees of latitude and 360 of longitude evenly.
    pub fn new(
        level_number: usize,
        tile_delta: Location,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, GeomError> {
        if !(tile_delta.latitude > 0.0 && tile_delta.longitude > 0.0) {
            return Err(GeomError::InvalidArgument(format!(
                "tile delta ({}, {}) must be positive",
                tile_delta.latitude, tile_delta.longitude
            )));
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(GeomError::InvalidArgument(format!(
                "tile size {tile_width}x{tile_height} must be non-zero"
            )));
        }
        let (Some(row_count), Some(column_count)) = (
            tile_count(180.0, tile_delta.latitude),
            tile_count(360.0, tile_delta.longitude),
        ) else {
            return Err(GeomError::InvalidArgument(format!(
                "tile delta ({}, {}) does not divide the globe evenly",
                tile_delta.latitude, tile_delta.longitude
            )));
        };
        Ok(Self {
            level_number,
            tile_delta,
            tile_width,
            tile_height,
            texel_size: tile_delta.latitude.to_radians() / tile_height as f64,
            row_count,
            column_count,
        })
    }

    pub fn level_number(&self) -> usize {
        self.level_number
    }

    /// Angular tile size in degrees.
    pub fn tile_delta(&self) -> Location {
        self.tile_delta
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Angular size of one texel in radians.
    pub fn texel_size(&self) -> f64 {
        self.texel_size
    }

    /// Number of tile rows covering the full latitude range.
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Number of tile columns covering the full longitude range.
    pub fn column_count(&self) -> u32 {
        self.column_count
    }
}

/// An ordered sequence of levels, coarsest first, each halving the previous tile delta.
#[derive(Clone, Debug)]
pub struct LevelSet {
    sector: Sector,
    levels: Vec<Level>,
}

impl LevelSet {
    pub fn new(
        sector: Sector,
        level_zero_delta: Location,
        num_levels: usize,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, GeomError> {
        if num_levels == 0 {
            return Err(GeomError::InvalidArgument(
                "level set needs at least one level".to_string(),
            ));
        }
        let mut levels = Vec::with_capacity(num_levels);
        let mut delta = level_zero_delta;
        for n in 0..num_levels {
            levels.push(Level::new(n, delta, tile_width, tile_height)?);
            delta = Location::new(delta.latitude * 0.5, delta.longitude * 0.5);
        }
        Ok(Self { sector, levels })
    }

    pub fn sector(&self) -> Sector {
        self.sector
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level_number: usize) -> Option<&Level> {
        self.levels.get(level_number)
    }

    pub fn first_level(&self) -> &Level {
        &self.levels[0]
    }

    pub fn last_level(&self) -> &Level {
        &self.levels[self.levels.len() - 1]
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// The coarsest level whose texel size is no larger than `texel_size` (radians), or the
    /// last level when none is fine enough.
    pub fn level_for_texel_size(&self, texel_size: f64) -> &Level {
        self.levels
            .iter()
            .find(|l| l.texel_size() <= texel_size)
            .unwrap_or_else(|| self.last_level())
    }

    /// Number of tiles at `level_number` that intersect `sector`, clipped to this set's
    /// coverage. Zero when they do not overlap.
    pub fn tile_count_for_sector(&self, sector: &Sector, level_number: usize) -> Result<u64, GeomError> {
        let level = self.level(level_number).ok_or_else(|| {
            GeomError::InvalidArgument(format!("level {level_number} is outside the level set"))
        })?;
        let mut s = *sector;
        if !s.overlaps(&self.sector) {
            return Ok(0);
        }
        s.intersection(&self.sector);

        let delta = level.tile_delta();
        let first_row = compute_row(delta.latitude, s.min_latitude)?;
        let last_row = compute_row(delta.latitude, s.max_latitude)?;
        let first_col = compute_column(delta.longitude, s.min_longitude)?;
        let last_col = compute_column(delta.longitude, s.max_longitude)?;
        Ok((last_row - first_row + 1) as u64 * (last_col - first_col + 1) as u64)
    }
}
