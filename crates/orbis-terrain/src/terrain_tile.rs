//! Tiles specialized for terrain rendering.

use std::sync::Arc;

use orbis_cache::Cacheable;
use orbis_geom::Sector;

use crate::geometry::TerrainGeometry;
use crate::globe::TessellatorId;
use crate::level::Level;
use crate::tile::{ElevationStamp, Tile, TileFactory};

/// A [`Tile`] with generated geometry.
///
/// `tessellator` names the owning tessellator without holding it. Geometry is shared and
/// only ever swapped as a whole, so clones handed to the renderer stay valid while a newer
/// mesh is being built.
#[derive(Clone, Debug)]
pub struct TerrainTile {
    tile: Tile,
    tessellator: TessellatorId,
    geometry: Option<Arc<TerrainGeometry>>,
    num_lat_cells: u32,
    num_lon_cells: u32,
    gpu_cache_key: String,
}

impl TerrainTile {
    /// Wrap `tile` for the tessellator `tessellator`. The tile has no geometry until
    /// [`TerrainTile::set_geometry`] is called.
    pub fn new(tile: Tile, tessellator: TessellatorId, num_lat_cells: u32, num_lon_cells: u32) -> Self {
        let key = tile.key();
        Self {
            tile,
            tessellator,
            geometry: None,
            num_lat_cells,
            num_lon_cells,
            gpu_cache_key: format!("terrain/{}/{key}", tessellator.index()),
        }
    }

    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    pub fn tile_mut(&mut self) -> &mut Tile {
        &mut self.tile
    }

    /// The tessellator that built this tile.
    pub fn tessellator(&self) -> TessellatorId {
        self.tessellator
    }

    /// Current mesh, or `None` while the first build is still pending.
    pub fn geometry(&self) -> Option<&Arc<TerrainGeometry>> {
        self.geometry.as_ref()
    }

    /// Elevation state the current geometry was built for.
    pub fn geometry_stamp(&self) -> Option<ElevationStamp> {
        self.geometry.as_ref().map(|g| g.stamp)
    }

    /// Replace the geometry in one step.
    pub fn set_geometry(&mut self, geometry: Arc<TerrainGeometry>) {
        self.geometry = Some(geometry);
    }

    /// Grid resolution the geometry is built at.
    pub fn num_lat_cells(&self) -> u32 {
        self.num_lat_cells
    }

    pub fn num_lon_cells(&self) -> u32 {
        self.num_lon_cells
    }

    /// Key under which the uploaded vertex data lives in the GPU resource cache.
    pub fn gpu_cache_key(&self) -> &str {
        &self.gpu_cache_key
    }
}

impl Cacheable for TerrainTile {
    fn size_in_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.gpu_cache_key.len()
            + self.geometry.as_ref().map_or(0, |g| g.size_in_bytes())
    }
}

/// Creates [`TerrainTile`]s owned by one tessellator.
#[derive(Clone, Copy, Debug)]
pub struct TerrainTileFactory {
    pub tessellator: TessellatorId,
    pub num_lat_cells: u32,
    pub num_lon_cells: u32,
}

impl TileFactory for TerrainTileFactory {
    type Tile = TerrainTile;

    fn create_tile(&self, sector: Sector, level: &Level, row: u32, column: u32) -> TerrainTile {
        TerrainTile::new(
            Tile::new(sector, *level, row, column),
            self.tessellator,
            self.num_lat_cells,
            self.num_lon_cells,
        )
    }
}
