//! Terrain for the globe: level-of-detail addressing, the tile quadtree, elevation models,
//! geometry generation (inline or on worker threads), and the tessellator that turns a
//! navigator snapshot into the visible tile list.

mod addressing;
mod elevation;
mod error;
mod geometry;
mod globe;
mod level;
mod pipeline;
mod terrain;
mod terrain_tile;
mod tessellator;
mod tile;

pub use addressing::{compute_column, compute_row, compute_sector};
pub use elevation::{ElevationModel, ProceduralElevationModel, ZeroElevationModel};
pub use error::TerrainError;
pub use geometry::{TerrainGeometry, build_geometry};
pub use globe::{Globe, GlobeSurface, TessellatorId};
pub use level::{Level, LevelSet};
pub use pipeline::{GeometryPipeline, GeometryResult, GeometryTask};
pub use terrain::Terrain;
pub use terrain_tile::{TerrainTile, TerrainTileFactory};
pub use tessellator::{Tessellator, TessellatorConfig};
pub use tile::{ElevationStamp, Tile, TileFactory, TileKey, create_tiles_for_level};
