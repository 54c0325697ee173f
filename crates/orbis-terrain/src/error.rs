use orbis_cache::CacheError;
use orbis_geom::GeomError;

/// Errors raised while building or refining terrain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TerrainError {
    #[error(transparent)]
    Geom(#[from] GeomError),

    #[error("tile cache: {0}")]
    Cache(#[from] CacheError),
}
