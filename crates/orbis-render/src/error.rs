use orbis_cache::CacheError;
use orbis_geom::GeomError;
use orbis_terrain::TerrainError;

/// Errors raised by the frame pipeline and the graphics backends.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// A caller supplied an unusable argument, e.g. a zero-area viewport.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The call was made in a state that does not permit it, e.g. without a
    /// current graphics context.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// The graphics backend failed.
    #[error("graphics error: {0}")]
    Graphics(String),

    #[error(transparent)]
    Geom(#[from] GeomError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Terrain(#[from] TerrainError),
}

impl RenderError {
    /// True for every error in the invalid-argument class, including wrapped
    /// geometry and cache argument errors.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        match self {
            Self::InvalidArgument(_) | Self::Cache(_) => true,
            Self::Geom(e) => matches!(e, GeomError::InvalidArgument(_)),
            Self::Terrain(TerrainError::Geom(e)) => matches!(e, GeomError::InvalidArgument(_)),
            Self::Terrain(TerrainError::Cache(_)) => true,
            Self::PreconditionViolation(_) | Self::Graphics(_) => false,
        }
    }

    #[must_use]
    pub fn is_precondition_violation(&self) -> bool {
        matches!(self, Self::PreconditionViolation(_))
    }

    /// True when a matrix or other numeric input was singular.
    #[must_use]
    pub fn is_numeric_degenerate(&self) -> bool {
        matches!(
            self,
            Self::Geom(GeomError::NumericDegenerate(_))
                | Self::Terrain(TerrainError::Geom(GeomError::NumericDegenerate(_)))
        )
    }
}
