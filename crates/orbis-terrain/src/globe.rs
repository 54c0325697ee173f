//! The globe: reference ellipsoid, elevation model, and the tessellators that own terrain.

use std::sync::Arc;

use glam::DVec3;
use orbis_geom::{Ellipsoid, GeomError, Position, Sector};
use orbis_navigate::NavigatorState;

use crate::elevation::ElevationModel;
use crate::error::TerrainError;
use crate::terrain::Terrain;
use crate::tessellator::{Tessellator, TessellatorConfig};

/// Index of a tessellator within its [`Globe`]. Tiles hold this instead of a reference so
/// that the globe alone owns its tessellators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TessellatorId(pub(crate) usize);

impl TessellatorId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Borrowed view of the globe's surface: what tiles need to size themselves.
#[derive(Clone, Copy)]
pub struct GlobeSurface<'a> {
    ellipsoid: &'a Ellipsoid,
    elevation_model: &'a Arc<dyn ElevationModel>,
}

impl<'a> GlobeSurface<'a> {
    pub fn new(ellipsoid: &'a Ellipsoid, elevation_model: &'a Arc<dyn ElevationModel>) -> Self {
        Self {
            ellipsoid,
            elevation_model,
        }
    }

    pub fn ellipsoid(&self) -> &'a Ellipsoid {
        self.ellipsoid
    }

    pub fn elevation_model(&self) -> &'a Arc<dyn ElevationModel> {
        self.elevation_model
    }

    pub fn elevation_timestamp(&self) -> u64 {
        self.elevation_model.timestamp()
    }

    pub fn min_max_elevations(&self, sector: &Sector) -> (f64, f64) {
        self.elevation_model.min_max_elevations(sector)
    }

    pub fn elevation_at(&self, latitude: f64, longitude: f64) -> f64 {
        self.elevation_model.elevation_at(latitude, longitude)
    }
}

/// Owns the tessellator arena; exactly one tessellator is active at a time.
pub struct Globe {
    ellipsoid: Ellipsoid,
    elevation_model: Arc<dyn ElevationModel>,
    tessellators: Vec<Tessellator>,
    active: TessellatorId,
}

impl Globe {
    /// Create a globe with one tessellator built from `config`.
    pub fn new(
        ellipsoid: Ellipsoid,
        elevation_model: Arc<dyn ElevationModel>,
        config: &TessellatorConfig,
    ) -> Result<Self, TerrainError> {
        let active = TessellatorId(0);
        Ok(Self {
            ellipsoid,
            elevation_model,
            tessellators: vec![Tessellator::new(active, config)?],
            active,
        })
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    pub fn elevation_model(&self) -> &Arc<dyn ElevationModel> {
        &self.elevation_model
    }

    pub fn surface(&self) -> GlobeSurface<'_> {
        GlobeSurface::new(&self.ellipsoid, &self.elevation_model)
    }

    pub fn add_tessellator(&mut self, config: &TessellatorConfig) -> Result<TessellatorId, TerrainError> {
        let id = TessellatorId(self.tessellators.len());
        self.tessellators.push(Tessellator::new(id, config)?);
        Ok(id)
    }

    pub fn set_active_tessellator(&mut self, id: TessellatorId) -> Result<(), GeomError> {
        if id.0 >= self.tessellators.len() {
            return Err(GeomError::InvalidArgument(format!(
                "unknown tessellator {}",
                id.0
            )));
        }
        self.active = id;
        Ok(())
    }

    pub fn active_tessellator(&self) -> TessellatorId {
        self.active
    }

    /// Resolve a tile's non-owning tessellator reference.
    pub fn tessellator(&self, id: TessellatorId) -> Option<&Tessellator> {
        self.tessellators.get(id.0)
    }

    pub fn tessellator_mut(&mut self, id: TessellatorId) -> Option<&mut Tessellator> {
        self.tessellators.get_mut(id.0)
    }

    /// Visible terrain for `state` from the active tessellator.
    pub fn tessellate(
        &mut self,
        state: &NavigatorState,
        vertical_exaggeration: f64,
    ) -> Result<Terrain, TerrainError> {
        let Globe {
            ellipsoid,
            elevation_model,
            tessellators,
            active,
        } = self;
        let surface = GlobeSurface::new(ellipsoid, elevation_model);
        let tessellator = tessellators
            .get_mut(active.0)
            .ok_or_else(|| GeomError::InvalidArgument(format!("unknown tessellator {}", active.0)))?;
        tessellator.tessellate(&surface, state, vertical_exaggeration)
    }

    pub fn compute_point(&self, latitude: f64, longitude: f64, altitude: f64) -> DVec3 {
        self.ellipsoid.compute_point(latitude, longitude, altitude)
    }

    pub fn compute_position(&self, point: DVec3) -> Position {
        self.ellipsoid.compute_position(point)
    }

    pub fn elevation_at(&self, latitude: f64, longitude: f64) -> f64 {
        self.elevation_model.elevation_at(latitude, longitude)
    }
}
