//! The per-frame visible terrain.

use glam::DVec3;
use orbis_geom::{Ellipsoid, Line, Position, Sector};

use crate::terrain_tile::TerrainTile;

/// Visible terrain tiles for one frame, with the globe parameters they were built for.
#[derive(Clone, Debug, Default)]
pub struct Terrain {
    tiles: Vec<TerrainTile>,
    sector: Sector,
    ellipsoid: Ellipsoid,
    vertical_exaggeration: f64,
}

impl Terrain {
    pub fn new(tiles: Vec<TerrainTile>, ellipsoid: Ellipsoid, vertical_exaggeration: f64) -> Self {
        let mut sector = tiles.first().map(|t| *t.tile().sector()).unwrap_or_default();
        for t in tiles.iter().skip(1) {
            sector.union(t.tile().sector());
        }
        Self {
            tiles,
            sector,
            ellipsoid,
            vertical_exaggeration,
        }
    }

    pub fn tiles(&self) -> &[TerrainTile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Bounding sector of all visible tiles.
    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    pub fn vertical_exaggeration(&self) -> f64 {
        self.vertical_exaggeration
    }

    /// Nearest point where `line` meets the terrain mesh.
    pub fn intersect(&self, line: &Line) -> Option<DVec3> {
        self.tiles
            .iter()
            .filter(|t| t.tile().extent().intersects_line(line))
            .filter_map(|t| t.geometry().and_then(|g| g.intersect(line)))
            .min_by(f64::total_cmp)
            .map(|t| line.point_at(t))
    }

    /// Geographic position where `line` meets the terrain. The altitude is reported in
    /// unexaggerated meters.
    pub fn pick_position(&self, line: &Line) -> Option<Position> {
        let point = self.intersect(line)?;
        let mut position = self.ellipsoid.compute_position(point);
        if self.vertical_exaggeration > 0.0 {
            position.altitude /= self.vertical_exaggeration;
        }
        Some(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::ZeroElevationModel;
    use crate::geometry::build_geometry;
    use crate::globe::{GlobeSurface, TessellatorId};
    use crate::level::Level;
    use crate::tile::Tile;
    use orbis_geom::Location;
    use std::sync::Arc;

    fn terrain_tile(sector: Sector, row: u32, column: u32) -> TerrainTile {
        let e = Ellipsoid::WGS84;
        let m: Arc<dyn crate::ElevationModel> = Arc::new(ZeroElevationModel);
        let level = Level::new(0, Location::new(45.0, 45.0), 8, 8).unwrap();
        let mut tile = TerrainTile::new(Tile::new(sector, level, row, column), TessellatorId(0), 8, 8);
        tile.tile_mut().update_extent(&GlobeSurface::new(&e, &m), 1.0);
        tile.set_geometry(Arc::new(build_geometry(&sector, 8, 8, &e, &ZeroElevationModel, 1.0)));
        tile
    }

    fn terrain_with_one_tile() -> Terrain {
        let tile = terrain_tile(Sector::new(0.0, 45.0, 0.0, 45.0), 2, 4);
        Terrain::new(vec![tile], Ellipsoid::WGS84, 1.0)
    }

    fn vertical_ray(latitude: f64, longitude: f64) -> Line {
        let e = Ellipsoid::WGS84;
        let origin = e.compute_point(latitude, longitude, 1.0e7);
        let target = e.compute_point(latitude, longitude, 0.0);
        Line::new(origin, (target - origin).normalize())
    }

    #[test]
    fn test_sector_is_union_of_tiles() {
        let t = terrain_with_one_tile();
        assert_eq!(*t.sector(), Sector::new(0.0, 45.0, 0.0, 45.0));
        assert_eq!(t.len(), 1);
        assert!(Terrain::default().is_empty());
    }

    #[test]
    fn test_pick_position_from_above() {
        let t = terrain_with_one_tile();
        let e = Ellipsoid::WGS84;
        let origin = e.compute_point(20.0, 25.0, 1.0e6);
        let target = e.compute_point(20.0, 25.0, 0.0);
        let pos = t
            .pick_position(&Line::new(origin, (target - origin).normalize()))
            .unwrap();
        assert!((pos.latitude - 20.0).abs() < 0.05);
        assert!((pos.longitude - 25.0).abs() < 0.05);
        assert!(pos.altitude.abs() < 3.0e4);
    }

    #[test]
    fn test_pick_on_tile_corner_and_edges() {
        let tiles = vec![
            terrain_tile(Sector::new(-45.0, 0.0, -45.0, 0.0), 1, 3),
            terrain_tile(Sector::new(-45.0, 0.0, 0.0, 45.0), 1, 4),
            terrain_tile(Sector::new(0.0, 45.0, -45.0, 0.0), 2, 3),
            terrain_tile(Sector::new(0.0, 45.0, 0.0, 45.0), 2, 4),
        ];
        let t = Terrain::new(tiles, Ellipsoid::WGS84, 1.0);

        for (lat, lon) in [(0.0, 0.0), (0.0, 20.0), (0.0, -12.5), (30.0, 0.0), (-7.0, 0.0)] {
            let pos = t
                .pick_position(&vertical_ray(lat, lon))
                .unwrap_or_else(|| panic!("no hit at ({lat}, {lon})"));
            assert!((pos.latitude - lat).abs() < 0.05, "{pos:?}");
            assert!((pos.longitude - lon).abs() < 0.05, "{pos:?}");
        }
    }

    #[test]
    fn test_ray_missing_terrain() {
        let t = terrain_with_one_tile();
        let e = Ellipsoid::WGS84;
        let origin = e.compute_point(-40.0, -100.0, 1.0e6);
        let target = e.compute_point(-40.0, -100.0, 0.0);
        assert!(t.pick_position(&Line::new(origin, (target - origin).normalize())).is_none());
    }
}
