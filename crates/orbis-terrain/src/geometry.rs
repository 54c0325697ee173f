//! Terrain tile meshes.

use glam::DVec3;
use orbis_geom::{Ellipsoid, Line, Sector};

use crate::elevation::ElevationModel;
use crate::tile::ElevationStamp;

/// A tile's triangle grid. Vertices are stored relative to `reference_center` so they stay
/// precise in `f32`.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainGeometry {
    pub reference_center: DVec3,
    pub vertices: Vec<[f32; 3]>,
    /// Triangle list, counter-clockwise seen from above the surface.
    pub indices: Vec<u32>,
    /// Line list outlining every cell.
    pub wireframe_indices: Vec<u32>,
    pub num_lat_cells: u32,
    pub num_lon_cells: u32,
    pub stamp: ElevationStamp,
}

impl TerrainGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Approximate heap footprint.
    pub fn size_in_bytes(&self) -> usize {
        self.vertices.len() * std::mem::size_of::<[f32; 3]>()
            + (self.indices.len() + self.wireframe_indices.len()) * std::mem::size_of::<u32>()
    }

    /// Model-coordinate position of vertex `i`.
    pub fn point(&self, i: usize) -> DVec3 {
        let [x, y, z] = self.vertices[i];
        self.reference_center + DVec3::new(x as f64, y as f64, z as f64)
    }

    /// Nearest intersection of `line` with this mesh, as a ray parameter.
    pub fn intersect(&self, line: &Line) -> Option<f64> {
        self.indices
            .chunks_exact(3)
            .filter_map(|tri| {
                line.intersect_triangle(
                    self.point(tri[0] as usize),
                    self.point(tri[1] as usize),
                    self.point(tri[2] as usize),
                )
            })
            .min_by(f64::total_cmp)
    }
}

/// Tessellate `sector` into a `num_lat_cells` by `num_lon_cells` grid draped over the
/// elevation model. Rows run south to north, columns west to east.
pub fn build_geometry(
    sector: &Sector,
    num_lat_cells: u32,
    num_lon_cells: u32,
    ellipsoid: &Ellipsoid,
    elevation_model: &dyn ElevationModel,
    vertical_exaggeration: f64,
) -> TerrainGeometry {
    let lat_cells = num_lat_cells.max(1);
    let lon_cells = num_lon_cells.max(1);
    let stride = lon_cells + 1;

    let centroid = sector.centroid();
    let reference_center = ellipsoid.compute_point(
        centroid.latitude,
        centroid.longitude,
        elevation_model.elevation_at(centroid.latitude, centroid.longitude) * vertical_exaggeration,
    );

    let mut vertices = Vec::with_capacity(((lat_cells + 1) * stride) as usize);
    let mut p = DVec3::ZERO;
    for i in 0..=lat_cells {
        let lat = sector.min_latitude + sector.delta_lat() * i as f64 / lat_cells as f64;
        for j in 0..=lon_cells {
            let lon = sector.min_longitude + sector.delta_lon() * j as f64 / lon_cells as f64;
            let elevation = elevation_model.elevation_at(lat, lon) * vertical_exaggeration;
            ellipsoid.compute_point_into(lat, lon, elevation, &mut p);
            let rel = p - reference_center;
            vertices.push([rel.x as f32, rel.y as f32, rel.z as f32]);
        }
    }

    let mut indices = Vec::with_capacity((lat_cells * lon_cells * 6) as usize);
    let mut wireframe_indices = Vec::with_capacity((lat_cells * lon_cells * 4 + (lat_cells + lon_cells) * 2) as usize);
    for i in 0..lat_cells {
        for j in 0..lon_cells {
            let sw = i * stride + j;
            let se = sw + 1;
            let nw = sw + stride;
            let ne = nw + 1;
            indices.extend_from_slice(&[sw, se, ne, sw, ne, nw]);
            wireframe_indices.extend_from_slice(&[sw, se, sw, nw]);
        }
    }
    for i in 0..lat_cells {
        let e = i * stride + lon_cells;
        wireframe_indices.extend_from_slice(&[e, e + stride]);
    }
    for j in 0..lon_cells {
        let n = lat_cells * stride + j;
        wireframe_indices.extend_from_slice(&[n, n + 1]);
    }

    TerrainGeometry {
        reference_center,
        vertices,
        indices,
        wireframe_indices,
        num_lat_cells: lat_cells,
        num_lon_cells: lon_cells,
        stamp: ElevationStamp {
            timestamp: elevation_model.timestamp(),
            vertical_exaggeration,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::{ProceduralElevationModel, ZeroElevationModel};

    #[test]
    fn test_grid_counts() {
        let g = build_geometry(
            &Sector::new(0.0, 10.0, 0.0, 20.0),
            4,
            8,
            &Ellipsoid::WGS84,
            &ZeroElevationModel,
            1.0,
        );
        assert_eq!(g.vertex_count(), 5 * 9);
        assert_eq!(g.triangle_count(), 4 * 8 * 2);
        assert_eq!(g.wireframe_indices.len(), (4 * 8 * 4 + 2 * (4 + 8)) as usize);
        assert!(g.indices.iter().all(|&i| (i as usize) < g.vertex_count()));
    }

    #[test]
    fn test_corner_vertex_matches_ellipsoid() {
        let e = Ellipsoid::WGS84;
        let g = build_geometry(&Sector::new(0.0, 10.0, 0.0, 20.0), 2, 2, &e, &ZeroElevationModel, 1.0);
        let expected = e.compute_point(0.0, 0.0, 0.0);
        assert!((g.point(0) - expected).length() < 1.0);
        let ne = e.compute_point(10.0, 20.0, 0.0);
        assert!((g.point(g.vertex_count() - 1) - ne).length() < 1.0);
    }

    #[test]
    fn test_triangles_face_outward() {
        let e = Ellipsoid::WGS84;
        let g = build_geometry(&Sector::new(-5.0, 5.0, -5.0, 5.0), 2, 2, &e, &ZeroElevationModel, 1.0);
        let tri = &g.indices[0..3];
        let (a, b, c) = (g.point(tri[0] as usize), g.point(tri[1] as usize), g.point(tri[2] as usize));
        let normal = (b - a).cross(c - a);
        assert!(normal.dot(a) > 0.0);
    }

    #[test]
    fn test_elevation_and_exaggeration_in_stamp() {
        let m = ProceduralElevationModel::new(100.0, 4.0);
        let g = build_geometry(&Sector::new(0.0, 1.0, 0.0, 1.0), 2, 2, &Ellipsoid::WGS84, &m, 3.0);
        assert_eq!(g.stamp.timestamp, m.timestamp());
        assert_eq!(g.stamp.vertical_exaggeration, 3.0);
    }

    #[test]
    fn test_ray_hits_tile_from_above() {
        let e = Ellipsoid::WGS84;
        let g = build_geometry(&Sector::new(-5.0, 5.0, -5.0, 5.0), 4, 4, &e, &ZeroElevationModel, 1.0);
        let surface = e.compute_point(1.0, 1.0, 0.0);
        let origin = e.compute_point(1.0, 1.0, 1.0e5);
        let line = Line::new(origin, (surface - origin).normalize());
        let t = g.intersect(&line).unwrap();
        assert!((line.point_at(t) - surface).length() < 2.0e3);
    }
}
