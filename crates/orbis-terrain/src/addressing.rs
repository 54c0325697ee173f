//! Row/column tiling math. Tiles are addressed from the south-west corner of the globe,
//! rows counting north from -90 and columns counting east from -180.

use orbis_geom::{GeomError, Sector};

use crate::level::Level;

fn check_delta(delta: f64) -> Result<(), GeomError> {
    if delta > 0.0 && delta.is_finite() {
        Ok(())
    } else {
        Err(GeomError::InvalidArgument(format!(
            "tile delta {delta} must be positive"
        )))
    }
}

/// Index of the last tile when `span` degrees are cut into tiles `delta` wide. A partial
/// tile at the end still counts.
fn last_index(span: f64, delta: f64) -> u32 {
    ((span / delta - 1e-9).ceil().max(1.0) as u32) - 1
}

/// Row of the tile containing `latitude` for tiles `delta` degrees tall. Latitude 90 maps
/// to the last row rather than one past it.
pub fn compute_row(delta: f64, latitude: f64) -> Result<u32, GeomError> {
    check_delta(delta)?;
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(GeomError::InvalidArgument(format!(
            "latitude {latitude} is outside [-90, 90]"
        )));
    }
    let row = ((latitude + 90.0) / delta).floor() as u32;
    Ok(row.min(last_index(180.0, delta)))
}

/// Column of the tile containing `longitude` for tiles `delta` degrees wide. Longitude
/// 180 maps to the last column.
pub fn compute_column(delta: f64, longitude: f64) -> Result<u32, GeomError> {
    check_delta(delta)?;
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(GeomError::InvalidArgument(format!(
            "longitude {longitude} is outside [-180, 180]"
        )));
    }
    let col = ((longitude + 180.0) / delta).floor() as u32;
    Ok(col.min(last_index(360.0, delta)))
}

/// Sector occupied by tile `(row, column)` at `level`.
pub fn compute_sector(level: &Level, row: u32, column: u32) -> Result<Sector, GeomError> {
    if row >= level.row_count() || column >= level.column_count() {
        return Err(GeomError::InvalidArgument(format!(
            "tile ({row}, {column}) is outside level {} ({} rows, {} columns)",
            level.level_number(),
            level.row_count(),
            level.column_count()
        )));
    }
    let delta = level.tile_delta();
    let min_lat = -90.0 + row as f64 * delta.latitude;
    let min_lon = -180.0 + column as f64 * delta.longitude;
    Ok(Sector::new(
        min_lat,
        (min_lat + delta.latitude).min(90.0),
        min_lon,
        (min_lon + delta.longitude).min(180.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_geom::Location;
    use proptest::prelude::*;

    #[test]
    fn test_row_and_column_edges() {
        assert_eq!(compute_row(45.0, -90.0).unwrap(), 0);
        assert_eq!(compute_row(45.0, 90.0).unwrap(), 3);
        assert_eq!(compute_row(45.0, 0.0).unwrap(), 2);
        assert_eq!(compute_column(45.0, -180.0).unwrap(), 0);
        assert_eq!(compute_column(45.0, 180.0).unwrap(), 7);
        assert_eq!(compute_column(45.0, -0.1).unwrap(), 3);
    }

    #[test]
    fn test_uneven_delta_clamps_to_last_tile() {
        // 40 degree rows: the fifth row is a partial tile ending at the pole.
        assert_eq!(compute_row(40.0, 89.0).unwrap(), 4);
        assert_eq!(compute_row(40.0, 90.0).unwrap(), 4);
        assert_eq!(compute_row(40.0, 70.0).unwrap(), 4);
        assert_eq!(compute_row(40.0, 69.9).unwrap(), 3);
        assert_eq!(compute_column(40.0, 180.0).unwrap(), 8);
    }

    #[test]
    fn test_last_sector_stays_on_the_globe() {
        let level = Level::new(0, Location::new(22.5, 22.5), 8, 8).unwrap();
        let s = compute_sector(&level, level.row_count() - 1, level.column_count() - 1).unwrap();
        assert_eq!(s, Sector::new(67.5, 90.0, 157.5, 180.0));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(matches!(compute_row(0.0, 0.0), Err(GeomError::InvalidArgument(_))));
        assert!(compute_row(-1.0, 0.0).is_err());
        assert!(compute_row(45.0, 90.5).is_err());
        assert!(compute_column(45.0, -180.5).is_err());
        assert!(compute_column(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_compute_sector() {
        let level = Level::new(1, Location::new(22.5, 22.5), 16, 16).unwrap();
        let s = compute_sector(&level, 3, 9).unwrap();
        assert_eq!(s, Sector::new(-22.5, 0.0, 22.5, 45.0));
        assert!(compute_sector(&level, 8, 0).is_err());
        assert!(compute_sector(&level, 0, 16).is_err());
    }

    proptest! {
        /// Any point strictly inside a tile's sector addresses back to that tile.
        #[test]
        fn test_addressing_round_trip(
            level_number in 0usize..10,
            row_frac in 0.0f64..1.0,
            col_frac in 0.0f64..1.0,
            lat_frac in 0.01f64..0.99,
            lon_frac in 0.01f64..0.99,
        ) {
            let delta = 45.0 / (1u64 << level_number) as f64;
            let level = Level::new(level_number, Location::new(delta, delta), 32, 32).unwrap();
            let row = ((level.row_count() as f64 * row_frac) as u32).min(level.row_count() - 1);
            let column = ((level.column_count() as f64 * col_frac) as u32).min(level.column_count() - 1);

            let s = compute_sector(&level, row, column).unwrap();
            let lat = s.min_latitude + lat_frac * s.delta_lat();
            let lon = s.min_longitude + lon_frac * s.delta_lon();
            prop_assert_eq!(compute_row(delta, lat).unwrap(), row);
            prop_assert_eq!(compute_column(delta, lon).unwrap(), column);
        }
    }
}
