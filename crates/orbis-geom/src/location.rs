//! Geographic locations and positions in degrees.

/// A latitude/longitude pair in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude_radians(&self) -> f64 {
        self.latitude.to_radians()
    }

    pub fn longitude_radians(&self) -> f64 {
        self.longitude.to_radians()
    }
}

/// A geographic location with an altitude in meters above the ellipsoid.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Drops the altitude.
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}

impl From<Location> for Position {
    fn from(loc: Location) -> Self {
        Self::new(loc.latitude, loc.longitude, 0.0)
    }
}
