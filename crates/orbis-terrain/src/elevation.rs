//! Elevation sources consulted by tiles and geometry builders.

use std::sync::atomic::{AtomicU64, Ordering};

use orbis_geom::Sector;

/// A source of terrain heights in meters.
///
/// `timestamp` is a generation counter: it must change whenever the data the model would
/// return changes, so that tiles can tell whether cached extents and geometry are stale.
pub trait ElevationModel: Send + Sync {
    /// Lowest and highest elevations that may occur within `sector`.
    fn min_max_elevations(&self, sector: &Sector) -> (f64, f64);

    fn elevation_at(&self, latitude: f64, longitude: f64) -> f64;

    fn timestamp(&self) -> u64;
}

/// A flat globe.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroElevationModel;

impl ElevationModel for ZeroElevationModel {
    fn min_max_elevations(&self, _sector: &Sector) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn elevation_at(&self, _latitude: f64, _longitude: f64) -> f64 {
        0.0
    }

    fn timestamp(&self) -> u64 {
        0
    }
}

/// Deterministic rolling terrain built from a product of sines. Adjusting the amplitude
/// bumps the timestamp.
#[derive(Debug)]
pub struct ProceduralElevationModel {
    amplitude_bits: AtomicU64,
    wavelength: f64,
    generation: AtomicU64,
}

impl ProceduralElevationModel {
    /// `amplitude` in meters, `wavelength` in degrees.
    pub fn new(amplitude: f64, wavelength: f64) -> Self {
        Self {
            amplitude_bits: AtomicU64::new(amplitude.to_bits()),
            wavelength: wavelength.max(f64::EPSILON),
            generation: AtomicU64::new(1),
        }
    }

    pub fn amplitude(&self) -> f64 {
        f64::from_bits(self.amplitude_bits.load(Ordering::Acquire))
    }

    pub fn set_amplitude(&self, amplitude: f64) {
        self.amplitude_bits
            .store(amplitude.to_bits(), Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl ElevationModel for ProceduralElevationModel {
    fn min_max_elevations(&self, _sector: &Sector) -> (f64, f64) {
        let a = self.amplitude().abs();
        (-a, a)
    }

    fn elevation_at(&self, latitude: f64, longitude: f64) -> f64 {
        let k = std::f64::consts::TAU / self.wavelength;
        self.amplitude() * (k * latitude).sin() * (k * longitude).cos()
    }

    fn timestamp(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
