//! Geographic sectors: axis-aligned latitude/longitude rectangles in degrees.
//!
//! A sector is empty when both its latitude and longitude spans are zero. Sectors are
//! small `Copy` values; the in-place `intersection`/`union` operations mutate `self`.

use crate::error::GeomError;
use crate::location::Location;

/// A latitude/longitude rectangle. Latitudes lie in [-90, 90], longitudes in [-180, 180].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sector {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Sector {
    /// The whole globe.
    pub const FULL_SPHERE: Sector = Sector {
        min_latitude: -90.0,
        max_latitude: 90.0,
        min_longitude: -180.0,
        max_longitude: 180.0,
    };

    /// Create a sector from its bounds. Reversed bounds are swapped so that `min <= max`.
    pub fn new(min_latitude: f64, max_latitude: f64, min_longitude: f64, max_longitude: f64) -> Self {
        Self {
            min_latitude: min_latitude.min(max_latitude),
            max_latitude: min_latitude.max(max_latitude),
            min_longitude: min_longitude.min(max_longitude),
            max_longitude: min_longitude.max(max_longitude),
        }
    }

    /// Like [`Sector::new`] but rejects non-finite or out-of-range bounds.
    pub fn try_new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> Result<Self, GeomError> {
        for (name, v, limit) in [
            ("min_latitude", min_latitude, 90.0),
            ("max_latitude", max_latitude, 90.0),
            ("min_longitude", min_longitude, 180.0),
            ("max_longitude", max_longitude, 180.0),
        ] {
            if !v.is_finite() || v.abs() > limit {
                return Err(GeomError::InvalidArgument(format!(
                    "{name} {v} is outside [-{limit}, {limit}]"
                )));
            }
        }
        Ok(Self::new(min_latitude, max_latitude, min_longitude, max_longitude))
    }

    /// Copy every bound from `other` into this sector.
    pub fn set(&mut self, other: &Sector) {
        *self = *other;
    }

    /// Smallest sector enclosing every location.
    pub fn from_locations(locations: &[Location]) -> Result<Self, GeomError> {
        let Some(first) = locations.first() else {
            return Err(GeomError::InvalidArgument(
                "location list is empty".to_string(),
            ));
        };
        let mut s = Sector::new(first.latitude, first.latitude, first.longitude, first.longitude);
        for loc in &locations[1..] {
            s.min_latitude = s.min_latitude.min(loc.latitude);
            s.max_latitude = s.max_latitude.max(loc.latitude);
            s.min_longitude = s.min_longitude.min(loc.longitude);
            s.max_longitude = s.max_longitude.max(loc.longitude);
        }
        Ok(s)
    }

    pub fn delta_lat(&self) -> f64 {
        self.max_latitude - self.min_latitude
    }

    pub fn delta_lon(&self) -> f64 {
        self.max_longitude - self.min_longitude
    }

    pub fn centroid_lat(&self) -> f64 {
        0.5 * (self.min_latitude + self.max_latitude)
    }

    pub fn centroid_lon(&self) -> f64 {
        0.5 * (self.min_longitude + self.max_longitude)
    }

    pub fn centroid(&self) -> Location {
        Location::new(self.centroid_lat(), self.centroid_lon())
    }

    pub fn min_latitude_radians(&self) -> f64 {
        self.min_latitude.to_radians()
    }

    pub fn max_latitude_radians(&self) -> f64 {
        self.max_latitude.to_radians()
    }

    pub fn min_longitude_radians(&self) -> f64 {
        self.min_longitude.to_radians()
    }

    pub fn max_longitude_radians(&self) -> f64 {
        self.max_longitude.to_radians()
    }

    /// The four corners followed by the centroid, counter-clockwise from the south-west.
    pub fn corners_and_center(&self) -> [Location; 5] {
        [
            Location::new(self.min_latitude, self.min_longitude),
            Location::new(self.min_latitude, self.max_longitude),
            Location::new(self.max_latitude, self.max_longitude),
            Location::new(self.max_latitude, self.min_longitude),
            self.centroid(),
        ]
    }

    /// True when both spans are zero.
    pub fn is_empty(&self) -> bool {
        self.delta_lat() == 0.0 && self.delta_lon() == 0.0
    }

    /// True when the sectors share any point, including a shared edge.
    pub fn intersects(&self, other: &Sector) -> bool {
        self.min_latitude <= other.max_latitude
            && self.max_latitude >= other.min_latitude
            && self.min_longitude <= other.max_longitude
            && self.max_longitude >= other.min_longitude
    }

    /// True when the sectors share a region of positive area.
    pub fn overlaps(&self, other: &Sector) -> bool {
        self.min_latitude < other.max_latitude
            && self.max_latitude > other.min_latitude
            && self.min_longitude < other.max_longitude
            && self.max_longitude > other.min_longitude
    }

    /// True when `other` lies entirely within this sector.
    pub fn contains(&self, other: &Sector) -> bool {
        self.min_latitude <= other.min_latitude
            && self.max_latitude >= other.max_latitude
            && self.min_longitude <= other.min_longitude
            && self.max_longitude >= other.max_longitude
    }

    pub fn contains_location(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_latitude
            && latitude <= self.max_latitude
            && longitude >= self.min_longitude
            && longitude <= self.max_longitude
    }

    /// Shrink this sector to its intersection with `other`. Disjoint sectors collapse to a
    /// degenerate sector whose spans are zero along every disjoint axis.
    pub fn intersection(&mut self, other: &Sector) {
        self.min_latitude = self.min_latitude.max(other.min_latitude);
        self.max_latitude = self.max_latitude.min(other.max_latitude);
        self.min_longitude = self.min_longitude.max(other.min_longitude);
        self.max_longitude = self.max_longitude.min(other.max_longitude);

        if self.max_latitude < self.min_latitude {
            self.max_latitude = self.min_latitude;
        }
        if self.max_longitude < self.min_longitude {
            self.max_longitude = self.min_longitude;
        }
    }

    /// Grow this sector to enclose `other`.
    pub fn union(&mut self, other: &Sector) {
        self.min_latitude = self.min_latitude.min(other.min_latitude);
        self.max_latitude = self.max_latitude.max(other.max_latitude);
        self.min_longitude = self.min_longitude.min(other.min_longitude);
        self.max_longitude = self.max_longitude.max(other.max_longitude);
    }

    /// Split into four quadrants: south-west, south-east, north-west, north-east.
    pub fn subdivide(&self) -> [Sector; 4] {
        let mid_lat = self.centroid_lat();
        let mid_lon = self.centroid_lon();
        [
            Sector::new(self.min_latitude, mid_lat, self.min_longitude, mid_lon),
            Sector::new(self.min_latitude, mid_lat, mid_lon, self.max_longitude),
            Sector::new(mid_lat, self.max_latitude, self.min_longitude, mid_lon),
            Sector::new(mid_lat, self.max_latitude, mid_lon, self.max_longitude),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_sphere_spans() {
        let s = Sector::FULL_SPHERE;
        assert_eq!(s.delta_lat(), 180.0);
        assert_eq!(s.delta_lon(), 360.0);
        assert_eq!(s.centroid(), Location::new(0.0, 0.0));
        assert!(!s.is_empty());
    }

    #[test]
    fn test_new_swaps_reversed_bounds() {
        let s = Sector::new(10.0, -10.0, 5.0, -5.0);
        assert_eq!(s.min_latitude, -10.0);
        assert_eq!(s.max_longitude, 5.0);
    }

    #[test]
    fn test_try_new_rejects_out_of_range() {
        assert!(matches!(
            Sector::try_new(-91.0, 0.0, 0.0, 1.0),
            Err(GeomError::InvalidArgument(_))
        ));
        assert!(Sector::try_new(f64::NAN, 0.0, 0.0, 1.0).is_err());
        assert!(Sector::try_new(-90.0, 90.0, -180.0, 180.0).is_ok());
    }

    #[test]
    fn test_from_locations_bounds() {
        let s = Sector::from_locations(&[
            Location::new(10.0, 20.0),
            Location::new(-5.0, 30.0),
            Location::new(2.0, -40.0),
        ])
        .unwrap();
        assert_eq!(s, Sector::new(-5.0, 10.0, -40.0, 30.0));
    }

    #[test]
    fn test_from_locations_empty_is_error() {
        assert!(Sector::from_locations(&[]).is_err());
    }

    #[test]
    fn test_point_sector_is_empty() {
        assert!(Sector::new(1.0, 1.0, 2.0, 2.0).is_empty());
        // A line segment is not empty: only one span is zero.
        assert!(!Sector::new(1.0, 1.0, 2.0, 3.0).is_empty());
    }

    #[test]
    fn test_intersects_and_contains() {
        let a = Sector::new(0.0, 10.0, 0.0, 10.0);
        let b = Sector::new(5.0, 15.0, 5.0, 15.0);
        let c = Sector::new(20.0, 30.0, 20.0, 30.0);
        let edge = Sector::new(10.0, 20.0, 0.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&edge));
        assert!(!a.overlaps(&edge));
        assert!(a.contains(&Sector::new(1.0, 2.0, 1.0, 2.0)));
        assert!(!a.contains(&b));
    }

    #[test]
    fn test_intersection_in_place() {
        let mut a = Sector::new(0.0, 10.0, 0.0, 10.0);
        a.intersection(&Sector::new(5.0, 15.0, -5.0, 5.0));
        assert_eq!(a, Sector::new(5.0, 10.0, 0.0, 5.0));
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let mut a = Sector::new(0.0, 10.0, 0.0, 10.0);
        a.intersection(&Sector::new(20.0, 30.0, 20.0, 30.0));
        assert!(a.is_empty());
    }

    #[test]
    fn test_union_in_place() {
        let mut a = Sector::new(0.0, 10.0, 0.0, 10.0);
        a.union(&Sector::new(-5.0, 2.0, 8.0, 20.0));
        assert_eq!(a, Sector::new(-5.0, 10.0, 0.0, 20.0));
    }

    #[test]
    fn test_subdivide_partitions_parent() {
        let parent = Sector::new(-10.0, 30.0, 40.0, 80.0);
        let children = parent.subdivide();
        let area: f64 = children.iter().map(|c| c.delta_lat() * c.delta_lon()).sum();
        assert!((area - parent.delta_lat() * parent.delta_lon()).abs() < 1e-9);
        for (i, a) in children.iter().enumerate() {
            assert!(parent.contains(a));
            for b in &children[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    fn arb_sector() -> impl proptest::strategy::Strategy<Value = Sector> {
        use proptest::prelude::*;
        (-90.0..90.0f64, -90.0..90.0f64, -180.0..180.0f64, -180.0..180.0f64)
            .prop_map(|(a, b, c, d)| Sector::new(a, b, c, d))
    }

    proptest::proptest! {
        #[test]
        fn test_union_contains_and_intersection_is_contained(a in arb_sector(), b in arb_sector()) {
            let mut union = a;
            union.union(&b);
            proptest::prop_assert!(union.contains(&a) && union.contains(&b));

            let mut both = a;
            both.intersection(&b);
            if a.intersects(&b) {
                proptest::prop_assert!(a.contains(&both) && b.contains(&both));
            }
            proptest::prop_assert!(both.delta_lat() >= 0.0 && both.delta_lon() >= 0.0);
        }
    }
}
