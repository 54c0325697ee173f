//! Geographic and Cartesian primitives for the globe: sectors, locations, bounding volumes,
//! frustums, rays, viewports, and the reference ellipsoid.

mod bounding_box;
mod ellipsoid;
mod error;
mod frustum;
mod line;
mod location;
pub mod matrix;
mod sector;
mod viewport;

pub use bounding_box::BoundingBox;
pub use ellipsoid::Ellipsoid;
pub use error::GeomError;
pub use frustum::Frustum;
pub use line::Line;
pub use location::{Location, Position};
pub use sector::Sector;
pub use viewport::Viewport;
