//! Backend-neutral graphics interface used by the frame pipeline.
//!
//! The pipeline draws only two primitive kinds, indexed triangle lists and
//! indexed line lists, each with a single flat color. Both backends keep
//! meshes resident under an opaque [`GpuHandle`] until deleted.

use glam::DMat4;
use orbis_geom::Viewport;

use crate::error::RenderError;

/// Opaque handle to a mesh resident in a graphics backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(pub u64);

/// Primitive assembly for an indexed mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Every three indices form a triangle.
    Triangles,
    /// Every two indices form a line segment.
    Lines,
}

/// Linear RGBA color with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// All-zero color. Cleared pick targets read back as this.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub fn from_rgba8(rgba: [u8; 4]) -> Self {
        Self::new(
            f32::from(rgba[0]) / 255.0,
            f32::from(rgba[1]) / 255.0,
            f32::from(rgba[2]) / 255.0,
            f32::from(rgba[3]) / 255.0,
        )
    }

    /// Quantizes to 8 bits per channel, rounding to nearest.
    #[must_use]
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    #[must_use]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// A drawing surface the scene controller renders into.
///
/// Window coordinates have their origin at the bottom-left corner. All
/// drawing happens between [`Graphics::begin_frame`] and
/// [`Graphics::end_frame`] on the thread that owns the context.
pub trait Graphics {
    /// Whether the context is current and may be drawn into.
    fn is_current(&self) -> bool;

    /// Makes the context current for the calling thread.
    fn make_current(&mut self);

    /// Releases the context. Drawing is refused until it is made current again.
    fn release_current(&mut self);

    /// Size of the backing color target in pixels.
    fn target_size(&self) -> (u32, u32);

    /// Sets the viewport and clears color and depth.
    fn begin_frame(&mut self, viewport: Viewport, clear_color: Color) -> Result<(), RenderError>;

    /// Flushes pending work and restores the default state (blending on).
    fn end_frame(&mut self) -> Result<(), RenderError>;

    /// Picking mode writes colors exactly, with blending disabled.
    fn set_picking(&mut self, picking: bool);

    fn create_mesh(
        &mut self,
        vertices: &[[f32; 3]],
        indices: &[u32],
        topology: Topology,
    ) -> Result<GpuHandle, RenderError>;

    /// Deletes a mesh. Unknown handles are ignored.
    fn delete_mesh(&mut self, handle: GpuHandle);

    /// Number of meshes currently resident.
    fn mesh_count(&self) -> usize;

    /// Draws a mesh with a flat color. `mvp` maps mesh vertices to clip space.
    fn draw_mesh(&mut self, handle: GpuHandle, mvp: &DMat4, color: Color)
    -> Result<(), RenderError>;

    /// Reads one pixel, with `(0, 0)` at the bottom-left of the target.
    fn read_pixel(&mut self, x: u32, y: u32) -> Result<[u8; 4], RenderError>;

    /// Reads the whole color target as tightly packed RGBA rows, top row first.
    fn read_frame(&mut self) -> Result<Vec<u8>, RenderError>;
}

/// Converts a double precision matrix to the column-major `f32` layout
/// uploaded to shaders.
#[must_use]
pub fn mat4_to_f32(m: &DMat4) -> [[f32; 4]; 4] {
    m.as_mat4().to_cols_array_2d()
}
