//! CPU rasterizer implementing [`Graphics`] without a GPU.
//!
//! Triangles are filled with edge functions sampled at pixel centers, lines
//! are stepped with a DDA, and both go through a `Less` depth test against a
//! `[0, 1]` depth buffer. Primitives with a vertex behind the eye are
//! dropped rather than clipped.

use std::collections::HashMap;

use glam::{DMat4, DVec4};
use orbis_geom::Viewport;

use crate::error::RenderError;
use crate::graphics::{Color, GpuHandle, Graphics, Topology};

/// Depth pulled toward the eye for line primitives so wireframes drawn over
/// coplanar triangles stay visible.
const LINE_DEPTH_OFFSET: f64 = 1.0e-5;

/// Clip-space `w` below which a vertex counts as behind the eye.
const MIN_CLIP_W: f64 = 1.0e-9;

struct SoftwareMesh {
    vertices: Vec<[f32; 3]>,
    indices: Vec<u32>,
    topology: Topology,
}

/// Window-space vertex: pixel coordinates plus normalized depth.
#[derive(Clone, Copy, Debug)]
struct ScreenVertex {
    x: f64,
    y: f64,
    z: f64,
}

/// Headless rasterizer with an RGBA8 color target and an `f32` depth target.
pub struct SoftwareGraphics {
    width: u32,
    height: u32,
    /// Rows stored bottom row first, matching window coordinates.
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
    viewport: Viewport,
    meshes: HashMap<GpuHandle, SoftwareMesh>,
    next_handle: u64,
    current: bool,
    picking: bool,
    in_frame: bool,
}

impl SoftwareGraphics {
    /// Creates a target of the given size. The context starts out current.
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "software target must be non-empty, got {width}x{height}"
            )));
        }
        let len = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            color: vec![[0, 0, 0, 0]; len],
            depth: vec![1.0; len],
            viewport: Viewport::new(0, 0, width, height),
            meshes: HashMap::new(),
            next_handle: 1,
            current: true,
            picking: false,
            in_frame: false,
        })
    }

    #[must_use]
    pub fn is_picking(&self) -> bool {
        self.picking
    }

    fn require_frame(&self) -> Result<(), RenderError> {
        if !self.current {
            return Err(RenderError::PreconditionViolation(
                "software context is not current".into(),
            ));
        }
        if !self.in_frame {
            return Err(RenderError::PreconditionViolation(
                "draw issued outside begin_frame/end_frame".into(),
            ));
        }
        Ok(())
    }

    fn to_screen(&self, mvp: &DMat4, v: [f32; 3]) -> Option<ScreenVertex> {
        let clip = *mvp * DVec4::new(f64::from(v[0]), f64::from(v[1]), f64::from(v[2]), 1.0);
        if clip.w <= MIN_CLIP_W {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let vp = self.viewport;
        Some(ScreenVertex {
            x: f64::from(vp.x) + (ndc.x + 1.0) * 0.5 * f64::from(vp.width),
            y: f64::from(vp.y) + (ndc.y + 1.0) * 0.5 * f64::from(vp.height),
            z: ndc.z,
        })
    }

    /// Pixel range covered by both the viewport and the target, as
    /// `(x0, y0, x1, y1)` with exclusive upper bounds.
    fn scissor(&self) -> (i64, i64, i64, i64) {
        let vp = self.viewport;
        let x0 = i64::from(vp.x).max(0);
        let y0 = i64::from(vp.y).max(0);
        let x1 = (i64::from(vp.x) + i64::from(vp.width)).min(i64::from(self.width));
        let y1 = (i64::from(vp.y) + i64::from(vp.height)).min(i64::from(self.height));
        (x0, y0, x1, y1)
    }

    fn shade(&mut self, px: i64, py: i64, z: f64, color: Color) {
        if !(0.0..=1.0).contains(&z) {
            return;
        }
        let idx = py as usize * self.width as usize + px as usize;
        let z = z as f32;
        if z >= self.depth[idx] {
            return;
        }
        self.depth[idx] = z;
        self.color[idx] = if self.picking || color.a >= 1.0 {
            color.to_rgba8()
        } else {
            let dst = Color::from_rgba8(self.color[idx]);
            let a = color.a;
            Color::new(
                color.r * a + dst.r * (1.0 - a),
                color.g * a + dst.g * (1.0 - a),
                color.b * a + dst.b * (1.0 - a),
                a + dst.a * (1.0 - a),
            )
            .to_rgba8()
        };
    }

    fn fill_triangle(&mut self, a: ScreenVertex, b: ScreenVertex, c: ScreenVertex, color: Color) {
        let area = edge(a, b, c.x, c.y);
        if area.abs() < f64::EPSILON {
            return;
        }
        let (sx0, sy0, sx1, sy1) = self.scissor();
        let min_x = (a.x.min(b.x).min(c.x).floor() as i64).max(sx0);
        let min_y = (a.y.min(b.y).min(c.y).floor() as i64).max(sy0);
        let max_x = (a.x.max(b.x).max(c.x).ceil() as i64).min(sx1);
        let max_y = (a.y.max(b.y).max(c.y).ceil() as i64).min(sy1);

        for py in min_y..max_y {
            let cy = py as f64 + 0.5;
            for px in min_x..max_x {
                let cx = px as f64 + 0.5;
                let w0 = edge(b, c, cx, cy) / area;
                let w1 = edge(c, a, cx, cy) / area;
                let w2 = edge(a, b, cx, cy) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let z = w0 * a.z + w1 * b.z + w2 * c.z;
                self.shade(px, py, z, color);
            }
        }
    }

    fn draw_line(&mut self, a: ScreenVertex, b: ScreenVertex, color: Color) {
        let (sx0, sy0, sx1, sy1) = self.scissor();
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i64;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let px = (a.x + dx * t).floor() as i64;
            let py = (a.y + dy * t).floor() as i64;
            if px < sx0 || px >= sx1 || py < sy0 || py >= sy1 {
                continue;
            }
            let z = a.z + (b.z - a.z) * t - LINE_DEPTH_OFFSET;
            self.shade(px, py, z.max(0.0), color);
        }
    }
}

/// Twice the signed area of `(a, b, p)`; positive when counter-clockwise.
fn edge(a: ScreenVertex, b: ScreenVertex, px: f64, py: f64) -> f64 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

impl Graphics for SoftwareGraphics {
    fn is_current(&self) -> bool {
        self.current
    }

    fn make_current(&mut self) {
        self.current = true;
    }

    fn release_current(&mut self) {
        self.current = false;
    }

    fn target_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self, viewport: Viewport, clear_color: Color) -> Result<(), RenderError> {
        if !self.current {
            return Err(RenderError::PreconditionViolation(
                "software context is not current".into(),
            ));
        }
        if viewport.is_empty() {
            return Err(RenderError::InvalidArgument(format!(
                "viewport {viewport:?} has zero area"
            )));
        }
        self.viewport = viewport;
        self.color.fill(clear_color.to_rgba8());
        self.depth.fill(1.0);
        self.in_frame = true;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.in_frame = false;
        self.picking = false;
        Ok(())
    }

    fn set_picking(&mut self, picking: bool) {
        self.picking = picking;
    }

    fn create_mesh(
        &mut self,
        vertices: &[[f32; 3]],
        indices: &[u32],
        topology: Topology,
    ) -> Result<GpuHandle, RenderError> {
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RenderError::InvalidArgument(format!(
                "index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }
        let handle = GpuHandle(self.next_handle);
        self.next_handle += 1;
        self.meshes.insert(
            handle,
            SoftwareMesh {
                vertices: vertices.to_vec(),
                indices: indices.to_vec(),
                topology,
            },
        );
        Ok(handle)
    }

    fn delete_mesh(&mut self, handle: GpuHandle) {
        self.meshes.remove(&handle);
    }

    fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    fn draw_mesh(
        &mut self,
        handle: GpuHandle,
        mvp: &DMat4,
        color: Color,
    ) -> Result<(), RenderError> {
        self.require_frame()?;
        // Taken out so rasterization can borrow the targets mutably.
        let mesh = self
            .meshes
            .remove(&handle)
            .ok_or_else(|| RenderError::InvalidArgument(format!("unknown mesh {handle:?}")))?;

        let screen: Vec<Option<ScreenVertex>> =
            mesh.vertices.iter().map(|&v| self.to_screen(mvp, v)).collect();
        match mesh.topology {
            Topology::Triangles => {
                for tri in mesh.indices.chunks_exact(3) {
                    if let (Some(a), Some(b), Some(c)) = (
                        screen[tri[0] as usize],
                        screen[tri[1] as usize],
                        screen[tri[2] as usize],
                    ) {
                        self.fill_triangle(a, b, c, color);
                    }
                }
            }
            Topology::Lines => {
                for seg in mesh.indices.chunks_exact(2) {
                    if let (Some(a), Some(b)) = (screen[seg[0] as usize], screen[seg[1] as usize])
                    {
                        self.draw_line(a, b, color);
                    }
                }
            }
        }

        self.meshes.insert(handle, mesh);
        Ok(())
    }

    fn read_pixel(&mut self, x: u32, y: u32) -> Result<[u8; 4], RenderError> {
        if x >= self.width || y >= self.height {
            return Err(RenderError::InvalidArgument(format!(
                "pixel ({x}, {y}) outside {}x{} target",
                self.width, self.height
            )));
        }
        Ok(self.color[y as usize * self.width as usize + x as usize])
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, RenderError> {
        let w = self.width as usize;
        let mut pixels = Vec::with_capacity(self.color.len() * 4);
        for row in self.color.chunks_exact(w).rev() {
            for px in row {
                pixels.extend_from_slice(px);
            }
        }
        Ok(pixels)
    }
}
