//! Offscreen wgpu implementation of [`Graphics`].
//!
//! Draws are recorded between flushes and replayed in one render pass per
//! flush. A flush happens on pixel readback and at the end of the frame, so
//! picking reads see every draw issued so far.

use std::collections::HashMap;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::DMat4;
use orbis_geom::Viewport;
use wgpu::util::DeviceExt;

use crate::error::RenderError;
use crate::graphics::{Color, GpuHandle, Graphics, Topology, mat4_to_f32};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-draw uniform: clip transform plus flat color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawUniform {
    pub mvp: [[f32; 4]; 4],
    pub color: [f32; 4],
}

/// The WGSL source for the flat-color shader.
pub const FLAT_SHADER_SOURCE: &str = r#"
struct DrawUniform {
    mvp: mat4x4<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> draw: DrawUniform;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return draw.mvp * vec4<f32>(position, 1.0);
}

// Lines are pulled toward the eye so they win over coplanar triangles.
@vertex
fn vs_lines(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    var clip = draw.mvp * vec4<f32>(position, 1.0);
    clip.z = clip.z - 1.0e-5 * clip.w;
    return clip;
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return draw.color;
}
"#;

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    topology: Topology,
}

struct DrawCommand {
    handle: GpuHandle,
    uniform: DrawUniform,
    opaque: bool,
}

/// Blended and opaque variants for both topologies.
struct FlatPipelines {
    triangles: wgpu::RenderPipeline,
    triangles_opaque: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
    lines_opaque: wgpu::RenderPipeline,
}

impl FlatPipelines {
    fn select(&self, topology: Topology, opaque: bool) -> &wgpu::RenderPipeline {
        match (topology, opaque) {
            (Topology::Triangles, false) => &self.triangles,
            (Topology::Triangles, true) => &self.triangles_opaque,
            (Topology::Lines, false) => &self.lines,
            (Topology::Lines, true) => &self.lines_opaque,
        }
    }
}

fn create_flat_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    topology: Topology,
    opaque: bool,
) -> wgpu::RenderPipeline {
    let (primitive_topology, entry_point) = match topology {
        Topology::Triangles => (wgpu::PrimitiveTopology::TriangleList, "vs_main"),
        Topology::Lines => (wgpu::PrimitiveTopology::LineList, "vs_lines"),
    };
    let label = match (topology, opaque) {
        (Topology::Triangles, false) => "flat-triangles",
        (Topology::Triangles, true) => "flat-triangles-opaque",
        (Topology::Lines, false) => "flat-lines",
        (Topology::Lines, true) => "flat-lines-opaque",
    };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(entry_point),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x3],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: primitive_topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: if opaque {
                    None
                } else {
                    Some(wgpu::BlendState::ALPHA_BLENDING)
                },
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}

fn create_target(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Offscreen RGBA8 target with a `Depth32Float` depth buffer.
pub struct WgpuGraphics {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    _depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
    pipelines: FlatPipelines,
    bind_group_layout: wgpu::BindGroupLayout,
    meshes: HashMap<GpuHandle, GpuMesh>,
    next_handle: u64,
    pending: Vec<DrawCommand>,
    viewport: Viewport,
    /// Clear color still owed to the target by the current frame.
    pending_clear: Option<Color>,
    current: bool,
    picking: bool,
    in_frame: bool,
}

impl WgpuGraphics {
    /// Selects an adapter and creates an offscreen target, blocking on `pollster`.
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        pollster::block_on(Self::new_async(width, height))
    }

    pub async fn new_async(width: u32, height: u32) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(_) => {
                return Err(RenderError::Graphics(
                    "no compatible GPU adapter found".into(),
                ));
            }
        };

        let info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("orbis-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| RenderError::Graphics(format!("failed to request GPU device: {e}")))?;

        Self::from_device(device, queue, width, height)
    }

    /// Builds the offscreen target on an existing device.
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "offscreen target must be non-empty, got {width}x{height}"
            )));
        }

        let (color_texture, color_view) = create_target(
            &device,
            "orbis-color-target",
            width,
            height,
            COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let (depth_texture, depth_view) = create_target(
            &device,
            "orbis-depth-target",
            width,
            height,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("flat-bind-group-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(80), // mat4x4 + vec4
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("flat-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("flat-shader"),
            source: wgpu::ShaderSource::Wgsl(FLAT_SHADER_SOURCE.into()),
        });
        let pipeline = |topology, opaque| {
            create_flat_pipeline(&device, &pipeline_layout, &shader, topology, opaque)
        };
        let pipelines = FlatPipelines {
            triangles: pipeline(Topology::Triangles, false),
            triangles_opaque: pipeline(Topology::Triangles, true),
            lines: pipeline(Topology::Lines, false),
            lines_opaque: pipeline(Topology::Lines, true),
        };

        Ok(Self {
            device,
            queue,
            color_texture,
            color_view,
            _depth_texture: depth_texture,
            depth_view,
            width,
            height,
            pipelines,
            bind_group_layout,
            meshes: HashMap::new(),
            next_handle: 1,
            pending: Vec::new(),
            viewport: Viewport::new(0, 0, width, height),
            pending_clear: None,
            current: true,
            picking: false,
            in_frame: false,
        })
    }

    /// Viewport rectangle in wgpu's top-left convention, clamped to the target.
    fn pass_viewport(&self) -> Option<(f32, f32, f32, f32)> {
        let vp = self.viewport;
        let x0 = i64::from(vp.x).max(0);
        let x1 = (i64::from(vp.x) + i64::from(vp.width)).min(i64::from(self.width));
        let top = i64::from(self.height) - (i64::from(vp.y) + i64::from(vp.height));
        let y0 = top.max(0);
        let y1 = (i64::from(self.height) - i64::from(vp.y)).min(i64::from(self.height));
        (x1 > x0 && y1 > y0)
            .then(|| (x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32))
    }

    /// Replays recorded draws into the target.
    fn flush(&mut self) {
        if self.pending.is_empty() && self.pending_clear.is_none() {
            return;
        }
        let commands = std::mem::take(&mut self.pending);
        let clear = self.pending_clear.take();

        let bind_groups: Vec<wgpu::BindGroup> = commands
            .iter()
            .map(|cmd| {
                let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("flat-draw-uniform"),
                    contents: bytemuck::bytes_of(&cmd.uniform),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("flat-draw-bind-group"),
                    layout: &self.bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("orbis-frame-encoder"),
            });
        {
            let color_load = match clear {
                Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: f64::from(c.r),
                    g: f64::from(c.g),
                    b: f64::from(c.b),
                    a: f64::from(c.a),
                }),
                None => wgpu::LoadOp::Load,
            };
            let depth_load = if clear.is_some() {
                wgpu::LoadOp::Clear(1.0)
            } else {
                wgpu::LoadOp::Load
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("orbis-flat-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some((x, y, w, h)) = self.pass_viewport() {
                pass.set_viewport(x, y, w, h, 0.0, 1.0);
                for (cmd, bind_group) in commands.iter().zip(&bind_groups) {
                    let Some(mesh) = self.meshes.get(&cmd.handle) else {
                        continue;
                    };
                    pass.set_pipeline(self.pipelines.select(mesh.topology, cmd.opaque));
                    pass.set_bind_group(0, bind_group, &[]);
                    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    pass.set_index_buffer(
                        mesh.index_buffer.slice(..),
                        wgpu::IndexFormat::Uint32,
                    );
                    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }
        self.queue.submit([encoder.finish()]);
    }

    /// Copies a region of the color target to the CPU, top row first.
    fn read_region(
        &mut self,
        x: u32,
        y_top: u32,
        w: u32,
        h: u32,
    ) -> Result<Vec<u8>, RenderError> {
        self.flush();

        let bpp = 4u32;
        let unpadded = w * bpp;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("orbis-readback"),
            size: u64::from(padded * h),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("orbis-readback-encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y: y_top, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(h),
                },
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit([encoder.finish()]);

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(RenderError::Graphics(format!("readback failed: {e}"))),
            Err(_) => return Err(RenderError::Graphics("readback callback dropped".into())),
        }

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * h) as usize);
        for row in 0..h {
            let start = (row * padded) as usize;
            pixels.extend_from_slice(&mapped[start..start + unpadded as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Ok(pixels)
    }
}

impl Graphics for WgpuGraphics {
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
                "wgpu context is not current".into(),
            ));
        }
        if viewport.is_empty() {
            return Err(RenderError::InvalidArgument(format!(
                "viewport {viewport:?} has zero area"
            )));
        }
        self.pending.clear();
        self.viewport = viewport;
        self.pending_clear = Some(clear_color);
        self.in_frame = true;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.flush();
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
        if vertices.is_empty() || indices.is_empty() {
            return Err(RenderError::InvalidArgument("mesh has no geometry".into()));
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RenderError::InvalidArgument(format!(
                "index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("orbis-mesh-vertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("orbis-mesh-indices"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let handle = GpuHandle(self.next_handle);
        self.next_handle += 1;
        self.meshes.insert(
            handle,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: indices.len() as u32,
                topology,
            },
        );
        Ok(handle)
    }

    fn delete_mesh(&mut self, handle: GpuHandle) {
        // Recorded draws still reference the buffers.
        if self.pending.iter().any(|cmd| cmd.handle == handle) {
            self.flush();
        }
        if let Some(mesh) = self.meshes.remove(&handle) {
            mesh.vertex_buffer.destroy();
            mesh.index_buffer.destroy();
        }
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
        if !self.current || !self.in_frame {
            return Err(RenderError::PreconditionViolation(
                "draw issued outside a current frame".into(),
            ));
        }
        if !self.meshes.contains_key(&handle) {
            return Err(RenderError::InvalidArgument(format!("unknown mesh {handle:?}")));
        }
        self.pending.push(DrawCommand {
            handle,
            uniform: DrawUniform {
                mvp: mat4_to_f32(mvp),
                color: color.to_array(),
            },
            opaque: self.picking,
        });
        Ok(())
    }

    fn read_pixel(&mut self, x: u32, y: u32) -> Result<[u8; 4], RenderError> {
        if x >= self.width || y >= self.height {
            return Err(RenderError::InvalidArgument(format!(
                "pixel ({x}, {y}) outside {}x{} target",
                self.width, self.height
            )));
        }
        let pixel = self.read_region(x, self.height - 1 - y, 1, 1)?;
        Ok([pixel[0], pixel[1], pixel[2], pixel[3]])
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, RenderError> {
        self.read_region(0, 0, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn try_graphics(width: u32, height: u32) -> Option<WgpuGraphics> {
        WgpuGraphics::new(width, height).ok()
    }

    fn quad(g: &mut WgpuGraphics, z: f32) -> GpuHandle {
        g.create_mesh(
            &[[-1.0, -1.0, z], [1.0, -1.0, z], [1.0, 1.0, z], [-1.0, 1.0, z]],
            &[0, 1, 2, 0, 2, 3],
            Topology::Triangles,
        )
        .unwrap()
    }

    #[test]
    fn test_draw_uniform_size() {
        assert_eq!(std::mem::size_of::<DrawUniform>(), 80);
    }

    #[test]
    fn test_clear_and_pick_colors_read_back_exactly() {
        let Some(mut g) = try_graphics(16, 16) else {
            return;
        };
        let q = quad(&mut g, 0.5);
        g.begin_frame(Viewport::new(0, 0, 16, 16), Color::TRANSPARENT)
            .unwrap();
        assert_eq!(g.read_pixel(3, 3).unwrap(), [0, 0, 0, 0]);

        g.set_picking(true);
        let code = Color::from_rgba8([1, 2, 3, 255]);
        g.draw_mesh(q, &DMat4::IDENTITY, code).unwrap();
        assert_eq!(g.read_pixel(8, 8).unwrap(), [1, 2, 3, 255]);
        g.end_frame().unwrap();
    }

    #[test]
    fn test_depth_keeps_nearest() {
        let Some(mut g) = try_graphics(8, 8) else {
            return;
        };
        let near = quad(&mut g, 0.2);
        let far = quad(&mut g, 0.8);
        g.begin_frame(Viewport::new(0, 0, 8, 8), Color::BLACK).unwrap();
        g.draw_mesh(near, &DMat4::IDENTITY, Color::WHITE).unwrap();
        g.draw_mesh(far, &DMat4::IDENTITY, Color::BLACK).unwrap();
        assert_eq!(g.read_pixel(4, 4).unwrap(), [255, 255, 255, 255]);
        g.end_frame().unwrap();
    }

    #[test]
    fn test_read_frame_dimensions() {
        let Some(mut g) = try_graphics(10, 6) else {
            return;
        };
        g.begin_frame(Viewport::new(0, 0, 10, 6), Color::WHITE).unwrap();
        g.end_frame().unwrap();
        let frame = g.read_frame().unwrap();
        assert_eq!(frame.len(), 10 * 6 * 4);
        assert!(frame.iter().all(|&b| b == 255));
    }

    #[test]
    fn test_deleted_mesh_is_gone() {
        let Some(mut g) = try_graphics(4, 4) else {
            return;
        };
        let q = quad(&mut g, 0.5);
        g.delete_mesh(q);
        assert_eq!(g.mesh_count(), 0);
        g.begin_frame(Viewport::new(0, 0, 4, 4), Color::BLACK).unwrap();
        assert!(g.draw_mesh(q, &DMat4::IDENTITY, Color::WHITE).is_err());
    }
}
