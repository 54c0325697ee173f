//! Frame rendering and picking for the globe.
//!
//! [`SceneController`] drives each frame: it snapshots the navigator, builds the
//! visible terrain, renders the layer list, then the ordered renderables back
//! to front. Pick frames use the same pipeline with every pickable drawn in a
//! unique opaque color, and resolve the color read back at the pick point.
//!
//! Drawing goes through the [`Graphics`] trait. [`WgpuGraphics`] renders
//! off-screen with wgpu; [`SoftwareGraphics`] is a CPU rasterizer used for
//! headless runs and tests.

mod draw_context;
mod error;
mod gpu_cache;
mod graphics;
mod layer;
mod pick;
mod renderable;
mod scene_controller;
mod software;
mod stats;
mod wgpu_graphics;

pub use draw_context::DrawContext;
pub use error::RenderError;
pub use gpu_cache::{GpuResource, GpuResourceCache};
pub use graphics::{Color, GpuHandle, Graphics, Topology, mat4_to_f32};
pub use layer::{
    Layer, LayerAttributes, LayerList, RenderableLayer, ShowTessellationLayer, SurfaceLayer,
};
pub use pick::{
    MAX_PICK_CODE, PickSupport, PickTarget, PickedObject, PickedObjectList, ShapeId, code_to_color,
    color_to_code,
};
pub use renderable::{OrderedRenderable, Placemark};
pub use scene_controller::{FrameState, SceneController, SceneOptions};
pub use software::SoftwareGraphics;
pub use stats::FrameStatistics;
pub use wgpu_graphics::{COLOR_FORMAT, DEPTH_FORMAT, WgpuGraphics};
