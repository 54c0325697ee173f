//! Layers: the ordered units of content drawn each frame.

use crate::draw_context::DrawContext;
use crate::error::RenderError;
use crate::graphics::{Color, Topology};
use crate::pick::ShapeId;
use crate::renderable::Placemark;

/// Name and switches shared by every layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerAttributes {
    pub name: String,
    pub enabled: bool,
    /// Whether the layer takes part in pick frames.
    pub pick_enabled: bool,
}

impl LayerAttributes {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            pick_enabled: true,
        }
    }
}

/// A unit of content drawn once per frame, in list order.
pub trait Layer {
    fn attributes(&self) -> &LayerAttributes;

    fn attributes_mut(&mut self) -> &mut LayerAttributes;

    fn render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError>;

    fn name(&self) -> &str {
        &self.attributes().name
    }

    fn is_enabled(&self) -> bool {
        self.attributes().enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.attributes_mut().enabled = enabled;
    }

    fn is_pick_enabled(&self) -> bool {
        self.attributes().pick_enabled
    }

    fn set_pick_enabled(&mut self, pick_enabled: bool) {
        self.attributes_mut().pick_enabled = pick_enabled;
    }
}

/// Layers in draw order: earlier layers are painted first.
#[derive(Default)]
pub struct LayerList {
    layers: Vec<Box<dyn Layer>>,
}

impl LayerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    /// Inserts at `index`, clamped to the end of the list.
    pub fn insert(&mut self, index: usize, layer: Box<dyn Layer>) {
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
    }

    /// Removes the first layer named `name`.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Layer>> {
        let index = self.layers.iter().position(|l| l.name() == name)?;
        Some(self.layers.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&(dyn Layer + 'static)> {
        self.layers.iter().find(|l| l.name() == name).map(|l| &**l)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Layer + 'static)> {
        self.layers
            .iter_mut()
            .find(|l| l.name() == name)
            .map(|l| &mut **l)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn Layer + 'static)> {
        self.layers.iter().map(|l| &**l)
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Box<dyn Layer>> {
        self.layers.iter_mut()
    }
}

/// Shades every visible terrain tile with one color. Stands in for imagery.
pub struct SurfaceLayer {
    attributes: LayerAttributes,
    color: Color,
}

impl SurfaceLayer {
    pub fn new(color: Color) -> Self {
        let mut attributes = LayerAttributes::new("Surface");
        // Terrain has its own pick pass.
        attributes.pick_enabled = false;
        Self { attributes, color }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

impl Layer for SurfaceLayer {
    fn attributes(&self) -> &LayerAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut LayerAttributes {
        &mut self.attributes
    }

    fn render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        dc.draw_terrain(Topology::Triangles, self.color)?;
        Ok(())
    }
}

/// Draws the terrain tessellation as a wireframe.
pub struct ShowTessellationLayer {
    attributes: LayerAttributes,
    color: Color,
}

impl ShowTessellationLayer {
    pub const DEFAULT_COLOR: Color = Color::new(1.0, 1.0, 1.0, 0.6);

    pub fn new() -> Self {
        let mut attributes = LayerAttributes::new("Show Tessellation");
        attributes.pick_enabled = false;
        Self {
            attributes,
            color: Self::DEFAULT_COLOR,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

impl Default for ShowTessellationLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for ShowTessellationLayer {
    fn attributes(&self) -> &LayerAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut LayerAttributes {
        &mut self.attributes
    }

    fn render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        let tiles = dc.draw_terrain(Topology::Lines, self.color)?;
        log::trace!("Tessellation wireframe drawn for {tiles} tiles");
        Ok(())
    }
}

/// Holds placemarks and queues the visible ones as ordered renderables.
pub struct RenderableLayer {
    attributes: LayerAttributes,
    placemarks: Vec<Placemark>,
}

impl RenderableLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            attributes: LayerAttributes::new(name),
            placemarks: Vec::new(),
        }
    }

    pub fn add_placemark(&mut self, placemark: Placemark) {
        self.placemarks.push(placemark);
    }

    pub fn remove_placemark(&mut self, id: ShapeId) -> Option<Placemark> {
        let index = self.placemarks.iter().position(|p| p.id() == id)?;
        Some(self.placemarks.remove(index))
    }

    pub fn placemarks(&self) -> &[Placemark] {
        &self.placemarks
    }

    pub fn placemarks_mut(&mut self) -> &mut [Placemark] {
        &mut self.placemarks
    }
}

impl Layer for RenderableLayer {
    fn attributes(&self) -> &LayerAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut LayerAttributes {
        &mut self.attributes
    }

    fn render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        let picking = dc.is_picking();
        for placemark in &self.placemarks {
            if picking && !placemark.is_pickable() {
                continue;
            }
            let name = &self.attributes.name;
            if let Some(renderable) = placemark.make_ordered_renderable(dc, name)? {
                dc.add_ordered_renderable(Box::new(renderable));
            }
        }
        Ok(())
    }
}
