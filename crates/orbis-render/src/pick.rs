//! Color-coded picking: unique pick colors, the color → object registry, and
//! the objects a pick resolves to.

use std::collections::HashMap;
use std::fmt;

use orbis_geom::Position;

use crate::graphics::Color;

/// Identity of a shape drawn by a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u64);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

/// What a pick resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PickTarget {
    Terrain,
    Shape(ShapeId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PickedObject {
    color_code: u32,
    target: PickTarget,
    position: Option<Position>,
    layer_name: Option<String>,
    on_top: bool,
}

impl PickedObject {
    #[must_use]
    pub fn new(color_code: u32, target: PickTarget, position: Option<Position>) -> Self {
        Self {
            color_code,
            target,
            position,
            layer_name: None,
            on_top: false,
        }
    }

    #[must_use]
    pub fn with_layer_name(mut self, name: impl Into<String>) -> Self {
        self.layer_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn color_code(&self) -> u32 {
        self.color_code
    }

    #[must_use]
    pub fn target(&self) -> PickTarget {
        self.target
    }

    #[must_use]
    pub fn is_terrain(&self) -> bool {
        self.target == PickTarget::Terrain
    }

    /// Geographic position of the picked point, when known.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn set_position(&mut self, position: Option<Position>) {
        self.position = position;
    }

    #[must_use]
    pub fn layer_name(&self) -> Option<&str> {
        self.layer_name.as_deref()
    }

    /// Whether this object was visible at the pick point.
    #[must_use]
    pub fn is_on_top(&self) -> bool {
        self.on_top
    }

    pub fn set_on_top(&mut self, on_top: bool) {
        self.on_top = on_top;
    }
}

/// Result of a pick, in resolution order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PickedObjectList {
    objects: Vec<PickedObject>,
}

impl PickedObjectList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: PickedObject) {
        self.objects.push(object);
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PickedObject> {
        self.objects.iter()
    }

    #[must_use]
    pub fn top_picked_object(&self) -> Option<&PickedObject> {
        self.objects.iter().find(|o| o.is_on_top())
    }

    #[must_use]
    pub fn terrain_object(&self) -> Option<&PickedObject> {
        self.objects.iter().find(|o| o.is_terrain())
    }
}

impl<'a> IntoIterator for &'a PickedObjectList {
    type Item = &'a PickedObject;
    type IntoIter = std::slice::Iter<'a, PickedObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

/// Largest code representable in 24 bits of RGB.
pub const MAX_PICK_CODE: u32 = 0x00FF_FFFF;

/// Allocates pick color codes for one pick frame and maps them back to the
/// objects drawn with them. Code 0 is reserved for "nothing drawn".
#[derive(Debug)]
pub struct PickSupport {
    next_code: u32,
    objects: HashMap<u32, PickedObject>,
}

impl Default for PickSupport {
    fn default() -> Self {
        Self {
            next_code: 1,
            objects: HashMap::new(),
        }
    }
}

impl PickSupport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh opaque color code. Wraps back to 1 after 2^24 - 1 codes.
    pub fn unique_color_code(&mut self) -> u32 {
        let code = self.next_code;
        self.next_code = if code >= MAX_PICK_CODE { 1 } else { code + 1 };
        code
    }

    /// Registers the object drawn with `object.color_code()`.
    pub fn add_pickable_object(&mut self, object: PickedObject) {
        self.objects.insert(object.color_code(), object);
    }

    /// Looks up the object drawn with the color read back at the pick point.
    #[must_use]
    pub fn resolve(&self, pixel: [u8; 4]) -> Option<&PickedObject> {
        match color_to_code(pixel) {
            0 => None,
            code => self.objects.get(&code),
        }
    }

    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn clear(&mut self) {
        self.next_code = 1;
        self.objects.clear();
    }
}

/// Encodes a pick code as an opaque color, red holding the high byte.
#[must_use]
pub fn code_to_color(code: u32) -> Color {
    let [_, r, g, b] = code.to_be_bytes();
    Color::from_rgba8([r, g, b, 255])
}

/// Decodes a read-back pixel into its pick code, ignoring alpha.
#[must_use]
pub fn color_to_code(pixel: [u8; 4]) -> u32 {
    u32::from_be_bytes([0, pixel[0], pixel[1], pixel[2]])
}
