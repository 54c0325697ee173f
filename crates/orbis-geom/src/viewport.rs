//! Viewport rectangles in window coordinates with a bottom-left origin.

/// A viewport rectangle. `(x, y)` is the bottom-left corner; y grows upward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the viewport covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    /// Whether the point lies inside the viewport rectangle (right and top edges excluded).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x as f64
            && x < self.x as f64 + self.width as f64
            && y >= self.y as f64
            && y < self.y as f64 + self.height as f64
    }

    /// Convert a top-left-origin point (y down) into this viewport's bottom-left-origin
    /// coordinates (y up).
    pub fn flip_y(&self, x: f64, y: f64) -> (f64, f64) {
        (x, self.height as f64 - y)
    }
}
