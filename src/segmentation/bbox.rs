use serde::{Deserialize, Serialize};

/// Axis-aligned letter region in bitmap coordinates.
///
/// The rectangle is half-open: it covers columns `x0..x1` and rows `y0..y1`,
/// so `width = x1 - x0` and a box produced from a single pixel at `(x, y)`
/// is `(x, y, x + 1, y + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BoundingBox {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        debug_assert!(x0 <= x1 && y0 <= y1);
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Signed width of the intersection of the two x-projections.
    /// Positive only when the boxes share at least one column.
    pub fn x_overlap(&self, other: &BoundingBox) -> i64 {
        self.x1.min(other.x1) as i64 - self.x0.max(other.x0) as i64
    }

    /// Smallest box covering both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.x0 <= other.x0 && self.y0 <= other.y0 && self.x1 >= other.x1 && self.y1 >= other.y1
    }

    /// Restrict the box to a `width` x `height` bitmap
    pub fn clamp_to(&self, width: u32, height: u32) -> BoundingBox {
        let x0 = self.x0.min(width);
        let y0 = self.y0.min(height);
        BoundingBox {
            x0,
            y0,
            x1: self.x1.min(width).max(x0),
            y1: self.y1.min(height).max(y0),
        }
    }
}
