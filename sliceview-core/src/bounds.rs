/// Axis-aligned bounding boxes
use nalgebra::{Point3, Vector3};

/// Axis-aligned extents of a set of points.
///
/// An empty box has `min = +inf` and `max = -inf`; its sizes read as zero
/// and its center as the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BoundingBox {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Build the tightest box around `points`.
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point3<f32>>,
    {
        let mut bounds = Self::empty();
        for point in points {
            bounds.expand(point);
        }
        bounds
    }

    /// Grow the box to include a point
    pub fn expand(&mut self, point: &Point3<f32>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn width(&self) -> f32 {
        (self.max.x - self.min.x).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.max.y - self.min.y).max(0.0)
    }

    pub fn depth(&self) -> f32 {
        (self.max.z - self.min.z).max(0.0)
    }

    pub fn size(&self) -> Vector3<f32> {
        Vector3::new(self.width(), self.height(), self.depth())
    }

    /// Largest of width, height and depth.
    pub fn max_dimension(&self) -> f32 {
        self.width().max(self.height()).max(self.depth())
    }

    pub fn center(&self) -> Point3<f32> {
        if self.is_empty() {
            return Point3::origin();
        }
        nalgebra::center(&self.min, &self.max)
    }

    /// Horizontal (x-z) footprint as `(width, depth)`.
    pub fn footprint(&self) -> (f32, f32) {
        (self.width(), self.depth())
    }

    /// Whether the x-z footprints of two boxes overlap with positive area.
    pub fn footprint_overlaps(&self, other: &BoundingBox, tolerance: f32) -> bool {
        self.min.x + tolerance < other.max.x
            && other.min.x + tolerance < self.max.x
            && self.min.z + tolerance < other.max.z
            && other.min.z + tolerance < self.max.z
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}
