/// Fixed work volume bounded by six planes
use nalgebra::{Point3, Vector3};

use crate::config::WorkspaceSettings;
use crate::error::{Result, ViewerError};
use crate::plane::Plane;

/// An axis-aligned cuboid centered at the origin.
///
/// Its six planes keep the inside of the box, in the order -x border,
/// +x border, -y, +y, -z, +z (each pair as `x <= w/2` then `x >= -w/2`).
#[derive(Debug, Clone)]
pub struct Workspace {
    width: f32,
    height: f32,
    depth: f32,
    planes: [Plane; 6],
    view_visible: bool,
}

impl Workspace {
    pub fn new(width: f32, height: f32, depth: f32) -> Result<Self> {
        for value in [width, height, depth] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ViewerError::InvalidSettings(format!(
                    "workspace dimensions must be positive, got {width}x{height}x{depth}"
                )));
            }
        }

        let x = Vector3::new(-1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, -1.0, 0.0);
        let z = Vector3::new(0.0, 0.0, -1.0);
        let planes = [
            // Borders on the x-axis
            Plane::new(x, width / 2.0),
            Plane::new(x, -width / 2.0).negate(),
            // Borders on the y-axis
            Plane::new(y, height / 2.0),
            Plane::new(y, -height / 2.0).negate(),
            // Borders on the z-axis
            Plane::new(z, depth / 2.0),
            Plane::new(z, -depth / 2.0).negate(),
        ];

        Ok(Self {
            width,
            height,
            depth,
            planes,
            view_visible: true,
        })
    }

    pub fn from_settings(settings: &WorkspaceSettings) -> Result<Self> {
        Self::new(settings.width, settings.height, settings.depth)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn max_dimension(&self) -> f32 {
        self.width.max(self.height).max(self.depth)
    }

    /// Height of the floor plane
    pub fn floor_y(&self) -> f32 {
        -self.height / 2.0
    }

    /// Minimum corner of the floor rectangle
    pub fn floor_min(&self) -> Point3<f32> {
        Point3::new(-self.width / 2.0, self.floor_y(), -self.depth / 2.0)
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    pub fn contains(&self, point: &Point3<f32>) -> bool {
        self.planes.iter().all(|plane| !plane.clips(point))
    }

    pub fn is_view_visible(&self) -> bool {
        self.view_visible
    }

    pub fn show_view(&mut self) {
        self.view_visible = true;
    }

    pub fn hide_view(&mut self) {
        self.view_visible = false;
    }

    /// The twelve wireframe edges of the cuboid
    pub fn edges(&self) -> [[Point3<f32>; 2]; 12] {
        let (hx, hy, hz) = (self.width / 2.0, self.height / 2.0, self.depth / 2.0);
        let c = |x: f32, y: f32, z: f32| Point3::new(x * hx, y * hy, z * hz);
        [
            // Floor
            [c(-1.0, -1.0, -1.0), c(1.0, -1.0, -1.0)],
            [c(1.0, -1.0, -1.0), c(1.0, -1.0, 1.0)],
            [c(1.0, -1.0, 1.0), c(-1.0, -1.0, 1.0)],
            [c(-1.0, -1.0, 1.0), c(-1.0, -1.0, -1.0)],
            // Ceiling
            [c(-1.0, 1.0, -1.0), c(1.0, 1.0, -1.0)],
            [c(1.0, 1.0, -1.0), c(1.0, 1.0, 1.0)],
            [c(1.0, 1.0, 1.0), c(-1.0, 1.0, 1.0)],
            [c(-1.0, 1.0, 1.0), c(-1.0, 1.0, -1.0)],
            // Pillars
            [c(-1.0, -1.0, -1.0), c(-1.0, 1.0, -1.0)],
            [c(1.0, -1.0, -1.0), c(1.0, 1.0, -1.0)],
            [c(1.0, -1.0, 1.0), c(1.0, 1.0, 1.0)],
            [c(-1.0, -1.0, 1.0), c(-1.0, 1.0, 1.0)],
        ]
    }
}
