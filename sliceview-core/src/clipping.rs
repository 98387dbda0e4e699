/// The movable slicing plane
use nalgebra::{Point3, Vector3};

use crate::plane::Plane;
use crate::workspace::Workspace;

/// A horizontal plane that keeps everything at or below `y = constant`.
#[derive(Debug, Clone)]
pub struct ClippingPlane {
    plane: Plane,
    helper_size: f32,
    helper_visible: bool,
}

impl ClippingPlane {
    pub fn new(constant: f32, helper_size: f32) -> Self {
        Self {
            plane: Plane::new(Vector3::new(0.0, -1.0, 0.0), constant),
            helper_size,
            helper_visible: true,
        }
    }

    /// Clipping plane sized to span the workspace
    pub fn for_workspace(workspace: &Workspace, constant: f32) -> Self {
        Self::new(constant, workspace.width().max(workspace.depth()))
    }

    pub fn constant(&self) -> f32 {
        self.plane.constant
    }

    pub fn set_constant(&mut self, constant: f32) {
        self.plane.constant = constant;
    }

    pub fn plane(&self) -> &Plane {
        &self.plane
    }

    /// Workspace planes followed by this plane. The order is stable and
    /// indexes per-plane render passes.
    pub fn all_planes(&self, workspace: &Workspace) -> Vec<Plane> {
        let mut planes = Vec::with_capacity(7);
        planes.extend_from_slice(workspace.planes());
        planes.push(self.plane);
        planes
    }

    pub fn is_helper_visible(&self) -> bool {
        self.helper_visible
    }

    pub fn show_helper(&mut self) {
        self.helper_visible = true;
    }

    pub fn hide_helper(&mut self) {
        self.helper_visible = false;
    }

    /// Corners of the square helper drawn through the plane's coplanar point
    pub fn helper_outline(&self) -> [Point3<f32>; 4] {
        let center = self.plane.coplanar_point();
        let half = self.helper_size / 2.0;
        [
            center + Vector3::new(-half, 0.0, -half),
            center + Vector3::new(half, 0.0, -half),
            center + Vector3::new(half, 0.0, half),
            center + Vector3::new(-half, 0.0, half),
        ]
    }
}
