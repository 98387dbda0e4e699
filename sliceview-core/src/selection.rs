/// Selection state and pointer picking
use nalgebra::{Point3, Vector3};

use crate::bounds::BoundingBox;
use crate::geometry::Triangle;
use crate::registry::{ModelId, ModelRegistry};

/// Live transform of the selected model as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionTransform {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Largest model dimension relative to the largest workspace dimension
    pub scale: f32,
}

impl SelectionTransform {
    pub fn from_bounds(bounds: &BoundingBox, workspace_max_dimension: f32) -> Self {
        let center = bounds.center();
        Self {
            x: center.x,
            y: center.y,
            z: center.z,
            scale: bounds.max_dimension() / workspace_max_dimension,
        }
    }
}

/// At most one selected model plus its mirrored transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    model: Option<ModelId>,
    transform: Option<SelectionTransform>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> Option<ModelId> {
        self.model
    }

    pub fn transform(&self) -> Option<SelectionTransform> {
        self.transform
    }

    /// Whether position and scale editing should be offered
    pub fn is_editable(&self) -> bool {
        self.model.is_some() && self.transform.is_some()
    }

    pub fn set(&mut self, id: ModelId, bounds: &BoundingBox, workspace_max_dimension: f32) {
        self.model = Some(id);
        self.transform = Some(SelectionTransform::from_bounds(bounds, workspace_max_dimension));
    }

    pub fn clear(&mut self) {
        self.model = None;
        self.transform = None;
    }

    /// Re-read the mirrored transform from the selected model's bounds.
    /// Clears the selection if the model is gone.
    pub fn refresh(&mut self, registry: &ModelRegistry, workspace_max_dimension: f32) {
        let Some(id) = self.model else {
            return;
        };
        match registry.get(id) {
            Some(model) => self.set(id, &model.geometry.bounds(), workspace_max_dimension),
            None => self.clear(),
        }
    }
}

/// A half-line used for pointer picking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, distance: f32) -> Point3<f32> {
        self.origin + self.direction * distance
    }

    /// Möller–Trumbore intersection, both faces. Returns the hit distance.
    pub fn intersect_triangle(&self, triangle: &Triangle) -> Option<f32> {
        const EPSILON: f32 = 1e-7;
        let [v0, v1, v2] = triangle.vertices;
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let p = self.direction.cross(&edge2);
        let det = edge1.dot(&p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let t_vec = self.origin - v0;
        let u = t_vec.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = t_vec.cross(&edge1);
        let v = self.direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let distance = edge2.dot(&q) * inv_det;
        (distance > EPSILON).then_some(distance)
    }
}

/// Nearest visible model hit by `ray`.
pub fn pick(registry: &ModelRegistry, ray: &Ray) -> Option<ModelId> {
    let mut nearest: Option<(ModelId, f32)> = None;
    for model in registry.visible_models() {
        for triangle in model.geometry.triangles() {
            if let Some(distance) = ray.intersect_triangle(&triangle) {
                if nearest.map_or(true, |(_, best)| distance < best) {
                    nearest = Some((model.id(), distance));
                }
            }
        }
    }
    nearest.map(|(id, _)| id)
}
