/// Mesh geometry with always-fresh bounds
use nalgebra::{Matrix4, Point3, Vector3};

use crate::bounds::BoundingBox;
use crate::transform::Transform;

/// A triangle face defined by three positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [Point3<f32>; 3],
}

impl Triangle {
    pub fn new(v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Calculate the face normal from the triangle's winding
    pub fn normal(&self) -> Vector3<f32> {
        let [v0, v1, v2] = self.vertices;

        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let normal = edge1.cross(&edge2);
        let length = normal.norm();
        if length > f32::EPSILON {
            normal / length
        } else {
            Vector3::zeros()
        }
    }
}

/// A non-indexed triangle soup: every three positions form one triangle.
///
/// Positions are only reachable through the mutation methods below, each of
/// which refreshes the cached bounding box before returning, so
/// [`Geometry::bounds`] is never stale.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    positions: Vec<Point3<f32>>,
    bounds: BoundingBox,
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(triangles: usize) -> Self {
        Self {
            positions: Vec::with_capacity(triangles * 3),
            bounds: BoundingBox::empty(),
        }
    }

    /// Build from a flat position list. Trailing positions that do not form
    /// a full triangle are dropped.
    pub fn from_positions(mut positions: Vec<Point3<f32>>) -> Self {
        positions.truncate(positions.len() - positions.len() % 3);
        let bounds = BoundingBox::from_points(&positions);
        Self { positions, bounds }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        for vertex in &triangle.vertices {
            self.bounds.expand(vertex);
        }
        self.positions.extend_from_slice(&triangle.vertices);
    }

    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.positions
            .chunks_exact(3)
            .map(|chunk| Triangle::new(chunk[0], chunk[1], chunk[2]))
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Current bounding box.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Transform every position by `matrix`.
    pub fn apply_matrix(&mut self, matrix: &Matrix4<f32>) {
        for position in &mut self.positions {
            *position = matrix.transform_point(position);
        }
        self.refresh_bounds();
    }

    /// Uniform scale about the origin.
    pub fn scale(&mut self, factor: f32) {
        for position in &mut self.positions {
            position.coords *= factor;
        }
        self.refresh_bounds();
    }

    /// Uniform scale about an arbitrary pivot.
    pub fn scale_about(&mut self, pivot: &Point3<f32>, factor: f32) {
        self.apply_matrix(&Transform::uniform_scale_about(pivot, factor));
    }

    pub fn translate(&mut self, offset: &Vector3<f32>) {
        for position in &mut self.positions {
            *position += *offset;
        }
        self.refresh_bounds();
    }

    /// Translate so the bounding box minimum corner lands on `target`.
    ///
    /// Each coordinate is rebased as `(p - min) + target`, so the minimum
    /// corner of the result equals `target` exactly.
    pub fn move_min_to(&mut self, target: &Point3<f32>) {
        if self.is_empty() {
            return;
        }
        let min = self.bounds.min;
        for position in &mut self.positions {
            *position = Point3::new(
                (position.x - min.x) + target.x,
                (position.y - min.y) + target.y,
                (position.z - min.z) + target.z,
            );
        }
        self.refresh_bounds();
    }

    /// Translate so the bounding box center lands on `target`.
    pub fn move_center_to(&mut self, target: &Point3<f32>) {
        if self.is_empty() {
            return;
        }
        let offset = *target - self.bounds.center();
        self.translate(&offset);
    }

    fn refresh_bounds(&mut self) {
        self.bounds = BoundingBox::from_points(&self.positions);
    }

    /// Create an axis-aligned cube mesh centered at the origin
    pub fn cube(size: f32) -> Self {
        Self::cuboid(size, size, size)
    }

    /// Create an axis-aligned box mesh centered at the origin, wound
    /// counter-clockwise when viewed from outside.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let (hx, hy, hz) = (width / 2.0, height / 2.0, depth / 2.0);
        let p = |x: f32, y: f32, z: f32| Point3::new(x * hx, y * hy, z * hz);
        let mut mesh = Self::with_capacity(12);

        // Each face as a quad (a, b, c, d), split into (a, b, c) and (a, c, d)
        let faces = [
            // Front
            [p(-1.0, -1.0, 1.0), p(1.0, -1.0, 1.0), p(1.0, 1.0, 1.0), p(-1.0, 1.0, 1.0)],
            // Back
            [p(1.0, -1.0, -1.0), p(-1.0, -1.0, -1.0), p(-1.0, 1.0, -1.0), p(1.0, 1.0, -1.0)],
            // Top
            [p(-1.0, 1.0, 1.0), p(1.0, 1.0, 1.0), p(1.0, 1.0, -1.0), p(-1.0, 1.0, -1.0)],
            // Bottom
            [p(-1.0, -1.0, -1.0), p(1.0, -1.0, -1.0), p(1.0, -1.0, 1.0), p(-1.0, -1.0, 1.0)],
            // Right
            [p(1.0, -1.0, 1.0), p(1.0, -1.0, -1.0), p(1.0, 1.0, -1.0), p(1.0, 1.0, 1.0)],
            // Left
            [p(-1.0, -1.0, -1.0), p(-1.0, -1.0, 1.0), p(-1.0, 1.0, 1.0), p(-1.0, 1.0, -1.0)],
        ];

        for [a, b, c, d] in faces {
            mesh.add_triangle(Triangle::new(a, b, c));
            mesh.add_triangle(Triangle::new(a, c, d));
        }

        mesh
    }
}
