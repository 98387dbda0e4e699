/// Horizontal cross-sections of triangle meshes
use crate::geometry::{Geometry, Triangle};

/// A cut segment in the x-z plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: [f32; 2],
    pub end: [f32; 2],
}

/// Intersect a triangle with the plane `y = level`.
///
/// A vertex exactly on the plane counts as below it, so a closed mesh yields
/// closed loops with no duplicated or dangling segments.
pub fn intersect_triangle(triangle: &Triangle, level: f32) -> Option<Segment> {
    let vertices = &triangle.vertices;
    let above = vertices.map(|v| v.y > level);
    if above.iter().all(|&a| a) || above.iter().all(|&a| !a) {
        return None;
    }

    let mut points = [[0.0f32; 2]; 2];
    let mut count = 0;
    for i in 0..3 {
        let j = (i + 1) % 3;
        if above[i] == above[j] {
            continue;
        }
        let (a, b) = (vertices[i], vertices[j]);
        let t = (level - a.y) / (b.y - a.y);
        points[count] = [a.x + t * (b.x - a.x), a.z + t * (b.z - a.z)];
        count += 1;
    }

    // Exactly two edges cross when the vertices are split across the plane
    (count == 2).then(|| Segment {
        start: points[0],
        end: points[1],
    })
}

/// All cut segments of `geometry` at `y = level`.
pub fn slice_geometry(geometry: &Geometry, level: f32) -> Vec<Segment> {
    let bounds = geometry.bounds();
    if geometry.is_empty() || level < bounds.min.y || level >= bounds.max.y {
        return Vec::new();
    }
    geometry
        .triangles()
        .filter_map(|triangle| intersect_triangle(&triangle, level))
        .collect()
}

/// Maps the floor rectangle onto a pixel grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorGrid {
    pub min_x: f32,
    pub min_z: f32,
    pub width: f32,
    pub depth: f32,
    pub columns: u32,
    pub rows: u32,
}

impl FloorGrid {
    /// World x of a column's pixel center
    pub fn column_x(&self, column: u32) -> f32 {
        self.min_x + (column as f32 + 0.5) * self.width / self.columns as f32
    }

    /// World z of a row's pixel center
    pub fn row_z(&self, row: u32) -> f32 {
        self.min_z + (row as f32 + 0.5) * self.depth / self.rows as f32
    }

    /// Fractional column of a world x
    fn column_of(&self, x: f32) -> f32 {
        (x - self.min_x) * self.columns as f32 / self.width - 0.5
    }
}

/// Even-odd scanline fill of closed `segments`, calling `fill(column, row)`
/// for every pixel whose center lies inside.
pub fn fill_segments(segments: &[Segment], grid: &FloorGrid, mut fill: impl FnMut(u32, u32)) {
    if segments.is_empty() || grid.columns == 0 || grid.rows == 0 {
        return;
    }

    let mut crossings: Vec<f32> = Vec::new();
    for row in 0..grid.rows {
        let z = grid.row_z(row);
        crossings.clear();
        for segment in segments {
            let ([x0, z0], [x1, z1]) = (segment.start, segment.end);
            // Half-open rule so shared endpoints count once
            if (z0 <= z) != (z1 <= z) {
                let t = (z - z0) / (z1 - z0);
                crossings.push(x0 + t * (x1 - x0));
            }
        }
        crossings.sort_by(f32::total_cmp);

        for pair in crossings.chunks_exact(2) {
            let first = grid.column_of(pair[0]).ceil().max(0.0);
            let last = grid.column_of(pair[1]).floor().min(grid.columns as f32 - 1.0);
            if first > last {
                continue;
            }
            for column in first as u32..=last as u32 {
                fill(column, row);
            }
        }
    }
}
