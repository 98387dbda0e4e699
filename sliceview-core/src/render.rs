/// Software rasterizer producing RGBA frames
use image::{Rgba, RgbaImage};
use nalgebra::{Matrix4, Point3, Vector3};

use crate::clipping::ClippingPlane;
use crate::config::ModelSettings;
use crate::geometry::Triangle;
use crate::plane::{clipped_by_any, Plane};
use crate::projection::{Camera, ScreenPoint};
use crate::registry::{ModelId, ModelRegistry};
use crate::section::{fill_segments, slice_geometry, FloorGrid};
use crate::workspace::Workspace;

/// Ambient share of the surface shading
const AMBIENT: f32 = 0.35;

/// Overlay lines are drawn when no surface is nearer than this
const LINE_DEPTH_BIAS: f32 = 1e-4;

/// Everything one frame is rendered from
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub registry: &'a ModelRegistry,
    pub workspace: &'a Workspace,
    pub clipping: &'a ClippingPlane,
    pub selected: Option<ModelId>,
    pub colors: &'a ModelSettings,
}

/// Rasterizes scenes into an RGBA framebuffer with a depth buffer
#[derive(Debug)]
pub struct Rasterizer {
    width: u32,
    height: u32,
    depth_buffer: Vec<f32>,
    frame: RgbaImage,
}

impl Rasterizer {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; width as usize * height as usize],
            frame: RgbaImage::new(width, height),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Change the output resolution. Buffers are reallocated only when the
    /// size actually changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width.max(1), height.max(1)) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }

    pub fn clear(&mut self, background: [u8; 3]) {
        self.depth_buffer.fill(f32::INFINITY);
        let pixel = opaque(background);
        for p in self.frame.pixels_mut() {
            *p = pixel;
        }
    }

    /// The last rendered frame
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn snapshot(&self) -> RgbaImage {
        self.frame.clone()
    }

    /// Perspective view of the scene, clipped by the workspace and the
    /// clipping plane. Where the nearest surviving surface faces away from
    /// the camera the solid has been cut open, and the cap color is drawn.
    pub fn render_scene(&mut self, scene: &Scene<'_>, camera: &Camera) {
        self.clear(scene.colors.background);

        let view_projection = camera.view_projection();
        let planes = scene.clipping.all_planes(scene.workspace);
        let light = (camera.position - camera.target)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z);

        for model in scene.registry.visible_models() {
            let color = if scene.selected == Some(model.id()) {
                mix(scene.colors.color, scene.colors.selected_color)
            } else {
                scene.colors.color
            };
            let style = FaceStyle {
                color,
                cap: scene.colors.cap_color,
                light,
            };
            for triangle in model.geometry.triangles() {
                self.render_triangle(&triangle, &view_projection, &planes, &style);
            }
        }

        if scene.workspace.is_view_visible() {
            for [start, end] in scene.workspace.edges() {
                self.draw_line(&view_projection, &start, &end, scene.colors.workspace_color);
            }
        }

        if scene.clipping.is_helper_visible() {
            let outline = scene.clipping.helper_outline();
            for i in 0..outline.len() {
                let next = (i + 1) % outline.len();
                self.draw_line(
                    &view_projection,
                    &outline[i],
                    &outline[next],
                    scene.colors.cap_color,
                );
            }
        }
    }

    /// Top-down cross-section of every visible model at the clipping
    /// constant. Columns span the workspace width and rows its depth.
    pub fn render_section(&mut self, scene: &Scene<'_>) {
        self.clear(scene.colors.background);

        let workspace = scene.workspace;
        let grid = FloorGrid {
            min_x: -workspace.width() / 2.0,
            min_z: -workspace.depth() / 2.0,
            width: workspace.width(),
            depth: workspace.depth(),
            columns: self.width,
            rows: self.height,
        };
        let level = scene.clipping.constant();
        let cap = opaque(scene.colors.cap_color);

        for model in scene.registry.visible_models() {
            let segments = slice_geometry(&model.geometry, level);
            let frame = &mut self.frame;
            fill_segments(&segments, &grid, |column, row| {
                frame.put_pixel(column, row, cap);
            });
        }
    }

    fn render_triangle(
        &mut self,
        triangle: &Triangle,
        view_projection: &Matrix4<f32>,
        planes: &[Plane],
        style: &FaceStyle,
    ) {
        // Project vertices to screen space
        let [a, b, c] = triangle
            .vertices
            .map(|vertex| Camera::project_with(view_projection, &vertex, self.width, self.height));
        let (Some(a), Some(b), Some(c)) = (a, b, c) else {
            return; // Triangle is clipped
        };

        // Counter-clockwise world winding turns clockwise on a y-down screen
        let area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        if area.abs() < 1e-9 {
            return;
        }
        let pixel = if area < 0.0 {
            let brightness = AMBIENT + (1.0 - AMBIENT) * triangle.normal().dot(&style.light).max(0.0);
            opaque(shade(style.color, brightness))
        } else {
            opaque(style.cap)
        };

        self.rasterize_triangle([a, b, c], &triangle.vertices, planes, pixel);
    }

    fn rasterize_triangle(
        &mut self,
        screen: [ScreenPoint; 3],
        world: &[Point3<f32>; 3],
        planes: &[Plane],
        pixel: Rgba<u8>,
    ) {
        let [v0, v1, v2] = screen;

        // Bounding box, clipped to screen bounds
        let min_x = v0.x.min(v1.x).min(v2.x).floor().max(0.0) as i64;
        let max_x = (v0.x.max(v1.x).max(v2.x).ceil() as i64).min(self.width as i64 - 1);
        let min_y = v0.y.min(v1.y).min(v2.y).floor().max(0.0) as i64;
        let max_y = (v0.y.max(v1.y).max(v2.y).ceil() as i64).min(self.height as i64 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = (x as f32 + 0.5, y as f32 + 0.5);
                let Some((w0, w1, w2)) = barycentric((v0.x, v0.y), (v1.x, v1.y), (v2.x, v2.y), p)
                else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.depth + w1 * v1.depth + w2 * v2.depth;
                let idx = y as usize * self.width as usize + x as usize;
                if depth >= self.depth_buffer[idx] {
                    continue;
                }

                // Perspective-correct world position for per-fragment clipping
                let (p0, p1, p2) = (w0 / v0.w, w1 / v1.w, w2 / v2.w);
                let sum = p0 + p1 + p2;
                let position = Point3::from(
                    (world[0].coords * p0 + world[1].coords * p1 + world[2].coords * p2) / sum,
                );
                if clipped_by_any(planes, &position) {
                    continue;
                }

                self.depth_buffer[idx] = depth;
                self.frame.put_pixel(x as u32, y as u32, pixel);
            }
        }
    }

    /// Depth-tested line that does not write depth
    fn draw_line(
        &mut self,
        view_projection: &Matrix4<f32>,
        start: &Point3<f32>,
        end: &Point3<f32>,
        color: [u8; 3],
    ) {
        let (Some(a), Some(b)) = (
            Camera::project_with(view_projection, start, self.width, self.height),
            Camera::project_with(view_projection, end, self.width, self.height),
        ) else {
            return;
        };

        let pixel = opaque(color);
        let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = (a.x + t * (b.x - a.x)).floor();
            let y = (a.y + t * (b.y - a.y)).floor();
            if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
                continue;
            }
            let depth = a.depth + t * (b.depth - a.depth);
            let idx = y as usize * self.width as usize + x as usize;
            if depth - LINE_DEPTH_BIAS <= self.depth_buffer[idx] {
                self.frame.put_pixel(x as u32, y as u32, pixel);
            }
        }
    }
}

struct FaceStyle {
    color: [u8; 3],
    cap: [u8; 3],
    light: Vector3<f32>,
}

fn opaque([r, g, b]: [u8; 3]) -> Rgba<u8> {
    Rgba([r, g, b, 0xff])
}

fn shade(color: [u8; 3], brightness: f32) -> [u8; 3] {
    color.map(|channel| (channel as f32 * brightness).round().clamp(0.0, 255.0) as u8)
}

fn mix(a: [u8; 3], b: [u8; 3]) -> [u8; 3] {
    [0, 1, 2].map(|i| ((a[i] as u16 + b[i] as u16) / 2) as u8)
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
