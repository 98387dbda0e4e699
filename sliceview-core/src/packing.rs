/// Auto-arranging model footprints on the workspace floor
use nalgebra::Point3;
use tracing::info;

use crate::registry::ModelRegistry;
use crate::selection::Selection;
use crate::workspace::Workspace;

/// Target fill used to size the initial packing strip
const TARGET_FILL: f32 = 0.95;

/// A footprint to place; `x`/`y` are filled in by [`pack_blocks`] and map to
/// world x and z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackBlock {
    pub width: f32,
    pub depth: f32,
    pub x: f32,
    pub y: f32,
}

impl PackBlock {
    pub fn new(width: f32, depth: f32) -> Self {
        Self {
            width,
            depth,
            x: 0.0,
            y: 0.0,
        }
    }

    /// Whether two placed blocks overlap with positive area
    pub fn overlaps(&self, other: &PackBlock, tolerance: f32) -> bool {
        self.x + tolerance < other.x + other.width
            && other.x + tolerance < self.x + self.width
            && self.y + tolerance < other.y + other.depth
            && other.y + tolerance < self.y + self.depth
    }
}

/// Bounding rectangle of a packed layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackLayout {
    pub width: f32,
    pub depth: f32,
    /// Total block area over `width * depth`
    pub fill: f32,
}

#[derive(Debug, Clone, Copy)]
struct Space {
    x: f32,
    y: f32,
    width: f32,
    depth: f32,
}

/// Place `blocks` without overlap inside a near-square rectangle.
///
/// Blocks are visited deepest first (stable for equal depths) and each is
/// put into the most recently created free space it fits in. The input order
/// of `blocks` is preserved; only `x` and `y` are written.
pub fn pack_blocks(blocks: &mut [PackBlock]) -> PackLayout {
    if blocks.is_empty() {
        return PackLayout {
            width: 0.0,
            depth: 0.0,
            fill: 0.0,
        };
    }

    let mut area = 0.0;
    let mut max_width: f32 = 0.0;
    for block in blocks.iter() {
        area += block.width * block.depth;
        max_width = max_width.max(block.width);
    }

    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by(|&a, &b| blocks[b].depth.total_cmp(&blocks[a].depth));

    let start_width = (area / TARGET_FILL).sqrt().max(max_width);
    let mut spaces = vec![Space {
        x: 0.0,
        y: 0.0,
        width: start_width,
        depth: f32::INFINITY,
    }];

    let mut width: f32 = 0.0;
    let mut depth: f32 = 0.0;

    for index in order {
        let block = &mut blocks[index];
        for i in (0..spaces.len()).rev() {
            let space = spaces[i];
            if block.width > space.width || block.depth > space.depth {
                continue;
            }

            block.x = space.x;
            block.y = space.y;
            depth = depth.max(block.y + block.depth);
            width = width.max(block.x + block.width);

            if block.width == space.width && block.depth == space.depth {
                // Exact fit consumes the space
                spaces.swap_remove(i);
            } else if block.depth == space.depth {
                spaces[i].x += block.width;
                spaces[i].width -= block.width;
            } else if block.width == space.width {
                spaces[i].y += block.depth;
                spaces[i].depth -= block.depth;
            } else {
                // Split into the strip right of the block and the rest below it
                spaces.push(Space {
                    x: space.x + block.width,
                    y: space.y,
                    width: space.width - block.width,
                    depth: block.depth,
                });
                spaces[i].y += block.depth;
                spaces[i].depth -= block.depth;
            }
            break;
        }
    }

    let bounding = width * depth;
    PackLayout {
        width,
        depth,
        fill: if bounding > 0.0 { area / bounding } else { 0.0 },
    }
}

/// Outcome of one packing run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackReport {
    pub layout: PackLayout,
    /// Uniform factor applied to every model
    pub scale: f32,
    pub models: usize,
}

/// Arranges every registered model on the workspace floor.
#[derive(Debug, Clone, Copy)]
pub struct PackingEngine {
    width: f32,
    depth: f32,
    floor_min: Point3<f32>,
    max_dimension: f32,
}

impl PackingEngine {
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            width: workspace.width(),
            depth: workspace.depth(),
            floor_min: workspace.floor_min(),
            max_dimension: workspace.max_dimension(),
        }
    }

    /// Shrink-only factor that fits `layout` on the floor.
    pub fn fit_scale(&self, layout: &PackLayout) -> f32 {
        if layout.width <= self.width && layout.depth <= self.depth {
            return 1.0;
        }
        (self.width / layout.width)
            .min(self.depth / layout.depth)
            .min(1.0)
    }

    /// Pack all models, rescale them together if the layout overflows the
    /// floor, and refresh the selection transform. Returns `None` when there
    /// is nothing to pack.
    pub fn pack(&self, registry: &mut ModelRegistry, selection: &mut Selection) -> Option<PackReport> {
        if registry.is_empty() {
            return None;
        }

        let mut blocks: Vec<PackBlock> = registry
            .iter()
            .map(|model| {
                let (width, depth) = model.geometry.bounds().footprint();
                PackBlock::new(width, depth)
            })
            .collect();
        let layout = pack_blocks(&mut blocks);
        let scale = self.fit_scale(&layout);

        for (model, block) in registry.iter_mut().zip(&blocks) {
            let geometry = &mut model.geometry;
            if scale != 1.0 {
                geometry.scale(scale);
            }
            geometry.move_min_to(&Point3::new(
                self.floor_min.x + block.x * scale,
                self.floor_min.y,
                self.floor_min.z + block.y * scale,
            ));
        }

        selection.refresh(registry, self.max_dimension);

        info!(
            models = blocks.len(),
            scale,
            fill = layout.fill,
            "packed models"
        );
        Some(PackReport {
            layout,
            scale,
            models: blocks.len(),
        })
    }
}
