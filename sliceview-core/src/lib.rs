/// Sliceview Core Library - Placement, packing and slicing of STL models
///
/// This library provides the engine behind the viewer: normalizing and
/// arranging meshes inside a fixed workspace, sweeping a clipping plane
/// through them, and packaging the rendered cross-sections as PNG slices.

pub mod bounds;
pub mod clipping;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod packing;
pub mod placement;
pub mod plane;
pub mod projection;
pub mod registry;
pub mod render;
pub mod section;
pub mod selection;
pub mod slicing;
pub mod state;
pub mod stl;
pub mod transform;
pub mod viewer;
pub mod workspace;

// Re-export commonly used types
pub use bounds::BoundingBox;
pub use clipping::ClippingPlane;
pub use config::Settings;
pub use error::{Result, ViewerError};
pub use export::{SliceArchive, SlicedArchive};
pub use geometry::{Geometry, Triangle};
pub use packing::{PackReport, PackingEngine};
pub use placement::PlacementEngine;
pub use plane::Plane;
pub use projection::Camera;
pub use registry::{ModelId, ModelRegistry};
pub use render::Rasterizer;
pub use selection::{Selection, SelectionTransform};
pub use slicing::{ExportState, ExportStep, SlicePlan, SlicingPipeline};
pub use state::{AppState, Mode};
pub use transform::{OrbitState, Transform};
pub use viewer::Viewer;
pub use workspace::Workspace;
