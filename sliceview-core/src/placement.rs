/// Normalizing and editing model placement inside the workspace
use nalgebra::Point3;
use tracing::{debug, info};

use crate::error::{Result, ViewerError};
use crate::geometry::Geometry;
use crate::registry::{ModelId, ModelRegistry};
use crate::workspace::Workspace;

/// Scale factors this close to 1 leave the geometry untouched
const SCALE_EPSILON: f32 = 1e-6;

/// Places geometries relative to a fixed workspace.
#[derive(Debug, Clone, Copy)]
pub struct PlacementEngine {
    width: f32,
    height: f32,
    depth: f32,
}

impl PlacementEngine {
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            width: workspace.width(),
            height: workspace.height(),
            depth: workspace.depth(),
        }
    }

    fn max_dimension(&self) -> f32 {
        self.width.max(self.height).max(self.depth)
    }

    fn floor_y(&self) -> f32 {
        -self.height / 2.0
    }

    /// Scale so the largest dimension equals the workspace height, then
    /// center on x = 0, z = 0 and drop onto the floor.
    pub fn normalize(&self, mut geometry: Geometry) -> Result<Geometry> {
        let max_dimension = geometry.bounds().max_dimension();
        if geometry.is_empty() || !(max_dimension.is_finite() && max_dimension > 0.0) {
            return Err(ViewerError::EmptyGeometry);
        }

        geometry.scale(self.height / max_dimension);

        let bounds = geometry.bounds();
        geometry.move_min_to(&Point3::new(
            -bounds.width() / 2.0,
            self.floor_y(),
            -bounds.depth() / 2.0,
        ));
        Ok(geometry)
    }

    /// Normalize a copy of `raw` and register it. The caller's geometry is
    /// never modified and nothing is registered on failure.
    pub fn add_geometry(&self, registry: &mut ModelRegistry, raw: &Geometry) -> Result<ModelId> {
        let geometry = self.normalize(raw.clone())?;
        let triangles = geometry.triangle_count();
        let id = registry.insert(geometry);
        info!(%id, triangles, "added model");
        Ok(id)
    }

    /// Rescale so the largest dimension equals `scale` times the largest
    /// workspace dimension. The bottom center of the model stays put.
    pub fn set_scale(&self, registry: &mut ModelRegistry, id: ModelId, scale: f32) -> Result<()> {
        if !(scale.is_finite() && scale > 0.0 && scale <= 1.0) {
            return Err(ViewerError::InvalidScale(scale));
        }
        let max_dimension = self.max_dimension();
        let geometry = registry.geometry_mut(id)?;

        let bounds = geometry.bounds();
        let current = bounds.max_dimension();
        if current <= 0.0 {
            return Err(ViewerError::EmptyGeometry);
        }

        let factor = scale * max_dimension / current;
        if (factor - 1.0).abs() <= SCALE_EPSILON {
            return Ok(());
        }

        let center = bounds.center();
        let pivot = Point3::new(center.x, bounds.min.y, center.z);
        geometry.scale_about(&pivot, factor);
        debug!(%id, scale, factor, "rescaled model");
        Ok(())
    }

    /// Move the bounding box center of a model to `target`.
    pub fn set_position(
        &self,
        registry: &mut ModelRegistry,
        id: ModelId,
        target: Point3<f32>,
    ) -> Result<()> {
        if !(target.x.is_finite() && target.y.is_finite() && target.z.is_finite()) {
            return Err(ViewerError::InvalidSettings(format!(
                "position must be finite, got {target}"
            )));
        }
        let geometry = registry.geometry_mut(id)?;
        geometry.move_center_to(&target);
        debug!(%id, x = target.x, y = target.y, z = target.z, "moved model");
        Ok(())
    }
}
