/// Top-level controller wiring the engines to one interactive scene
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use image::RgbaImage;
use nalgebra::Point3;
use tracing::{debug, info};

use crate::clipping::ClippingPlane;
use crate::config::{ModelSettings, Settings, SlicingSettings};
use crate::error::{Result, ViewerError};
use crate::export::SlicedArchive;
use crate::geometry::Geometry;
use crate::packing::{PackReport, PackingEngine};
use crate::placement::PlacementEngine;
use crate::projection::Camera;
use crate::registry::{ModelId, ModelRegistry};
use crate::render::{Rasterizer, Scene};
use crate::selection::{pick, Selection};
use crate::slicing::{ExportStep, SlicePlan, SliceTarget, SlicingPipeline};
use crate::state::{AppState, Mode};
use crate::stl::parse_stl;
use crate::transform::OrbitState;
use crate::workspace::Workspace;

/// Owns the scene and exposes the entry points UI glue calls into.
pub struct Viewer {
    state: AppState,
    workspace: Workspace,
    clipping: ClippingPlane,
    registry: ModelRegistry,
    placement: PlacementEngine,
    packing: PackingEngine,
    slicing: SlicingPipeline,
    rasterizer: Rasterizer,
    camera: Camera,
    orbit: OrbitState,
}

impl Viewer {
    /// Build a viewer rendering at `viewport` (width, height) pixels.
    pub fn new(settings: Settings, viewport: (u32, u32)) -> Result<Self> {
        settings.validate()?;

        let workspace = Workspace::from_settings(&settings.workspace)?;
        let clipping = ClippingPlane::for_workspace(&workspace, settings.clipping_plane.constant);
        let mut camera = Camera::from_settings(&settings.camera, viewport.0, viewport.1);
        let orbit = OrbitState {
            distance: settings.camera.distance,
            ..OrbitState::default()
        };
        camera.orbit(&orbit);

        Ok(Self {
            placement: PlacementEngine::new(&workspace),
            packing: PackingEngine::new(&workspace),
            slicing: SlicingPipeline::new(settings.slicing.clone()),
            rasterizer: Rasterizer::new(viewport.0, viewport.1),
            state: AppState::new(settings, viewport),
            workspace,
            clipping,
            registry: ModelRegistry::new(),
            camera,
            orbit,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn selection(&self) -> &Selection {
        &self.state.selection
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn clipping(&self) -> &ClippingPlane {
        &self.clipping
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn orbit(&self) -> &OrbitState {
        &self.orbit
    }

    pub fn model_ids(&self) -> Vec<ModelId> {
        self.registry.ids()
    }

    /// Changes whenever models are added, so selectors can be rebuilt
    pub fn revision(&self) -> u64 {
        self.registry.revision()
    }

    pub fn controls_enabled(&self) -> bool {
        self.state.controls_enabled
    }

    fn ensure_controls(&self) -> Result<()> {
        if self.state.controls_enabled {
            Ok(())
        } else {
            Err(ViewerError::ControlsDisabled)
        }
    }

    fn refresh_selection(&mut self) {
        self.state
            .selection
            .refresh(&self.registry, self.workspace.max_dimension());
    }

    /// Normalize a copy of `raw` into the workspace and register it.
    pub fn add_geometry(&mut self, raw: &Geometry) -> Result<ModelId> {
        self.ensure_controls()?;
        self.placement.add_geometry(&mut self.registry, raw)
    }

    /// Parse STL data, add it and re-pack every model.
    pub fn upload_stl(&mut self, data: &[u8]) -> Result<ModelId> {
        self.ensure_controls()?;
        let geometry = parse_stl(data)?;
        let id = self.add_geometry(&geometry)?;
        self.pack()?;
        Ok(id)
    }

    /// Select a model, or clear the selection with `None`.
    pub fn select(&mut self, id: Option<ModelId>) -> Result<()> {
        self.ensure_controls()?;
        match id {
            Some(id) => {
                let bounds = self.registry.geometry(id)?.bounds();
                self.state
                    .selection
                    .set(id, &bounds, self.workspace.max_dimension());
                debug!(%id, "selected model");
            }
            None => {
                self.state.selection.clear();
                debug!("cleared selection");
            }
        }
        Ok(())
    }

    /// Select the nearest visible model under normalized device
    /// coordinates. A miss leaves the selection unchanged.
    pub fn pick(&mut self, ndc_x: f32, ndc_y: f32) -> Result<Option<ModelId>> {
        self.ensure_controls()?;
        let Some(ray) = self.camera.ray_from_ndc(ndc_x, ndc_y) else {
            return Ok(None);
        };
        let hit = pick(&self.registry, &ray);
        if hit.is_some() {
            self.select(hit)?;
        }
        Ok(hit)
    }

    pub fn set_scale(&mut self, id: ModelId, scale: f32) -> Result<()> {
        self.ensure_controls()?;
        self.placement.set_scale(&mut self.registry, id, scale)?;
        self.refresh_selection();
        Ok(())
    }

    pub fn set_position(&mut self, id: ModelId, x: f32, y: f32, z: f32) -> Result<()> {
        self.ensure_controls()?;
        self.placement
            .set_position(&mut self.registry, id, Point3::new(x, y, z))?;
        self.refresh_selection();
        Ok(())
    }

    pub fn set_model_visible(&mut self, id: ModelId, visible: bool) -> Result<()> {
        self.ensure_controls()?;
        self.registry.set_model_visible(id, visible)
    }

    /// Show or hide the whole model group. Hidden models are neither
    /// drawn, picked nor sliced.
    pub fn set_models_visible(&mut self, visible: bool) -> Result<()> {
        self.ensure_controls()?;
        self.registry.set_visible(visible);
        debug!(visible, "model group visibility changed");
        Ok(())
    }

    pub fn models_visible(&self) -> bool {
        self.registry.is_group_visible()
    }

    /// Arrange every model on the floor. `None` when there are no models.
    pub fn pack(&mut self) -> Result<Option<PackReport>> {
        self.ensure_controls()?;
        Ok(self
            .packing
            .pack(&mut self.registry, &mut self.state.selection))
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.ensure_controls()?;
        match mode {
            Mode::View => {
                self.workspace.show_view();
                self.clipping.show_helper();
            }
            Mode::Slicing => {
                self.workspace.hide_view();
                self.clipping.hide_helper();
            }
        }
        if mode != self.state.mode {
            info!(%mode, "mode changed");
        }
        self.state.mode = mode;
        Ok(())
    }

    pub fn set_clipping_constant(&mut self, constant: f32) -> Result<()> {
        self.ensure_controls()?;
        if !constant.is_finite() {
            return Err(ViewerError::InvalidSettings(format!(
                "clipping constant must be finite, got {constant}"
            )));
        }
        self.clipping.set_constant(constant);
        Ok(())
    }

    /// Replace the slicing settings used by the next export.
    pub fn configure_slicing(&mut self, settings: SlicingSettings) -> Result<()> {
        self.ensure_controls()?;
        self.slicing
            .configure(settings.clone(), self.workspace.height())?;
        self.state.settings.slicing = settings;
        Ok(())
    }

    /// Put the selected model on the clipboard.
    pub fn copy(&mut self) -> Result<ModelId> {
        let id = self
            .state
            .selection
            .model()
            .ok_or(ViewerError::NothingSelected)?;
        self.state.clipboard = Some(id);
        debug!(%id, "copied model");
        Ok(id)
    }

    /// Add a copy of the clipboard model and re-pack.
    pub fn paste(&mut self) -> Result<ModelId> {
        self.ensure_controls()?;
        let source = self.state.clipboard.ok_or(ViewerError::ClipboardEmpty)?;
        let geometry = self.registry.geometry(source)?.clone();
        let id = self.add_geometry(&geometry)?;
        self.pack()?;
        info!(%source, %id, "pasted model");
        Ok(id)
    }

    pub fn orbit_by(&mut self, dyaw: f32, dpitch: f32) -> Result<()> {
        self.ensure_controls()?;
        self.orbit.rotate(dyaw, dpitch);
        self.camera.orbit(&self.orbit);
        Ok(())
    }

    pub fn zoom(&mut self, factor: f32) -> Result<()> {
        self.ensure_controls()?;
        self.orbit.zoom(factor);
        self.camera.orbit(&self.orbit);
        Ok(())
    }

    /// Change the interactive resolution. During an export the new size
    /// takes effect once the export ends.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.state.viewport = (width, height);
        if !self.slicing.is_exporting() {
            self.apply_resolution(width, height);
        }
    }

    fn apply_resolution(&mut self, width: u32, height: u32) {
        self.rasterizer.resize(width, height);
        self.camera.set_viewport(width, height);
    }

    /// Render one frame for the current mode and return it.
    pub fn render_frame(&mut self) -> &RgbaImage {
        let scene = Scene {
            registry: &self.registry,
            workspace: &self.workspace,
            clipping: &self.clipping,
            selected: self.state.selection.model(),
            colors: &self.state.settings.model,
        };
        match self.state.mode {
            Mode::View => self.rasterizer.render_scene(&scene, &self.camera),
            Mode::Slicing => self.rasterizer.render_section(&scene),
        }
        self.rasterizer.frame()
    }

    /// The last rendered frame
    pub fn frame(&self) -> &RgbaImage {
        self.rasterizer.frame()
    }

    pub fn is_exporting(&self) -> bool {
        self.slicing.is_exporting()
    }

    /// Slices captured so far and the total, while exporting
    pub fn export_progress(&self) -> Option<(usize, usize)> {
        self.slicing.progress()
    }

    /// Shared flag that stops a running export before its next slice.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.slicing.cancel_handle()
    }

    pub fn cancel_export(&self) {
        self.slicing.cancel();
    }

    /// Start a slice export. Locks the controls and switches to the export
    /// resolution. Returns the number of slices.
    pub fn begin_export(&mut self) -> Result<usize> {
        if self.slicing.is_exporting() {
            return Err(ViewerError::ExportInProgress);
        }
        if self.state.mode != Mode::Slicing {
            return Err(ViewerError::NotSlicingMode);
        }
        self.ensure_controls()?;

        let settings = self.slicing.settings();
        let (width, height) = (settings.width_resolution, settings.height_resolution);
        let plan = SlicePlan::for_models(&self.registry, &self.workspace, settings.step)?;
        self.slicing.begin(plan)?;

        self.state.controls_enabled = false;
        self.apply_resolution(width, height);
        Ok(plan.count())
    }

    /// Capture the next slice. When the export ends, by finishing, being
    /// cancelled or failing, controls and resolution are restored.
    pub fn advance_export(&mut self) -> Result<ExportStep> {
        let mut target = SectionCapture {
            rasterizer: &mut self.rasterizer,
            clipping: &mut self.clipping,
            registry: &self.registry,
            workspace: &self.workspace,
            colors: &self.state.settings.model,
        };
        let step = self.slicing.step(&mut target);

        if !self.slicing.is_exporting() && !self.state.controls_enabled {
            let (width, height) = self.state.viewport;
            self.apply_resolution(width, height);
            self.state.controls_enabled = true;
        }
        step
    }

    /// Run a whole export, pausing between slices when `view_slice` is set.
    pub fn save_images(&mut self) -> Result<SlicedArchive> {
        self.begin_export()?;
        let delay = self.slicing.slice_delay();
        loop {
            match self.advance_export()? {
                ExportStep::Slice { .. } => {
                    if let Some(delay) = delay {
                        std::thread::sleep(delay);
                    }
                }
                ExportStep::Finished(archive) => return Ok(archive),
                ExportStep::Cancelled => return Err(ViewerError::ExportCancelled),
            }
        }
    }
}

/// Renders cross-sections of the viewer's scene for the slicing pipeline
struct SectionCapture<'a> {
    rasterizer: &'a mut Rasterizer,
    clipping: &'a mut ClippingPlane,
    registry: &'a ModelRegistry,
    workspace: &'a Workspace,
    colors: &'a ModelSettings,
}

impl SliceTarget for SectionCapture<'_> {
    fn set_constant(&mut self, constant: f32) {
        self.clipping.set_constant(constant);
    }

    fn capture(&mut self) -> Result<RgbaImage> {
        let scene = Scene {
            registry: self.registry,
            workspace: self.workspace,
            clipping: &*self.clipping,
            selected: None,
            colors: self.colors,
        };
        self.rasterizer.render_section(&scene);
        Ok(self.rasterizer.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer() -> Viewer {
        let mut settings = Settings::default();
        settings.slicing.step = 0.5;
        settings.slicing.view_slice = false;
        settings.slicing.width_resolution = 16;
        settings.slicing.height_resolution = 16;
        Viewer::new(settings, (40, 30)).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let mut settings = Settings::default();
        settings.workspace.height = -1.0;
        assert!(Viewer::new(settings, (10, 10)).is_err());
    }

    #[test]
    fn test_select_unknown_model() {
        let mut viewer = viewer();
        let id = viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        let mut other = self::viewer();
        assert!(matches!(
            other.select(Some(id)),
            Err(ViewerError::UnknownModel(_))
        ));
        assert!(other.selection().model().is_none());
    }

    #[test]
    fn test_scale_refreshes_selection() {
        let mut viewer = viewer();
        let id = viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        viewer.select(Some(id)).unwrap();
        assert_eq!(viewer.selection().transform().unwrap().scale, 1.0);

        viewer.set_scale(id, 0.5).unwrap();
        let transform = viewer.selection().transform().unwrap();
        assert!((transform.scale - 0.5).abs() < 1e-5);

        viewer.set_position(id, 0.25, -0.5, 0.0).unwrap();
        assert!((viewer.selection().transform().unwrap().x - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_mode_toggles_visuals() {
        let mut viewer = viewer();
        viewer.set_mode(Mode::Slicing).unwrap();
        assert!(!viewer.workspace().is_view_visible());
        assert!(!viewer.clipping().is_helper_visible());
        viewer.set_mode(Mode::View).unwrap();
        assert!(viewer.workspace().is_view_visible());
        assert!(viewer.clipping().is_helper_visible());
    }

    #[test]
    fn test_copy_paste() {
        let mut viewer = viewer();
        assert!(matches!(viewer.copy(), Err(ViewerError::NothingSelected)));
        assert!(matches!(viewer.paste(), Err(ViewerError::ClipboardEmpty)));

        let id = viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        viewer.select(Some(id)).unwrap();
        viewer.copy().unwrap();
        let pasted = viewer.paste().unwrap();

        assert_ne!(pasted, id);
        assert_eq!(viewer.registry().len(), 2);
        assert_eq!(viewer.revision(), 2);
    }

    #[test]
    fn test_pick_selects_model() {
        let mut viewer = viewer();
        let id = viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        assert_eq!(viewer.pick(0.0, 0.0).unwrap(), Some(id));
        assert_eq!(viewer.selection().model(), Some(id));

        // A miss keeps the selection
        assert_eq!(viewer.pick(0.99, 0.99).unwrap(), None);
        assert_eq!(viewer.selection().model(), Some(id));
    }

    #[test]
    fn test_export_requires_slicing_mode() {
        let mut viewer = viewer();
        viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        assert!(matches!(
            viewer.save_images(),
            Err(ViewerError::NotSlicingMode)
        ));
        assert!(viewer.controls_enabled());
    }

    #[test]
    fn test_export_locks_and_restores_controls() {
        let mut viewer = viewer();
        viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        viewer.set_mode(Mode::Slicing).unwrap();
        viewer.set_clipping_constant(0.3).unwrap();

        assert_eq!(viewer.begin_export().unwrap(), 5);
        assert!(!viewer.controls_enabled());
        assert_eq!(viewer.frame().dimensions(), (16, 16));
        assert!(matches!(viewer.pack(), Err(ViewerError::ControlsDisabled)));
        assert!(matches!(
            viewer.begin_export(),
            Err(ViewerError::ExportInProgress)
        ));

        viewer.resize(50, 20);
        while let ExportStep::Slice { .. } = viewer.advance_export().unwrap() {}

        assert!(viewer.controls_enabled());
        assert_eq!(viewer.clipping().constant(), 0.0);
        assert_eq!(viewer.frame().dimensions(), (50, 20));
    }

    #[test]
    fn test_export_with_no_models() {
        let mut viewer = viewer();
        viewer.set_mode(Mode::Slicing).unwrap();
        assert!(matches!(
            viewer.save_images(),
            Err(ViewerError::NothingToSlice)
        ));
        assert!(viewer.controls_enabled());
        assert!(!viewer.is_exporting());
    }

    #[test]
    fn test_configure_slicing_changes_next_export() {
        let mut viewer = viewer();
        viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        viewer.set_mode(Mode::Slicing).unwrap();

        let coarse = SlicingSettings {
            step: 1.0,
            ..viewer.settings().slicing.clone()
        };
        viewer.configure_slicing(coarse).unwrap();
        assert_eq!(viewer.settings().slicing.step, 1.0);
        assert_eq!(viewer.save_images().unwrap().entries.len(), 3);
    }

    #[test]
    fn test_configure_slicing_locked_during_export() {
        let mut viewer = viewer();
        viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        viewer.set_mode(Mode::Slicing).unwrap();
        assert_eq!(viewer.begin_export().unwrap(), 5);

        let before = viewer.settings().slicing.clone();
        let coarse = SlicingSettings {
            step: 1.0,
            ..before.clone()
        };
        assert!(matches!(
            viewer.configure_slicing(coarse),
            Err(ViewerError::ControlsDisabled)
        ));
        assert_eq!(viewer.settings().slicing, before);

        let mut slices = 0;
        while let ExportStep::Slice { .. } = viewer.advance_export().unwrap() {
            slices += 1;
        }
        assert_eq!(slices, 5);
    }

    #[test]
    fn test_configure_slicing_rejects_step_above_workspace() {
        let mut viewer = viewer();
        let before = viewer.settings().slicing.clone();
        let result = viewer.configure_slicing(SlicingSettings {
            step: 5.0,
            ..before.clone()
        });
        assert!(matches!(result, Err(ViewerError::InvalidSettings(_))));
        assert_eq!(viewer.settings().slicing, before);
    }

    #[test]
    fn test_hidden_model_group() {
        let mut viewer = viewer();
        viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        viewer.set_models_visible(false).unwrap();
        assert!(!viewer.models_visible());

        // Only the workspace overlays remain
        let hidden = viewer.render_frame().clone();
        assert_eq!(self::viewer().render_frame(), &hidden);
        assert_eq!(viewer.pick(0.0, 0.0).unwrap(), None);

        viewer.set_mode(Mode::Slicing).unwrap();
        assert!(matches!(
            viewer.save_images(),
            Err(ViewerError::NothingToSlice)
        ));

        viewer.set_models_visible(true).unwrap();
        assert_eq!(viewer.save_images().unwrap().entries.len(), 5);
    }

    #[test]
    fn test_render_frame_uses_viewport() {
        let mut viewer = viewer();
        viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        let frame = viewer.render_frame();
        assert_eq!(frame.dimensions(), (40, 30));
        let background = [0, 0, 0, 255];
        assert!(frame.pixels().any(|p| p.0 != background));
    }
}
