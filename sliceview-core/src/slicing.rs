/// Sweeping the clipping plane through the models and capturing slices
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::config::{SlicingSettings, MAX_SLICES};
use crate::error::{Result, ViewerError};
use crate::export::{SliceArchive, SlicedArchive};
use crate::registry::ModelRegistry;
use crate::workspace::Workspace;

/// Absorbs float noise in `height / step` so exact multiples are not lost
const STEP_EPSILON: f32 = 1e-4;

/// Clipping constants visited by one export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlicePlan {
    floor: f32,
    height: f32,
    steps: f32,
    count: usize,
}

impl SlicePlan {
    /// Slices from `floor` up to `floor + height`, `step` apart.
    pub fn new(height: f32, floor: f32, step: f32) -> Result<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(ViewerError::InvalidSettings(format!(
                "slicing step must be positive, got {step}"
            )));
        }
        if !(height.is_finite() && height > 0.0) {
            return Err(ViewerError::NothingToSlice);
        }

        let steps = height / step;
        let last = (steps + STEP_EPSILON).floor();
        if !(last.is_finite() && last < MAX_SLICES as f32) {
            return Err(ViewerError::InvalidSettings(format!(
                "slicing step {step} gives more than {MAX_SLICES} slices over {height}"
            )));
        }
        let count = (last as usize).checked_add(1).ok_or_else(|| {
            ViewerError::InvalidSettings(format!("slice count overflows for step {step}"))
        })?;
        Ok(Self {
            floor,
            height,
            steps,
            count,
        })
    }

    /// Plan covering the tallest visible model, starting at the workspace
    /// floor.
    pub fn for_models(registry: &ModelRegistry, workspace: &Workspace, step: f32) -> Result<Self> {
        let height = registry
            .visible_models()
            .map(|model| model.geometry.bounds().height())
            .fold(None, |tallest: Option<f32>, height| {
                Some(tallest.map_or(height, |tallest| tallest.max(height)))
            })
            .ok_or(ViewerError::NothingToSlice)?;
        Self::new(height, workspace.floor_y(), step)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Clipping constant of slice `index`
    pub fn constant(&self, index: usize) -> f32 {
        self.floor + (self.height / self.steps) * index as f32
    }

    pub fn constants(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.count).map(|index| self.constant(index))
    }
}

/// Export state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Exporting,
}

/// What the pipeline renders slices through
pub trait SliceTarget {
    fn set_constant(&mut self, constant: f32);
    fn capture(&mut self) -> Result<RgbaImage>;
}

/// Result of advancing an export by one step
#[derive(Debug)]
pub enum ExportStep {
    /// Slice `index` of `total` was captured
    Slice { index: usize, total: usize },
    Finished(SlicedArchive),
    Cancelled,
}

struct ExportRun {
    plan: SlicePlan,
    next: usize,
    archive: SliceArchive,
}

/// Drives slice exports one step at a time so a UI can repaint in between.
pub struct SlicingPipeline {
    settings: SlicingSettings,
    run: Option<ExportRun>,
    cancel: Arc<AtomicBool>,
}

impl SlicingPipeline {
    pub fn new(settings: SlicingSettings) -> Self {
        Self {
            settings,
            run: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn settings(&self) -> &SlicingSettings {
        &self.settings
    }

    /// Replace the export settings for a workspace of `workspace_height`.
    /// Rejected while exporting.
    pub fn configure(&mut self, settings: SlicingSettings, workspace_height: f32) -> Result<()> {
        if self.is_exporting() {
            return Err(ViewerError::ExportInProgress);
        }
        settings.validate(workspace_height)?;
        self.settings = settings;
        Ok(())
    }

    pub fn state(&self) -> ExportState {
        if self.run.is_some() {
            ExportState::Exporting
        } else {
            ExportState::Idle
        }
    }

    pub fn is_exporting(&self) -> bool {
        self.run.is_some()
    }

    /// Slices captured so far and the total, while exporting
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.run.as_ref().map(|run| (run.next, run.plan.count()))
    }

    /// Shared flag that stops the running export before its next slice.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Pacing delay between slices, if slices are meant to be watched
    pub fn slice_delay(&self) -> Option<Duration> {
        self.settings
            .view_slice
            .then(|| Duration::from_millis(self.settings.slice_delay_ms))
    }

    /// Enter the exporting state. Only one export may run at a time.
    pub fn begin(&mut self, plan: SlicePlan) -> Result<()> {
        if self.is_exporting() {
            return Err(ViewerError::ExportInProgress);
        }
        self.cancel.store(false, Ordering::SeqCst);
        info!(
            slices = plan.count(),
            height = plan.height(),
            step = self.settings.step,
            "export started"
        );
        self.run = Some(ExportRun {
            plan,
            next: 0,
            archive: SliceArchive::new(&self.settings),
        });
        Ok(())
    }

    /// Capture the next slice, or finish the archive once every slice is
    /// in. The clipping constant is reset to 0 when the export ends, and a
    /// failed capture ends the export.
    pub fn step(&mut self, target: &mut dyn SliceTarget) -> Result<ExportStep> {
        let Some(run) = self.run.as_mut() else {
            return Err(ViewerError::NoActiveExport);
        };

        if self.cancel.swap(false, Ordering::SeqCst) {
            let captured = run.next;
            self.abort(target);
            warn!(captured, "export cancelled");
            return Ok(ExportStep::Cancelled);
        }

        let total = run.plan.count();
        if run.next < total {
            let index = run.next;
            let constant = run.plan.constant(index);
            target.set_constant(constant);

            let captured = target
                .capture()
                .and_then(|image| run.archive.add_image(&image));
            if let Err(err) = captured {
                self.abort(target);
                return Err(err);
            }

            run.next += 1;
            debug!(index, total, constant, "captured slice");
            return Ok(ExportStep::Slice { index, total });
        }

        let Some(run) = self.run.take() else {
            return Err(ViewerError::NoActiveExport);
        };
        target.set_constant(0.0);
        let archive = run.archive.finish()?;
        info!(
            slices = archive.entries.len(),
            bytes = archive.bytes.len(),
            archive = %archive.file_name,
            "export finished"
        );
        Ok(ExportStep::Finished(archive))
    }

    /// Drop the running export without producing an archive.
    pub fn abort(&mut self, target: &mut dyn SliceTarget) {
        if self.run.take().is_some() {
            target.set_constant(0.0);
        }
    }

    /// Step until the export ends, sleeping `delay` after every slice.
    pub fn run_to_end(
        &mut self,
        target: &mut dyn SliceTarget,
        delay: Option<Duration>,
    ) -> Result<SlicedArchive> {
        loop {
            match self.step(target)? {
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct RecordingTarget {
        constant: f32,
        constants: Vec<f32>,
        fail_at: Option<usize>,
    }

    impl SliceTarget for RecordingTarget {
        fn set_constant(&mut self, constant: f32) {
            self.constant = constant;
            self.constants.push(constant);
        }

        fn capture(&mut self) -> Result<RgbaImage> {
            if self.fail_at == Some(self.constants.len() - 1) {
                return Err(ViewerError::Io(std::io::Error::other("capture failed")));
            }
            Ok(RgbaImage::new(2, 2))
        }
    }

    fn pipeline() -> SlicingPipeline {
        SlicingPipeline::new(SlicingSettings {
            step: 0.5,
            ..SlicingSettings::default()
        })
    }

    #[test]
    fn test_plan_count_and_constants() {
        let plan = SlicePlan::new(2.0, -1.0, 0.5).unwrap();
        assert_eq!(plan.count(), 5);
        let constants: Vec<f32> = plan.constants().collect();
        assert_eq!(constants, [-1.0, -0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_plan_partial_step() {
        let plan = SlicePlan::new(1.0, -1.0, 0.3).unwrap();
        assert_eq!(plan.count(), 4);
        assert_relative_eq!(plan.constant(3), -0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_plan_absorbs_float_noise() {
        // An exact multiple keeps its top slice
        let plan = SlicePlan::new(0.3, 0.0, 0.1).unwrap();
        assert_eq!(plan.count(), 4);
    }

    #[test]
    fn test_plan_rejects_bad_input() {
        assert!(matches!(
            SlicePlan::new(2.0, -1.0, 0.0),
            Err(ViewerError::InvalidSettings(_))
        ));
        assert!(matches!(
            SlicePlan::new(0.0, -1.0, 0.5),
            Err(ViewerError::NothingToSlice)
        ));
    }

    #[test]
    fn test_plan_rejects_runaway_counts() {
        for step in [1e-40, 1e-9] {
            assert!(matches!(
                SlicePlan::new(2.0, -1.0, step),
                Err(ViewerError::InvalidSettings(_))
            ));
        }
        let plan = SlicePlan::new(2.0, -1.0, 1.0 / 512.0).unwrap();
        assert_eq!(plan.count(), 1025);
    }

    #[test]
    fn test_configure_validates_against_workspace() {
        let mut pipeline = pipeline();
        let coarse = SlicingSettings {
            step: 3.0,
            ..SlicingSettings::default()
        };
        assert!(matches!(
            pipeline.configure(coarse.clone(), 2.0),
            Err(ViewerError::InvalidSettings(_))
        ));
        assert_eq!(pipeline.settings().step, 0.5);

        pipeline.configure(coarse, 4.0).unwrap();
        assert_eq!(pipeline.settings().step, 3.0);
    }

    #[test]
    fn test_full_export() {
        let mut pipeline = pipeline();
        let mut target = RecordingTarget::default();
        pipeline.begin(SlicePlan::new(2.0, -1.0, 0.5).unwrap()).unwrap();
        assert_eq!(pipeline.state(), ExportState::Exporting);

        let archive = pipeline.run_to_end(&mut target, None).unwrap();
        assert_eq!(archive.entries.len(), 5);
        assert_eq!(archive.entries[4], "slice004.png");
        assert_eq!(target.constants, [-1.0, -0.5, 0.0, 0.5, 1.0, 0.0]);
        assert_eq!(target.constant, 0.0);
        assert_eq!(pipeline.state(), ExportState::Idle);
    }

    #[test]
    fn test_reentrant_begin_is_rejected() {
        let mut pipeline = pipeline();
        let plan = SlicePlan::new(2.0, -1.0, 0.5).unwrap();
        pipeline.begin(plan).unwrap();
        assert!(matches!(
            pipeline.begin(plan),
            Err(ViewerError::ExportInProgress)
        ));
        assert!(matches!(
            pipeline.configure(SlicingSettings::default(), 2.0),
            Err(ViewerError::ExportInProgress)
        ));
    }

    #[test]
    fn test_step_without_export() {
        let mut pipeline = pipeline();
        assert!(matches!(
            pipeline.step(&mut RecordingTarget::default()),
            Err(ViewerError::NoActiveExport)
        ));
    }

    #[test]
    fn test_cancel_through_handle() {
        let mut pipeline = pipeline();
        let mut target = RecordingTarget::default();
        pipeline.begin(SlicePlan::new(2.0, -1.0, 0.5).unwrap()).unwrap();

        assert!(matches!(
            pipeline.step(&mut target).unwrap(),
            ExportStep::Slice { index: 0, total: 5 }
        ));
        pipeline.cancel_handle().store(true, Ordering::SeqCst);
        assert!(matches!(
            pipeline.step(&mut target).unwrap(),
            ExportStep::Cancelled
        ));
        assert!(!pipeline.is_exporting());
        assert_eq!(target.constant, 0.0);

        // The flag is cleared for the next run
        pipeline.begin(SlicePlan::new(1.0, -1.0, 0.5).unwrap()).unwrap();
        assert_eq!(pipeline.run_to_end(&mut target, None).unwrap().entries.len(), 3);
    }

    #[test]
    fn test_failed_capture_ends_export() {
        let mut pipeline = pipeline();
        let mut target = RecordingTarget {
            fail_at: Some(1),
            ..RecordingTarget::default()
        };
        pipeline.begin(SlicePlan::new(2.0, -1.0, 0.5).unwrap()).unwrap();
        assert!(pipeline.run_to_end(&mut target, None).is_err());
        assert!(!pipeline.is_exporting());
        assert_eq!(target.constant, 0.0);
    }

    #[test]
    fn test_slice_delay_follows_view_slice() {
        let mut pipeline = pipeline();
        assert_eq!(pipeline.slice_delay(), Some(Duration::from_millis(10)));
        pipeline
            .configure(SlicingSettings {
                view_slice: false,
                ..SlicingSettings::default()
            }, 2.0)
            .unwrap();
        assert_eq!(pipeline.slice_delay(), None);
    }
}
