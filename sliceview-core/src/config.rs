/// Viewer settings
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

/// Most slices a single export may produce
pub const MAX_SLICES: usize = 100_000;

/// Fixed work volume dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            width: 2.0,
            height: 2.0,
            depth: 2.0,
        }
    }
}

/// Slice export parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicingSettings {
    /// Pause between slices so each one can be displayed
    pub view_slice: bool,
    /// Vertical distance between slices
    pub step: f32,
    /// Export image width in pixels
    pub width_resolution: u32,
    /// Export image height in pixels
    pub height_resolution: u32,
    /// Zero padding of the slice index in file names
    pub digits: usize,
    /// Archive file name without extension
    pub archive_name: String,
    /// Slice image file name prefix
    pub file_prefix: String,
    /// Pause length when `view_slice` is set
    pub slice_delay_ms: u64,
}

impl Default for SlicingSettings {
    fn default() -> Self {
        Self {
            view_slice: true,
            step: 0.01,
            width_resolution: 1000,
            height_resolution: 1000,
            digits: 3,
            archive_name: "slicing".into(),
            file_prefix: "slice".into(),
            slice_delay_ms: 10,
        }
    }
}

impl SlicingSettings {
    /// Check the export parameters against the height they sweep.
    pub fn validate(&self, workspace_height: f32) -> Result<()> {
        if !(self.step.is_finite() && self.step > 0.0 && self.step <= workspace_height) {
            return Err(ViewerError::InvalidSettings(format!(
                "slicing step must be in (0, {workspace_height}], got {}",
                self.step
            )));
        }
        if workspace_height / self.step > MAX_SLICES as f32 {
            return Err(ViewerError::InvalidSettings(format!(
                "slicing step {} gives more than {MAX_SLICES} slices",
                self.step
            )));
        }
        if self.width_resolution == 0 || self.height_resolution == 0 {
            return Err(ViewerError::InvalidSettings(
                "export resolution must be non-zero".into(),
            ));
        }
        if self.digits == 0 {
            return Err(ViewerError::InvalidSettings(
                "slice digits must be at least 1".into(),
            ));
        }
        if self.archive_name.is_empty() {
            return Err(ViewerError::InvalidSettings(
                "archive name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Perspective camera parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Initial orbit distance from the workspace center
    pub distance: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov: 45.0,
            near: 0.05,
            far: 1024.0,
            distance: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClippingPlaneSettings {
    pub constant: f32,
}

impl Default for ClippingPlaneSettings {
    fn default() -> Self {
        Self { constant: 0.0 }
    }
}

/// Colors used by the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub color: [u8; 3],
    /// Cut cross-section color
    pub cap_color: [u8; 3],
    pub selected_color: [u8; 3],
    pub background: [u8; 3],
    pub workspace_color: [u8; 3],
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            color: [0xff, 0xc1, 0x07],
            cap_color: [0xff, 0xff, 0xff],
            selected_color: [0x00, 0xff, 0xff],
            background: [0x00, 0x00, 0x00],
            workspace_color: [0xd3, 0xd3, 0xd3],
        }
    }
}

/// All viewer settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub workspace: WorkspaceSettings,
    pub slicing: SlicingSettings,
    pub camera: CameraSettings,
    pub clipping_plane: ClippingPlaneSettings,
    pub model: ModelSettings,
}

impl Settings {
    /// Load settings from a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let ws = &self.workspace;
        for (name, value) in [("width", ws.width), ("height", ws.height), ("depth", ws.depth)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ViewerError::InvalidSettings(format!(
                    "workspace {name} must be positive"
                )));
            }
        }

        self.slicing.validate(ws.height)?;

        let camera = &self.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(ViewerError::InvalidSettings(
                "camera planes must satisfy 0 < near < far".into(),
            ));
        }
        if !(camera.fov > 0.0 && camera.fov < 180.0) {
            return Err(ViewerError::InvalidSettings(
                "camera fov must be between 0 and 180 degrees".into(),
            ));
        }
        Ok(())
    }
}
