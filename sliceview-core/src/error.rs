/// Error types for the viewer core.
use thiserror::Error;

use crate::registry::ModelId;

/// Errors that can occur in viewer operations.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// The referenced model is not registered.
    #[error("unknown model: {0}")]
    UnknownModel(ModelId),

    /// Geometry has no triangles or a zero-size bounding box.
    #[error("geometry is empty or degenerate")]
    EmptyGeometry,

    /// Scale outside of (0, 1] or not finite.
    #[error("invalid scale {0}: expected a value in (0, 1]")]
    InvalidScale(f32),

    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// STL data could not be parsed.
    #[error("failed to parse STL: {0}")]
    Stl(String),

    /// Export was requested outside of slicing mode.
    #[error("export is only available in 'slicing' mode")]
    NotSlicingMode,

    /// An operation needed a selected model.
    #[error("select a model")]
    NothingSelected,

    /// Paste was requested with nothing copied.
    #[error("select and copy a model")]
    ClipboardEmpty,

    /// Interactive controls are locked while an export runs.
    #[error("controls are disabled while exporting")]
    ControlsDisabled,

    /// A second export was started while one is running.
    #[error("an export is already in progress")]
    ExportInProgress,

    /// An export step was requested with no export running.
    #[error("no export in progress")]
    NoActiveExport,

    /// There are no visible models to slice.
    #[error("nothing to slice: no visible models")]
    NothingToSlice,

    /// The export was cancelled before the last slice.
    #[error("export cancelled")]
    ExportCancelled,

    /// Slice image encoding failed.
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    /// Archive generation failed.
    #[error("archive generation failed: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Settings file could not be parsed.
    #[error("failed to parse settings: {0}")]
    Config(#[from] toml::de::Error),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for viewer operations.
pub type Result<T> = std::result::Result<T, ViewerError>;
