/// Interactive application state shared by the viewer components
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::registry::ModelId;
use crate::selection::Selection;

/// What the viewer is currently for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Free placement and scaling of models
    #[default]
    View,
    /// Cross-section preview and export
    Slicing,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::View => Mode::Slicing,
            Mode::Slicing => Mode::View,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::View => write!(f, "view"),
            Mode::Slicing => write!(f, "slicing"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "view" => Ok(Mode::View),
            "slicing" => Ok(Mode::Slicing),
            other => Err(format!("unknown mode '{other}', expected 'view' or 'slicing'")),
        }
    }
}

/// Mutable state owned by the viewer and handed to components by reference
#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Settings,
    pub mode: Mode,
    pub selection: Selection,
    /// Single-slot clipboard holding a copied model
    pub clipboard: Option<ModelId>,
    /// False while an export runs
    pub controls_enabled: bool,
    /// Interactive output resolution
    pub viewport: (u32, u32),
}

impl AppState {
    pub fn new(settings: Settings, viewport: (u32, u32)) -> Self {
        Self {
            settings,
            mode: Mode::View,
            selection: Selection::new(),
            clipboard: None,
            controls_enabled: true,
            viewport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("view".parse::<Mode>().unwrap(), Mode::View);
        assert_eq!("Slicing".parse::<Mode>().unwrap(), Mode::Slicing);
        assert!("print".parse::<Mode>().is_err());
        assert_eq!(Mode::Slicing.to_string(), "slicing");
        assert_eq!(Mode::View.toggled(), Mode::Slicing);
    }

    #[test]
    fn test_mode_serde_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: Mode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"slicing\"").unwrap();
        assert_eq!(parsed.mode, Mode::Slicing);
    }

    #[test]
    fn test_new_state_is_idle() {
        let state = AppState::new(Settings::default(), (80, 24));
        assert_eq!(state.mode, Mode::View);
        assert!(state.controls_enabled);
        assert!(state.clipboard.is_none());
        assert!(!state.selection.is_editable());
    }
}
