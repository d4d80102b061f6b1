//! Closed state sets for the two overview hosts

use serde::{Deserialize, Serialize};

use super::primitives::{colors, Color};
use crate::animation::VisualState;

/// Color scheme of the hosting surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurfaceTheme {
    #[default]
    Dark,
    Light,
}

impl SurfaceTheme {
    fn overview_scrim(self) -> Color {
        match self {
            SurfaceTheme::Dark => colors::OVERVIEW_SCRIM,
            SurfaceTheme::Light => colors::LIGHT_SCRIM,
        }
    }
}

/// States of the home surface with overview embedded in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LauncherState {
    /// Home screen
    Normal,
    Overview,
    /// Overview reached by a sideways swipe, cards only
    QuickSwitch,
    /// An app is in front; overview waits behind it
    BackgroundApp,
    AllApps,
}

impl LauncherState {
    pub fn scrim_color(self, theme: SurfaceTheme) -> Color {
        match self {
            LauncherState::Overview | LauncherState::QuickSwitch | LauncherState::BackgroundApp => {
                theme.overview_scrim()
            }
            LauncherState::AllApps => colors::MODAL_SCRIM,
            LauncherState::Normal => colors::TRANSPARENT,
        }
    }

    /// Visuals for this state with the host's scrim
    pub fn visuals(self, scrim: Color) -> VisualState {
        let (overview_progress, depth) = match self {
            LauncherState::Normal => (0.0, 0.0),
            LauncherState::Overview | LauncherState::QuickSwitch => (1.0, 1.0),
            LauncherState::BackgroundApp => (0.0, 1.0),
            LauncherState::AllApps => (0.0, 0.5),
        };
        VisualState {
            scrim,
            overview_progress,
            depth,
            blur_radius: depth * 24.0,
        }
    }
}

/// States of the standalone recents surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecentsState {
    /// Task cards shown
    Default,
    /// One task focused (e.g. task menu open)
    ModalTask,
    BackgroundApp,
    /// Leaving for the other home app
    Home,
}

impl RecentsState {
    pub fn scrim_color(self, theme: SurfaceTheme) -> Color {
        match self {
            RecentsState::Default => theme.overview_scrim(),
            RecentsState::ModalTask => colors::MODAL_SCRIM,
            RecentsState::BackgroundApp | RecentsState::Home => colors::TRANSPARENT,
        }
    }

    pub fn visuals(self, scrim: Color) -> VisualState {
        let overview_progress = match self {
            RecentsState::Default | RecentsState::ModalTask => 1.0,
            RecentsState::BackgroundApp | RecentsState::Home => 0.0,
        };
        VisualState {
            scrim,
            overview_progress,
            depth: 0.0,
            blur_radius: 0.0,
        }
    }
}
