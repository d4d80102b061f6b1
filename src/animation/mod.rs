//! Animation - visual state interpolation and the compositor handshake
//!
//! - `VisualState`: the values a surface shows for a state (scrim, depth, ...)
//! - `AnimationFactory`: per-gesture interpolation, buffers until the
//!   compositor delivers animation content
//! - `RecentsAnimationCoordinator`: owns the single active factory and the
//!   live tile

mod factory;
mod remote;

pub use factory::*;
pub use remote::*;

use crate::shell::primitives::{colors, lerp, lerp_color, Color};

/// Visual values a surface displays for a state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualState {
    pub scrim: Color,
    /// 0 = running app full screen, 1 = task cards laid out
    pub overview_progress: f64,
    /// How far the home content is pushed back (0 = not at all)
    pub depth: f64,
    pub blur_radius: f64,
}

impl Default for VisualState {
    fn default() -> Self {
        Self {
            scrim: colors::TRANSPARENT,
            overview_progress: 0.0,
            depth: 0.0,
            blur_radius: 0.0,
        }
    }
}

impl VisualState {
    pub fn interpolate(&self, to: &VisualState, t: f64) -> VisualState {
        VisualState {
            scrim: lerp_color(self.scrim, to.scrim, t),
            overview_progress: lerp(self.overview_progress, to.overview_progress, t),
            depth: lerp(self.depth, to.depth, t),
            blur_radius: lerp(self.blur_radius, to.blur_radius, t),
        }
    }
}

/// Something that renders part of a surface and follows its visual state
/// (scrim layer, depth controller, blur)
pub trait VisualEndpoint {
    fn apply(&mut self, visuals: &VisualState);
}
