//! Gesture device state - navigation mode, rotation and touch regions
//!
//! Single source of truth for "what kind of swipe is possible and where".
//! Everything here answers with a bool or an enum; bad input is rejected
//! quietly instead of producing errors.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smithay::utils::{Logical, Point, Rectangle, Size, Transform};

use super::touch::Edge;
use crate::config::GestureConfig;

/// System navigation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationMode {
    ThreeButton,
    TwoButton,
    /// Fully gestural, no buttons
    NoButton,
}

impl NavigationMode {
    fn to_raw(self) -> u8 {
        match self {
            NavigationMode::ThreeButton => 0,
            NavigationMode::TwoButton => 1,
            NavigationMode::NoButton => 2,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => NavigationMode::ThreeButton,
            1 => NavigationMode::TwoButton,
            _ => NavigationMode::NoButton,
        }
    }

    pub fn has_gestures(&self) -> bool {
        *self != NavigationMode::ThreeButton
    }
}

/// Latest-value navigation mode, pushed by the host from any thread
#[derive(Debug, Clone)]
pub struct NavModeSignal(Arc<AtomicU8>);

impl NavModeSignal {
    pub fn new(mode: NavigationMode) -> Self {
        Self(Arc::new(AtomicU8::new(mode.to_raw())))
    }

    pub fn set(&self, mode: NavigationMode) {
        self.0.store(mode.to_raw(), Ordering::Release);
    }

    pub fn get(&self) -> NavigationMode {
        NavigationMode::from_raw(self.0.load(Ordering::Acquire))
    }
}

/// Display rotation, counter-clockwise from the natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rotation {
    #[default]
    Natural,
    Rotated90,
    Rotated180,
    Rotated270,
}

impl Rotation {
    pub fn to_transform(self) -> Transform {
        match self {
            Rotation::Natural => Transform::Normal,
            Rotation::Rotated90 => Transform::_90,
            Rotation::Rotated180 => Transform::_180,
            Rotation::Rotated270 => Transform::_270,
        }
    }

    pub fn is_landscape(self) -> bool {
        matches!(self, Rotation::Rotated90 | Rotation::Rotated270)
    }

    /// Landscape with the natural bottom on the left
    pub fn is_seascape(self) -> bool {
        self == Rotation::Rotated270
    }
}

/// Device state consulted by gesture classification and layout
#[derive(Debug)]
pub struct GestureDeviceState {
    config: GestureConfig,
    /// Screen size in the natural orientation
    natural_size: Size<i32, Logical>,
    nav_mode: NavModeSignal,
    display_rotation: Rotation,
    /// Rotation the UI renders in; sticks while rotation is locked
    active_rotation: Rotation,
    rotation_locked: bool,
    /// Regions apps asked to keep free of system gestures
    excluded_regions: Vec<Rectangle<f64, Logical>>,
    keyboard_region: Option<Rectangle<f64, Logical>>,
}

impl GestureDeviceState {
    pub fn new(config: GestureConfig, natural_size: Size<i32, Logical>, nav_mode: NavModeSignal) -> Self {
        Self {
            config,
            natural_size,
            nav_mode,
            display_rotation: Rotation::Natural,
            active_rotation: Rotation::Natural,
            rotation_locked: false,
            excluded_regions: Vec::new(),
            keyboard_region: None,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn nav_mode_signal(&self) -> NavModeSignal {
        self.nav_mode.clone()
    }

    /// Latest navigation mode. Gestures latch this at start, so a change
    /// only affects the next gesture.
    pub fn current_navigation_mode(&self) -> NavigationMode {
        self.nav_mode.get()
    }

    pub fn is_fully_gestural_nav_mode(&self) -> bool {
        self.current_navigation_mode() == NavigationMode::NoButton
    }

    pub fn display_rotation(&self) -> Rotation {
        self.display_rotation
    }

    pub fn active_rotation(&self) -> Rotation {
        self.active_rotation
    }

    pub fn natural_size(&self) -> Size<i32, Logical> {
        self.natural_size
    }

    /// Screen size in the current display rotation
    pub fn screen_size(&self) -> Size<i32, Logical> {
        self.display_rotation.to_transform().transform_size(self.natural_size)
    }

    pub fn on_display_rotation(&mut self, rotation: Rotation) {
        self.display_rotation = rotation;
        if !self.rotation_locked {
            self.active_rotation = rotation;
        }
        tracing::debug!(
            display = ?self.display_rotation,
            active = ?self.active_rotation,
            "Display rotation changed"
        );
    }

    /// Lock the UI to its current rotation, or follow the display again
    pub fn set_rotation_locked(&mut self, locked: bool) {
        self.rotation_locked = locked;
        if !locked {
            self.active_rotation = self.display_rotation;
        }
    }

    /// Regions apps keep free of system gestures, in display coordinates
    pub fn set_excluded_regions(&mut self, regions: Vec<Rectangle<f64, Logical>>) {
        self.excluded_regions = regions;
    }

    pub fn set_keyboard_region(&mut self, region: Option<Rectangle<f64, Logical>>) {
        self.keyboard_region = region;
    }

    /// Whether the nav bar sits on a side edge (landscape with buttons)
    pub fn is_vertical_bar_layout(&self) -> bool {
        self.current_navigation_mode() != NavigationMode::NoButton
            && self.display_rotation.is_landscape()
    }

    /// Edge the swipe-up gesture starts from
    pub fn swipe_up_edge(&self) -> Edge {
        if self.is_vertical_bar_layout() {
            if self.display_rotation.is_seascape() {
                Edge::Left
            } else {
                Edge::Right
            }
        } else {
            Edge::Bottom
        }
    }

    /// Nav bar area in display coordinates
    pub fn nav_bar_rect(&self) -> Rectangle<f64, Logical> {
        let size = self.screen_size();
        let (w, h) = (size.w as f64, size.h as f64);
        let bar = self.config.nav_bar_size;
        edge_strip(self.swipe_up_edge(), w, h, bar)
    }

    fn is_on_screen(&self, pos: Point<f64, Logical>) -> bool {
        let size = self.screen_size();
        pos.x.is_finite()
            && pos.y.is_finite()
            && pos.x >= 0.0
            && pos.y >= 0.0
            && pos.x < size.w as f64
            && pos.y < size.h as f64
    }

    fn is_excluded(&self, pos: Point<f64, Logical>) -> bool {
        let size = self.screen_size();
        let back = self.config.back_edge_width;
        if pos.x < back || pos.x >= size.w as f64 - back {
            return true;
        }
        if self.keyboard_region.is_some_and(|r| r.contains(pos)) {
            return true;
        }
        self.excluded_regions.iter().any(|r| r.contains(pos))
    }

    /// Whether a pointer-down may start a fully-gestural swipe.
    /// Never true outside fully-gestural mode.
    pub fn is_fully_gestural_swipe(&self, pos: Point<f64, Logical>) -> bool {
        self.is_fully_gestural_nav_mode() && self.is_on_screen(pos) && !self.is_excluded(pos)
    }

    /// Whether a pointer-down may start swipe-up tracking in the current mode
    pub fn is_in_swipe_up_touch_region(&self, pos: Point<f64, Logical>) -> bool {
        let mode = self.current_navigation_mode();
        if !mode.has_gestures() {
            return false;
        }
        if mode == NavigationMode::NoButton {
            self.is_fully_gestural_swipe(pos)
        } else {
            self.is_on_screen(pos) && self.nav_bar_rect().contains(pos)
        }
    }

    /// Strip hugging the nav bar edge where a touch may just be a button tap
    pub fn is_in_deferred_gesture_region(&self, pos: Point<f64, Logical>) -> bool {
        if !self.is_on_screen(pos) {
            return false;
        }
        let size = self.screen_size();
        let strip = edge_strip(
            self.swipe_up_edge(),
            size.w as f64,
            size.h as f64,
            self.config.deferred_region_height,
        );
        strip.contains(pos)
    }
}

fn edge_strip(edge: Edge, w: f64, h: f64, thickness: f64) -> Rectangle<f64, Logical> {
    let (loc, size) = match edge {
        Edge::Bottom => ((0.0, h - thickness), (w, thickness)),
        Edge::Top => ((0.0, 0.0), (w, thickness)),
        Edge::Left => ((0.0, 0.0), (thickness, h)),
        Edge::Right => ((w - thickness, 0.0), (thickness, h)),
    };
    Rectangle::new(Point::from(loc), Size::from(size))
}
