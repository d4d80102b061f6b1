//! Per-gesture bookkeeping

use crate::end_target::{GestureEndTarget, GestureTrajectory};
use crate::input::{Edge, NavigationMode};

/// State of one gesture from first contact to settle.
///
/// The navigation mode is latched when the gesture begins; a mode switch
/// mid-gesture only affects the next one.
#[derive(Debug, Clone)]
pub struct GestureState {
    gesture_id: u32,
    nav_mode: NavigationMode,
    edge: Option<Edge>,
    trajectory: GestureTrajectory,
    end_target: Option<GestureEndTarget>,
}

impl GestureState {
    pub fn new(gesture_id: u32, nav_mode: NavigationMode) -> Self {
        Self {
            gesture_id,
            nav_mode,
            edge: None,
            trajectory: GestureTrajectory::default(),
            end_target: None,
        }
    }

    pub fn gesture_id(&self) -> u32 {
        self.gesture_id
    }

    pub fn nav_mode(&self) -> NavigationMode {
        self.nav_mode
    }

    pub fn edge(&self) -> Option<Edge> {
        self.edge
    }

    pub fn set_edge(&mut self, edge: Edge) {
        self.edge = Some(edge);
    }

    pub fn trajectory(&self) -> GestureTrajectory {
        self.trajectory
    }

    pub fn set_trajectory(&mut self, trajectory: GestureTrajectory) {
        self.trajectory = trajectory;
    }

    pub fn end_target(&self) -> Option<GestureEndTarget> {
        self.end_target
    }

    /// Set once. Later calls are ignored and return false.
    pub fn set_end_target(&mut self, target: GestureEndTarget) -> bool {
        if let Some(existing) = self.end_target {
            tracing::warn!(
                gesture_id = self.gesture_id,
                ?existing,
                ignored = ?target,
                "End target already set"
            );
            return false;
        }
        self.end_target = Some(target);
        true
    }

    /// Finger still down (or not yet resolved)
    pub fn is_tracking(&self) -> bool {
        self.end_target.is_none()
    }
}
