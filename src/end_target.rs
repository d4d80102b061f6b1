//! Gesture end-target resolution
//!
//! Pure mapping from a finished swipe to where it should land. No clocks, no
//! shared state: the same trajectory, mode and thresholds always give the
//! same answer.
//!
//! Rules, first match wins:
//! 1. Fully gestural, sideways travel past `quick_switch_distance` and larger
//!    than the upward travel: quick switch. A sideways fling back toward the
//!    start returns to the last task, anything else switches to a new task.
//! 2. Fully gestural, upward speed above `home_fling_velocity`: home.
//! 3. Upward speed above `fling_velocity`: recents. Velocity beats position.
//! 4. Downward speed above `fling_velocity`: back to the last task.
//! 5. Otherwise the nearest state by progress: home (fully gestural only) at
//!    `home_progress`, recents at `recents_progress`, else the last task.

use serde::{Deserialize, Serialize};

use crate::config::EndTargetThresholds;
use crate::input::NavigationMode;

/// Where a completed gesture goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GestureEndTarget {
    Home,
    Recents,
    NewTask,
    LastTask,
}

impl GestureEndTarget {
    /// Whether the target leaves the launcher or recents surface showing,
    /// so the running app goes to the background
    pub fn is_launcher(&self) -> bool {
        matches!(self, GestureEndTarget::Home | GestureEndTarget::Recents)
    }
}

/// Measured swipe, in the swipe's own frame.
///
/// "Travel" is away from the swipe edge (up, for a bottom swipe), "cross" is
/// perpendicular to it. Velocities are px/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GestureTrajectory {
    /// Travel as a fraction of the swipe-up length
    pub progress: f64,
    pub cross_displacement: f64,
    pub travel_velocity: f64,
    pub cross_velocity: f64,
}

/// Resolve the end target of a completed gesture
pub fn resolve_end_target(
    trajectory: &GestureTrajectory,
    swipe_length: f64,
    mode: NavigationMode,
    thresholds: &EndTargetThresholds,
) -> GestureEndTarget {
    let gestural = mode == NavigationMode::NoButton;
    let travel = trajectory.progress * swipe_length;
    let cross = trajectory.cross_displacement;

    if gestural && cross.abs() > thresholds.quick_switch_distance && cross.abs() > travel {
        let flung_back = trajectory.cross_velocity.signum() != cross.signum()
            && trajectory.cross_velocity.abs() > thresholds.fling_velocity;
        return if flung_back {
            GestureEndTarget::LastTask
        } else {
            GestureEndTarget::NewTask
        };
    }

    let up = trajectory.travel_velocity;
    if gestural && up > thresholds.home_fling_velocity {
        return GestureEndTarget::Home;
    }
    if up > thresholds.fling_velocity {
        return GestureEndTarget::Recents;
    }
    if up < -thresholds.fling_velocity {
        return GestureEndTarget::LastTask;
    }

    if gestural && trajectory.progress >= thresholds.home_progress {
        GestureEndTarget::Home
    } else if trajectory.progress >= thresholds.recents_progress {
        GestureEndTarget::Recents
    } else {
        GestureEndTarget::LastTask
    }
}
