//! Touch input handling

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smithay::utils::{Logical, Point};

/// Raw touch event, in display coordinates.
///
/// `time` is the monotonic event timestamp from the input device, not the time
/// the event was processed.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchEvent {
    Down {
        slot: i32,
        position: Point<f64, Logical>,
        time: Duration,
    },
    Up {
        slot: i32,
        time: Duration,
    },
    Motion {
        slot: i32,
        position: Point<f64, Logical>,
        time: Duration,
    },
    Cancel,
}

impl TouchEvent {
    pub fn slot(&self) -> Option<i32> {
        match self {
            TouchEvent::Down { slot, .. }
            | TouchEvent::Up { slot, .. }
            | TouchEvent::Motion { slot, .. } => Some(*slot),
            TouchEvent::Cancel => None,
        }
    }

    /// Positions that cannot come from a real digitizer
    pub fn is_malformed(&self) -> bool {
        match self {
            TouchEvent::Down { position, .. } | TouchEvent::Motion { position, .. } => {
                !position.x.is_finite() || !position.y.is_finite()
            }
            _ => false,
        }
    }
}

/// Edge of the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    /// Distance travelled away from this edge for a displacement
    pub fn travel(&self, delta: Point<f64, Logical>) -> f64 {
        match self {
            Edge::Left => delta.x,
            Edge::Right => -delta.x,
            Edge::Top => delta.y,
            Edge::Bottom => -delta.y,
        }
    }

    /// Displacement perpendicular to the travel axis
    pub fn cross_travel(&self, delta: Point<f64, Logical>) -> f64 {
        match self {
            Edge::Left => -delta.y,
            Edge::Right => delta.y,
            Edge::Top => -delta.x,
            Edge::Bottom => delta.x,
        }
    }
}
