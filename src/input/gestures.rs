//! Swipe-up recognition with per-slot touch tracking
//!
//! A touch that lands in the swipe region starts as a potential swipe and only
//! becomes one after moving past the touch slop. Until then it may still turn
//! out to be a tap (for example on a nav bar button), so nothing is started.
//!
//! Only one slot drives the swipe; other fingers are tracked but ignored.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use smithay::utils::{Logical, Point};

use super::touch::Edge;
use crate::config::GestureConfig;
use crate::end_target::GestureTrajectory;
use crate::error::{Error, Result};

/// Recognized swipe event
#[derive(Debug, Clone, PartialEq)]
pub enum SwipeEvent {
    /// Touch moved past the slop; tracking begins
    Start {
        edge: Edge,
        position: Point<f64, Logical>,
    },

    /// Finger moved while tracking
    Update(GestureTrajectory),

    /// Finger lifted while tracking
    End(GestureTrajectory),

    /// Touch lifted inside the slop within the tap timeout
    Tap {
        position: Point<f64, Logical>,
    },

    /// Tracking aborted by the input system
    Cancel,
}

/// Motion older than this no longer counts towards the release velocity
const VELOCITY_WINDOW: Duration = Duration::from_millis(100);

/// Touch point tracking
#[derive(Debug, Clone)]
pub struct TouchPoint {
    pub id: i32,
    pub start_pos: Point<f64, Logical>,
    pub current_pos: Point<f64, Logical>,
    pub start_time: Duration,
    pub last_time: Duration,
    /// px/s over the last `VELOCITY_WINDOW`
    pub velocity: Point<f64, Logical>,
    samples: VecDeque<(Duration, Point<f64, Logical>)>,
}

impl TouchPoint {
    pub fn new(id: i32, pos: Point<f64, Logical>, time: Duration) -> Self {
        Self {
            id,
            start_pos: pos,
            current_pos: pos,
            start_time: time,
            last_time: time,
            velocity: Point::from((0.0, 0.0)),
            samples: VecDeque::from([(time, pos)]),
        }
    }

    pub fn update(&mut self, pos: Point<f64, Logical>, time: Duration) {
        let time = self.last_time.max(time);
        match self.samples.back_mut() {
            Some(last) if last.0 == time => last.1 = pos,
            _ => self.samples.push_back((time, pos)),
        }
        let horizon = time.saturating_sub(VELOCITY_WINDOW);
        while self.samples.front().is_some_and(|(t, _)| *t < horizon) {
            self.samples.pop_front();
        }

        self.velocity = match (self.samples.front(), self.samples.back()) {
            (Some((t0, p0)), Some((t1, p1))) if t1.saturating_sub(*t0).as_secs_f64() > 0.001 => {
                let dt = t1.saturating_sub(*t0).as_secs_f64();
                Point::from(((p1.x - p0.x) / dt, (p1.y - p0.y) / dt))
            }
            _ => Point::from((0.0, 0.0)),
        };

        self.current_pos = pos;
        self.last_time = time;
    }

    pub fn delta(&self) -> Point<f64, Logical> {
        Point::from((
            self.current_pos.x - self.start_pos.x,
            self.current_pos.y - self.start_pos.y,
        ))
    }

    pub fn distance(&self) -> f64 {
        let d = self.delta();
        (d.x * d.x + d.y * d.y).sqrt()
    }

    pub fn held_for(&self) -> Duration {
        self.last_time.saturating_sub(self.start_time)
    }
}

/// Per-slot gesture state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotGesture {
    /// Landed in the swipe region, still within the slop
    PotentialSwipe { edge: Edge, allow_cross: bool },
    /// Tracked swipe
    Swipe { edge: Edge, allow_cross: bool },
    /// Not ours (outside the region, wrong direction, or an extra finger)
    Ignored,
}

/// Swipe-up recognizer
pub struct SwipeRecognizer {
    pub config: GestureConfig,
    /// Travel distance that maps to progress 1.0
    swipe_length: f64,
    points: HashMap<i32, TouchPoint>,
    slot_gestures: HashMap<i32, SlotGesture>,
}

impl SwipeRecognizer {
    pub fn new(config: GestureConfig, swipe_length: f64) -> Self {
        Self {
            config,
            swipe_length: swipe_length.max(1.0),
            points: HashMap::new(),
            slot_gestures: HashMap::new(),
        }
    }

    pub fn set_swipe_length(&mut self, length: f64) {
        self.swipe_length = length.max(1.0);
    }

    pub fn swipe_length(&self) -> f64 {
        self.swipe_length
    }

    fn driving_slot(&self) -> Option<(i32, SlotGesture)> {
        self.slot_gestures
            .iter()
            .find(|(_, g)| !matches!(g, SlotGesture::Ignored))
            .map(|(id, g)| (*id, *g))
    }

    /// Edge of the tracked swipe, `Ok(None)` when no swipe touch is down and
    /// `ClassificationAmbiguous` while the touch is still inside the slop.
    pub fn tracked_edge(&self) -> Result<Option<Edge>> {
        match self.driving_slot() {
            Some((_, SlotGesture::Swipe { edge, .. })) => Ok(Some(edge)),
            Some((_, SlotGesture::PotentialSwipe { .. })) => Err(Error::ClassificationAmbiguous),
            _ => Ok(None),
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.tracked_edge(), Ok(Some(_)))
    }

    fn trajectory(&self, point: &TouchPoint, edge: Edge) -> GestureTrajectory {
        let delta = point.delta();
        let travel = edge.travel(delta);
        GestureTrajectory {
            progress: (travel / self.swipe_length).max(0.0),
            cross_displacement: edge.cross_travel(delta),
            travel_velocity: edge.travel(point.velocity),
            cross_velocity: edge.cross_travel(point.velocity),
        }
    }

    /// Handle touch down. `region` is the swipe edge if the device state
    /// accepted this position, `allow_cross` enables quick-switch motion.
    pub fn touch_down(
        &mut self,
        id: i32,
        pos: Point<f64, Logical>,
        time: Duration,
        region: Option<Edge>,
        allow_cross: bool,
    ) -> Option<SwipeEvent> {
        let gesture = match region {
            Some(edge) if self.driving_slot().is_none() => SlotGesture::PotentialSwipe { edge, allow_cross },
            _ => SlotGesture::Ignored,
        };
        self.points.insert(id, TouchPoint::new(id, pos, time));
        self.slot_gestures.insert(id, gesture);
        None
    }

    /// Handle touch motion. Motion for unknown slots is dropped.
    pub fn touch_motion(&mut self, id: i32, pos: Point<f64, Logical>, time: Duration) -> Option<SwipeEvent> {
        let point = self.points.get_mut(&id)?;
        point.update(pos, time);
        let point = point.clone();

        match self.slot_gestures.get(&id).copied()? {
            SlotGesture::PotentialSwipe { edge, allow_cross } => {
                if point.distance() < self.config.touch_slop {
                    return None;
                }
                let delta = point.delta();
                let travel = edge.travel(delta);
                let cross = edge.cross_travel(delta).abs();
                let accepted = travel > 0.0 || (allow_cross && cross > travel.abs());
                if accepted {
                    self.slot_gestures.insert(id, SlotGesture::Swipe { edge, allow_cross });
                    Some(SwipeEvent::Start {
                        edge,
                        position: point.start_pos,
                    })
                } else {
                    tracing::debug!(slot = id, "Touch moved away from the swipe edge, ignoring");
                    self.slot_gestures.insert(id, SlotGesture::Ignored);
                    None
                }
            }
            SlotGesture::Swipe { edge, .. } => Some(SwipeEvent::Update(self.trajectory(&point, edge))),
            SlotGesture::Ignored => None,
        }
    }

    /// Handle touch up
    pub fn touch_up(&mut self, id: i32, time: Duration) -> Option<SwipeEvent> {
        let mut point = self.points.remove(&id)?;
        // A stationary sample at lift time so a pause before release
        // is not reported as the last fling speed
        point.update(point.current_pos, time);
        let slot_gesture = self.slot_gestures.remove(&id)?;

        match slot_gesture {
            SlotGesture::Swipe { edge, .. } => Some(SwipeEvent::End(self.trajectory(&point, edge))),
            SlotGesture::PotentialSwipe { .. } => {
                if point.held_for() < self.config.tap_timeout() && point.distance() < self.config.touch_slop {
                    Some(SwipeEvent::Tap {
                        position: point.start_pos,
                    })
                } else {
                    None
                }
            }
            SlotGesture::Ignored => None,
        }
    }

    /// Handle touch cancel - clear all state
    pub fn touch_cancel(&mut self) -> Option<SwipeEvent> {
        let was_tracking = self.is_tracking();
        self.points.clear();
        self.slot_gestures.clear();
        was_tracking.then_some(SwipeEvent::Cancel)
    }

    pub fn touch_count(&self) -> usize {
        self.points.len()
    }
}
