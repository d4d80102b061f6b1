//! Swipe-up handler - touch stream to overview transition
//!
//! Feeds touches through the recognizer, starts a gesture in the
//! coordinator when the touch qualifies, streams progress while the finger
//! moves and resolves the end target on release.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use crate::animation::{RecentsAnimationCoordinator, RemoteAnimationContent, RemoteAnimationProvider};
use crate::config::{Config, EndTargetThresholds};
use crate::end_target::{resolve_end_target, GestureEndTarget, GestureTrajectory};
use crate::gesture_state::GestureState;
use crate::input::{GestureDeviceState, SwipeEvent, SwipeRecognizer, TouchEvent};
use crate::interface::ActivityInterface;
use crate::session::SessionContext;
use crate::shell::DeviceProfile;

pub struct SwipeUpHandler<I: ActivityInterface> {
    interface: I,
    session: Rc<SessionContext>,
    recognizer: SwipeRecognizer,
    coordinator: RecentsAnimationCoordinator<I>,
    thresholds: EndTargetThresholds,
    gesture: Option<GestureState>,
    last_end_target: Option<GestureEndTarget>,
    /// Touch landed in the swipe region but may still be a button tap
    deferred: bool,
    /// Filled by the init listener when the surface shows up mid-gesture
    surface_ready: Rc<Cell<Option<bool>>>,
}

impl<I: ActivityInterface> SwipeUpHandler<I> {
    pub fn new(
        interface: I,
        session: Rc<SessionContext>,
        config: &Config,
        provider: Box<dyn RemoteAnimationProvider>,
    ) -> Self {
        let coordinator = RecentsAnimationCoordinator::new(
            interface,
            session.clone(),
            provider,
            config.animation.settle_duration(),
        );
        Self {
            interface,
            session,
            recognizer: SwipeRecognizer::new(config.gesture.clone(), 1.0),
            coordinator,
            thresholds: config.end_target.clone(),
            gesture: None,
            last_end_target: None,
            deferred: false,
            surface_ready: Rc::new(Cell::new(None)),
        }
    }

    pub fn interface(&self) -> I {
        self.interface
    }

    pub fn coordinator(&self) -> &RecentsAnimationCoordinator<I> {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut RecentsAnimationCoordinator<I> {
        &mut self.coordinator
    }

    pub fn gesture(&self) -> Option<&GestureState> {
        self.gesture.as_ref()
    }

    pub fn last_end_target(&self) -> Option<GestureEndTarget> {
        self.last_end_target
    }

    fn is_tracking(&self) -> bool {
        self.gesture.as_ref().is_some_and(GestureState::is_tracking)
    }

    pub fn on_touch_event(&mut self, event: &TouchEvent, device: &GestureDeviceState) {
        if event.is_malformed() {
            tracing::debug!(?event, "Dropping malformed touch event");
            return;
        }
        self.check_surface_ready();

        match *event {
            TouchEvent::Down { slot, position, time } => {
                let first = self.recognizer.touch_count() == 0;
                let region = device
                    .is_in_swipe_up_touch_region(position)
                    .then(|| device.swipe_up_edge());
                if first {
                    let dp = DeviceProfile::new(device);
                    let (_, length) = self
                        .interface
                        .swipe_up_destination_and_length(&dp, device.current_navigation_mode());
                    self.recognizer.set_swipe_length(length);
                }
                self.recognizer.touch_down(
                    slot,
                    position,
                    time,
                    region,
                    device.is_fully_gestural_nav_mode(),
                );

                if first && region.is_some() {
                    if self.interface.defer_starting_activity(device, position) {
                        tracing::debug!(slot, "Touch may be a button tap, deferring");
                        self.deferred = true;
                    } else {
                        self.begin_gesture(device);
                    }
                }
            }
            TouchEvent::Motion { slot, position, time } => {
                match self.recognizer.touch_motion(slot, position, time) {
                    Some(SwipeEvent::Start { edge, .. }) => {
                        if std::mem::take(&mut self.deferred) {
                            self.begin_gesture(device);
                        }
                        if let Some(gesture) = self.gesture.as_mut().filter(|g| g.is_tracking()) {
                            gesture.set_edge(edge);
                        }
                    }
                    Some(SwipeEvent::Update(trajectory)) => self.on_update(trajectory),
                    _ => {}
                }
            }
            TouchEvent::Up { slot, time } => match self.recognizer.touch_up(slot, time) {
                Some(SwipeEvent::End(trajectory)) => self.on_end(trajectory),
                Some(SwipeEvent::Tap { .. }) => {
                    self.deferred = false;
                    self.cancel_gesture("tap");
                }
                _ => {
                    if self.recognizer.touch_count() == 0 {
                        self.deferred = false;
                        self.cancel_gesture("released without swiping");
                    }
                }
            },
            TouchEvent::Cancel => {
                self.recognizer.touch_cancel();
                self.deferred = false;
                self.cancel_gesture("input canceled");
            }
        }
    }

    fn begin_gesture(&mut self, device: &GestureDeviceState) {
        let activity_visible = self.interface.is_surface_visible(&self.session);
        let gesture_id = self.coordinator.prepare_for_gesture(device, activity_visible);
        self.gesture = Some(GestureState::new(gesture_id, device.current_navigation_mode()));

        if self.interface.created_surface(&self.session).is_none() {
            // Fresh cell per gesture so a stale listener cannot wake a newer one
            let ready = Rc::new(Cell::new(None));
            self.surface_ready = ready.clone();
            self.interface.create_activity_init_listener(&self.session, move |already_on_home| {
                ready.set(Some(already_on_home));
                false
            });
        }
    }

    fn check_surface_ready(&mut self) {
        if let Some(already_on_home) = self.surface_ready.take() {
            tracing::debug!(already_on_home, "Surface attached mid-gesture");
            self.coordinator.on_surface_created(already_on_home);
        }
    }

    fn on_update(&mut self, trajectory: GestureTrajectory) {
        let Some(gesture) = self.gesture.as_mut().filter(|g| g.is_tracking()) else {
            return;
        };
        gesture.set_trajectory(trajectory);
        self.coordinator.update_progress(trajectory.progress);
    }

    fn on_end(&mut self, trajectory: GestureTrajectory) {
        let length = self.recognizer.swipe_length();
        let Some(gesture) = self.gesture.as_mut().filter(|g| g.is_tracking()) else {
            return;
        };
        gesture.set_trajectory(trajectory);

        // Resolve with the mode latched at gesture start
        let target = resolve_end_target(&trajectory, length, gesture.nav_mode(), &self.thresholds);
        gesture.set_end_target(target);
        tracing::info!(
            gesture_id = gesture.gesture_id(),
            ?target,
            progress = trajectory.progress,
            velocity = trajectory.travel_velocity,
            "Gesture released"
        );

        self.last_end_target = Some(target);
        self.coordinator.finish_gesture(target, trajectory.cross_displacement);
    }

    fn cancel_gesture(&mut self, reason: &str) {
        if !self.is_tracking() {
            return;
        }
        if let Some(gesture) = self.gesture.take() {
            tracing::debug!(gesture_id = gesture.gesture_id(), reason, "Canceling gesture");
        }
        self.coordinator.cancel_gesture();
    }

    pub fn on_animation_content_available(&mut self, content: Arc<RemoteAnimationContent>) {
        self.check_surface_ready();
        self.coordinator.on_animation_content_available(content);
    }

    pub fn on_animation_canceled(&mut self, gesture_id: u32) {
        self.coordinator.on_animation_canceled(gesture_id);
    }

    /// Per frame, after the surfaces advanced
    pub fn tick(&mut self) {
        self.check_surface_ready();
        self.coordinator.poll();
        if self.coordinator.active_gesture_id().is_none() && !self.is_tracking() {
            self.gesture = None;
        }
    }
}
