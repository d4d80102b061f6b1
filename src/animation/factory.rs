//! Per-gesture animation factory
//!
//! Created when a gesture starts tracking. Drives the host surface's state
//! machine with a controlled transition toward overview and transforms the
//! compositor's app surfaces to match. Progress set before the compositor
//! content (or the surface) exists is kept and replayed when it attaches.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use smithay::utils::{Logical, Rectangle, Size};

use super::remote::{RemoteAnimationContent, SurfaceTransaction, TargetMode};
use super::VisualEndpoint;
use crate::interface::ActivityInterface;
use crate::session::SessionContext;
use crate::shell::primitives::{lerp, lerp_rect};
use crate::shell::OverviewSurface;
use crate::state_manager::Subscription;

/// Corner radius of a task card in overview
const CARD_CORNER_RADIUS: f64 = 16.0;

/// Compositor content as seen by one factory
#[derive(Debug)]
enum ContentSlot {
    /// Not delivered yet
    Pending,
    Attached(Arc<RemoteAnimationContent>),
    /// Canceled by the compositor or never delivered
    Dropped,
    Released,
}

pub struct AnimationFactory<I: ActivityInterface> {
    interface: I,
    session: Rc<SessionContext>,
    gesture_id: u32,
    screen_size: Size<i32, Logical>,
    task_rect: Rectangle<i32, Logical>,
    surface: Weak<RefCell<I::Surface>>,
    activity_visible: bool,
    /// State committed before the gesture touched the surface
    start_state: Option<I::State>,
    /// Transition this factory owns in the surface's state manager
    transition: Option<u64>,
    end_state: Option<I::State>,
    progress: f64,
    content: ContentSlot,
    pending_endpoints: Vec<Box<dyn VisualEndpoint>>,
    endpoint_subscriptions: Vec<Subscription>,
    released: bool,
}

impl<I: ActivityInterface> AnimationFactory<I> {
    pub fn new(
        interface: I,
        session: Rc<SessionContext>,
        gesture_id: u32,
        screen_size: Size<i32, Logical>,
        task_rect: Rectangle<i32, Logical>,
    ) -> Self {
        session.factory_created();
        tracing::debug!(gesture_id, host = I::NAME, "Animation factory created");
        Self {
            interface,
            session,
            gesture_id,
            screen_size,
            task_rect,
            surface: Weak::new(),
            activity_visible: false,
            start_state: None,
            transition: None,
            end_state: None,
            progress: 0.0,
            content: ContentSlot::Pending,
            pending_endpoints: Vec::new(),
            endpoint_subscriptions: Vec::new(),
            released: false,
        }
    }

    pub fn gesture_id(&self) -> u32 {
        self.gesture_id
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn end_state(&self) -> Option<I::State> {
        self.end_state
    }

    pub fn surface(&self) -> Option<Rc<RefCell<I::Surface>>> {
        self.surface.upgrade()
    }

    pub fn is_bound(&self) -> bool {
        self.surface.strong_count() > 0
    }

    /// Put the surface behind the app (unless it is already in front) and
    /// start tracking. Without a surface this waits for `init_ui` again.
    pub fn init_ui(&mut self, activity_visible: bool) {
        self.activity_visible = activity_visible;
        if !self.bind() {
            tracing::debug!(
                gesture_id = self.gesture_id,
                error = %crate::Error::SurfaceUnavailable,
                "Deferring UI setup until the surface exists"
            );
        }
    }

    fn bind(&mut self) -> bool {
        if self.released {
            return false;
        }
        if self.is_bound() {
            return true;
        }
        let Some(surface) = self.interface.created_surface(&self.session) else {
            return false;
        };

        {
            let mut s = surface.borrow_mut();
            s.recents_view().borrow_mut().set_task_rect(self.screen_size, self.task_rect);

            let sm = s.state_manager_mut();
            self.start_state = Some(sm.state());
            if !self.activity_visible {
                sm.go_to_state(I::BACKGROUND_STATE, false, None);
            }
            let id = sm.start_controlled(I::OVERVIEW_STATE);
            sm.set_controlled_progress(id, self.progress);
            self.transition = Some(id);

            for endpoint in self.pending_endpoints.drain(..) {
                self.endpoint_subscriptions.push(sm.add_visual_endpoint(endpoint));
            }
        }

        tracing::debug!(gesture_id = self.gesture_id, progress = self.progress, "Factory bound to surface");
        self.surface = Rc::downgrade(&surface);
        true
    }

    /// Register something that tracks this gesture's visuals (depth, blur)
    pub fn add_visual_endpoint(&mut self, endpoint: Box<dyn VisualEndpoint>) {
        match self.surface() {
            Some(surface) => {
                let subscription = surface.borrow_mut().state_manager_mut().add_visual_endpoint(endpoint);
                self.endpoint_subscriptions.push(subscription);
            }
            None => self.pending_endpoints.push(endpoint),
        }
    }

    pub fn set_progress(&mut self, progress: f64) {
        self.progress = progress.clamp(0.0, 1.0);
        if let (Some(surface), Some(id)) = (self.surface(), self.transition) {
            surface
                .borrow_mut()
                .state_manager_mut()
                .set_controlled_progress(id, self.progress);
        }
    }

    /// Attach compositor content. False if this gesture is already past
    /// the point of accepting it.
    pub fn attach_content(&mut self, content: Arc<RemoteAnimationContent>) -> bool {
        match self.content {
            ContentSlot::Pending => {
                self.content = ContentSlot::Attached(content);
                true
            }
            _ => false,
        }
    }

    pub fn mark_content_dropped(&mut self) {
        if !matches!(self.content, ContentSlot::Released) {
            self.content = ContentSlot::Dropped;
        }
    }

    pub fn is_content_pending(&self) -> bool {
        matches!(self.content, ContentSlot::Pending)
    }

    pub fn content(&self) -> Option<&Arc<RemoteAnimationContent>> {
        match &self.content {
            ContentSlot::Attached(content) => Some(content),
            _ => None,
        }
    }

    /// Overview progress currently on screen
    fn displayed_progress(&self) -> f64 {
        match self.surface() {
            Some(surface) => {
                let visuals = surface.borrow().state_manager().displayed_visuals();
                visuals.overview_progress
            }
            None => self.progress,
        }
    }

    /// Transforms for the app surfaces at the current progress
    pub fn transactions(&self) -> Vec<SurfaceTransaction> {
        let Some(content) = self.content() else {
            return Vec::new();
        };
        let t = self.displayed_progress();
        content
            .apps
            .iter()
            .filter(|target| target.mode == TargetMode::Closing)
            .map(|target| SurfaceTransaction {
                surface: target.surface,
                rect: lerp_rect(target.bounds, self.task_rect, t),
                alpha: 1.0,
                corner_radius: lerp(0.0, CARD_CORNER_RADIUS, t),
            })
            .collect()
    }

    /// Animate to `end_state` after the finger lifts
    pub fn settle(&mut self, end_state: I::State, duration: Duration) {
        self.end_state = Some(end_state);
        let Some(surface) = self.surface() else {
            tracing::debug!(gesture_id = self.gesture_id, "No surface to settle");
            return;
        };
        let mut s = surface.borrow_mut();
        let sm = s.state_manager_mut();

        let ours = self.transition.is_some() && sm.transition_id() == self.transition;
        let settled = match self.transition {
            Some(id) if ours && end_state == I::OVERVIEW_STATE => sm.settle_controlled(id, duration),
            _ => false,
        };
        if !settled {
            sm.go_to_state(end_state, true, None);
        }
        self.transition = sm.transition_id();
    }

    /// Settle finished (or the surface is gone, or someone else took over)
    pub fn is_settled(&self) -> bool {
        if self.released {
            return true;
        }
        if self.end_state.is_none() {
            return false;
        }
        match self.surface() {
            Some(surface) => {
                let in_flight = surface.borrow().state_manager().transition_id();
                in_flight.is_none() || in_flight != self.transition
            }
            None => true,
        }
    }

    /// Abort: snap the surface back to the state it had before the gesture
    pub fn cancel(&mut self) {
        if let Some(surface) = self.surface() {
            let mut s = surface.borrow_mut();
            let sm = s.state_manager_mut();
            if self.transition.is_some() && sm.transition_id() == self.transition {
                sm.cancel_animation();
            }
            if let Some(start) = self.start_state {
                if sm.state() != start {
                    sm.go_to_state(start, false, None);
                }
            }
        }
        tracing::debug!(gesture_id = self.gesture_id, progress = self.progress, "Animation canceled");
        self.release();
    }

    /// Give up the content reference and endpoint registrations. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.content = ContentSlot::Released;
        self.pending_endpoints.clear();

        let subscriptions = std::mem::take(&mut self.endpoint_subscriptions);
        if let Some(surface) = self.surface() {
            match surface.try_borrow_mut() {
                Ok(mut s) => {
                    for subscription in subscriptions {
                        s.state_manager_mut().remove_visual_endpoint(subscription);
                    }
                }
                Err(_) => tracing::warn!(gesture_id = self.gesture_id, "Surface busy, endpoints left registered"),
            };
        }

        self.session.factory_released();
        tracing::debug!(gesture_id = self.gesture_id, "Animation factory released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<I: ActivityInterface> Drop for AnimationFactory<I> {
    fn drop(&mut self) {
        self.release();
    }
}
