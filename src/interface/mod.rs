//! Activity interfaces - the seam between the gesture core and a host surface
//!
//! One stateless implementation per overview host. The state machine and the
//! animation machinery are generic over `ActivityInterface`, so the compiler
//! checks every host handles every operation. All calls that need the surface
//! quietly do nothing when it has not been created (or was torn down).

mod fallback;
mod launcher;

pub use fallback::FallbackActivityInterface;
pub use launcher::LauncherActivityInterface;

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use smithay::utils::{Logical, Point, Rectangle};

use crate::animation::AnimationFactory;
use crate::end_target::GestureEndTarget;
use crate::input::{GestureDeviceState, NavigationMode, Rotation};
use crate::session::{SessionContext, SurfaceTracker};
use crate::shell::primitives::Color;
use crate::shell::{calculate_task_size, DeviceProfile, Lifecycle, OverviewSurface, RecentsView, SurfaceAppearance};
use crate::state_manager::{ListenerStatus, ShellState, StateListener};

pub trait ActivityInterface: Copy + Debug + 'static {
    type State: ShellState;
    type Surface: OverviewSurface<State = Self::State> + 'static;

    /// For logs
    const NAME: &'static str;
    /// Task cards shown, the destination of a swipe up
    const OVERVIEW_STATE: Self::State;
    /// App in front, overview waiting behind it
    const BACKGROUND_STATE: Self::State;
    const HOME_STATE: Self::State;

    fn tracker(session: &SessionContext) -> &SurfaceTracker<Self::Surface>;

    fn created_surface(&self, session: &SessionContext) -> Option<Rc<RefCell<Self::Surface>>> {
        Self::tracker(session).created()
    }

    /// Task rect in overview and the swipe travel that maps to progress 1.0
    fn swipe_up_destination_and_length(
        &self,
        dp: &DeviceProfile,
        mode: NavigationMode,
    ) -> (Rectangle<i32, Logical>, f64);

    fn on_assistant_visibility_changed(&self, session: &SessionContext, visibility: f32);

    fn on_one_handed_mode_state_changed(&self, session: &SessionContext, activated: bool);

    /// Build the factory for a new gesture and put the surface behind the app
    fn prepare_recents_ui(
        &self,
        session: &Rc<SessionContext>,
        device: &GestureDeviceState,
        activity_visible: bool,
        gesture_id: u32,
    ) -> AnimationFactory<Self> {
        self.notify_recents_of_orientation(session, device);

        let dp = DeviceProfile::new(device);
        let (task_rect, _) = self.swipe_up_destination_and_length(&dp, device.current_navigation_mode());
        let mut factory = AnimationFactory::new(*self, session.clone(), gesture_id, dp.size(), task_rect);
        factory.init_ui(activity_visible);
        factory
    }

    /// Call `on_init(already_on_home)` when the surface attaches. The
    /// listener stays registered while it returns true.
    fn create_activity_init_listener(&self, session: &SessionContext, mut on_init: impl FnMut(bool) -> bool + 'static) {
        Self::tracker(session).register_init_listener(Box::new(move |_, already_on_home| on_init(already_on_home)));
    }

    /// Whether the surface is in front (gestures starting here skip the
    /// move to the background state)
    fn is_surface_visible(&self, session: &SessionContext) -> bool {
        self.created_surface(session).is_some_and(|s| {
            let lifecycle = s.borrow().lifecycle();
            lifecycle == Lifecycle::Resumed
        })
    }

    /// Recents view, if the user can currently see it
    fn visible_recents_view(&self, session: &SessionContext) -> Option<Rc<RefCell<RecentsView>>> {
        let surface = self.created_surface(session)?;
        let surface = surface.borrow();
        if surface.has_been_resumed() || self.is_in_live_tile_mode(session) {
            Some(surface.recents_view())
        } else {
            None
        }
    }

    /// Animate to overview if the surface is showing. False if it is not.
    fn switch_to_recents_if_visible(&self, session: &SessionContext, on_complete: Box<dyn FnOnce()>) -> bool;

    /// Whether a touch at `pos` must prove itself a gesture before the
    /// overview host is started (it may be a nav bar button tap)
    fn defer_starting_activity(&self, device: &GestureDeviceState, pos: Point<f64, Logical>) -> bool {
        device.is_in_deferred_gesture_region(pos)
    }

    /// Run `exit` once the surface is at home. Immediate if it already is.
    fn on_exit_overview(&self, session: &SessionContext, device: &GestureDeviceState, exit: Box<dyn FnOnce()>) {
        let Some(surface) = self.created_surface(session) else {
            tracing::debug!(host = Self::NAME, "No surface, exiting overview directly");
            exit();
            return;
        };

        let mut surface = surface.borrow_mut();
        if surface.state_manager().state() == Self::HOME_STATE {
            drop(surface);
            exit();
            self.notify_recents_of_orientation(session, device);
            return;
        }

        let listener = ExitOverviewListener {
            home: Self::HOME_STATE,
            exit: Some(exit),
            recents_view: surface.recents_view(),
            rotations: (device.active_rotation(), device.display_rotation()),
        };
        let subscription = surface.state_manager_mut().add_state_listener(Box::new(listener));
        surface.add_exit_subscription(subscription);
    }

    /// Surface exists, shows the overview state and is composited
    fn is_in_live_tile_mode(&self, session: &SessionContext) -> bool {
        self.created_surface(session).is_some_and(|s| {
            let s = s.borrow();
            s.state_manager().state() == Self::OVERVIEW_STATE && s.is_started()
        })
    }

    fn on_launch_task_failed(&self, session: &SessionContext);

    fn state_from_gesture_end_target(&self, target: GestureEndTarget) -> Self::State;

    /// Scrim behind the overview in `state`; the surfaces' state resolvers use it
    fn overview_scrim_color_for_state(&self, appearance: &SurfaceAppearance, state: Self::State) -> Color;

    /// Recents content follows the active rotation, layout the display one
    fn notify_recents_of_orientation(&self, session: &SessionContext, device: &GestureDeviceState) {
        if let Some(surface) = self.created_surface(session) {
            surface
                .borrow()
                .recents_view()
                .borrow_mut()
                .set_layout_rotation(device.active_rotation(), device.display_rotation());
        }
    }
}

/// Task rect plus the gap between it and the nav bar edge. In a vertical
/// bar layout with buttons the swipe runs sideways toward the bar.
fn swipe_gap_to_nav_bar(dp: &DeviceProfile, mode: NavigationMode) -> (Rectangle<i32, Logical>, Option<f64>) {
    let rect = calculate_task_size(dp);
    if dp.is_vertical_bar_layout && mode != NavigationMode::NoButton {
        let gap = if dp.is_seascape {
            rect.loc.x
        } else {
            dp.width_px - (rect.loc.x + rect.size.w)
        };
        (rect, Some(gap as f64))
    } else {
        (rect, None)
    }
}

/// One-shot listener behind `on_exit_overview`
struct ExitOverviewListener<S> {
    home: S,
    exit: Option<Box<dyn FnOnce()>>,
    recents_view: Rc<RefCell<RecentsView>>,
    /// Captured when registered; the device state is not reachable from here
    rotations: (Rotation, Rotation),
}

impl<S: ShellState> StateListener<S> for ExitOverviewListener<S> {
    fn on_state_transition_complete(&mut self, state: S) -> ListenerStatus {
        if state != self.home {
            return ListenerStatus::Active;
        }
        if let Some(exit) = self.exit.take() {
            exit();
        }
        let (active, display) = self.rotations;
        self.recents_view.borrow_mut().set_layout_rotation(active, display);
        ListenerStatus::Done
    }
}
