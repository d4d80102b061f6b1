//! Overview in the standalone recents surface, used when another app is the
//! default home

use smithay::utils::{Logical, Point, Rectangle};

use super::{swipe_gap_to_nav_bar, ActivityInterface};
use crate::end_target::GestureEndTarget;
use crate::input::{GestureDeviceState, NavigationMode};
use crate::session::{SessionContext, SurfaceTracker};
use crate::shell::primitives::Color;
use crate::shell::{DeviceProfile, OverviewSurface, RecentsState, RecentsSurface, SurfaceAppearance};

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackActivityInterface;

impl ActivityInterface for FallbackActivityInterface {
    type State = RecentsState;
    type Surface = RecentsSurface;

    const NAME: &'static str = "fallback";
    const OVERVIEW_STATE: RecentsState = RecentsState::Default;
    const BACKGROUND_STATE: RecentsState = RecentsState::BackgroundApp;
    const HOME_STATE: RecentsState = RecentsState::Home;

    fn tracker(session: &SessionContext) -> &SurfaceTracker<RecentsSurface> {
        session.recents_tracker()
    }

    fn swipe_up_destination_and_length(
        &self,
        dp: &DeviceProfile,
        mode: NavigationMode,
    ) -> (Rectangle<i32, Logical>, f64) {
        match swipe_gap_to_nav_bar(dp, mode) {
            (rect, Some(gap)) => (rect, gap),
            (rect, None) => {
                let below = dp.height_px - (rect.loc.y + rect.size.h);
                (rect, below as f64)
            }
        }
    }

    // The assistant is reset before this surface becomes active
    fn on_assistant_visibility_changed(&self, _session: &SessionContext, _visibility: f32) {}

    fn on_one_handed_mode_state_changed(&self, _session: &SessionContext, _activated: bool) {}

    fn switch_to_recents_if_visible(&self, _session: &SessionContext, _on_complete: Box<dyn FnOnce()>) -> bool {
        false
    }

    /// With buttons, a touch near the bar may be the home button, which
    /// starts home directly. Wait until it is clearly a gesture.
    fn defer_starting_activity(&self, device: &GestureDeviceState, pos: Point<f64, Logical>) -> bool {
        !device.is_fully_gestural_nav_mode() || device.is_in_deferred_gesture_region(pos)
    }

    fn on_launch_task_failed(&self, session: &SessionContext) {
        if let Some(surface) = self.created_surface(session) {
            tracing::info!("Task launch failed, leaving recents for home");
            let recents_view = surface.borrow().recents_view();
            recents_view.borrow_mut().start_home();
        }
    }

    fn state_from_gesture_end_target(&self, target: GestureEndTarget) -> RecentsState {
        match target {
            GestureEndTarget::Recents => RecentsState::Default,
            GestureEndTarget::NewTask | GestureEndTarget::LastTask => RecentsState::BackgroundApp,
            GestureEndTarget::Home => RecentsState::Home,
        }
    }

    fn overview_scrim_color_for_state(&self, appearance: &SurfaceAppearance, state: RecentsState) -> Color {
        state.scrim_color(appearance.theme())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GestureConfig;
    use crate::input::{NavModeSignal, Rotation};
    use crate::shell::SurfaceTheme;
    use smithay::utils::Size;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    fn device(mode: NavigationMode) -> GestureDeviceState {
        GestureDeviceState::new(GestureConfig::default(), Size::from((720, 1440)), NavModeSignal::new(mode))
    }

    fn surface(session: &Rc<SessionContext>) -> Rc<std::cell::RefCell<RecentsSurface>> {
        let surface = RecentsSurface::new(session.clone(), Size::from((720, 1440)), SurfaceTheme::Dark, Duration::from_millis(100));
        session.recents_tracker().attach(&surface, false);
        surface
    }

    #[test]
    fn test_defers_whenever_buttons_exist() {
        let i = FallbackActivityInterface;
        let mid = Point::from((360.0, 700.0));
        assert!(i.defer_starting_activity(&device(NavigationMode::TwoButton), mid));
        assert!(!i.defer_starting_activity(&device(NavigationMode::NoButton), mid));
        assert!(i.defer_starting_activity(&device(NavigationMode::NoButton), Point::from((360.0, 1435.0))));
    }

    #[test]
    fn test_vertical_bar_length_is_sideways_gap() {
        let mut d = device(NavigationMode::TwoButton);
        d.on_display_rotation(Rotation::Rotated270);
        let dp = DeviceProfile::new(&d);
        let (rect, length) = FallbackActivityInterface.swipe_up_destination_and_length(&dp, NavigationMode::TwoButton);
        assert_eq!(length, rect.loc.x as f64);

        let (rect, length) = FallbackActivityInterface.swipe_up_destination_and_length(&dp, NavigationMode::NoButton);
        assert_eq!(length, (dp.height_px - rect.loc.y - rect.size.h) as f64);
    }

    #[test]
    fn test_end_targets_map_to_recents_states() {
        let i = FallbackActivityInterface;
        assert_eq!(i.state_from_gesture_end_target(GestureEndTarget::Recents), RecentsState::Default);
        assert_eq!(i.state_from_gesture_end_target(GestureEndTarget::LastTask), RecentsState::BackgroundApp);
        assert_eq!(i.state_from_gesture_end_target(GestureEndTarget::Home), RecentsState::Home);
    }

    #[test]
    fn test_never_switches_to_recents() {
        let session = SessionContext::new();
        let _surface = surface(&session);
        assert!(!FallbackActivityInterface.switch_to_recents_if_visible(&session, Box::new(|| {})));
    }

    #[test]
    fn test_launch_failure_requests_home() {
        let session = SessionContext::new();
        let surface = surface(&session);
        FallbackActivityInterface.on_launch_task_failed(&session);
        let view = surface.borrow().recents_view();
        assert!(view.borrow_mut().take_home_request());
    }

    #[test]
    fn test_exit_overview_waits_for_home() {
        let session = SessionContext::new();
        let surface = surface(&session);
        surface
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(RecentsState::Default, false, None);

        let mut d = device(NavigationMode::NoButton);
        d.on_display_rotation(Rotation::Rotated90);
        let exited = Rc::new(Cell::new(0));
        let count = exited.clone();
        FallbackActivityInterface.on_exit_overview(&session, &d, Box::new(move || count.set(count.get() + 1)));
        assert_eq!(exited.get(), 0);

        surface
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(RecentsState::ModalTask, false, None);
        assert_eq!(exited.get(), 0);

        surface
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(RecentsState::Home, false, None);
        assert_eq!(exited.get(), 1);
        let view = surface.borrow().recents_view();
        assert_eq!(view.borrow().layout_rotation(), (Rotation::Rotated90, Rotation::Rotated90));

        // One-shot: later trips home do not run it again
        surface
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(RecentsState::Default, false, None);
        surface
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(RecentsState::Home, false, None);
        assert_eq!(exited.get(), 1);
    }

    #[test]
    fn test_every_pending_exit_runs() {
        let session = SessionContext::new();
        let surface = surface(&session);
        surface
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(RecentsState::Default, false, None);

        let d = device(NavigationMode::NoButton);
        let exited = Rc::new(Cell::new(0));
        for _ in 0..2 {
            let count = exited.clone();
            FallbackActivityInterface.on_exit_overview(&session, &d, Box::new(move || count.set(count.get() + 1)));
        }
        surface
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(RecentsState::Home, false, None);
        assert_eq!(exited.get(), 2);
    }

    #[test]
    fn test_exit_overview_at_home_is_immediate() {
        let session = SessionContext::new();
        let _surface = surface(&session);
        let exited = Rc::new(Cell::new(false));
        let flag = exited.clone();
        FallbackActivityInterface.on_exit_overview(&session, &device(NavigationMode::NoButton), Box::new(move || flag.set(true)));
        assert!(exited.get());
    }
}
