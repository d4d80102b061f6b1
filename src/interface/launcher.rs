//! Overview embedded in the launcher's own home surface

use smithay::utils::{Logical, Rectangle};

use super::{swipe_gap_to_nav_bar, ActivityInterface};
use crate::end_target::GestureEndTarget;
use crate::input::NavigationMode;
use crate::session::{SessionContext, SurfaceTracker};
use crate::shell::primitives::{with_alpha, Color};
use crate::shell::{DeviceProfile, LauncherState, LauncherSurface, OverviewSurface, SurfaceAppearance};

#[derive(Debug, Clone, Copy, Default)]
pub struct LauncherActivityInterface;

impl ActivityInterface for LauncherActivityInterface {
    type State = LauncherState;
    type Surface = LauncherSurface;

    const NAME: &'static str = "launcher";
    const OVERVIEW_STATE: LauncherState = LauncherState::Overview;
    const BACKGROUND_STATE: LauncherState = LauncherState::BackgroundApp;
    const HOME_STATE: LauncherState = LauncherState::Normal;

    fn tracker(session: &SessionContext) -> &SurfaceTracker<LauncherSurface> {
        session.launcher_tracker()
    }

    fn swipe_up_destination_and_length(
        &self,
        dp: &DeviceProfile,
        mode: NavigationMode,
    ) -> (Rectangle<i32, Logical>, f64) {
        match swipe_gap_to_nav_bar(dp, mode) {
            (rect, Some(gap)) => (rect, gap),
            // Past the task rect the swipe keeps tracking over the hotseat shelf
            (rect, None) => {
                let below = dp.height_px - (rect.loc.y + rect.size.h);
                (rect, (below + dp.hotseat_bar_size) as f64)
            }
        }
    }

    fn on_assistant_visibility_changed(&self, session: &SessionContext, visibility: f32) {
        if let Some(surface) = self.created_surface(session) {
            surface.borrow_mut().set_assistant_visibility(visibility);
        }
    }

    fn on_one_handed_mode_state_changed(&self, session: &SessionContext, activated: bool) {
        if let Some(surface) = self.created_surface(session) {
            surface.borrow_mut().set_one_handed(activated);
        }
    }

    fn switch_to_recents_if_visible(&self, session: &SessionContext, on_complete: Box<dyn FnOnce()>) -> bool {
        if !self.is_surface_visible(session) {
            return false;
        }
        let Some(surface) = self.created_surface(session) else {
            return false;
        };
        surface
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(LauncherState::Overview, true, Some(Box::new(move |_| on_complete())));
        true
    }

    fn on_launch_task_failed(&self, session: &SessionContext) {
        if let Some(surface) = self.created_surface(session) {
            tracing::info!("Task launch failed, returning to overview");
            surface
                .borrow_mut()
                .state_manager_mut()
                .go_to_state(LauncherState::Overview, true, None);
        }
    }

    fn state_from_gesture_end_target(&self, target: GestureEndTarget) -> LauncherState {
        match target {
            GestureEndTarget::Home => LauncherState::Normal,
            GestureEndTarget::Recents => LauncherState::Overview,
            GestureEndTarget::NewTask | GestureEndTarget::LastTask => LauncherState::BackgroundApp,
        }
    }

    /// The scrim fades out while the assistant is up
    fn overview_scrim_color_for_state(&self, appearance: &SurfaceAppearance, state: LauncherState) -> Color {
        with_alpha(state.scrim_color(appearance.theme()), 1.0 - appearance.assistant_visibility())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::SurfaceTheme;
    use smithay::utils::Size;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    fn dp() -> DeviceProfile {
        DeviceProfile {
            width_px: 720,
            height_px: 1440,
            is_vertical_bar_layout: false,
            is_seascape: false,
            nav_bar_size: 96,
            hotseat_bar_size: 144,
        }
    }

    #[test]
    fn test_swipe_length_includes_shelf() {
        let (rect, length) = LauncherActivityInterface.swipe_up_destination_and_length(&dp(), NavigationMode::NoButton);
        let below = 1440 - (rect.loc.y + rect.size.h);
        assert_eq!(length, (below + 144) as f64);
    }

    #[test]
    fn test_end_targets_map_to_launcher_states() {
        let i = LauncherActivityInterface;
        assert_eq!(i.state_from_gesture_end_target(GestureEndTarget::Home), LauncherState::Normal);
        assert_eq!(i.state_from_gesture_end_target(GestureEndTarget::Recents), LauncherState::Overview);
        assert_eq!(i.state_from_gesture_end_target(GestureEndTarget::NewTask), LauncherState::BackgroundApp);
        assert_eq!(i.state_from_gesture_end_target(GestureEndTarget::LastTask), LauncherState::BackgroundApp);
    }

    #[test]
    fn test_calls_without_surface_are_noops() {
        let session = SessionContext::new();
        let i = LauncherActivityInterface;
        i.on_assistant_visibility_changed(&session, 0.5);
        i.on_launch_task_failed(&session);
        assert!(!i.switch_to_recents_if_visible(&session, Box::new(|| {})));
        assert!(!i.is_in_live_tile_mode(&session));
        assert!(i.visible_recents_view(&session).is_none());
    }

    #[test]
    fn test_switch_to_recents_when_visible() {
        let session = SessionContext::new();
        let surface = LauncherSurface::new(session.clone(), Size::from((720, 1440)), SurfaceTheme::Dark, Duration::ZERO);
        session.launcher_tracker().attach(&surface, true);
        surface.borrow_mut().on_start();
        surface.borrow_mut().on_resume();

        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        assert!(LauncherActivityInterface.switch_to_recents_if_visible(&session, Box::new(move || flag.set(true))));
        assert!(done.get());
        assert!(LauncherActivityInterface.is_in_live_tile_mode(&session));
        assert!(LauncherActivityInterface.visible_recents_view(&session).is_some());
    }

    #[test]
    fn test_scrim_dims_with_assistant() {
        let session = SessionContext::new();
        let surface = LauncherSurface::new(session.clone(), Size::from((720, 1440)), SurfaceTheme::Dark, Duration::ZERO);
        session.launcher_tracker().attach(&surface, false);
        LauncherActivityInterface.on_assistant_visibility_changed(&session, 1.0);

        let surface = surface.borrow();
        let scrim = LauncherActivityInterface.overview_scrim_color_for_state(surface.appearance(), LauncherState::Overview);
        assert_eq!(scrim[3], 0.0);
    }
}
