//! Overview host surfaces
//!
//! `LauncherSurface` is the home screen with overview embedded in it;
//! `RecentsSurface` is the standalone fallback used when another app is the
//! default home. Both own a state manager and share a recents view with
//! whoever needs to lay it out.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use smithay::utils::{Logical, Size};

use super::recents_view::RecentsView;
use super::states::{LauncherState, RecentsState, SurfaceTheme};
use crate::interface::{ActivityInterface, FallbackActivityInterface, LauncherActivityInterface};
use crate::session::SessionContext;
use crate::state_manager::{ShellState, StateManager, Subscription};

/// Surface lifecycle as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Started,
    Resumed,
    Paused,
    Stopped,
}

/// What the scrim color depends on besides the state. Shared with the
/// state resolver, which reads it on every reapply.
#[derive(Debug, Default)]
pub struct SurfaceAppearance {
    theme: SurfaceTheme,
    assistant_visibility: Cell<f32>,
}

impl SurfaceAppearance {
    pub fn new(theme: SurfaceTheme) -> Self {
        Self {
            theme,
            assistant_visibility: Cell::new(0.0),
        }
    }

    pub fn theme(&self) -> SurfaceTheme {
        self.theme
    }

    pub fn assistant_visibility(&self) -> f32 {
        self.assistant_visibility.get()
    }
}

/// Parts every overview surface has
pub struct SurfaceCore {
    recents_view: Rc<RefCell<RecentsView>>,
    lifecycle: Lifecycle,
    has_been_resumed: bool,
    appearance: Rc<SurfaceAppearance>,
    exit_subscriptions: Vec<Subscription>,
}

impl SurfaceCore {
    fn new(screen_size: Size<i32, Logical>, appearance: Rc<SurfaceAppearance>) -> Self {
        Self {
            recents_view: Rc::new(RefCell::new(RecentsView::new(screen_size))),
            lifecycle: Lifecycle::Created,
            has_been_resumed: false,
            appearance,
            exit_subscriptions: Vec::new(),
        }
    }
}

pub trait OverviewSurface {
    type State: ShellState;

    fn core(&self) -> &SurfaceCore;
    fn core_mut(&mut self) -> &mut SurfaceCore;
    fn state_manager(&self) -> &StateManager<Self::State>;
    fn state_manager_mut(&mut self) -> &mut StateManager<Self::State>;

    fn recents_view(&self) -> Rc<RefCell<RecentsView>> {
        self.core().recents_view.clone()
    }

    fn appearance(&self) -> &SurfaceAppearance {
        &self.core().appearance
    }

    fn theme(&self) -> SurfaceTheme {
        self.core().appearance.theme()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.core().lifecycle
    }

    fn has_been_resumed(&self) -> bool {
        self.core().has_been_resumed
    }

    fn is_started(&self) -> bool {
        matches!(
            self.core().lifecycle,
            Lifecycle::Started | Lifecycle::Resumed | Lifecycle::Paused
        )
    }

    fn on_start(&mut self) {
        self.core_mut().lifecycle = Lifecycle::Started;
    }

    fn on_resume(&mut self) {
        let core = self.core_mut();
        core.lifecycle = Lifecycle::Resumed;
        core.has_been_resumed = true;
    }

    fn on_pause(&mut self) {
        self.core_mut().lifecycle = Lifecycle::Paused;
    }

    fn on_stop(&mut self) {
        self.core_mut().lifecycle = Lifecycle::Stopped;
    }

    /// Keep a pending exit-overview listener until the surface goes away
    fn add_exit_subscription(&mut self, subscription: Subscription) {
        let mut pending = std::mem::take(&mut self.core_mut().exit_subscriptions);
        pending.retain(|s| self.state_manager().has_state_listener(s));
        pending.push(subscription);
        self.core_mut().exit_subscriptions = pending;
    }

    /// Unsubscribe every exit-overview listener that has not fired yet
    fn clear_exit_subscriptions(&mut self) {
        let pending = std::mem::take(&mut self.core_mut().exit_subscriptions);
        for subscription in pending {
            self.state_manager_mut().remove_state_listener(subscription);
        }
    }
}

/// Home surface with overview embedded
pub struct LauncherSurface {
    core: SurfaceCore,
    state_manager: StateManager<LauncherState>,
    one_handed: bool,
}

impl LauncherSurface {
    pub fn new(
        session: Rc<SessionContext>,
        screen_size: Size<i32, Logical>,
        theme: SurfaceTheme,
        transition_duration: Duration,
    ) -> Rc<RefCell<Self>> {
        let appearance = Rc::new(SurfaceAppearance::new(theme));
        let resolver_appearance = appearance.clone();
        let state_manager = StateManager::new(
            LauncherState::Normal,
            session,
            Box::new(move |state: LauncherState| {
                let scrim = LauncherActivityInterface.overview_scrim_color_for_state(&resolver_appearance, state);
                state.visuals(scrim)
            }),
            transition_duration,
        );

        Rc::new(RefCell::new(Self {
            core: SurfaceCore::new(screen_size, appearance),
            state_manager,
            one_handed: false,
        }))
    }

    pub fn assistant_visibility(&self) -> f32 {
        self.core.appearance.assistant_visibility()
    }

    pub fn set_assistant_visibility(&mut self, visibility: f32) {
        self.core.appearance.assistant_visibility.set(visibility.clamp(0.0, 1.0));
        self.state_manager.reapply_state();
    }

    pub fn is_one_handed(&self) -> bool {
        self.one_handed
    }

    pub fn set_one_handed(&mut self, activated: bool) {
        self.one_handed = activated;
    }
}

impl OverviewSurface for LauncherSurface {
    type State = LauncherState;

    fn core(&self) -> &SurfaceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SurfaceCore {
        &mut self.core
    }

    fn state_manager(&self) -> &StateManager<LauncherState> {
        &self.state_manager
    }

    fn state_manager_mut(&mut self) -> &mut StateManager<LauncherState> {
        &mut self.state_manager
    }
}

/// Standalone recents surface
pub struct RecentsSurface {
    core: SurfaceCore,
    state_manager: StateManager<RecentsState>,
}

impl RecentsSurface {
    pub fn new(
        session: Rc<SessionContext>,
        screen_size: Size<i32, Logical>,
        theme: SurfaceTheme,
        transition_duration: Duration,
    ) -> Rc<RefCell<Self>> {
        let appearance = Rc::new(SurfaceAppearance::new(theme));
        let resolver_appearance = appearance.clone();
        let state_manager = StateManager::new(
            RecentsState::Home,
            session,
            Box::new(move |state: RecentsState| {
                let scrim = FallbackActivityInterface.overview_scrim_color_for_state(&resolver_appearance, state);
                state.visuals(scrim)
            }),
            transition_duration,
        );
        Rc::new(RefCell::new(Self {
            core: SurfaceCore::new(screen_size, appearance),
            state_manager,
        }))
    }
}

impl OverviewSurface for RecentsSurface {
    type State = RecentsState;

    fn core(&self) -> &SurfaceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SurfaceCore {
        &mut self.core
    }

    fn state_manager(&self) -> &StateManager<RecentsState> {
        &self.state_manager
    }

    fn state_manager_mut(&mut self) -> &mut StateManager<RecentsState> {
        &mut self.state_manager
    }
}
