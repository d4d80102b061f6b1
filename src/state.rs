//! Touch interaction service - owner-thread state for the recents core
//!
//! Holds the device state, the session context, the overview host (launcher
//! or fallback) and the privileged helper status. Everything runs on the
//! thread that owns the calloop event loop; the compositor and the helper
//! thread reach it only through channels inserted with `insert_sources` and
//! `connect_helper`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use calloop::channel::{self, Event, Sender};
use calloop::LoopHandle;
use smithay::utils::{Logical, Point, Rectangle, Size};

use crate::animation::{CompositorMessage, RemoteAnimationProvider};
use crate::config::Config;
use crate::end_target::GestureEndTarget;
use crate::error::{Error, Result};
use crate::handler::SwipeUpHandler;
use crate::helper::{HelperClient, HelperCommand, HelperJob, HelperMessage, HelperStatus, PrivilegedAction, PrivilegedHelper};
use crate::input::{GestureDeviceState, NavModeSignal, NavigationMode, Rotation, TouchEvent};
use crate::interface::{ActivityInterface, FallbackActivityInterface, LauncherActivityInterface};
use crate::session::SessionContext;
use crate::shell::{DeviceProfile, LauncherSurface, OverviewSurface, RecentsSurface, RecentsView, SurfaceTheme, TaskCard};
use crate::state_manager::{ListenerStatus, ShellState, StateListener, Subscription};

/// Which surface hosts overview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewHost {
    /// The launcher is the default home
    Launcher,
    /// Another app is home; overview runs in its own surface
    Fallback,
}

/// Transition log shared with the logger listener
pub type TransitionLog = Rc<RefCell<Vec<String>>>;

struct TransitionLogger {
    host: &'static str,
    log: TransitionLog,
}

impl<S: ShellState> StateListener<S> for TransitionLogger {
    fn on_state_transition_start(&mut self, to: S) {
        tracing::debug!(host = self.host, state = ?to, "Transition started");
        self.log.borrow_mut().push(format!("start {:?}", to));
    }

    fn on_state_transition_complete(&mut self, state: S) -> ListenerStatus {
        tracing::info!(host = self.host, ?state, "Transition complete");
        self.log.borrow_mut().push(format!("complete {:?}", state));
        ListenerStatus::Active
    }
}

/// Gesture handler plus the surface it drives, for one host kind
pub struct HostComponent<I: ActivityInterface> {
    handler: SwipeUpHandler<I>,
    surface: Option<Rc<RefCell<I::Surface>>>,
    log_subscription: Option<Subscription>,
}

impl<I: ActivityInterface> HostComponent<I> {
    fn new(handler: SwipeUpHandler<I>) -> Self {
        Self {
            handler,
            surface: None,
            log_subscription: None,
        }
    }

    pub fn handler(&self) -> &SwipeUpHandler<I> {
        &self.handler
    }

    pub fn surface(&self) -> Option<&Rc<RefCell<I::Surface>>> {
        self.surface.as_ref()
    }

    fn attach(&mut self, session: &SessionContext, surface: Rc<RefCell<I::Surface>>, on_home: bool, log: &TransitionLog) {
        self.destroy(session);
        let subscription = surface.borrow_mut().state_manager_mut().add_state_listener(Box::new(TransitionLogger {
            host: I::NAME,
            log: log.clone(),
        }));
        surface.borrow_mut().on_start();
        I::tracker(session).attach(&surface, on_home);
        self.surface = Some(surface);
        self.log_subscription = Some(subscription);
        tracing::info!(host = I::NAME, on_home, "Overview surface created");
    }

    fn destroy(&mut self, session: &SessionContext) {
        let Some(surface) = self.surface.take() else {
            return;
        };
        {
            let mut surface = surface.borrow_mut();
            if let Some(subscription) = self.log_subscription.take() {
                surface.state_manager_mut().remove_state_listener(subscription);
            }
            surface.clear_exit_subscriptions();
            surface.on_stop();
        }
        I::tracker(session).detach();
        tracing::info!(host = I::NAME, "Overview surface destroyed");
    }

    fn with_surface(&self, f: impl FnOnce(&mut I::Surface)) {
        if let Some(surface) = &self.surface {
            f(&mut surface.borrow_mut());
        }
    }

    fn current_state(&self) -> Option<String> {
        let surface = self.surface.as_ref()?;
        let state = surface.borrow().state_manager().state();
        Some(format!("{:?}", state))
    }

    fn on_display_rotation(&self, device: &GestureDeviceState) {
        let Some(surface) = &self.surface else {
            return;
        };
        let dp = DeviceProfile::new(device);
        let (task_rect, _) = self
            .handler
            .interface()
            .swipe_up_destination_and_length(&dp, device.current_navigation_mode());
        let view = surface.borrow().recents_view();
        view.borrow_mut().set_task_rect(dp.size(), task_rect);
        view.borrow_mut()
            .set_layout_rotation(device.active_rotation(), device.display_rotation());
        surface.borrow_mut().state_manager_mut().reapply_state();
    }

    fn tick(&mut self, dt: Duration) {
        if let Some(surface) = &self.surface {
            surface.borrow_mut().state_manager_mut().advance(dt);
            let view = surface.borrow().recents_view();
            let home_requested = {
                let mut view = view.borrow_mut();
                view.tick(dt.as_secs_f64());
                view.take_home_request()
            };
            if home_requested {
                tracing::debug!(host = I::NAME, "Recents view asked for home");
                surface.borrow_mut().state_manager_mut().go_to_state(I::HOME_STATE, true, None);
            }
        }
        self.handler.tick();
    }
}

/// Closed set of overview hosts
pub enum OverviewComponent {
    Launcher(HostComponent<LauncherActivityInterface>),
    Fallback(HostComponent<FallbackActivityInterface>),
}

impl OverviewComponent {
    pub fn host(&self) -> OverviewHost {
        match self {
            OverviewComponent::Launcher(_) => OverviewHost::Launcher,
            OverviewComponent::Fallback(_) => OverviewHost::Fallback,
        }
    }
}

pub struct TouchInteractionService {
    config: Config,
    device: GestureDeviceState,
    session: Rc<SessionContext>,
    component: OverviewComponent,
    theme: SurfaceTheme,
    transition_log: TransitionLog,
    overview_exits: Rc<Cell<u32>>,
    helper: HelperClient,
    notifications: Vec<String>,
    last_frame: Option<Duration>,
}

impl TouchInteractionService {
    pub fn new(config: Config, host: OverviewHost, provider: Box<dyn RemoteAnimationProvider>) -> Self {
        let session = SessionContext::new();
        let natural_size = Size::from((config.display.width, config.display.height));
        let device = GestureDeviceState::new(
            config.gesture.clone(),
            natural_size,
            NavModeSignal::new(NavigationMode::NoButton),
        );
        let component = match host {
            OverviewHost::Launcher => OverviewComponent::Launcher(HostComponent::new(SwipeUpHandler::new(
                LauncherActivityInterface,
                session.clone(),
                &config,
                provider,
            ))),
            OverviewHost::Fallback => OverviewComponent::Fallback(HostComponent::new(SwipeUpHandler::new(
                FallbackActivityInterface,
                session.clone(),
                &config,
                provider,
            ))),
        };
        tracing::info!(?host, "Touch interaction service started");

        Self {
            config,
            device,
            session,
            component,
            theme: SurfaceTheme::default(),
            transition_log: Rc::new(RefCell::new(Vec::new())),
            overview_exits: Rc::new(Cell::new(0)),
            helper: HelperClient::default(),
            notifications: Vec::new(),
            last_frame: None,
        }
    }

    pub fn host(&self) -> OverviewHost {
        self.component.host()
    }

    pub fn component(&self) -> &OverviewComponent {
        &self.component
    }

    pub fn device(&self) -> &GestureDeviceState {
        &self.device
    }

    pub fn session(&self) -> &Rc<SessionContext> {
        &self.session
    }

    /// Theme for surfaces created from now on
    pub fn set_theme(&mut self, theme: SurfaceTheme) {
        tracing::debug!(?theme, "Surface theme changed");
        self.theme = theme;
    }

    /// Compositor messages arrive on the returned sender; the loop hands
    /// them to this service on the owner thread.
    pub fn insert_sources(handle: &LoopHandle<'static, Self>) -> Result<Sender<CompositorMessage>> {
        let (sender, compositor_channel) = channel::channel();
        handle
            .insert_source(compositor_channel, |event, _, service| match event {
                Event::Msg(message) => service.on_compositor_message(message),
                Event::Closed => tracing::info!("Compositor channel closed"),
            })
            .map_err(|e| e.error)?;
        Ok(sender)
    }

    /// Start the privileged helper thread. The connection and every action
    /// run there; results come back through the loop.
    pub fn connect_helper<F>(&mut self, handle: &LoopHandle<'static, Self>, connector: F) -> Result<()>
    where
        F: FnOnce() -> Result<Box<dyn PrivilegedHelper>> + Send + 'static,
    {
        let (sender, helper_channel) = channel::channel();
        handle
            .insert_source(helper_channel, |event, _, service| {
                if let Event::Msg(message) = event {
                    service.on_helper_message(message);
                }
            })
            .map_err(|e| e.error)?;
        self.helper.connect(connector, sender)
    }

    pub fn helper_status(&self) -> &HelperStatus {
        self.helper.status()
    }

    fn on_helper_message(&mut self, message: HelperMessage) {
        let Some((job, result)) = self.helper.on_message(message) else {
            return;
        };
        match result {
            Ok(()) => tracing::info!(action = %job.action, "Privileged action done"),
            Err(reason) => {
                let e = Error::ServiceUnavailable(reason);
                self.report_privileged_failure(job.action, job.user_invoked, &e);
            }
        }
    }

    // Surface lifecycle

    pub fn create_surface(&mut self, already_on_home: bool) {
        let size = self.device.screen_size();
        let duration = self.config.animation.transition_duration();
        match &mut self.component {
            OverviewComponent::Launcher(c) => {
                let surface = LauncherSurface::new(self.session.clone(), size, self.theme, duration);
                c.attach(&self.session, surface, already_on_home, &self.transition_log);
                c.on_display_rotation(&self.device);
            }
            OverviewComponent::Fallback(c) => {
                let surface = RecentsSurface::new(self.session.clone(), size, self.theme, duration);
                c.attach(&self.session, surface, already_on_home, &self.transition_log);
                c.on_display_rotation(&self.device);
            }
        }
    }

    pub fn resume_surface(&mut self) {
        match &self.component {
            OverviewComponent::Launcher(c) => c.with_surface(|s| s.on_resume()),
            OverviewComponent::Fallback(c) => c.with_surface(|s| s.on_resume()),
        }
    }

    pub fn pause_surface(&mut self) {
        match &self.component {
            OverviewComponent::Launcher(c) => c.with_surface(|s| s.on_pause()),
            OverviewComponent::Fallback(c) => c.with_surface(|s| s.on_pause()),
        }
    }

    pub fn stop_surface(&mut self) {
        match &self.component {
            OverviewComponent::Launcher(c) => c.with_surface(|s| s.on_stop()),
            OverviewComponent::Fallback(c) => c.with_surface(|s| s.on_stop()),
        }
    }

    pub fn destroy_surface(&mut self) {
        match &mut self.component {
            OverviewComponent::Launcher(c) => c.destroy(&self.session),
            OverviewComponent::Fallback(c) => c.destroy(&self.session),
        }
    }

    pub fn set_recent_tasks(&mut self, tasks: Vec<TaskCard>) {
        self.with_recents_view(|view| view.set_tasks(tasks));
    }

    fn recents_view(&self) -> Option<Rc<RefCell<RecentsView>>> {
        match &self.component {
            OverviewComponent::Launcher(c) => c.surface().map(|s| s.borrow().recents_view()),
            OverviewComponent::Fallback(c) => c.surface().map(|s| s.borrow().recents_view()),
        }
    }

    fn with_recents_view(&self, f: impl FnOnce(&mut RecentsView)) {
        if let Some(view) = self.recents_view() {
            f(&mut view.borrow_mut());
        }
    }

    /// Finger dragging the task cards sideways by `dx`
    pub fn scroll_recents(&mut self, dx: f64) {
        self.with_recents_view(|view| view.scroll_by(dx));
    }

    /// Finger lifted from the task cards
    pub fn release_recents_scroll(&mut self) {
        self.with_recents_view(|view| view.snap_to_nearest_page());
    }

    /// Tap in the recents view. Returns the task under the point.
    pub fn task_at(&self, pos: Point<f64, Logical>) -> Option<u32> {
        let view = self.recents_view()?;
        let task = view.borrow().hit_test(pos);
        task
    }

    // Input and host signals

    pub fn on_touch_event(&mut self, event: &TouchEvent) {
        match &mut self.component {
            OverviewComponent::Launcher(c) => c.handler.on_touch_event(event, &self.device),
            OverviewComponent::Fallback(c) => c.handler.on_touch_event(event, &self.device),
        }
    }

    pub fn on_compositor_message(&mut self, message: CompositorMessage) {
        match message {
            CompositorMessage::ContentAvailable(content) => match &mut self.component {
                OverviewComponent::Launcher(c) => c.handler.on_animation_content_available(content),
                OverviewComponent::Fallback(c) => c.handler.on_animation_content_available(content),
            },
            CompositorMessage::Canceled { gesture_id } => match &mut self.component {
                OverviewComponent::Launcher(c) => c.handler.on_animation_canceled(gesture_id),
                OverviewComponent::Fallback(c) => c.handler.on_animation_canceled(gesture_id),
            },
        }
    }

    pub fn on_navigation_mode(&mut self, mode: NavigationMode) {
        tracing::info!(?mode, "Navigation mode changed");
        self.device.nav_mode_signal().set(mode);
    }

    pub fn on_display_rotation(&mut self, rotation: Rotation) {
        self.device.on_display_rotation(rotation);
        match &self.component {
            OverviewComponent::Launcher(c) => c.on_display_rotation(&self.device),
            OverviewComponent::Fallback(c) => c.on_display_rotation(&self.device),
        }
    }

    pub fn set_rotation_locked(&mut self, locked: bool) {
        self.device.set_rotation_locked(locked);
    }

    pub fn set_excluded_regions(&mut self, regions: Vec<Rectangle<f64, Logical>>) {
        tracing::debug!(count = regions.len(), "Gesture exclusion regions changed");
        self.device.set_excluded_regions(regions);
    }

    /// On-screen keyboard bounds; swipes never start inside them
    pub fn set_keyboard_region(&mut self, region: Option<Rectangle<f64, Logical>>) {
        tracing::debug!(shown = region.is_some(), "Keyboard region changed");
        self.device.set_keyboard_region(region);
    }

    pub fn set_assistant_visibility(&mut self, visibility: f32) {
        match &self.component {
            OverviewComponent::Launcher(c) => {
                c.handler.interface().on_assistant_visibility_changed(&self.session, visibility)
            }
            OverviewComponent::Fallback(c) => {
                c.handler.interface().on_assistant_visibility_changed(&self.session, visibility)
            }
        }
    }

    pub fn set_one_handed(&mut self, activated: bool) {
        match &self.component {
            OverviewComponent::Launcher(c) => {
                c.handler.interface().on_one_handed_mode_state_changed(&self.session, activated)
            }
            OverviewComponent::Fallback(c) => {
                c.handler.interface().on_one_handed_mode_state_changed(&self.session, activated)
            }
        }
    }

    /// Advance animations to the monotonic time `now`
    pub fn tick(&mut self, now: Duration) {
        let dt = self.last_frame.map_or(Duration::ZERO, |last| now.saturating_sub(last));
        self.last_frame = Some(now);
        match &mut self.component {
            OverviewComponent::Launcher(c) => c.tick(dt),
            OverviewComponent::Fallback(c) => c.tick(dt),
        }
    }

    pub fn on_launch_task_failed(&mut self) {
        tracing::warn!("Task launch failed");
        match &self.component {
            OverviewComponent::Launcher(c) => c.handler.interface().on_launch_task_failed(&self.session),
            OverviewComponent::Fallback(c) => c.handler.interface().on_launch_task_failed(&self.session),
        }
    }

    /// Leave overview; counted in `overview_exits` once home is reached
    pub fn exit_overview(&mut self) {
        let exits = self.overview_exits.clone();
        let exit: Box<dyn FnOnce()> = Box::new(move || {
            exits.set(exits.get() + 1);
            tracing::info!("Exited overview");
        });
        match &self.component {
            OverviewComponent::Launcher(c) => c.handler.interface().on_exit_overview(&self.session, &self.device, exit),
            OverviewComponent::Fallback(c) => c.handler.interface().on_exit_overview(&self.session, &self.device, exit),
        }
    }

    pub fn overview_exits(&self) -> u32 {
        self.overview_exits.get()
    }

    pub fn switch_to_recents_if_visible(&mut self) -> bool {
        let done: Box<dyn FnOnce()> = Box::new(|| tracing::debug!("Switched to recents"));
        match &self.component {
            OverviewComponent::Launcher(c) => c.handler.interface().switch_to_recents_if_visible(&self.session, done),
            OverviewComponent::Fallback(c) => c.handler.interface().switch_to_recents_if_visible(&self.session, done),
        }
    }

    pub fn set_live_tile_mode(&mut self, enabled: bool) -> bool {
        match &mut self.component {
            OverviewComponent::Launcher(c) => c.handler.coordinator_mut().set_live_tile_mode(enabled),
            OverviewComponent::Fallback(c) => c.handler.coordinator_mut().set_live_tile_mode(enabled),
        }
    }

    pub fn live_tile_task(&self) -> Option<u32> {
        match &self.component {
            OverviewComponent::Launcher(c) => c.handler.coordinator().live_tile_task(),
            OverviewComponent::Fallback(c) => c.handler.coordinator().live_tile_task(),
        }
    }

    pub fn active_gesture_id(&self) -> Option<u32> {
        match &self.component {
            OverviewComponent::Launcher(c) => c.handler.coordinator().active_gesture_id(),
            OverviewComponent::Fallback(c) => c.handler.coordinator().active_gesture_id(),
        }
    }

    pub fn last_end_target(&self) -> Option<GestureEndTarget> {
        match &self.component {
            OverviewComponent::Launcher(c) => c.handler.last_end_target(),
            OverviewComponent::Fallback(c) => c.handler.last_end_target(),
        }
    }

    /// Committed state of the overview surface, `None` without a surface
    pub fn current_state(&self) -> Option<String> {
        match &self.component {
            OverviewComponent::Launcher(c) => c.current_state(),
            OverviewComponent::Fallback(c) => c.current_state(),
        }
    }

    pub fn transition_log(&self) -> Vec<String> {
        self.transition_log.borrow().clone()
    }

    /// Queue a privileged action on the helper thread. Failures, now or
    /// when the helper reports back, only turn into a user notification
    /// when the user asked for the action.
    pub fn request_privileged(&mut self, action: PrivilegedAction, user_invoked: bool) -> Result<()> {
        let queued = self.resolve_privileged(action).and_then(|command| {
            self.helper.submit(HelperJob {
                action,
                command,
                user_invoked,
            })
        });
        match queued {
            Ok(()) => {
                tracing::debug!(%action, "Privileged action queued");
                Ok(())
            }
            Err(e) => {
                self.report_privileged_failure(action, user_invoked, &e);
                Err(e)
            }
        }
    }

    fn resolve_privileged(&self, action: PrivilegedAction) -> Result<HelperCommand> {
        match action {
            PrivilegedAction::SleepDisplay => Ok(HelperCommand::LockSessions),
            PrivilegedAction::ForceStopTask(task_id) => {
                let pid = self.recents_view().and_then(|view| {
                    let pid = view.borrow().task(task_id).and_then(|t| t.pid);
                    pid
                });
                pid.map(|pid| HelperCommand::KillProcess { pid })
                    .ok_or(Error::UnknownTaskProcess { task_id })
            }
        }
    }

    fn report_privileged_failure(&mut self, action: PrivilegedAction, user_invoked: bool, e: &Error) {
        if user_invoked && e.is_user_visible() {
            tracing::warn!(%action, "Privileged action failed: {}", e);
            self.notifications.push(format!("Could not {}: {}", action, e));
        } else {
            tracing::debug!(%action, "Privileged action skipped: {}", e);
        }
    }

    /// User-facing notifications raised so far
    pub fn notifications(&self) -> &[String] {
        &self.notifications
    }
}

impl Drop for TouchInteractionService {
    fn drop(&mut self) {
        self.destroy_surface();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{running_app_content, ProviderCall, RecordingProvider};
    use std::sync::{Arc, Mutex};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn service(host: OverviewHost) -> (TouchInteractionService, Rc<RefCell<Vec<ProviderCall>>>) {
        let provider = RecordingProvider::default();
        let calls = provider.calls.clone();
        (TouchInteractionService::new(Config::default(), host, Box::new(provider)), calls)
    }

    fn touch(kind: &str, y: f64, t: u64) -> TouchEvent {
        let position = Point::from((360.0, y));
        match kind {
            "down" => TouchEvent::Down { slot: 0, position, time: ms(t) },
            "move" => TouchEvent::Motion { slot: 0, position, time: ms(t) },
            _ => TouchEvent::Up { slot: 0, time: ms(t) },
        }
    }

    fn run_frames(service: &mut TouchInteractionService, from: u64, count: u64) {
        for i in 0..count {
            service.tick(ms(from + i * 16));
        }
    }

    #[test]
    fn test_fling_into_recents_end_to_end() {
        let (mut service, calls) = service(OverviewHost::Launcher);
        service.create_surface(false);
        service.set_recent_tasks(vec![TaskCard::new(3, "Terminal", "foot"), TaskCard::new(8, "Files", "nautilus")]);
        assert_eq!(service.current_state().as_deref(), Some("Normal"));

        service.on_touch_event(&touch("down", 1400.0, 0));
        let gesture_id = service.active_gesture_id().unwrap();
        service.on_compositor_message(CompositorMessage::ContentAvailable(running_app_content(gesture_id, 8)));
        service.on_touch_event(&touch("move", 1370.0, 10));
        service.on_touch_event(&touch("move", 1330.0, 20));
        service.on_touch_event(&touch("move", 1300.0, 30));
        service.on_touch_event(&touch("up", 0.0, 32));
        run_frames(&mut service, 40, 40);

        assert_eq!(service.last_end_target(), Some(GestureEndTarget::Recents));
        assert_eq!(service.current_state().as_deref(), Some("Overview"));
        assert_eq!(service.live_tile_task(), Some(8));
        assert_eq!(service.session().live_factory_count(), 0);
        assert!(service.transition_log().contains(&"complete Overview".to_string()));
        // The running app's card is the one in view
        assert_eq!(service.task_at(Point::from((360.0, 600.0))), Some(8));
        // Live tile keeps the app surface, the compositor has not been told to finish
        assert!(!calls.borrow().iter().any(|c| matches!(c, ProviderCall::Finish { .. })));

        // Leaving live tile snapshots before releasing
        assert!(service.set_live_tile_mode(false));
        let calls = calls.borrow();
        let snapshot = calls.iter().position(|c| *c == ProviderCall::Snapshot(8));
        let release = calls.iter().position(|c| matches!(c, ProviderCall::Release(_)));
        assert!(snapshot.unwrap() < release.unwrap());
    }

    #[test]
    fn test_content_never_arrives() {
        let (mut service, calls) = service(OverviewHost::Fallback);
        service.create_surface(false);

        service.on_touch_event(&touch("down", 1400.0, 0));
        service.on_touch_event(&touch("move", 1370.0, 10));
        service.on_touch_event(&touch("move", 1330.0, 20));
        service.on_touch_event(&touch("move", 1300.0, 30));
        service.on_touch_event(&touch("up", 0.0, 32));
        run_frames(&mut service, 40, 40);

        assert_eq!(service.current_state().as_deref(), Some("Default"));
        assert_eq!(service.session().dropped_content_count(), 1);
        assert_eq!(service.live_tile_task(), None);
        assert_eq!(service.session().live_factory_count(), 0);
        assert!(service.notifications().is_empty());
        assert!(calls.borrow().iter().all(|c| !matches!(c, ProviderCall::Transaction(_))));
    }

    #[test]
    fn test_exit_overview_waits_for_home() {
        let (mut service, _calls) = service(OverviewHost::Fallback);
        service.create_surface(false);
        service.on_touch_event(&touch("down", 1400.0, 0));
        service.on_touch_event(&touch("move", 1370.0, 10));
        service.on_touch_event(&touch("move", 1330.0, 20));
        service.on_touch_event(&touch("move", 1300.0, 30));
        service.on_touch_event(&touch("up", 0.0, 32));
        run_frames(&mut service, 40, 40);

        service.exit_overview();
        assert_eq!(service.overview_exits(), 0);

        service.on_launch_task_failed();
        run_frames(&mut service, 700, 40);
        assert_eq!(service.current_state().as_deref(), Some("Home"));
        assert_eq!(service.overview_exits(), 1);
    }

    #[test]
    fn test_second_exit_request_keeps_the_first() {
        let (mut service, _calls) = service(OverviewHost::Launcher);
        service.create_surface(false);
        service.on_touch_event(&touch("down", 1400.0, 0));
        service.on_touch_event(&touch("move", 1370.0, 10));
        service.on_touch_event(&touch("move", 1330.0, 20));
        service.on_touch_event(&touch("move", 1300.0, 30));
        service.on_touch_event(&touch("up", 0.0, 32));
        run_frames(&mut service, 40, 40);
        assert_eq!(service.current_state().as_deref(), Some("Overview"));

        service.exit_overview();
        service.exit_overview();
        assert_eq!(service.overview_exits(), 0);

        let OverviewComponent::Launcher(c) = service.component() else {
            panic!("launcher host expected");
        };
        c.surface()
            .unwrap()
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(crate::shell::LauncherState::Normal, false, None);
        assert_eq!(service.overview_exits(), 2);
    }

    #[test]
    fn test_launch_failure_ends_live_tile() {
        let (mut service, calls) = service(OverviewHost::Fallback);
        service.create_surface(false);
        service.set_recent_tasks(vec![TaskCard::new(8, "Files", "nautilus")]);

        service.on_touch_event(&touch("down", 1400.0, 0));
        let gesture_id = service.active_gesture_id().unwrap();
        service.on_compositor_message(CompositorMessage::ContentAvailable(running_app_content(gesture_id, 8)));
        service.on_touch_event(&touch("move", 1370.0, 10));
        service.on_touch_event(&touch("move", 1330.0, 20));
        service.on_touch_event(&touch("move", 1300.0, 30));
        service.on_touch_event(&touch("up", 0.0, 32));
        run_frames(&mut service, 40, 40);
        assert_eq!(service.live_tile_task(), Some(8));

        service.on_launch_task_failed();
        run_frames(&mut service, 700, 40);
        assert_eq!(service.current_state().as_deref(), Some("Home"));
        assert_eq!(service.live_tile_task(), None);

        let calls = calls.borrow();
        let snapshot = calls.iter().position(|c| *c == ProviderCall::Snapshot(8));
        let release = calls.iter().position(|c| matches!(c, ProviderCall::Release(_)));
        assert!(snapshot.unwrap() < release.unwrap());
        assert!(calls.contains(&ProviderCall::Finish { gesture_id, to_home: true }));
    }

    #[test]
    fn test_gesture_without_surface_is_harmless() {
        let (mut service, _calls) = service(OverviewHost::Launcher);
        service.on_touch_event(&touch("down", 1400.0, 0));
        service.on_touch_event(&touch("move", 1300.0, 30));
        service.on_touch_event(&touch("up", 0.0, 32));
        run_frames(&mut service, 40, 20);

        assert_eq!(service.current_state(), None);
        assert_eq!(service.session().live_factory_count(), 0);
        service.exit_overview();
        assert_eq!(service.overview_exits(), 1);
        assert!(!service.switch_to_recents_if_visible());
        service.on_launch_task_failed();
    }

    #[test]
    fn test_rotation_reaches_the_recents_view() {
        let (mut service, _calls) = service(OverviewHost::Launcher);
        service.create_surface(true);
        service.set_rotation_locked(true);
        service.on_display_rotation(Rotation::Rotated90);

        let OverviewComponent::Launcher(c) = service.component() else {
            panic!("launcher host expected");
        };
        let view = c.surface().unwrap().borrow().recents_view();
        assert_eq!(view.borrow().layout_rotation(), (Rotation::Natural, Rotation::Rotated90));
        assert_eq!(view.borrow().screen_size(), Size::from((1440, 720)));
    }

    #[test]
    fn test_destroy_unsubscribes_logger() {
        let (mut service, _calls) = service(OverviewHost::Launcher);
        service.create_surface(false);
        let surface = match service.component() {
            OverviewComponent::Launcher(c) => c.surface().unwrap().clone(),
            OverviewComponent::Fallback(_) => panic!("launcher host expected"),
        };
        service.destroy_surface();
        surface
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(crate::shell::LauncherState::Overview, false, None);
        assert!(service.transition_log().is_empty());
        assert_eq!(service.current_state(), None);
    }

    #[test]
    fn test_helper_failures_surface_only_when_user_invoked() {
        let (mut service, _calls) = service(OverviewHost::Launcher);
        assert!(service.request_privileged(PrivilegedAction::SleepDisplay, false).is_err());
        assert!(service.notifications().is_empty());

        assert!(service.request_privileged(PrivilegedAction::ForceStopTask(2), true).is_err());
        assert_eq!(service.notifications().len(), 1);
    }

    struct ScriptedHelper {
        ran: Arc<Mutex<Vec<HelperCommand>>>,
        fail: bool,
    }

    impl PrivilegedHelper for ScriptedHelper {
        fn run(&mut self, command: HelperCommand) -> Result<()> {
            self.ran.lock().unwrap().push(command);
            if self.fail {
                return Err(Error::ServiceUnavailable("denied".into()));
            }
            Ok(())
        }
    }

    type HelperLoop = calloop::EventLoop<'static, TouchInteractionService>;

    fn with_helper(fail: bool) -> (HelperLoop, TouchInteractionService, Arc<Mutex<Vec<HelperCommand>>>) {
        let mut event_loop: HelperLoop = calloop::EventLoop::try_new().unwrap();
        let (mut service, _calls) = service(OverviewHost::Fallback);
        let ran = Arc::new(Mutex::new(Vec::new()));
        let recorder = ran.clone();
        service
            .connect_helper(&event_loop.handle(), move || {
                let helper: Box<dyn PrivilegedHelper> = Box::new(ScriptedHelper { ran: recorder, fail });
                Ok(helper)
            })
            .unwrap();
        pump(&mut event_loop, &mut service, |s| s.helper_status() == &HelperStatus::Connected);
        (event_loop, service, ran)
    }

    fn pump(event_loop: &mut HelperLoop, service: &mut TouchInteractionService, done: impl Fn(&TouchInteractionService) -> bool) {
        for _ in 0..50 {
            if done(service) {
                return;
            }
            event_loop.dispatch(Some(ms(20)), service).unwrap();
        }
    }

    #[test]
    fn test_force_stop_kills_the_task_process() {
        let (mut event_loop, mut service, ran) = with_helper(false);
        service.create_surface(false);
        service.set_recent_tasks(vec![
            TaskCard::new(8, "Files", "nautilus").with_pid(Some(4242)),
            TaskCard::new(9, "Terminal", "foot"),
        ]);

        service.request_privileged(PrivilegedAction::ForceStopTask(8), true).unwrap();
        pump(&mut event_loop, &mut service, |_| !ran.lock().unwrap().is_empty());
        assert_eq!(*ran.lock().unwrap(), vec![HelperCommand::KillProcess { pid: 4242 }]);

        // No process reported for the task: nothing is killed
        let err = service.request_privileged(PrivilegedAction::ForceStopTask(9), true).unwrap_err();
        assert!(matches!(err, Error::UnknownTaskProcess { task_id: 9 }));
        assert_eq!(service.notifications().len(), 1);
        event_loop.dispatch(Some(ms(20)), &mut service).unwrap();
        assert_eq!(ran.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_helper_rejection_notifies_when_it_reports_back() {
        let (mut event_loop, mut service, ran) = with_helper(true);

        // Queued without waiting for the helper
        service.request_privileged(PrivilegedAction::SleepDisplay, true).unwrap();
        assert!(service.notifications().is_empty());

        pump(&mut event_loop, &mut service, |s| !s.notifications().is_empty());
        assert_eq!(*ran.lock().unwrap(), vec![HelperCommand::LockSessions]);
        assert_eq!(service.notifications().len(), 1);
        assert!(service.notifications()[0].contains("denied"));
    }

    #[test]
    fn test_messages_dispatch_through_the_event_loop() {
        let mut event_loop: calloop::EventLoop<TouchInteractionService> = calloop::EventLoop::try_new().unwrap();
        let (mut service, _calls) = service(OverviewHost::Launcher);
        let sender = TouchInteractionService::insert_sources(&event_loop.handle()).unwrap();
        service.create_surface(false);

        service.on_touch_event(&touch("down", 1400.0, 0));
        let gesture_id = service.active_gesture_id().unwrap();

        // Content is built on another thread, as the compositor would
        let content = std::thread::spawn(move || running_app_content(gesture_id, 4)).join().unwrap();
        sender.send(CompositorMessage::ContentAvailable(Arc::clone(&content))).unwrap();
        event_loop.dispatch(Some(ms(0)), &mut service).unwrap();

        service.on_touch_event(&touch("move", 1370.0, 10));
        service.on_touch_event(&touch("move", 1330.0, 20));
        service.on_touch_event(&touch("move", 1300.0, 30));
        service.on_touch_event(&touch("up", 0.0, 32));
        assert_eq!(service.live_tile_task(), Some(4));
    }
}
