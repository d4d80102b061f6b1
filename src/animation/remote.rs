//! Remote animation handshake with the compositor
//!
//! The compositor delivers animation content for a gesture zero or one time,
//! possibly after tracking started, and may cancel it. Both the content and
//! the local gesture completion arrive as events on the owner thread; the
//! coordinator keeps one active factory and decides per event whether the
//! content still belongs to it.
//!
//! Live tile: after a swipe into recents the running app's own surface stays
//! on screen in the task card slot. Leaving live tile swaps it for a
//! snapshot, and the surface is only released once that snapshot exists.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use smithay::utils::{Logical, Rectangle, Size};

use super::factory::AnimationFactory;
use crate::end_target::GestureEndTarget;
use crate::error::Error;
use crate::input::GestureDeviceState;
use crate::interface::ActivityInterface;
use crate::session::SessionContext;
use crate::shell::OverviewSurface;

/// Compositor surface handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    Opening,
    /// The app being swiped away from
    Closing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAnimationTarget {
    pub task_id: u32,
    pub surface: SurfaceHandle,
    pub bounds: Rectangle<i32, Logical>,
    pub mode: TargetMode,
    pub is_translucent: bool,
}

/// Animation content for one gesture. Shared with the compositor.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAnimationContent {
    pub gesture_id: u32,
    pub apps: Vec<RemoteAnimationTarget>,
    pub wallpapers: Vec<RemoteAnimationTarget>,
}

impl RemoteAnimationContent {
    /// The app the gesture started over
    pub fn running_task(&self) -> Option<&RemoteAnimationTarget> {
        self.apps.iter().find(|t| t.mode == TargetMode::Closing)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub task_id: u32,
    pub size: Size<i32, Logical>,
}

/// Per-frame transform for one compositor surface
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceTransaction {
    pub surface: SurfaceHandle,
    pub rect: Rectangle<f64, Logical>,
    pub alpha: f32,
    pub corner_radius: f64,
}

/// Compositor side of the handshake
pub trait RemoteAnimationProvider {
    fn apply_transaction(&mut self, transaction: &SurfaceTransaction);

    /// Snapshot of a task's current contents, `None` if it cannot be taken
    fn capture_snapshot(&mut self, task_id: u32) -> Option<TaskSnapshot>;

    /// Stop showing a live app surface
    fn release_surface(&mut self, surface: SurfaceHandle);

    /// End the compositor animation. `to_home` sends the app to the
    /// background; otherwise it returns to the front.
    fn finish(&mut self, gesture_id: u32, to_home: bool);

    /// Bring a task from recents to the front
    fn launch_task(&mut self, task_id: u32);
}

/// Messages from the compositor thread
#[derive(Debug, Clone)]
pub enum CompositorMessage {
    ContentAvailable(Arc<RemoteAnimationContent>),
    Canceled { gesture_id: u32 },
}

struct ActiveAnimation<I: ActivityInterface> {
    factory: AnimationFactory<I>,
    end_target: Option<GestureEndTarget>,
    /// Quick-switch destination, launched once the gesture settles
    launch: Option<u32>,
}

struct LiveTile {
    gesture_id: u32,
    task_id: u32,
    surface: SurfaceHandle,
    /// Keeps the content alive after the gesture's factory is gone
    _content: Arc<RemoteAnimationContent>,
}

pub struct RecentsAnimationCoordinator<I: ActivityInterface> {
    interface: I,
    session: Rc<SessionContext>,
    provider: Box<dyn RemoteAnimationProvider>,
    settle_duration: Duration,
    active: Option<ActiveAnimation<I>>,
    live_tile: Option<LiveTile>,
}

impl<I: ActivityInterface> RecentsAnimationCoordinator<I> {
    pub fn new(
        interface: I,
        session: Rc<SessionContext>,
        provider: Box<dyn RemoteAnimationProvider>,
        settle_duration: Duration,
    ) -> Self {
        Self {
            interface,
            session,
            provider,
            settle_duration,
            active: None,
            live_tile: None,
        }
    }

    pub fn active_gesture_id(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.factory.gesture_id())
    }

    pub fn live_tile_task(&self) -> Option<u32> {
        self.live_tile.as_ref().map(|t| t.task_id)
    }

    /// Start a factory for a new gesture. Any previous gesture is canceled
    /// first and a live tile is swapped for its snapshot. Returns the id the
    /// compositor content will carry.
    pub fn prepare_for_gesture(&mut self, device: &GestureDeviceState, activity_visible: bool) -> u32 {
        if let Some(previous) = self.active.take() {
            tracing::debug!(gesture_id = previous.factory.gesture_id(), "New gesture cancels the previous one");
            self.abort(previous);
        }
        self.leave_live_tile(true);

        let gesture_id = self.session.next_gesture_id();
        let factory = self
            .interface
            .prepare_recents_ui(&self.session, device, activity_visible, gesture_id);
        self.active = Some(ActiveAnimation {
            factory,
            end_target: None,
            launch: None,
        });
        tracing::info!(gesture_id, host = I::NAME, "Gesture tracking started");
        gesture_id
    }

    /// The host surface appeared after the gesture began
    pub fn on_surface_created(&mut self, already_on_home: bool) {
        if let Some(active) = self.active.as_mut() {
            active.factory.init_ui(already_on_home);
            self.apply_frame();
        }
    }

    pub fn on_animation_content_available(&mut self, content: Arc<RemoteAnimationContent>) {
        let gesture_id = content.gesture_id;
        let attached = match self.active.as_mut() {
            Some(active) if active.factory.gesture_id() == gesture_id => active.factory.attach_content(content),
            _ => false,
        };

        if attached {
            tracing::debug!(gesture_id, "Animation content attached");
            let running = self
                .active
                .as_ref()
                .and_then(|a| a.factory.content())
                .and_then(|c| c.running_task())
                .map(|t| t.task_id);
            if let Some(view) = self.recents_view() {
                view.borrow_mut().set_running_task(running);
            }
            self.apply_frame();
        } else {
            tracing::debug!(gesture_id, "Stale animation content, handing it back");
            self.provider.finish(gesture_id, false);
        }
    }

    pub fn on_animation_canceled(&mut self, gesture_id: u32) {
        if let Some(active) = self.active.as_mut() {
            if active.factory.gesture_id() == gesture_id {
                active.factory.mark_content_dropped();
                self.record_dropped(gesture_id);
            }
        }
        if self.live_tile.as_ref().is_some_and(|t| t.gesture_id == gesture_id) {
            tracing::debug!(gesture_id, "Compositor canceled the live tile");
            self.live_tile = None;
            self.set_recents_live_tile(None);
        }
    }

    fn record_dropped(&self, gesture_id: u32) {
        self.session.record_dropped_content();
        tracing::debug!(
            gesture_id,
            error = %Error::AnimationContentDropped { gesture_id },
            "Finishing with local progress"
        );
    }

    pub fn update_progress(&mut self, progress: f64) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.end_target.is_some() {
            return;
        }
        active.factory.set_progress(progress);
        self.apply_frame();
    }

    /// Settle toward the resolved target. Never waits for the compositor:
    /// content still missing now is treated as dropped. `cross_displacement`
    /// picks the quick-switch neighbor: positive is toward the previous card.
    pub fn finish_gesture(&mut self, target: GestureEndTarget, cross_displacement: f64) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.end_target.is_some() {
            return;
        }
        active.end_target = Some(target);

        let gesture_id = active.factory.gesture_id();
        if active.factory.is_content_pending() {
            active.factory.mark_content_dropped();
            self.record_dropped(gesture_id);
        }

        let launch = match target {
            GestureEndTarget::NewTask => self.quick_switch_target(cross_displacement),
            _ => None,
        };
        let state = self.interface.state_from_gesture_end_target(target);
        if let Some(active) = self.active.as_mut() {
            active.launch = launch;
            active.factory.settle(state, self.settle_duration);
        }
        tracing::info!(gesture_id, ?target, ?state, "Gesture finishing");
        self.apply_frame();

        if target == GestureEndTarget::Recents {
            self.set_live_tile_mode(true);
        }
    }

    fn quick_switch_target(&self, cross_displacement: f64) -> Option<u32> {
        let view = self.recents_view()?;
        let task = view.borrow_mut().switch_from_running(cross_displacement > 0.0);
        if task.is_none() {
            tracing::debug!("No task beside the running one, staying put");
        }
        task
    }

    pub fn cancel_gesture(&mut self) {
        if let Some(active) = self.active.take() {
            self.abort(active);
        }
    }

    fn abort(&mut self, mut active: ActiveAnimation<I>) {
        let gesture_id = active.factory.gesture_id();
        if active.factory.content().is_some() {
            self.provider.finish(gesture_id, false);
        }
        active.factory.cancel();
        tracing::info!(gesture_id, "Gesture canceled");
    }

    /// Turn live tile on or off. Turning it on needs compositor content and
    /// a started surface headed for overview. Turning it off fails (and
    /// keeps the live surface) if no snapshot can be taken.
    pub fn set_live_tile_mode(&mut self, enabled: bool) -> bool {
        if enabled {
            self.enter_live_tile()
        } else {
            self.leave_live_tile(false)
        }
    }

    fn enter_live_tile(&mut self) -> bool {
        if self.live_tile.is_some() {
            return true;
        }
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        let to_overview = active.factory.end_state() == Some(I::OVERVIEW_STATE);
        let composited = active.factory.surface().is_some_and(|s| {
            let started = s.borrow().is_started();
            started
        });
        let Some(content) = active.factory.content() else {
            tracing::debug!("No compositor content, live tile unavailable");
            return false;
        };
        let Some(running) = content.running_task() else {
            return false;
        };
        if !to_overview || !composited {
            tracing::debug!(to_overview, composited, "Live tile not allowed here");
            return false;
        }

        let tile = LiveTile {
            gesture_id: active.factory.gesture_id(),
            task_id: running.task_id,
            surface: running.surface,
            _content: Arc::clone(content),
        };
        tracing::info!(task_id = tile.task_id, "Live tile on");
        self.set_recents_live_tile(Some(tile.task_id));
        self.live_tile = Some(tile);
        true
    }

    /// Swap the live surface for a snapshot. With `force`, a failed capture
    /// hands the app back to the compositor instead of keeping it.
    fn leave_live_tile(&mut self, force: bool) -> bool {
        let Some(tile) = self.live_tile.take() else {
            return true;
        };

        match self.provider.capture_snapshot(tile.task_id) {
            Some(snapshot) => {
                if let Some(view) = self.recents_view() {
                    let mut view = view.borrow_mut();
                    view.set_snapshot(snapshot);
                    view.set_live_tile_task(None);
                }
                self.provider.release_surface(tile.surface);
                self.provider.finish(tile.gesture_id, true);
                tracing::info!(task_id = tile.task_id, "Live tile off");
                true
            }
            None if force => {
                tracing::warn!(task_id = tile.task_id, "No snapshot, returning live tile to the compositor");
                self.set_recents_live_tile(None);
                self.provider.finish(tile.gesture_id, false);
                true
            }
            None => {
                tracing::warn!(task_id = tile.task_id, "No snapshot, keeping live tile");
                self.live_tile = Some(tile);
                false
            }
        }
    }

    fn recents_view(&self) -> Option<Rc<std::cell::RefCell<crate::shell::RecentsView>>> {
        let surface = self.interface.created_surface(&self.session)?;
        let view = surface.borrow().recents_view();
        Some(view)
    }

    fn set_recents_live_tile(&self, task_id: Option<u32>) {
        if let Some(view) = self.recents_view() {
            view.borrow_mut().set_live_tile_task(task_id);
        }
    }

    fn apply_frame(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        for transaction in active.factory.transactions() {
            self.provider.apply_transaction(&transaction);
        }
    }

    /// A live tile only lasts while the surface shows or heads for overview
    fn leave_live_tile_outside_overview(&mut self) {
        if self.live_tile.is_none() {
            return;
        }
        let in_overview = self.interface.created_surface(&self.session).is_some_and(|s| {
            let target = s.borrow().state_manager().target_state();
            target == I::OVERVIEW_STATE
        });
        if !in_overview {
            tracing::debug!("Surface left overview, ending live tile");
            self.leave_live_tile(true);
        }
    }

    /// Per frame, after the surfaces advanced: push transforms and finalize
    /// a settled gesture
    pub fn poll(&mut self) {
        self.leave_live_tile_outside_overview();
        let settled = self
            .active
            .as_ref()
            .is_some_and(|a| a.end_target.is_some() && a.factory.is_settled());
        if !settled {
            self.apply_frame();
            return;
        }

        self.apply_frame();
        let Some(mut active) = self.active.take() else {
            return;
        };
        let gesture_id = active.factory.gesture_id();
        let kept_live = self.live_tile.as_ref().is_some_and(|t| t.gesture_id == gesture_id);
        if !kept_live && active.factory.content().is_some() {
            let to_home = match active.end_target {
                Some(GestureEndTarget::NewTask) => active.launch.is_some(),
                Some(target) => target.is_launcher(),
                None => false,
            };
            self.provider.finish(gesture_id, to_home);
        }
        if let Some(task_id) = active.launch {
            tracing::info!(gesture_id, task_id, "Quick switch");
            self.provider.launch_task(task_id);
        }
        active.factory.release();
        tracing::info!(gesture_id, target = ?active.end_target, live_tile = kept_live, "Gesture finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GestureConfig;
    use crate::input::{NavModeSignal, NavigationMode};
    use crate::interface::FallbackActivityInterface;
    use crate::shell::{RecentsState, RecentsSurface, SurfaceTheme};
    use crate::testing::{running_app_content, ProviderCall, RecordingProvider};
    use smithay::utils::Size;
    use std::cell::RefCell;

    struct Fixture {
        session: Rc<SessionContext>,
        device: GestureDeviceState,
        surface: Rc<RefCell<RecentsSurface>>,
        calls: Rc<RefCell<Vec<ProviderCall>>>,
        snapshots: Rc<std::cell::Cell<bool>>,
        coordinator: RecentsAnimationCoordinator<FallbackActivityInterface>,
    }

    fn fixture() -> Fixture {
        let session = SessionContext::new();
        let surface = RecentsSurface::new(session.clone(), Size::from((720, 1440)), SurfaceTheme::Dark, Duration::from_millis(100));
        session.recents_tracker().attach(&surface, false);
        surface.borrow_mut().on_start();

        let provider = RecordingProvider::default();
        let calls = provider.calls.clone();
        let snapshots = provider.snapshots_available.clone();
        let coordinator = RecentsAnimationCoordinator::new(
            FallbackActivityInterface,
            session.clone(),
            Box::new(provider),
            Duration::from_millis(100),
        );
        let device = GestureDeviceState::new(
            GestureConfig::default(),
            Size::from((720, 1440)),
            NavModeSignal::new(NavigationMode::NoButton),
        );
        Fixture {
            session,
            device,
            surface,
            calls,
            snapshots,
            coordinator,
        }
    }

    fn run_frames(f: &mut Fixture, frames: usize) {
        for _ in 0..frames {
            f.surface.borrow_mut().state_manager_mut().advance(Duration::from_millis(16));
            f.coordinator.poll();
        }
    }

    #[test]
    fn test_second_gesture_cancels_first() {
        let mut f = fixture();
        let first = f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.update_progress(0.3);
        let second = f.coordinator.prepare_for_gesture(&f.device, false);

        assert_ne!(first, second);
        assert_eq!(f.coordinator.active_gesture_id(), Some(second));
        assert_eq!(f.session.live_factory_count(), 1);
    }

    #[test]
    fn test_content_for_old_gesture_is_handed_back() {
        let mut f = fixture();
        let first = f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.on_animation_content_available(running_app_content(first, 7));
        assert_eq!(*f.calls.borrow(), vec![ProviderCall::Finish { gesture_id: first, to_home: false }]);
    }

    #[test]
    fn test_missing_content_still_finishes() {
        let mut f = fixture();
        f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.update_progress(0.8);
        f.coordinator.finish_gesture(GestureEndTarget::Recents, 0.0);
        run_frames(&mut f, 20);

        assert_eq!(f.surface.borrow().state_manager().state(), RecentsState::Default);
        assert_eq!(f.coordinator.active_gesture_id(), None);
        assert_eq!(f.session.dropped_content_count(), 1);
        assert_eq!(f.session.live_factory_count(), 0);
        assert_eq!(f.coordinator.live_tile_task(), None);
    }

    #[test]
    fn test_recents_keeps_live_tile_until_snapshot() {
        let mut f = fixture();
        let id = f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.on_animation_content_available(running_app_content(id, 7));
        f.coordinator.update_progress(0.9);
        f.coordinator.finish_gesture(GestureEndTarget::Recents, 0.0);
        assert_eq!(f.coordinator.live_tile_task(), Some(7));
        run_frames(&mut f, 20);

        // Landed in recents with the app still live
        assert_eq!(f.coordinator.active_gesture_id(), None);
        assert_eq!(f.session.live_factory_count(), 0);
        assert!(!f.calls.borrow().iter().any(|c| matches!(c, ProviderCall::Finish { .. })));

        // Snapshot not possible: the live surface stays
        f.snapshots.set(false);
        assert!(!f.coordinator.set_live_tile_mode(false));
        assert_eq!(f.coordinator.live_tile_task(), Some(7));
        assert!(!f.calls.borrow().iter().any(|c| matches!(c, ProviderCall::Release(_))));

        f.snapshots.set(true);
        assert!(f.coordinator.set_live_tile_mode(false));
        let calls = f.calls.borrow();
        let snapshot = calls.iter().position(|c| *c == ProviderCall::Snapshot(7));
        let release = calls.iter().position(|c| *c == ProviderCall::Release(SurfaceHandle(70)));
        assert!(snapshot.is_some() && release.is_some());
        assert!(snapshot < release);

        let view = f.surface.borrow().recents_view();
        assert!(view.borrow().snapshot(7).is_some());
        assert_eq!(view.borrow().live_tile_task(), None);
    }

    #[test]
    fn test_live_tile_needs_overview_destination() {
        let mut f = fixture();
        let id = f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.on_animation_content_available(running_app_content(id, 7));
        assert!(!f.coordinator.set_live_tile_mode(true));

        f.coordinator.finish_gesture(GestureEndTarget::LastTask, 0.0);
        assert!(!f.coordinator.set_live_tile_mode(true));
        run_frames(&mut f, 20);
        assert_eq!(f.surface.borrow().state_manager().state(), RecentsState::BackgroundApp);
        assert!(f
            .calls
            .borrow()
            .contains(&ProviderCall::Finish { gesture_id: id, to_home: false }));
    }

    fn with_tasks(f: &Fixture, ids: &[u32]) {
        let view = f.surface.borrow().recents_view();
        view.borrow_mut()
            .set_tasks(ids.iter().map(|id| crate::shell::TaskCard::new(*id, "task", "app")).collect());
    }

    #[test]
    fn test_quick_switch_launches_the_neighbor() {
        let mut f = fixture();
        with_tasks(&f, &[3, 7, 9]);
        let id = f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.on_animation_content_available(running_app_content(id, 7));
        f.coordinator.update_progress(0.1);
        // Finger went left: the next card slides in
        f.coordinator.finish_gesture(GestureEndTarget::NewTask, -150.0);
        run_frames(&mut f, 20);

        let calls = f.calls.borrow();
        let finish = calls
            .iter()
            .position(|c| *c == ProviderCall::Finish { gesture_id: id, to_home: true });
        let launch = calls.iter().position(|c| *c == ProviderCall::Launch(9));
        assert!(finish.unwrap() < launch.unwrap());
        assert_eq!(f.session.live_factory_count(), 0);
    }

    #[test]
    fn test_quick_switch_toward_previous_card() {
        let mut f = fixture();
        with_tasks(&f, &[3, 7, 9]);
        let id = f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.on_animation_content_available(running_app_content(id, 7));
        f.coordinator.finish_gesture(GestureEndTarget::NewTask, 150.0);
        run_frames(&mut f, 20);
        assert!(f.calls.borrow().contains(&ProviderCall::Launch(3)));
    }

    #[test]
    fn test_quick_switch_without_neighbor_returns_to_app() {
        let mut f = fixture();
        with_tasks(&f, &[7]);
        let id = f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.on_animation_content_available(running_app_content(id, 7));
        f.coordinator.finish_gesture(GestureEndTarget::NewTask, -150.0);
        run_frames(&mut f, 20);

        let calls = f.calls.borrow();
        assert!(calls.contains(&ProviderCall::Finish { gesture_id: id, to_home: false }));
        assert!(!calls.iter().any(|c| matches!(c, ProviderCall::Launch(_))));
    }

    #[test]
    fn test_live_tile_ends_when_overview_is_left() {
        let mut f = fixture();
        let id = f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.on_animation_content_available(running_app_content(id, 7));
        f.coordinator.finish_gesture(GestureEndTarget::Recents, 0.0);
        run_frames(&mut f, 20);
        assert_eq!(f.coordinator.live_tile_task(), Some(7));

        f.surface
            .borrow_mut()
            .state_manager_mut()
            .go_to_state(RecentsState::Home, true, None);
        f.coordinator.poll();

        assert_eq!(f.coordinator.live_tile_task(), None);
        let calls = f.calls.borrow();
        let snapshot = calls.iter().position(|c| *c == ProviderCall::Snapshot(7));
        let release = calls.iter().position(|c| *c == ProviderCall::Release(SurfaceHandle(70)));
        assert!(snapshot.unwrap() < release.unwrap());
        assert!(calls.contains(&ProviderCall::Finish { gesture_id: id, to_home: true }));
    }

    #[test]
    fn test_cancel_at_zero_leaves_state_and_frees_factory() {
        let mut f = fixture();
        let id = f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.on_animation_content_available(running_app_content(id, 7));
        f.coordinator.cancel_gesture();

        assert_eq!(f.surface.borrow().state_manager().state(), RecentsState::Home);
        assert_eq!(f.session.live_factory_count(), 0);
        assert!(f
            .calls
            .borrow()
            .contains(&ProviderCall::Finish { gesture_id: id, to_home: false }));
    }

    #[test]
    fn test_compositor_cancel_mid_gesture_finishes_locally() {
        let mut f = fixture();
        let id = f.coordinator.prepare_for_gesture(&f.device, false);
        f.coordinator.on_animation_content_available(running_app_content(id, 7));
        f.coordinator.on_animation_canceled(id);
        f.coordinator.update_progress(0.7);
        f.coordinator.finish_gesture(GestureEndTarget::Recents, 0.0);
        run_frames(&mut f, 20);

        assert_eq!(f.surface.borrow().state_manager().state(), RecentsState::Default);
        assert_eq!(f.session.dropped_content_count(), 1);
        assert_eq!(f.coordinator.live_tile_task(), None);
    }
}
