//! Recorded gesture traces
//!
//! A trace is a JSON array of timestamped events:
//!
//! ```json
//! [
//!   { "at_ms": 0, "type": "surface-created" },
//!   { "at_ms": 10, "type": "down", "x": 360.0, "y": 1400.0 },
//!   { "at_ms": 12, "type": "content", "task_id": 5 },
//!   { "at_ms": 26, "type": "frame" }
//! ]
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use calloop::channel::Sender;
use serde::{Deserialize, Serialize};
use smithay::utils::{Logical, Point, Rectangle, Size};

use crate::animation::{CompositorMessage, RemoteAnimationContent, RemoteAnimationTarget, SurfaceHandle, TargetMode};
use crate::error::Result;
use crate::helper::PrivilegedAction;
use crate::input::{NavigationMode, Rotation, TouchEvent};
use crate::shell::{SurfaceTheme, TaskCard};
use crate::state::TouchInteractionService;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Monotonic time of the event (ms)
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: TraceEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceTask {
    pub id: u32,
    pub title: String,
    pub app_class: String,
    #[serde(default)]
    pub pid: Option<u32>,
}

/// Display-space rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl From<TraceRect> for Rectangle<f64, Logical> {
    fn from(r: TraceRect) -> Self {
        Rectangle::new(Point::from((r.x, r.y)), Size::from((r.w, r.h)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TraceEvent {
    Down {
        #[serde(default)]
        slot: i32,
        x: f64,
        y: f64,
    },
    Move {
        #[serde(default)]
        slot: i32,
        x: f64,
        y: f64,
    },
    Up {
        #[serde(default)]
        slot: i32,
    },
    Cancel,
    NavMode {
        mode: NavigationMode,
    },
    Rotation {
        rotation: Rotation,
    },
    RotationLock {
        locked: bool,
    },
    ExcludedRegions {
        regions: Vec<TraceRect>,
    },
    /// Keyboard shown at `region`, or hidden without one
    KeyboardRegion {
        #[serde(default)]
        region: Option<TraceRect>,
    },
    Theme {
        theme: SurfaceTheme,
    },
    SurfaceCreated {
        #[serde(default)]
        on_home: bool,
    },
    SurfaceResumed,
    SurfacePaused,
    SurfaceStopped,
    SurfaceDestroyed,
    Tasks {
        tasks: Vec<TraceTask>,
    },
    /// Finger dragging the task cards sideways
    RecentsScroll {
        dx: f64,
    },
    RecentsScrollEnd,
    /// Compositor delivers content with the running app `task_id`. Without
    /// `gesture_id` it goes to the gesture in progress.
    Content {
        task_id: u32,
        #[serde(default)]
        gesture_id: Option<u32>,
    },
    ContentCanceled {
        #[serde(default)]
        gesture_id: Option<u32>,
    },
    Frame,
    Helper {
        action: PrivilegedAction,
        #[serde(default)]
        user_invoked: bool,
    },
    ExitOverview,
    LaunchTaskFailed,
    LiveTile {
        enabled: bool,
    },
    Assistant {
        visibility: f32,
    },
    OneHanded {
        activated: bool,
    },
}

pub fn load(path: &Path) -> Result<Vec<TraceEntry>> {
    let contents = fs::read_to_string(path)?;
    parse(&contents)
}

pub fn parse(contents: &str) -> Result<Vec<TraceEntry>> {
    let entries: Vec<TraceEntry> = serde_json::from_str(contents)?;
    tracing::debug!("Parsed {} trace events", entries.len());
    Ok(entries)
}

impl TraceEntry {
    /// Feed this event to `service`. Compositor events go through
    /// `compositor` and reach the service on the next loop dispatch.
    pub fn apply(&self, service: &mut TouchInteractionService, compositor: &Sender<CompositorMessage>) {
        let time = Duration::from_millis(self.at_ms);
        match &self.event {
            TraceEvent::Down { slot, x, y } => service.on_touch_event(&TouchEvent::Down {
                slot: *slot,
                position: Point::from((*x, *y)),
                time,
            }),
            TraceEvent::Move { slot, x, y } => service.on_touch_event(&TouchEvent::Motion {
                slot: *slot,
                position: Point::from((*x, *y)),
                time,
            }),
            TraceEvent::Up { slot } => service.on_touch_event(&TouchEvent::Up { slot: *slot, time }),
            TraceEvent::Cancel => service.on_touch_event(&TouchEvent::Cancel),
            TraceEvent::NavMode { mode } => service.on_navigation_mode(*mode),
            TraceEvent::Rotation { rotation } => service.on_display_rotation(*rotation),
            TraceEvent::RotationLock { locked } => service.set_rotation_locked(*locked),
            TraceEvent::ExcludedRegions { regions } => {
                service.set_excluded_regions(regions.iter().map(|r| (*r).into()).collect())
            }
            TraceEvent::KeyboardRegion { region } => service.set_keyboard_region(region.map(Into::into)),
            TraceEvent::Theme { theme } => service.set_theme(*theme),
            TraceEvent::SurfaceCreated { on_home } => service.create_surface(*on_home),
            TraceEvent::SurfaceResumed => service.resume_surface(),
            TraceEvent::SurfacePaused => service.pause_surface(),
            TraceEvent::SurfaceStopped => service.stop_surface(),
            TraceEvent::SurfaceDestroyed => service.destroy_surface(),
            TraceEvent::Tasks { tasks } => service.set_recent_tasks(
                tasks
                    .iter()
                    .map(|t| TaskCard::new(t.id, t.title.clone(), t.app_class.clone()).with_pid(t.pid))
                    .collect(),
            ),
            TraceEvent::RecentsScroll { dx } => service.scroll_recents(*dx),
            TraceEvent::RecentsScrollEnd => service.release_recents_scroll(),
            TraceEvent::Content { task_id, gesture_id } => {
                let Some(gesture_id) = gesture_id.or(service.active_gesture_id()) else {
                    tracing::warn!(at_ms = self.at_ms, "Content event with no gesture to attach to");
                    return;
                };
                let screen = service.device().screen_size();
                let content = RemoteAnimationContent {
                    gesture_id,
                    apps: vec![RemoteAnimationTarget {
                        task_id: *task_id,
                        surface: SurfaceHandle(*task_id as u64),
                        bounds: Rectangle::from_size(screen),
                        mode: TargetMode::Closing,
                        is_translucent: false,
                    }],
                    wallpapers: Vec::new(),
                };
                send(compositor, CompositorMessage::ContentAvailable(Arc::new(content)));
            }
            TraceEvent::ContentCanceled { gesture_id } => {
                if let Some(gesture_id) = gesture_id.or(service.active_gesture_id()) {
                    send(compositor, CompositorMessage::Canceled { gesture_id });
                }
            }
            TraceEvent::Frame => service.tick(time),
            TraceEvent::Helper { action, user_invoked } => {
                if let Err(e) = service.request_privileged(*action, *user_invoked) {
                    tracing::debug!(%action, "Helper request failed: {}", e);
                }
            }
            TraceEvent::ExitOverview => service.exit_overview(),
            TraceEvent::LaunchTaskFailed => service.on_launch_task_failed(),
            TraceEvent::LiveTile { enabled } => {
                let ok = service.set_live_tile_mode(*enabled);
                tracing::info!(enabled, ok, "Live tile request");
            }
            TraceEvent::Assistant { visibility } => service.set_assistant_visibility(*visibility),
            TraceEvent::OneHanded { activated } => service.set_one_handed(*activated),
        }
    }
}

fn send(compositor: &Sender<CompositorMessage>, message: CompositorMessage) {
    if let Err(e) = compositor.send(message) {
        tracing::warn!("Compositor channel closed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::end_target::GestureEndTarget;
    use crate::state::OverviewHost;
    use crate::testing::RecordingProvider;

    const FLING: &str = r#"[
        { "at_ms": 0, "type": "surface-created" },
        { "at_ms": 0, "type": "tasks", "tasks": [
            { "id": 5, "title": "Files", "app_class": "org.gnome.Nautilus" }
        ] },
        { "at_ms": 0, "type": "down", "x": 360.0, "y": 1400.0 },
        { "at_ms": 2, "type": "content", "task_id": 5 },
        { "at_ms": 10, "type": "move", "x": 360.0, "y": 1370.0 },
        { "at_ms": 20, "type": "move", "x": 360.0, "y": 1330.0 },
        { "at_ms": 30, "type": "move", "x": 360.0, "y": 1300.0 },
        { "at_ms": 32, "type": "up" },
        { "at_ms": 40, "type": "frame" },
        { "at_ms": 200, "type": "frame" },
        { "at_ms": 400, "type": "frame" },
        { "at_ms": 600, "type": "frame" },
        { "at_ms": 700, "type": "helper", "action": { "force-stop-task": 5 }, "user_invoked": true }
    ]"#;

    #[test]
    fn test_parse_tagged_events() {
        let entries = parse(FLING).unwrap();
        assert_eq!(entries.len(), 13);
        assert_eq!(entries[0].event, TraceEvent::SurfaceCreated { on_home: false });
        assert_eq!(entries[3].event, TraceEvent::Content { task_id: 5, gesture_id: None });
        assert_eq!(
            entries[12].event,
            TraceEvent::Helper {
                action: PrivilegedAction::ForceStopTask(5),
                user_invoked: true
            }
        );
    }

    #[test]
    fn test_unknown_event_is_an_error() {
        let err = parse(r#"[{ "at_ms": 0, "type": "teleport" }]"#).unwrap_err();
        assert!(matches!(err, crate::Error::Trace(_)));
    }

    #[test]
    fn test_replay_through_the_event_loop() {
        let mut event_loop: calloop::EventLoop<TouchInteractionService> = calloop::EventLoop::try_new().unwrap();
        let compositor = TouchInteractionService::insert_sources(&event_loop.handle()).unwrap();
        let mut service = TouchInteractionService::new(
            Config::default(),
            OverviewHost::Launcher,
            Box::new(RecordingProvider::default()),
        );

        for entry in parse(FLING).unwrap() {
            entry.apply(&mut service, &compositor);
            event_loop.dispatch(Some(Duration::ZERO), &mut service).unwrap();
        }

        assert_eq!(service.last_end_target(), Some(GestureEndTarget::Recents));
        assert_eq!(service.current_state().as_deref(), Some("Overview"));
        assert_eq!(service.live_tile_task(), Some(5));
        assert_eq!(service.session().dropped_content_count(), 0);
        // No process reported for task 5, and the user asked
        assert_eq!(service.notifications().len(), 1);
    }

    fn replay(trace: &str) -> TouchInteractionService {
        let mut event_loop: calloop::EventLoop<TouchInteractionService> = calloop::EventLoop::try_new().unwrap();
        let compositor = TouchInteractionService::insert_sources(&event_loop.handle()).unwrap();
        let mut service = TouchInteractionService::new(
            Config::default(),
            OverviewHost::Launcher,
            Box::new(RecordingProvider::default()),
        );
        for entry in parse(trace).unwrap() {
            entry.apply(&mut service, &compositor);
            event_loop.dispatch(Some(Duration::ZERO), &mut service).unwrap();
        }
        service
    }

    #[test]
    fn test_swipe_from_keyboard_never_tracks() {
        let service = replay(
            r#"[
            { "at_ms": 0, "type": "surface-created" },
            { "at_ms": 0, "type": "keyboard-region", "region": { "x": 0.0, "y": 1000.0, "w": 720.0, "h": 440.0 } },
            { "at_ms": 0, "type": "down", "x": 360.0, "y": 1400.0 },
            { "at_ms": 10, "type": "move", "x": 360.0, "y": 1300.0 },
            { "at_ms": 20, "type": "move", "x": 360.0, "y": 1100.0 },
            { "at_ms": 22, "type": "up" },
            { "at_ms": 40, "type": "frame" }
        ]"#,
        );
        assert_eq!(service.active_gesture_id(), None);
        assert_eq!(service.last_end_target(), None);
        assert_eq!(service.current_state().as_deref(), Some("Normal"));
        assert_eq!(service.session().live_factory_count(), 0);
    }

    #[test]
    fn test_keyboard_hidden_allows_swipes_again() {
        let service = replay(
            r#"[
            { "at_ms": 0, "type": "surface-created" },
            { "at_ms": 0, "type": "excluded-regions", "regions": [ { "x": 0.0, "y": 0.0, "w": 720.0, "h": 200.0 } ] },
            { "at_ms": 0, "type": "keyboard-region", "region": { "x": 0.0, "y": 1000.0, "w": 720.0, "h": 440.0 } },
            { "at_ms": 5, "type": "keyboard-region" },
            { "at_ms": 10, "type": "down", "x": 360.0, "y": 1400.0 },
            { "at_ms": 20, "type": "move", "x": 360.0, "y": 1370.0 },
            { "at_ms": 30, "type": "move", "x": 360.0, "y": 1330.0 },
            { "at_ms": 40, "type": "move", "x": 360.0, "y": 1300.0 },
            { "at_ms": 42, "type": "up" }
        ]"#,
        );
        assert_eq!(service.last_end_target(), Some(GestureEndTarget::Recents));
        // The excluded strip at the top still blocks swipes there
        assert!(!service.device().is_fully_gestural_swipe(Point::from((360.0, 100.0))));
    }
}
