//! Transition state machine for overview surfaces
//!
//! Generic over a closed state enum per surface kind. Exactly one state is
//! committed at any time and at most one transition is in flight. A new
//! request while a transition runs replaces it: the old one never reaches
//! `on_state_transition_complete`, and the new one starts from whatever is on
//! screen at that moment.
//!
//! Listener calls and completion callbacks run while the manager is
//! borrowed, so they must not call back into it.

use std::fmt::Debug;
use std::rc::Rc;
use std::time::Duration;

use crate::animation::{VisualEndpoint, VisualState};
use crate::session::SessionContext;
use crate::shell::primitives::{easing, lerp};

/// A surface's closed set of states
pub trait ShellState: Copy + Eq + Debug + 'static {}

impl<T: Copy + Eq + Debug + 'static> ShellState for T {}

/// Whether a listener wants further notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Active,
    Done,
}

/// Observer of state transitions.
///
/// Receives `on_state_transition_start` for every transition and at most one
/// `on_state_transition_complete` per start. A replaced transition gets no
/// terminal call; the next start is the cancellation notice.
pub trait StateListener<S> {
    fn on_state_transition_start(&mut self, _to: S) {}

    fn on_state_transition_complete(&mut self, _state: S) -> ListenerStatus {
        ListenerStatus::Active
    }
}

/// Handle for a registered listener or endpoint. Remove it explicitly.
#[must_use = "dropping a subscription leaks the registration"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type OnComplete<S> = Box<dyn FnOnce(S)>;

#[derive(Debug, Clone, Copy)]
enum Driver {
    /// Runs on its own clock
    Timed { elapsed: Duration, duration: Duration },
    /// Follows `set_controlled_progress` (a finger)
    Controlled,
    /// Released controlled transition running to the end
    Settling {
        start: f64,
        elapsed: Duration,
        duration: Duration,
    },
}

struct Transition<S> {
    id: u64,
    target: S,
    from: VisualState,
    to: VisualState,
    progress: f64,
    driver: Driver,
    on_complete: Option<OnComplete<S>>,
}

pub struct StateManager<S: ShellState> {
    state: S,
    transition: Option<Transition<S>>,
    displayed: VisualState,
    resolver: Box<dyn Fn(S) -> VisualState>,
    listeners: Vec<(u64, Box<dyn StateListener<S>>)>,
    endpoints: Vec<(u64, Box<dyn VisualEndpoint>)>,
    session: Rc<SessionContext>,
    transition_duration: Duration,
    next_id: u64,
}

impl<S: ShellState> StateManager<S> {
    pub fn new(
        initial: S,
        session: Rc<SessionContext>,
        resolver: Box<dyn Fn(S) -> VisualState>,
        transition_duration: Duration,
    ) -> Self {
        let displayed = resolver(initial);
        Self {
            state: initial,
            transition: None,
            displayed,
            resolver,
            listeners: Vec::new(),
            endpoints: Vec::new(),
            session,
            transition_duration,
            next_id: 1,
        }
    }

    /// Last committed state
    pub fn state(&self) -> S {
        self.state
    }

    /// Target of the in-flight transition, or the committed state
    pub fn target_state(&self) -> S {
        self.transition.as_ref().map_or(self.state, |t| t.target)
    }

    pub fn is_in_transition(&self) -> bool {
        self.transition.is_some()
    }

    pub fn displayed_visuals(&self) -> VisualState {
        self.displayed
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_state_listener(&mut self, listener: Box<dyn StateListener<S>>) -> Subscription {
        let id = self.next_id();
        self.listeners.push((id, listener));
        Subscription(id)
    }

    /// False once the listener finished itself or was removed
    pub fn has_state_listener(&self, subscription: &Subscription) -> bool {
        self.listeners.iter().any(|(id, _)| *id == subscription.0)
    }

    /// Returns false if the listener was already gone (it finished itself)
    pub fn remove_state_listener(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != subscription.0);
        self.listeners.len() != before
    }

    pub fn add_visual_endpoint(&mut self, mut endpoint: Box<dyn VisualEndpoint>) -> Subscription {
        endpoint.apply(&self.displayed);
        let id = self.next_id();
        self.endpoints.push((id, endpoint));
        Subscription(id)
    }

    pub fn remove_visual_endpoint(&mut self, subscription: Subscription) -> bool {
        let before = self.endpoints.len();
        self.endpoints.retain(|(id, _)| *id != subscription.0);
        self.endpoints.len() != before
    }

    pub fn set_transition_duration(&mut self, duration: Duration) {
        self.transition_duration = duration;
    }

    fn show(&mut self, visuals: VisualState) {
        self.displayed = visuals;
        for (_, endpoint) in &mut self.endpoints {
            endpoint.apply(&visuals);
        }
    }

    fn notify_start(&mut self, to: S) {
        for (_, listener) in &mut self.listeners {
            listener.on_state_transition_start(to);
        }
    }

    fn notify_complete(&mut self, state: S) {
        self.listeners
            .retain_mut(|(_, listener)| listener.on_state_transition_complete(state) == ListenerStatus::Active);
    }

    /// Drop the in-flight transition. Its listeners already saw the start;
    /// they get no terminal call.
    fn abandon_transition(&mut self) {
        if let Some(old) = self.transition.take() {
            tracing::debug!(from = ?self.state, abandoned = ?old.target, "Replacing in-flight transition");
        }
    }

    /// Begin a transition from what is currently on screen
    fn begin(&mut self, target: S, driver: Driver, on_complete: Option<OnComplete<S>>) -> u64 {
        self.abandon_transition();
        self.notify_start(target);

        let id = self.next_id();
        let to = (self.resolver)(target);
        self.transition = Some(Transition {
            id,
            target,
            from: self.displayed,
            to,
            progress: 0.0,
            driver,
            on_complete,
        });
        id
    }

    /// Move to `target`. Redirects an in-flight transition.
    ///
    /// Asking for the committed state while idle does nothing beyond running
    /// `on_complete`.
    pub fn go_to_state(&mut self, target: S, animated: bool, on_complete: Option<OnComplete<S>>) {
        if self.transition.is_none() && self.state == target {
            if let Some(callback) = on_complete {
                callback(target);
            }
            return;
        }

        tracing::debug!(from = ?self.state, to = ?target, animated, "State transition");
        let duration = self.transition_duration;
        self.begin(
            target,
            Driver::Timed {
                elapsed: Duration::ZERO,
                duration,
            },
            on_complete,
        );

        if !animated || duration.is_zero() {
            self.commit();
        }
    }

    /// Start a transition whose progress is driven externally. Returns its id.
    pub fn start_controlled(&mut self, target: S) -> u64 {
        tracing::debug!(from = ?self.state, to = ?target, "Controlled transition");
        self.begin(target, Driver::Controlled, None)
    }

    /// Set progress of a controlled transition. False if `id` is no longer
    /// the in-flight controlled transition.
    pub fn set_controlled_progress(&mut self, id: u64, progress: f64) -> bool {
        let visuals = match self.transition.as_mut() {
            Some(t) if t.id == id && matches!(t.driver, Driver::Controlled) => {
                t.progress = progress.clamp(0.0, 1.0);
                t.from.interpolate(&t.to, t.progress)
            }
            _ => return false,
        };
        self.show(visuals);
        true
    }

    /// Let a controlled transition run to its target over `duration`
    pub fn settle_controlled(&mut self, id: u64, duration: Duration) -> bool {
        match self.transition.as_mut() {
            Some(t) if t.id == id && matches!(t.driver, Driver::Controlled) => {
                t.driver = Driver::Settling {
                    start: t.progress,
                    elapsed: Duration::ZERO,
                    duration,
                };
            }
            _ => return false,
        }
        if duration.is_zero() {
            self.commit();
        }
        true
    }

    /// Id of the in-flight transition, if any
    pub fn transition_id(&self) -> Option<u64> {
        self.transition.as_ref().map(|t| t.id)
    }

    /// Drop the in-flight transition and snap back to the committed state
    pub fn cancel_animation(&mut self) {
        if self.transition.is_none() {
            return;
        }
        self.abandon_transition();
        let visuals = (self.resolver)(self.state);
        self.show(visuals);
    }

    /// Advance the timed part of the in-flight transition
    pub fn advance(&mut self, dt: Duration) {
        let (visuals, done) = match self.transition.as_mut() {
            Some(t) => match &mut t.driver {
                Driver::Controlled => return,
                Driver::Timed { elapsed, duration } => {
                    *elapsed += dt;
                    let linear = fraction(*elapsed, *duration);
                    t.progress = easing::ease_out_cubic(linear);
                    (t.from.interpolate(&t.to, t.progress), linear >= 1.0)
                }
                Driver::Settling {
                    start,
                    elapsed,
                    duration,
                } => {
                    *elapsed += dt;
                    let linear = fraction(*elapsed, *duration);
                    t.progress = lerp(*start, 1.0, easing::ease_out_cubic(linear));
                    (t.from.interpolate(&t.to, t.progress), linear >= 1.0)
                }
            },
            None => return,
        };

        if done {
            self.commit();
        } else {
            self.show(visuals);
        }
    }

    fn commit(&mut self) {
        let Some(transition) = self.transition.take() else {
            return;
        };
        self.state = transition.target;
        self.show(transition.to);
        tracing::debug!(state = ?self.state, "State committed");

        self.notify_complete(self.state);
        if let Some(callback) = transition.on_complete {
            callback(self.state);
        }
        if self.session.take_pending_reapply() {
            self.reapply_state();
        }
    }

    /// Re-apply the committed state's visuals (after a layout change).
    /// Deferred to the end of a running transition.
    pub fn reapply_state(&mut self) {
        if self.transition.is_some() {
            self.session.request_reapply();
            return;
        }
        let visuals = (self.resolver)(self.state);
        self.show(visuals);
    }
}

fn fraction(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
    }
}
