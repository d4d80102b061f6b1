//! Session context
//!
//! Everything that would otherwise be process-wide mutable state lives here:
//! gesture ids, surface trackers, the pending re-layout flag and the
//! factory/dropped-content bookkeeping. One context per overview host; it is
//! handed to state managers and interfaces explicitly.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::shell::{LauncherSurface, RecentsSurface};

type InitListener<T> = Box<dyn FnMut(&Rc<RefCell<T>>, bool) -> bool>;

/// Tracks the live instance of one surface kind.
///
/// Holds a weak reference only: a torn-down surface simply stops being
/// returned by `created()`.
pub struct SurfaceTracker<T> {
    surface: RefCell<Weak<RefCell<T>>>,
    init_listeners: RefCell<Vec<InitListener<T>>>,
}

impl<T> Default for SurfaceTracker<T> {
    fn default() -> Self {
        Self {
            surface: RefCell::new(Weak::new()),
            init_listeners: RefCell::new(Vec::new()),
        }
    }
}

impl<T> SurfaceTracker<T> {
    pub fn created(&self) -> Option<Rc<RefCell<T>>> {
        self.surface.borrow().upgrade()
    }

    /// Register a surface. Init listeners run with `already_on_home` and stay
    /// registered while they return true.
    pub fn attach(&self, surface: &Rc<RefCell<T>>, already_on_home: bool) {
        *self.surface.borrow_mut() = Rc::downgrade(surface);

        let mut listeners = std::mem::take(&mut *self.init_listeners.borrow_mut());
        listeners.retain_mut(|listener| listener(surface, already_on_home));
        // Listeners registered while running keep their place after the old ones
        let mut current = self.init_listeners.borrow_mut();
        listeners.append(&mut current);
        *current = listeners;
    }

    pub fn detach(&self) {
        *self.surface.borrow_mut() = Weak::new();
    }

    /// Run `listener` when a surface attaches (immediately if one exists)
    pub fn register_init_listener(&self, mut listener: InitListener<T>) {
        if let Some(surface) = self.created() {
            if !listener(&surface, true) {
                return;
            }
        }
        self.init_listeners.borrow_mut().push(listener);
    }
}

/// Per-host session state
#[derive(Default)]
pub struct SessionContext {
    next_gesture_id: Cell<u32>,
    live_factories: Cell<usize>,
    pending_reapply: Cell<bool>,
    dropped_content: Cell<u32>,
    launcher: SurfaceTracker<LauncherSurface>,
    recents: SurfaceTracker<RecentsSurface>,
}

impl SessionContext {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn next_gesture_id(&self) -> u32 {
        let id = self.next_gesture_id.get().wrapping_add(1);
        self.next_gesture_id.set(id);
        id
    }

    pub fn launcher_tracker(&self) -> &SurfaceTracker<LauncherSurface> {
        &self.launcher
    }

    pub fn recents_tracker(&self) -> &SurfaceTracker<RecentsSurface> {
        &self.recents
    }

    pub(crate) fn factory_created(&self) {
        self.live_factories.set(self.live_factories.get() + 1);
    }

    pub(crate) fn factory_released(&self) {
        self.live_factories.set(self.live_factories.get().saturating_sub(1));
    }

    /// Animation factories not yet released
    pub fn live_factory_count(&self) -> usize {
        self.live_factories.get()
    }

    /// Ask surfaces to re-apply their layout once the running transition settles
    pub fn request_reapply(&self) {
        self.pending_reapply.set(true);
    }

    pub fn take_pending_reapply(&self) -> bool {
        self.pending_reapply.replace(false)
    }

    pub(crate) fn record_dropped_content(&self) {
        self.dropped_content.set(self.dropped_content.get() + 1);
    }

    /// Gestures that finished without compositor content
    pub fn dropped_content_count(&self) -> u32 {
        self.dropped_content.get()
    }
}
