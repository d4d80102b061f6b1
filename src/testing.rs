//! Fakes shared by the unit tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use smithay::utils::{Point, Rectangle, Size};

use crate::animation::{
    RemoteAnimationContent, RemoteAnimationProvider, RemoteAnimationTarget, SurfaceHandle, SurfaceTransaction,
    TargetMode, TaskSnapshot,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Transaction(SurfaceHandle),
    /// Recorded only when a snapshot was produced
    Snapshot(u32),
    Release(SurfaceHandle),
    Finish { gesture_id: u32, to_home: bool },
    Launch(u32),
}

/// Compositor fake that records every call
pub struct RecordingProvider {
    pub calls: Rc<RefCell<Vec<ProviderCall>>>,
    pub snapshots_available: Rc<Cell<bool>>,
}

impl Default for RecordingProvider {
    fn default() -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            snapshots_available: Rc::new(Cell::new(true)),
        }
    }
}

impl RemoteAnimationProvider for RecordingProvider {
    fn apply_transaction(&mut self, transaction: &SurfaceTransaction) {
        self.calls.borrow_mut().push(ProviderCall::Transaction(transaction.surface));
    }

    fn capture_snapshot(&mut self, task_id: u32) -> Option<TaskSnapshot> {
        if !self.snapshots_available.get() {
            return None;
        }
        self.calls.borrow_mut().push(ProviderCall::Snapshot(task_id));
        Some(TaskSnapshot {
            task_id,
            size: Size::from((720, 1440)),
        })
    }

    fn release_surface(&mut self, surface: SurfaceHandle) {
        self.calls.borrow_mut().push(ProviderCall::Release(surface));
    }

    fn finish(&mut self, gesture_id: u32, to_home: bool) {
        self.calls.borrow_mut().push(ProviderCall::Finish { gesture_id, to_home });
    }

    fn launch_task(&mut self, task_id: u32) {
        self.calls.borrow_mut().push(ProviderCall::Launch(task_id));
    }
}

/// Content with one full-screen running app; its surface handle is
/// `task_id * 10`
pub fn running_app_content(gesture_id: u32, task_id: u32) -> Arc<RemoteAnimationContent> {
    Arc::new(RemoteAnimationContent {
        gesture_id,
        apps: vec![RemoteAnimationTarget {
            task_id,
            surface: SurfaceHandle(task_id as u64 * 10),
            bounds: Rectangle::new(Point::from((0, 0)), Size::from((720, 1440))),
            mode: TargetMode::Closing,
            is_translucent: false,
        }],
        wallpapers: Vec::new(),
    })
}
