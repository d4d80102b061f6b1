//! Recents view - horizontally paged task cards
//!
//! Cards sit side by side at the task rect size; the list scrolls one page
//! per card and snaps to the nearest page on release. One card may be the
//! live tile, in which case the compositor draws the running app there
//! instead of a snapshot.

use std::collections::HashMap;

use smithay::utils::{Logical, Point, Rectangle, Size};

use super::primitives::{AnimatedValue, Color};
use crate::animation::TaskSnapshot;
use crate::input::Rotation;

/// Task shown in recents
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCard {
    pub id: u32,
    pub title: String,
    pub app_class: String,
    /// Placeholder tint until a snapshot exists
    pub color: Color,
    /// Process behind the task, when the host reported one
    pub pid: Option<u32>,
}

impl TaskCard {
    pub fn new(id: u32, title: impl Into<String>, app_class: impl Into<String>) -> Self {
        let app_class = app_class.into();
        let color = class_to_color(&app_class);
        Self {
            id,
            title: title.into(),
            app_class,
            color,
            pid: None,
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }
}

/// Stable tint per app class
fn class_to_color(class: &str) -> Color {
    let hash: u32 = class
        .bytes()
        .fold(0, |acc, b| acc.wrapping_add(b as u32).wrapping_mul(31));
    let hue = (hash % 360) as f32;

    let (s, l) = (0.6_f32, 0.4_f32);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match (hue / 60.0) as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [r + m, g + m, b + m, 1.0]
}

pub struct RecentsView {
    screen_size: Size<i32, Logical>,
    task_rect: Rectangle<i32, Logical>,
    page_spacing: f64,
    tasks: Vec<TaskCard>,
    scroll: AnimatedValue,
    running_task: Option<u32>,
    live_tile_task: Option<u32>,
    snapshots: HashMap<u32, TaskSnapshot>,
    active_rotation: Rotation,
    display_rotation: Rotation,
    home_requested: bool,
}

impl RecentsView {
    pub fn new(screen_size: Size<i32, Logical>) -> Self {
        Self {
            screen_size,
            task_rect: Rectangle::new(Point::from((0, 0)), screen_size),
            page_spacing: 48.0,
            tasks: Vec::new(),
            scroll: AnimatedValue::new(0.0),
            running_task: None,
            live_tile_task: None,
            snapshots: HashMap::new(),
            active_rotation: Rotation::Natural,
            display_rotation: Rotation::Natural,
            home_requested: false,
        }
    }

    pub fn screen_size(&self) -> Size<i32, Logical> {
        self.screen_size
    }

    pub fn set_task_rect(&mut self, screen_size: Size<i32, Logical>, task_rect: Rectangle<i32, Logical>) {
        self.screen_size = screen_size;
        self.task_rect = task_rect;
        // Keep the same page in view after a size change
        let page = self.current_page();
        self.scroll.set_immediate(self.page_offset(page));
    }

    pub fn task_rect(&self) -> Rectangle<i32, Logical> {
        self.task_rect
    }

    pub fn set_tasks(&mut self, tasks: Vec<TaskCard>) {
        self.snapshots.retain(|id, _| tasks.iter().any(|t| t.id == *id));
        self.tasks = tasks;
        let last = self.tasks.len().saturating_sub(1);
        let page = self.current_page().min(last);
        self.scroll.set_immediate(self.page_offset(page));
    }

    pub fn task(&self, task_id: u32) -> Option<&TaskCard> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn tasks(&self) -> &[TaskCard] {
        &self.tasks
    }

    fn page_width(&self) -> f64 {
        self.task_rect.size.w as f64 + self.page_spacing
    }

    fn page_offset(&self, page: usize) -> f64 {
        page as f64 * self.page_width()
    }

    pub fn current_page(&self) -> usize {
        if self.tasks.is_empty() {
            return 0;
        }
        let page = (self.scroll.target() / self.page_width()).round().max(0.0) as usize;
        page.min(self.tasks.len() - 1)
    }

    /// Card rect for the task at `index`, in display coordinates
    pub fn card_rect(&self, index: usize) -> Rectangle<f64, Logical> {
        let x = self.task_rect.loc.x as f64 + self.page_offset(index) - self.scroll.get();
        Rectangle::new(
            Point::from((x, self.task_rect.loc.y as f64)),
            Size::from((self.task_rect.size.w as f64, self.task_rect.size.h as f64)),
        )
    }

    /// Follow a finger
    pub fn scroll_by(&mut self, dx: f64) {
        let max = self.page_offset(self.tasks.len().saturating_sub(1));
        let value = (self.scroll.get() - dx).clamp(0.0, max);
        self.scroll.set_immediate(value);
    }

    pub fn snap_to_nearest_page(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let page = (self.scroll.get() / self.page_width()).round().max(0.0) as usize;
        let page = page.min(self.tasks.len() - 1);
        self.scroll.set_target(self.page_offset(page));
    }

    pub fn snap_to_page(&mut self, page: usize) {
        let page = page.min(self.tasks.len().saturating_sub(1));
        self.scroll.set_target(self.page_offset(page));
    }

    /// Mark the task the user swiped away from and bring its page into view
    pub fn set_running_task(&mut self, task_id: Option<u32>) {
        self.running_task = task_id;
        if let Some(index) = task_id.and_then(|id| self.tasks.iter().position(|t| t.id == id)) {
            self.scroll.set_immediate(self.page_offset(index));
        }
    }

    /// Quick switch away from the running task: the card before it when
    /// `toward_previous`, else the one after. Scrolls to that card.
    pub fn switch_from_running(&mut self, toward_previous: bool) -> Option<u32> {
        let index = self.tasks.iter().position(|t| Some(t.id) == self.running_task)?;
        let next = if toward_previous {
            index.checked_sub(1)?
        } else {
            index + 1
        };
        let task_id = self.tasks.get(next)?.id;
        self.snap_to_page(next);
        Some(task_id)
    }

    pub fn running_task(&self) -> Option<u32> {
        self.running_task
    }

    pub fn set_live_tile_task(&mut self, task_id: Option<u32>) {
        self.live_tile_task = task_id;
    }

    pub fn live_tile_task(&self) -> Option<u32> {
        self.live_tile_task
    }

    pub fn set_snapshot(&mut self, snapshot: TaskSnapshot) {
        self.snapshots.insert(snapshot.task_id, snapshot);
    }

    pub fn snapshot(&self, task_id: u32) -> Option<&TaskSnapshot> {
        self.snapshots.get(&task_id)
    }

    /// Rotations the card content is laid out for
    pub fn set_layout_rotation(&mut self, active: Rotation, display: Rotation) {
        if (active, display) != (self.active_rotation, self.display_rotation) {
            let display_rotation = display;
            tracing::debug!(?active, display = ?display_rotation, "Recents layout rotation changed");
        }
        self.active_rotation = active;
        self.display_rotation = display;
    }

    pub fn layout_rotation(&self) -> (Rotation, Rotation) {
        (self.active_rotation, self.display_rotation)
    }

    /// Ask the host to leave recents for the home app
    pub fn start_home(&mut self) {
        tracing::info!("Recents requested home");
        self.home_requested = true;
    }

    pub fn take_home_request(&mut self) -> bool {
        std::mem::take(&mut self.home_requested)
    }

    /// Task under a tap, if any
    pub fn hit_test(&self, pos: Point<f64, Logical>) -> Option<u32> {
        self.tasks
            .iter()
            .enumerate()
            .find(|(i, _)| self.card_rect(*i).contains(pos))
            .map(|(_, task)| task.id)
    }

    pub fn is_scrolling(&self) -> bool {
        self.scroll.is_animating()
    }

    pub fn tick(&mut self, dt: f64) {
        self.scroll.update(dt);
    }
}
