//! Device profile and task card geometry

use smithay::utils::{Logical, Point, Rectangle, Size};

use crate::input::GestureDeviceState;

/// Screen geometry for layout, in the current display rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    pub width_px: i32,
    pub height_px: i32,
    /// Nav bar on a side edge (landscape with buttons)
    pub is_vertical_bar_layout: bool,
    /// Landscape with the natural bottom on the left
    pub is_seascape: bool,
    pub nav_bar_size: i32,
    pub hotseat_bar_size: i32,
}

impl DeviceProfile {
    /// Layout sizing follows the display rotation, not the active one
    pub fn new(device: &GestureDeviceState) -> Self {
        let size = device.screen_size();
        let nav_bar_size = device.config().nav_bar_size.round() as i32;
        Self {
            width_px: size.w,
            height_px: size.h,
            is_vertical_bar_layout: device.is_vertical_bar_layout(),
            is_seascape: device.display_rotation().is_seascape(),
            nav_bar_size,
            hotseat_bar_size: nav_bar_size * 3 / 2,
        }
    }

    pub fn size(&self) -> Size<i32, Logical> {
        Size::from((self.width_px, self.height_px))
    }

    pub fn is_landscape(&self) -> bool {
        self.width_px > self.height_px
    }
}

/// Rect of the focused task card in overview.
///
/// Keeps the screen's aspect ratio and is centered in the space left after
/// the status area, the overview action row and (in a vertical bar layout)
/// the nav bar.
pub fn calculate_task_size(dp: &DeviceProfile) -> Rectangle<i32, Logical> {
    let (w, h) = (dp.width_px as f64, dp.height_px as f64);

    let (mut left, mut right) = (w * 0.06, w * 0.06);
    let (top, bottom) = if dp.is_landscape() {
        (h * 0.1, h * 0.15)
    } else {
        (h * 0.08, h * 0.18)
    };
    if dp.is_vertical_bar_layout {
        if dp.is_seascape {
            left += dp.nav_bar_size as f64;
        } else {
            right += dp.nav_bar_size as f64;
        }
    }

    let avail_w = (w - left - right).max(1.0);
    let avail_h = (h - top - bottom).max(1.0);
    let aspect = w / h;
    let (task_w, task_h) = if avail_w / avail_h > aspect {
        (avail_h * aspect, avail_h)
    } else {
        (avail_w, avail_w / aspect)
    };

    let x = left + (avail_w - task_w) / 2.0;
    let y = top + (avail_h - task_h) / 2.0;
    Rectangle::new(
        Point::from((x.round() as i32, y.round() as i32)),
        Size::from((task_w.round() as i32, task_h.round() as i32)),
    )
}
