//! Basic visual primitives shared by the overview surfaces
//!
//! Colors, easing and interpolation. The rendering itself happens in the
//! compositor; this crate only decides the values.

use smithay::utils::{Logical, Point, Rectangle, Size};

/// Color in RGBA format (0.0 - 1.0)
pub type Color = [f32; 4];

/// Colors for the overview surfaces
pub mod colors {
    use super::Color;

    pub const TRANSPARENT: Color = [0.0, 0.0, 0.0, 0.0];
    pub const OVERVIEW_SCRIM: Color = [0.08, 0.08, 0.12, 0.85]; // Behind the task cards
    pub const MODAL_SCRIM: Color = [0.0, 0.0, 0.0, 0.7];        // Behind a focused task
    pub const LIGHT_SCRIM: Color = [0.95, 0.95, 0.97, 0.8];     // Light theme overview
}

/// Multiply a color's alpha
pub fn with_alpha(color: Color, factor: f32) -> Color {
    [color[0], color[1], color[2], (color[3] * factor).clamp(0.0, 1.0)]
}

pub fn lerp_color(a: Color, b: Color, t: f64) -> Color {
    let t = t as f32;
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

/// Simple animated value for smooth scrolling
#[derive(Debug, Clone)]
pub struct AnimatedValue {
    current: f64,
    target: f64,
    velocity: f64,
}

impl AnimatedValue {
    pub fn new(value: f64) -> Self {
        Self {
            current: value,
            target: value,
            velocity: 0.0,
        }
    }

    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    pub fn set_immediate(&mut self, value: f64) {
        self.current = value;
        self.target = value;
        self.velocity = 0.0;
    }

    pub fn update(&mut self, dt: f64) {
        // Critically damped-ish spring
        let spring = 300.0;
        let damping = 35.0;

        let delta = self.target - self.current;
        let accel = spring * delta - damping * self.velocity;

        self.velocity += accel * dt;
        self.current += self.velocity * dt;

        // Snap if close enough
        if (self.current - self.target).abs() < 0.001 && self.velocity.abs() < 0.001 {
            self.current = self.target;
            self.velocity = 0.0;
        }
    }

    pub fn get(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_animating(&self) -> bool {
        (self.current - self.target).abs() > 0.001 || self.velocity.abs() > 0.001
    }
}

/// Easing functions for animations
pub mod easing {
    /// Ease out cubic - starts fast, slows down
    pub fn ease_out_cubic(t: f64) -> f64 {
        1.0 - (1.0 - t).powi(3)
    }
}

/// Linear interpolation
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Interpolate between two rectangles (e.g. full-screen app and task card)
pub fn lerp_rect(
    from: Rectangle<i32, Logical>,
    to: Rectangle<i32, Logical>,
    t: f64,
) -> Rectangle<f64, Logical> {
    Rectangle::new(
        Point::from((
            lerp(from.loc.x as f64, to.loc.x as f64, t),
            lerp(from.loc.y as f64, to.loc.y as f64, t),
        )),
        Size::from((
            lerp(from.size.w as f64, to.size.w as f64, t),
            lerp(from.size.h as f64, to.size.h as f64, t),
        )),
    )
}
