//! Input handling - touch stream, device state and swipe recognition
//!
//! This module provides:
//! - Raw touch events with device timestamps
//! - Navigation mode, rotation and touch-region predicates
//! - Swipe-up recognition producing continuous progress

mod device_state;
mod gestures;
mod touch;

pub use device_state::*;
pub use gestures::*;
pub use touch::*;
