//! Flick recents - gesture to overview transition core
//!
//! Turns the touch stream from the bottom edge into a continuous transition
//! between a running app, home and the overview of recent tasks:
//! - Device state: navigation mode, rotation and swipe regions
//! - Per-surface transition state machines with listeners
//! - Launcher and fallback overview hosts behind one capability trait
//! - The compositor animation handshake, including live tile
//! - End-target resolution when the finger lifts

pub mod animation;
pub mod config;
pub mod end_target;
pub mod error;
pub mod gesture_state;
pub mod handler;
pub mod helper;
pub mod input;
pub mod interface;
pub mod session;
pub mod shell;
pub mod state;
pub mod state_manager;
pub mod trace;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use end_target::{resolve_end_target, GestureEndTarget};
pub use error::{Error, Result};
pub use state::{OverviewHost, TouchInteractionService};
