//! Error types for the recents gesture core
//!
//! Most of these never leave the crate: classification and surface failures are
//! absorbed where they happen and only logged. Privileged action failures may
//! reach the user, and only for actions the user asked for.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Input has not resolved to a gesture yet. A pending state, not a failure.
    #[error("gesture classification still ambiguous")]
    ClassificationAmbiguous,

    #[error("target surface is not available")]
    SurfaceUnavailable,

    #[error("compositor dropped animation content for gesture {gesture_id}")]
    AnimationContentDropped { gesture_id: u32 },

    #[error("privileged helper unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("no process known for task {task_id}")]
    UnknownTaskProcess { task_id: u32 },

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("trace error: {0}")]
    Trace(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event loop error: {0}")]
    EventLoop(#[from] calloop::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error may be shown to the user at all
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Error::ServiceUnavailable(_) | Error::UnknownTaskProcess { .. })
    }
}
