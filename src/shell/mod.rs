//! Overview surfaces - the launcher and the standalone recents host
//!
//! Rendering happens in the compositor. These types hold the state a surface
//! exposes to the gesture core: its state machine, its recents view and its
//! lifecycle.

pub mod layout;
pub mod primitives;
pub mod recents_view;
pub mod states;
pub mod surfaces;

pub use layout::{calculate_task_size, DeviceProfile};
pub use recents_view::{RecentsView, TaskCard};
pub use states::{LauncherState, RecentsState, SurfaceTheme};
pub use surfaces::{LauncherSurface, Lifecycle, OverviewSurface, RecentsSurface, SurfaceAppearance, SurfaceCore};
