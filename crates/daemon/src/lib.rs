//! winlayout Daemon library
//!
//! Configuration, layout persistence and the daemon state that hosts the
//! capture/match/restore engine. The `winlayoutd` binary drives these from
//! its event loop.

pub mod config;
pub mod state;
pub mod store;

pub use config::{Config, ConfigWarning};
pub use state::{AppState, Platform, RestoreProgress, SavedLayout};
pub use store::LayoutStore;
