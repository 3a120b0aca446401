//! winlayout Core Engine
//!
//! Platform-agnostic capture/match/restore engine for window layouts.
//!
//! This crate implements:
//! - Capturing live windows into a named [`Layout`] ([`snapshot`])
//! - Fuzzy window identity matching across process restarts ([`matcher`])
//! - Monitor-topology-aware placement with DPI normalization and snap
//!   compensation ([`placement`], [`topology`])
//! - Virtual desktop membership through a fallback chain of bridges ([`desktop`])
//! - The timer-driven restore state machine ([`scheduler`])
//! - Post-restore zone snapping and per-application rules ([`zones`], [`rules`])
//!
//! Everything that touches the operating system goes through the traits in
//! [`platform`], so the whole engine runs against fakes in tests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod desktop;
pub mod matcher;
pub mod model;
pub mod placement;
pub mod platform;
pub mod rules;
pub mod scheduler;
pub mod settings;
pub mod snapshot;
pub mod title;
pub mod topology;
pub mod zones;

#[cfg(test)]
pub(crate) mod test_support;

pub use desktop::{DesktopBridge, DesktopChain, DesktopError, DesktopId};
pub use model::{Layout, LayoutBook, LayoutVersion, SaveOutcome, WindowEntry};
pub use placement::{PlaceOutcome, Placer, SnapRatioCache};
pub use platform::{Launcher, PlatformError, RawWindow, WindowSystem};
pub use rules::{Rule, RuleEngine, RulePosition};
pub use scheduler::{
    ActiveJobSlot, DelaySchedule, JobState, JobTicket, RestoreJob, RestoreOptions, RestoreReport,
    RetryPolicy, Step, UnresolvedEntry, MAX_RESTORE_ATTEMPTS,
};
pub use settings::{EngineSettings, ZoneSettings};
pub use snapshot::{LiveWindow, WindowSnapshot};
pub use topology::{MonitorFingerprint, MonitorInfo, MonitorTopology};
pub use zones::{MonitorZones, ZoneEngine, ZoneLayout};

/// Unique identifier for a live window.
/// On Windows, this is the HWND cast to u64.
pub type WindowId = u64;

/// Errors that can occur during layout book operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("No windows were captured; layout '{0}' was left unchanged")]
    EmptyCapture(String),

    #[error("Layout '{0}' not found")]
    LayoutNotFound(String),

    #[error("Layout name must not be empty")]
    InvalidName,

    #[error("Layout '{name}' has no history version {index}")]
    VersionNotFound { name: String, index: usize },

    #[error("A restore is already in progress")]
    RestoreInProgress,
}

/// A point in virtual-screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A rectangle in virtual-screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Check if this rectangle intersects with another.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && self.right() > other.x && self.y < other.bottom() && self.bottom() > other.y
    }

    /// Get the right edge x-coordinate, saturating at `i32::MAX`.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Get the bottom edge y-coordinate, saturating at `i32::MAX`.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Center point (rounded toward the top-left).
    pub fn center(&self) -> Point {
        Point::new(
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    /// Whether the point lies inside this rectangle (right/bottom edges exclusive).
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Same rectangle with a different height.
    pub fn with_height(&self, height: i32) -> Self {
        Self { height, ..*self }
    }

    /// Whether every edge of `other` is within `tolerance` pixels of this one.
    pub fn approx_eq(&self, other: &Rect, tolerance: i32) -> bool {
        let within = |a: i32, b: i32| a.abs_diff(b) <= tolerance.max(0) as u32;
        within(self.x, other.x)
            && within(self.y, other.y)
            && within(self.width, other.width)
            && within(self.height, other.height)
    }
}

/// Min/max state of a top-level window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    #[default]
    Normal,
    Maximized,
    Minimized,
}

/// Borrowed view of everything the engine needs from its host.
///
/// Built by the host for the duration of one operation (a capture, one
/// scheduler step) and passed by reference into [`WindowSnapshot`],
/// [`Placer`] and [`RestoreJob`].
pub struct EngineContext<'a> {
    /// OS window/monitor operations.
    pub system: &'a dyn WindowSystem,
    /// Virtual desktop bridges, tried in fallback order.
    pub desktops: &'a DesktopChain,
    /// Process launcher for missing applications (None disables launching).
    pub launcher: Option<&'a dyn Launcher>,
    /// Matching, retry and placement tunables.
    pub settings: &'a EngineSettings,
    /// Snap ratios learned from earlier placements, keyed by executable.
    pub snap_ratios: &'a SnapRatioCache,
}
