//! Engine tunables.
//!
//! The daemon builds these from its config file; the engine never reads
//! configuration itself.

use crate::rules::Rule;
use crate::scheduler::RetryPolicy;
use crate::title::default_title_suffixes;
use crate::zones::MonitorZones;
use std::time::Duration;

/// Shell and system surfaces that are never part of a layout.
pub const DEFAULT_EXCLUDED_CLASSES: &[&str] = &[
    "Shell_TrayWnd",
    "Shell_SecondaryTrayWnd",
    "Progman",
    "WorkerW",
    "Windows.UI.Core.CoreWindow",
    "NotifyIconOverflowWindow",
    "Xaml_WindowedPopupClass",
    "TopLevelWindowForOverflowXamlIsland",
];

pub const DEFAULT_EXCLUDED_PROCESSES: &[&str] = &[
    "ShellExperienceHost.exe",
    "StartMenuExperienceHost.exe",
    "SearchHost.exe",
    "SearchApp.exe",
    "TextInputHost.exe",
    "LockApp.exe",
    "winlayoutd.exe",
];

/// Applications that take long enough to start that the slow retry schedule
/// applies when one of them is still unresolved.
pub const DEFAULT_SLOW_APPS: &[&str] = &[
    "chrome.exe",
    "msedge.exe",
    "firefox.exe",
    "brave.exe",
    "opera.exe",
    "vivaldi.exe",
    "code.exe",
    "cursor.exe",
    "devenv.exe",
    "idea64.exe",
    "pycharm64.exe",
    "rider64.exe",
    "slack.exe",
    "discord.exe",
    "teams.exe",
    "ms-teams.exe",
    "spotify.exe",
    "obsidian.exe",
    "outlook.exe",
    "olk.exe",
];

pub const DEFAULT_MIN_WINDOW_SIZE: i32 = 50;
pub const DEFAULT_PLACEMENT_TOLERANCE: i32 = 10;
pub const DEFAULT_SNAP_THRESHOLD: f64 = 1.3;
pub const DEFAULT_SNAP_CACHE_CAPACITY: usize = 64;

pub(crate) fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Post-restore zone snapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneSettings {
    pub snap_after_restore: bool,
    pub monitors: Vec<MonitorZones>,
}

/// Everything the engine can be tuned by.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Ordered chrome-suffix table for title normalization.
    pub title_suffixes: Vec<String>,
    /// Executable names never captured (case-insensitive).
    pub excluded_processes: Vec<String>,
    /// Window classes never captured (exact).
    pub excluded_classes: Vec<String>,
    /// Windows smaller than this in either dimension are not captured.
    pub min_window_size: i32,
    pub retry: RetryPolicy,
    /// Pixel tolerance of the already-placed check.
    pub placement_tolerance: i32,
    /// Height inflation ratio above which snap compensation kicks in.
    pub snap_threshold: f64,
    /// Size of the window on the target monitor before it is maximized.
    pub maximize_placeholder: (i32, i32),
    /// Pause after a virtual desktop move.
    pub desktop_settle: Duration,
    pub snap_cache_capacity: usize,
    pub rules: Vec<Rule>,
    pub zones: ZoneSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            title_suffixes: default_title_suffixes(),
            excluded_processes: to_strings(DEFAULT_EXCLUDED_PROCESSES),
            excluded_classes: to_strings(DEFAULT_EXCLUDED_CLASSES),
            min_window_size: DEFAULT_MIN_WINDOW_SIZE,
            retry: RetryPolicy::default(),
            placement_tolerance: DEFAULT_PLACEMENT_TOLERANCE,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            maximize_placeholder: (400, 300),
            desktop_settle: Duration::from_millis(50),
            snap_cache_capacity: DEFAULT_SNAP_CACHE_CAPACITY,
            rules: Vec::new(),
            zones: ZoneSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn is_excluded_process(&self, exe: &str) -> bool {
        self.excluded_processes
            .iter()
            .any(|p| p.eq_ignore_ascii_case(exe))
    }

    pub fn is_excluded_class(&self, class: &str) -> bool {
        self.excluded_classes.iter().any(|c| c == class)
    }
}
