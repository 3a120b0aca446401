//! Configuration management for the winlayout daemon.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. `%APPDATA%/winlayout/config.toml` (Windows standard)
//! 2. `~/.config/winlayout/config.toml` (Unix-style, for WSL compatibility)
//! 3. `./config.toml` (current directory, for development)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use winlayout_core::settings::{
    DEFAULT_EXCLUDED_CLASSES, DEFAULT_EXCLUDED_PROCESSES, DEFAULT_MIN_WINDOW_SIZE,
    DEFAULT_PLACEMENT_TOLERANCE, DEFAULT_SLOW_APPS, DEFAULT_SNAP_CACHE_CAPACITY,
    DEFAULT_SNAP_THRESHOLD,
};
use winlayout_core::title::default_title_suffixes;
use winlayout_core::{
    DelaySchedule, EngineSettings, MonitorZones, RetryPolicy, Rule, ZoneLayout, ZoneSettings,
};

/// Main configuration structure for winlayout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub behavior: BehaviorConfig,
    pub restore: RestoreConfig,
    pub matching: MatchingConfig,
    pub placement: PlacementConfig,
    pub desktops: DesktopsConfig,
    pub history: HistoryConfig,
    pub persistence: PersistenceConfig,
    pub zones: ZonesConfig,
    /// Per-application placement rules; the first matching rule wins.
    ///
    /// ```toml
    /// [[rules]]
    /// exe = "spotify.exe"
    /// position = "right-half"
    /// monitor = 2
    /// ```
    pub rules: Vec<Rule>,
}

/// Behavior-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Restore the layout saved on the new monitor setup when displays change.
    #[serde(default = "default_true")]
    pub auto_switch_on_display_change: bool,

    /// How often the monitor fingerprint is recomputed.
    #[serde(default = "default_topology_poll_ms")]
    pub topology_poll_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            auto_switch_on_display_change: true,
            topology_poll_ms: default_topology_poll_ms(),
        }
    }
}

/// Restore retry and launch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Launch applications whose windows are missing.
    #[serde(default = "default_false")]
    pub launch_missing: bool,

    #[serde(default = "default_fast_delay_start_ms")]
    pub fast_delay_start_ms: u64,
    #[serde(default = "default_fast_delay_end_ms")]
    pub fast_delay_end_ms: u64,
    #[serde(default = "default_slow_delay_start_ms")]
    pub slow_delay_start_ms: u64,
    #[serde(default = "default_slow_delay_end_ms")]
    pub slow_delay_end_ms: u64,

    /// Executables that get the slow retry schedule.
    #[serde(default = "default_slow_apps")]
    pub slow_apps: Vec<String>,

    /// Pixel tolerance under which a window counts as already placed.
    #[serde(default = "default_already_placed_tolerance")]
    pub already_placed_tolerance: i32,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            launch_missing: false,
            fast_delay_start_ms: default_fast_delay_start_ms(),
            fast_delay_end_ms: default_fast_delay_end_ms(),
            slow_delay_start_ms: default_slow_delay_start_ms(),
            slow_delay_end_ms: default_slow_delay_end_ms(),
            slow_apps: default_slow_apps(),
            already_placed_tolerance: default_already_placed_tolerance(),
        }
    }
}

/// Capture filters and title normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Ordered application-chrome suffixes; the first match is stripped.
    #[serde(default = "default_title_suffixes")]
    pub title_suffixes: Vec<String>,

    #[serde(default = "default_excluded_processes")]
    pub excluded_processes: Vec<String>,

    #[serde(default = "default_excluded_classes")]
    pub excluded_classes: Vec<String>,

    /// Windows smaller than this in either dimension are not captured.
    #[serde(default = "default_min_window_size")]
    pub min_window_size: i32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            title_suffixes: default_title_suffixes(),
            excluded_processes: default_excluded_processes(),
            excluded_classes: default_excluded_classes(),
            min_window_size: default_min_window_size(),
        }
    }
}

/// Placement tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Height inflation ratio that triggers snap compensation.
    #[serde(default = "default_snap_threshold")]
    pub snap_threshold: f64,

    /// Size a window is moved at before being maximized on its monitor.
    #[serde(default = "default_placeholder_width")]
    pub maximize_placeholder_width: i32,
    #[serde(default = "default_placeholder_height")]
    pub maximize_placeholder_height: i32,

    /// Executables whose snap ratio is remembered.
    #[serde(default = "default_snap_cache_capacity")]
    pub snap_cache_capacity: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            snap_threshold: default_snap_threshold(),
            maximize_placeholder_width: default_placeholder_width(),
            maximize_placeholder_height: default_placeholder_height(),
            snap_cache_capacity: default_snap_cache_capacity(),
        }
    }
}

/// Virtual desktop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopsConfig {
    /// Try the undocumented interface before the public one.
    #[serde(default = "default_true")]
    pub use_internal_interface: bool,

    /// Pause after a desktop move while the shell catches up.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for DesktopsConfig {
    fn default() -> Self {
        Self {
            use_internal_interface: true,
            settle_ms: default_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Prior versions kept per layout.
    #[serde(default = "default_history_depth")]
    pub depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            depth: default_history_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Quiet period before pending layout changes are written.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Overrides the default `layouts.json` location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layouts_path: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            layouts_path: None,
        }
    }
}

/// Post-restore zone snapping.
///
/// ```toml
/// [zones]
/// snap_after_restore = true
///
/// [[zones.monitors]]
/// monitor = 1
/// layout = { type = "columns", widths = [25, 50, 25] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZonesConfig {
    #[serde(default = "default_false")]
    pub snap_after_restore: bool,
    pub monitors: Vec<MonitorZones>,
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_topology_poll_ms() -> u64 {
    2000
}

fn default_fast_delay_start_ms() -> u64 {
    200
}

fn default_fast_delay_end_ms() -> u64 {
    1500
}

fn default_slow_delay_start_ms() -> u64 {
    500
}

fn default_slow_delay_end_ms() -> u64 {
    5000
}

fn default_slow_apps() -> Vec<String> {
    DEFAULT_SLOW_APPS.iter().map(|s| s.to_string()).collect()
}

fn default_already_placed_tolerance() -> i32 {
    DEFAULT_PLACEMENT_TOLERANCE
}

fn default_excluded_processes() -> Vec<String> {
    DEFAULT_EXCLUDED_PROCESSES.iter().map(|s| s.to_string()).collect()
}

fn default_excluded_classes() -> Vec<String> {
    DEFAULT_EXCLUDED_CLASSES.iter().map(|s| s.to_string()).collect()
}

fn default_min_window_size() -> i32 {
    DEFAULT_MIN_WINDOW_SIZE
}

fn default_snap_threshold() -> f64 {
    DEFAULT_SNAP_THRESHOLD
}

fn default_placeholder_width() -> i32 {
    400
}

fn default_placeholder_height() -> i32 {
    300
}

fn default_snap_cache_capacity() -> usize {
    DEFAULT_SNAP_CACHE_CAPACITY
}

fn default_settle_ms() -> u64 {
    50
}

fn default_history_depth() -> usize {
    5
}

fn default_debounce_ms() -> u64 {
    500
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const MIN_TOPOLOGY_POLL_MS: u64 = 250;
const MAX_TOLERANCE: i32 = 100;
const MIN_SNAP_THRESHOLD: f64 = 1.05;
const MIN_PLACEHOLDER: i32 = 100;
const MAX_SETTLE_MS: u64 = 1000;
const MAX_HISTORY_DEPTH: usize = 50;
const MAX_DEBOUNCE_MS: u64 = 60_000;

/// A config value that was out of range and has been corrected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn order_schedule(
    warnings: &mut Vec<ConfigWarning>,
    field: &str,
    start: u64,
    end: &mut u64,
) {
    if start > *end {
        warnings.push(ConfigWarning::new(
            field,
            format!("end delay {}ms is below start delay {}ms; using {}ms", end, start, start),
        ));
        *end = start;
    }
}

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Tries the following locations in order:
    /// 1. `%APPDATA%/winlayout/config.toml`
    /// 2. `~/.config/winlayout/config.toml`
    /// 3. `./config.toml`
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        let paths = config_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Clamp out-of-range values in place and describe each correction.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let level = self.behavior.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            warnings.push(ConfigWarning::new(
                "behavior.log_level",
                format!("unknown level '{}'; using 'info'", self.behavior.log_level),
            ));
            self.behavior.log_level = default_log_level();
        }

        if self.behavior.topology_poll_ms < MIN_TOPOLOGY_POLL_MS {
            warnings.push(ConfigWarning::new(
                "behavior.topology_poll_ms",
                format!("{} is too frequent; using {}", self.behavior.topology_poll_ms, MIN_TOPOLOGY_POLL_MS),
            ));
            self.behavior.topology_poll_ms = MIN_TOPOLOGY_POLL_MS;
        }

        let restore = &mut self.restore;
        order_schedule(
            &mut warnings,
            "restore.fast_delay_end_ms",
            restore.fast_delay_start_ms,
            &mut restore.fast_delay_end_ms,
        );
        order_schedule(
            &mut warnings,
            "restore.slow_delay_end_ms",
            restore.slow_delay_start_ms,
            &mut restore.slow_delay_end_ms,
        );

        let tolerance = restore.already_placed_tolerance.clamp(0, MAX_TOLERANCE);
        if tolerance != restore.already_placed_tolerance {
            warnings.push(ConfigWarning::new(
                "restore.already_placed_tolerance",
                format!("{} is out of range 0..={}; using {}", restore.already_placed_tolerance, MAX_TOLERANCE, tolerance),
            ));
            restore.already_placed_tolerance = tolerance;
        }

        if self.matching.min_window_size < 1 {
            warnings.push(ConfigWarning::new(
                "matching.min_window_size",
                format!("{} must be positive; using 1", self.matching.min_window_size),
            ));
            self.matching.min_window_size = 1;
        }

        if !(self.placement.snap_threshold >= MIN_SNAP_THRESHOLD) {
            warnings.push(ConfigWarning::new(
                "placement.snap_threshold",
                format!("{} would flag ordinary resizes; using {}", self.placement.snap_threshold, MIN_SNAP_THRESHOLD),
            ));
            self.placement.snap_threshold = MIN_SNAP_THRESHOLD;
        }

        for (field, value) in [
            ("placement.maximize_placeholder_width", &mut self.placement.maximize_placeholder_width),
            ("placement.maximize_placeholder_height", &mut self.placement.maximize_placeholder_height),
        ] {
            if *value < MIN_PLACEHOLDER {
                warnings.push(ConfigWarning::new(
                    field,
                    format!("{} is below {}; using {}", value, MIN_PLACEHOLDER, MIN_PLACEHOLDER),
                ));
                *value = MIN_PLACEHOLDER;
            }
        }

        if self.placement.snap_cache_capacity == 0 {
            warnings.push(ConfigWarning::new("placement.snap_cache_capacity", "must be at least 1; using 1"));
            self.placement.snap_cache_capacity = 1;
        }

        if self.desktops.settle_ms > MAX_SETTLE_MS {
            warnings.push(ConfigWarning::new(
                "desktops.settle_ms",
                format!("{} is too long; using {}", self.desktops.settle_ms, MAX_SETTLE_MS),
            ));
            self.desktops.settle_ms = MAX_SETTLE_MS;
        }

        if self.history.depth > MAX_HISTORY_DEPTH {
            warnings.push(ConfigWarning::new(
                "history.depth",
                format!("{} exceeds {}; using {}", self.history.depth, MAX_HISTORY_DEPTH, MAX_HISTORY_DEPTH),
            ));
            self.history.depth = MAX_HISTORY_DEPTH;
        }

        if self.persistence.debounce_ms > MAX_DEBOUNCE_MS {
            warnings.push(ConfigWarning::new(
                "persistence.debounce_ms",
                format!("{} exceeds {}; using {}", self.persistence.debounce_ms, MAX_DEBOUNCE_MS, MAX_DEBOUNCE_MS),
            ));
            self.persistence.debounce_ms = MAX_DEBOUNCE_MS;
        }

        self.zones.monitors.retain(|mz| {
            let problem = match &mz.layout {
                _ if mz.monitor == 0 => Some("monitor indices start at 1".to_string()),
                ZoneLayout::Grid { cols, rows } if *cols == 0 || *rows == 0 => {
                    Some(format!("grid {}x{} has no cells", cols, rows))
                }
                ZoneLayout::Columns { widths } if !widths.iter().any(|w| *w > 0.0) => {
                    Some("columns need at least one positive width".to_string())
                }
                _ => None,
            };
            match problem {
                Some(message) => {
                    warnings.push(ConfigWarning::new(
                        format!("zones.monitors[{}]", mz.monitor),
                        format!("{}; entry ignored", message),
                    ));
                    false
                }
                None => true,
            }
        });

        for mz in &self.zones.monitors {
            if let ZoneLayout::Columns { widths } = &mz.layout {
                let sum: f64 = widths.iter().filter(|w| **w > 0.0).sum();
                if (sum - 100.0).abs() > 1.0 {
                    warnings.push(ConfigWarning::new(
                        format!("zones.monitors[{}]", mz.monitor),
                        format!("column widths sum to {}; scaling to 100", sum),
                    ));
                }
            }
        }

        let before = self.rules.len();
        self.rules
            .retain(|r| r.exe.is_some() || r.title_contains.is_some());
        if self.rules.len() != before {
            warnings.push(ConfigWarning::new(
                "rules",
                format!("{} rule(s) without exe or title_contains ignored", before - self.rules.len()),
            ));
        }

        warnings
    }

    /// Where layouts are persisted.
    pub fn layouts_path(&self) -> PathBuf {
        self.persistence
            .layouts_path
            .clone()
            .unwrap_or_else(default_layouts_path)
    }

    pub fn topology_poll_interval(&self) -> Duration {
        Duration::from_millis(self.behavior.topology_poll_ms)
    }

    pub fn persistence_debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.debounce_ms)
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        let restore = &config.restore;
        Self {
            title_suffixes: config.matching.title_suffixes.clone(),
            excluded_processes: config.matching.excluded_processes.clone(),
            excluded_classes: config.matching.excluded_classes.clone(),
            min_window_size: config.matching.min_window_size,
            retry: RetryPolicy {
                fast: DelaySchedule::from_millis(restore.fast_delay_start_ms, restore.fast_delay_end_ms),
                slow: DelaySchedule::from_millis(restore.slow_delay_start_ms, restore.slow_delay_end_ms),
                slow_apps: restore.slow_apps.clone(),
            },
            placement_tolerance: restore.already_placed_tolerance,
            snap_threshold: config.placement.snap_threshold,
            maximize_placeholder: (
                config.placement.maximize_placeholder_width,
                config.placement.maximize_placeholder_height,
            ),
            desktop_settle: Duration::from_millis(config.desktops.settle_ms),
            snap_cache_capacity: config.placement.snap_cache_capacity,
            rules: config.rules.clone(),
            zones: ZoneSettings {
                snap_after_restore: config.zones.snap_after_restore,
                monitors: config.zones.monitors.clone(),
            },
        }
    }
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Windows standard: %APPDATA%/winlayout/config.toml
    if let Some(proj_dirs) = ProjectDirs::from("com", "winlayout", "winlayout") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    // 2. Unix-style: ~/.config/winlayout/config.toml
    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("winlayout").join("config.toml"));
    }

    // 3. Current directory: ./config.toml
    paths.push(PathBuf::from("config.toml"));

    paths
}

/// `layouts.json` in the project data directory.
pub fn default_layouts_path() -> PathBuf {
    ProjectDirs::from("com", "winlayout", "winlayout")
        .map(|dirs| dirs.data_dir().join("layouts.json"))
        .unwrap_or_else(|| PathBuf::from("layouts.json"))
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
