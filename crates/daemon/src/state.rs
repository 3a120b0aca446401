//! Daemon state and the engine entry points.
//!
//! `AppState` is owned by the event loop and never shared across threads.
//! It does not own any timers: after each event the loop asks it whether a
//! restore step is due ([`AppState::take_scheduled_tick`]) and whether the
//! layouts need to be written ([`AppState::take_dirty`]).

use crate::config::Config;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use winlayout_core::{
    ActiveJobSlot, DesktopChain, EngineContext, EngineSettings, LayoutBook, LayoutError, Launcher,
    MonitorFingerprint, MonitorTopology, RestoreJob, RestoreOptions, RestoreReport, SaveOutcome,
    SnapRatioCache, Step, WindowSnapshot, WindowSystem,
};
use winlayout_ipc::{
    IpcCommand, IpcResponse, LayoutSummary, RestoreSummary, UnresolvedWindow, VersionSummary,
};

/// The OS collaborators the engine runs against.
pub struct Platform {
    pub system: Box<dyn WindowSystem>,
    pub desktops: DesktopChain,
    pub launcher: Option<Box<dyn Launcher>>,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedLayout {
    pub name: String,
    pub windows: usize,
    pub replaced: bool,
}

/// Where a restore stands after a scheduler step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreProgress {
    /// Waiting for the next tick.
    Running { placed: usize, total: usize },
    Finished(RestoreReport),
}

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn report_summary(report: &RestoreReport) -> RestoreSummary {
    RestoreSummary {
        layout: report.layout.clone(),
        placed: report.placed,
        total: report.total,
        attempts: report.attempts,
        unresolved: report
            .unresolved
            .iter()
            .map(|u| UnresolvedWindow {
                process: u.process_exe_name.clone(),
                class: u.window_class.clone(),
                title: u.normalized_title.clone(),
            })
            .collect(),
        placement_failures: report.placement_failures,
        launched: report.launched,
    }
}

fn context<'a>(
    platform: &'a Platform,
    settings: &'a EngineSettings,
    snap_ratios: &'a SnapRatioCache,
) -> EngineContext<'a> {
    EngineContext {
        system: platform.system.as_ref(),
        desktops: &platform.desktops,
        launcher: platform.launcher.as_deref(),
        settings,
        snap_ratios,
    }
}

/// Daemon state.
pub struct AppState {
    config: Config,
    settings: EngineSettings,
    platform: Platform,
    book: LayoutBook,
    snap_ratios: SnapRatioCache,
    slot: ActiveJobSlot,
    job: Option<RestoreJob>,
    next_tick: Option<Duration>,
    dirty: bool,
    fingerprint: MonitorFingerprint,
    last_restored: Option<String>,
    last_report: Option<RestoreReport>,
    start_time: Instant,
}

impl AppState {
    pub fn new(config: Config, platform: Platform, book: LayoutBook) -> Self {
        let settings = EngineSettings::from(&config);
        let snap_ratios = SnapRatioCache::new(settings.snap_cache_capacity);
        let fingerprint = MonitorTopology::from_system(platform.system.as_ref()).fingerprint();
        info!("Monitor fingerprint: {}", fingerprint);
        Self {
            config,
            settings,
            platform,
            book,
            snap_ratios,
            slot: ActiveJobSlot::new(),
            job: None,
            next_tick: None,
            dirty: false,
            fingerprint,
            last_restored: None,
            last_report: None,
            start_time: Instant::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn book(&self) -> &LayoutBook {
        &self.book
    }

    pub fn is_restoring(&self) -> bool {
        self.slot.is_active()
    }

    /// Delay before the active restore wants its next step, once.
    pub fn take_scheduled_tick(&mut self) -> Option<Duration> {
        self.next_tick.take()
    }

    /// Whether layouts changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Capture the current windows under `name`.
    pub fn save_layout(&mut self, name: &str) -> Result<SavedLayout, LayoutError> {
        let ctx = context(&self.platform, &self.settings, &self.snap_ratios);
        let windows = WindowSnapshot::new(&ctx).capture_all();
        let count = windows.len();
        let fingerprint = MonitorTopology::from_system(ctx.system).fingerprint();

        let outcome = self
            .book
            .save(name, windows, fingerprint, now_secs(), self.config.history.depth)?;
        self.dirty = true;

        let replaced = matches!(outcome, SaveOutcome::Replaced { .. });
        info!(layout = name.trim(), windows = count, replaced, "Layout saved");
        Ok(SavedLayout {
            name: name.trim().to_string(),
            windows: count,
            replaced,
        })
    }

    /// Start restoring `name` and run its first pass.
    ///
    /// Only one restore may run at a time; a second request is rejected.
    pub fn restore_layout(
        &mut self,
        name: &str,
        options: RestoreOptions,
    ) -> Result<RestoreProgress, LayoutError> {
        let layout = self
            .book
            .get(name)
            .cloned()
            .ok_or_else(|| LayoutError::LayoutNotFound(name.trim().to_string()))?;
        let ticket = self.slot.try_acquire().ok_or(LayoutError::RestoreInProgress)?;

        self.job = Some(RestoreJob::new(layout, options, ticket));
        Ok(self.step_restore().unwrap_or(RestoreProgress::Running { placed: 0, total: 0 }))
    }

    /// Run the active restore's next pass; None when no restore is active.
    pub fn step_restore(&mut self) -> Option<RestoreProgress> {
        let job = self.job.as_mut()?;
        let ctx = context(&self.platform, &self.settings, &self.snap_ratios);
        match job.advance(&ctx) {
            Step::Reschedule(delay) => {
                let (placed, total) = job.progress();
                self.next_tick = Some(delay);
                Some(RestoreProgress::Running { placed, total })
            }
            Step::Finished(report) => {
                self.complete_restore(report.clone());
                Some(RestoreProgress::Finished(report))
            }
        }
    }

    /// Abandon the active restore and release the foreground lock it holds.
    /// Returns whether a restore was running.
    pub fn abort_restore(&mut self) -> bool {
        let Some(job) = self.job.take() else {
            return false;
        };
        self.next_tick = None;
        self.platform.system.set_foreground_lock(false);
        let (placed, total) = job.progress();
        warn!(layout = %job.layout_name(), placed, total, "Abandoned restore in progress");
        true
    }

    fn complete_restore(&mut self, report: RestoreReport) {
        let options = self.job.take().map(|job| job.options()).unwrap_or_default();
        self.next_tick = None;
        if !options.no_profile_update {
            self.last_restored = Some(report.layout.clone());
        }
        if !report.is_complete() {
            warn!(
                layout = %report.layout,
                placed = report.placed,
                total = report.total,
                unresolved = report.unresolved.len(),
                failures = report.placement_failures,
                "Restore finished with windows left unplaced"
            );
        }
        self.last_report = Some(report);
    }

    /// Layout names in sorted order.
    pub fn layout_names(&self) -> Vec<String> {
        self.book.names()
    }

    pub fn delete_layout(&mut self, name: &str) -> Result<(), LayoutError> {
        self.book.remove(name)?;
        self.dirty = true;
        info!(layout = name.trim(), "Layout deleted");
        Ok(())
    }

    pub fn restore_version(&mut self, name: &str, index: usize) -> Result<(), LayoutError> {
        self.book
            .restore_version(name, index, now_secs(), self.config.history.depth)?;
        self.dirty = true;
        info!(layout = name.trim(), index, "Layout version made current");
        Ok(())
    }

    /// Re-read the monitor setup and switch layouts if it changed.
    ///
    /// A change seen while a restore is running is recorded but never acted
    /// on.
    pub fn check_topology(&mut self) -> Option<RestoreProgress> {
        let fingerprint = MonitorTopology::from_system(self.platform.system.as_ref()).fingerprint();
        if fingerprint == self.fingerprint {
            return None;
        }
        info!(old = %self.fingerprint, new = %fingerprint, "Display topology changed");
        self.fingerprint = fingerprint;

        if self.slot.is_active() {
            info!("Restore in progress, ignoring display change");
            return None;
        }
        if !self.config.behavior.auto_switch_on_display_change {
            return None;
        }

        let name = self.book.find_by_fingerprint(&self.fingerprint)?.name.clone();
        info!(layout = %name, "Switching to layout saved for this display setup");
        let options = RestoreOptions {
            launch_missing: false,
            silent: true,
            no_profile_update: false,
        };
        match self.restore_layout(&name, options) {
            Ok(progress) => Some(progress),
            Err(e) => {
                warn!("Automatic restore of '{}' failed: {}", name, e);
                None
            }
        }
    }

    /// Swap in a new configuration.
    pub fn apply_config(&mut self, config: Config) {
        if config.desktops.use_internal_interface != self.config.desktops.use_internal_interface {
            warn!("desktops.use_internal_interface changes take effect after a restart");
        }
        self.settings = EngineSettings::from(&config);
        if config.placement.snap_cache_capacity != self.config.placement.snap_cache_capacity {
            self.snap_ratios = SnapRatioCache::new(self.settings.snap_cache_capacity);
        }
        self.config = config;
        info!("Configuration applied");
    }

    fn restore_options(&self, launch_missing: Option<bool>) -> RestoreOptions {
        RestoreOptions {
            launch_missing: launch_missing.unwrap_or(self.config.restore.launch_missing),
            silent: false,
            no_profile_update: false,
        }
    }

    fn status(&self) -> IpcResponse {
        IpcResponse::Status {
            active_restore: self.job.as_ref().map(|job| job.layout_name().to_string()),
            last_restored: self.last_restored.clone(),
            last_report: self.last_report.as_ref().map(report_summary),
            layouts: self.book.len(),
            monitor_fingerprint: self.fingerprint.to_string(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Handle an IPC command and return the response.
    pub fn handle_command(&mut self, cmd: IpcCommand) -> IpcResponse {
        match cmd {
            IpcCommand::SaveLayout { name } => match self.save_layout(&name) {
                Ok(saved) => IpcResponse::Saved {
                    name: saved.name,
                    windows: saved.windows,
                    replaced: saved.replaced,
                },
                Err(e) => IpcResponse::error(e.to_string()),
            },
            IpcCommand::RestoreLayout { name, launch_missing } => {
                let options = self.restore_options(launch_missing);
                match self.restore_layout(&name, options) {
                    Ok(RestoreProgress::Running { placed, total }) => IpcResponse::RestoreStarted {
                        name: name.trim().to_string(),
                        placed,
                        total,
                    },
                    Ok(RestoreProgress::Finished(report)) => IpcResponse::RestoreFinished {
                        report: report_summary(&report),
                    },
                    Err(e) => IpcResponse::error(e.to_string()),
                }
            }
            IpcCommand::ListLayouts => IpcResponse::LayoutList {
                layouts: self
                    .book
                    .iter()
                    .map(|layout| LayoutSummary {
                        name: layout.name.clone(),
                        timestamp: layout.timestamp,
                        windows: layout.windows.len(),
                        history: layout.history.len(),
                        monitor_fingerprint: layout.monitor_fingerprint.to_string(),
                    })
                    .collect(),
            },
            IpcCommand::DeleteLayout { name } => match self.delete_layout(&name) {
                Ok(()) => IpcResponse::Ok,
                Err(e) => IpcResponse::error(e.to_string()),
            },
            IpcCommand::LayoutHistory { name } => match self.book.get(&name) {
                Some(layout) => IpcResponse::History {
                    name: layout.name.clone(),
                    versions: layout
                        .history
                        .iter()
                        .enumerate()
                        .map(|(index, version)| VersionSummary {
                            index,
                            timestamp: version.timestamp,
                            windows: version.windows.len(),
                        })
                        .collect(),
                },
                None => IpcResponse::error(LayoutError::LayoutNotFound(name.trim().to_string()).to_string()),
            },
            IpcCommand::RestoreVersion { name, index } => match self.restore_version(&name, index) {
                Ok(()) => IpcResponse::Ok,
                Err(e) => IpcResponse::error(e.to_string()),
            },
            IpcCommand::QueryStatus => self.status(),
            IpcCommand::Reload => match Config::load() {
                Ok(mut new_config) => {
                    for w in new_config.validate() {
                        warn!("Config: {} - {}", w.field, w.message);
                    }
                    self.apply_config(new_config);
                    IpcResponse::Ok
                }
                Err(e) => IpcResponse::error(format!("Failed to reload config: {:#}", e)),
            },
            IpcCommand::Stop => {
                // This is handled specially in the event loop
                debug!("Stop requested");
                IpcResponse::Ok
            }
        }
    }
}
