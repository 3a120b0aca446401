//! The restore state machine.
//!
//! A job moves `Starting -> Retrying(n) -> Done`. Each call to
//! [`RestoreJob::advance`] performs one match-and-place pass and either asks
//! the host to call again after a delay or finishes with a report. The job
//! never sleeps or spawns; the host owns the timer.

use crate::matcher::find_match;
use crate::model::{Layout, WindowEntry};
use crate::placement::Placer;
use crate::rules::RuleEngine;
use crate::settings::{to_strings, DEFAULT_SLOW_APPS};
use crate::snapshot::{LiveWindow, WindowSnapshot};
use crate::topology::MonitorTopology;
use crate::zones::ZoneEngine;
use crate::{EngineContext, WindowId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Retry rounds after the initial pass before a job gives up.
pub const MAX_RESTORE_ATTEMPTS: u32 = 13;

/// Linear backoff from `start` (first retry) to `end` (last retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelaySchedule {
    pub start: Duration,
    pub end: Duration,
}

impl DelaySchedule {
    pub const fn from_millis(start: u64, end: u64) -> Self {
        Self {
            start: Duration::from_millis(start),
            end: Duration::from_millis(end),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let n = attempt.clamp(1, MAX_RESTORE_ATTEMPTS);
        let t = (n - 1) as f64 / (MAX_RESTORE_ATTEMPTS - 1) as f64;
        let start = self.start.as_millis() as f64;
        let end = self.end.as_millis() as f64;
        Duration::from_millis((start + (end - start) * t).round().max(0.0) as u64)
    }
}

/// Chooses between the fast and slow backoff schedules.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub fast: DelaySchedule,
    pub slow: DelaySchedule,
    /// Executables that start slowly (browsers, IDEs, chat clients).
    pub slow_apps: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            fast: DelaySchedule::from_millis(200, 1500),
            slow: DelaySchedule::from_millis(500, 5000),
            slow_apps: to_strings(DEFAULT_SLOW_APPS),
        }
    }
}

impl RetryPolicy {
    pub fn is_slow_app(&self, exe: &str) -> bool {
        self.slow_apps.iter().any(|a| a.eq_ignore_ascii_case(exe))
    }

    /// Delay before retry `attempt`, slow if any pending executable is slow.
    pub fn delay_for<'e>(&self, attempt: u32, pending: impl IntoIterator<Item = &'e str>) -> Duration {
        if pending.into_iter().any(|exe| self.is_slow_app(exe)) {
            self.slow.delay_for(attempt)
        } else {
            self.fast.delay_for(attempt)
        }
    }
}

/// Per-request restore switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Launch applications whose windows are missing.
    pub launch_missing: bool,
    /// Log completion quietly (automatic restores).
    pub silent: bool,
    /// Do not record this layout as the last restored profile.
    pub no_profile_update: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Starting,
    Retrying(u32),
    Done,
}

/// A saved window that was never matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedEntry {
    pub process_exe_name: String,
    pub window_class: String,
    pub normalized_title: String,
}

impl From<&WindowEntry> for UnresolvedEntry {
    fn from(entry: &WindowEntry) -> Self {
        Self {
            process_exe_name: entry.process_exe_name.clone(),
            window_class: entry.window_class.clone(),
            normalized_title: entry.normalized_title.clone(),
        }
    }
}

/// Outcome of a finished job. Partial success is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub layout: String,
    /// Entries matched and placed (or found already in place).
    pub placed: usize,
    pub total: usize,
    /// Retry rounds run after the initial pass.
    pub attempts: u32,
    pub unresolved: Vec<UnresolvedEntry>,
    /// Entries matched whose OS move failed; the window was left as is.
    pub placement_failures: usize,
    /// Distinct applications launched.
    pub launched: usize,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && self.placement_failures == 0
    }
}

/// What the host does after [`RestoreJob::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Call `advance` again after this delay.
    Reschedule(Duration),
    Finished(RestoreReport),
}

/// Process-wide "a restore is running" flag.
#[derive(Debug, Clone, Default)]
pub struct ActiveJobSlot {
    active: Arc<AtomicBool>,
}

impl ActiveJobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Claim the slot; None if a job already holds it.
    pub fn try_acquire(&self) -> Option<JobTicket> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| JobTicket {
                active: Arc::clone(&self.active),
            })
    }
}

/// Proof of holding the [`ActiveJobSlot`]; releases it on drop.
#[derive(Debug)]
pub struct JobTicket {
    active: Arc<AtomicBool>,
}

impl Drop for JobTicket {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// One in-flight restore.
pub struct RestoreJob {
    layout: Layout,
    options: RestoreOptions,
    state: JobState,
    /// Indices into `layout.windows`, in stored order.
    unresolved: Vec<usize>,
    claimed: HashSet<WindowId>,
    placed_windows: Vec<LiveWindow>,
    placed: usize,
    placement_failures: usize,
    launched: HashSet<(String, Option<String>)>,
    attempts: u32,
    ticket: Option<JobTicket>,
}

impl RestoreJob {
    pub fn new(layout: Layout, options: RestoreOptions, ticket: JobTicket) -> Self {
        let unresolved = (0..layout.windows.len()).collect();
        Self {
            layout,
            options,
            state: JobState::Starting,
            unresolved,
            claimed: HashSet::new(),
            placed_windows: Vec::new(),
            placed: 0,
            placement_failures: 0,
            launched: HashSet::new(),
            attempts: 0,
            ticket: Some(ticket),
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn layout_name(&self) -> &str {
        &self.layout.name
    }

    pub fn options(&self) -> RestoreOptions {
        self.options
    }

    /// `(placed, total)` so far.
    pub fn progress(&self) -> (usize, usize) {
        (self.placed, self.layout.windows.len())
    }

    /// Run the pass for the current state and transition.
    pub fn advance(&mut self, ctx: &EngineContext<'_>) -> Step {
        match self.state {
            JobState::Starting => {
                ctx.system.set_foreground_lock(true);
                tracing::info!(
                    layout = %self.layout.name,
                    windows = self.layout.windows.len(),
                    "Starting restore"
                );

                self.run_pass(ctx);
                if self.unresolved.is_empty() {
                    return Step::Finished(self.finish(ctx));
                }
                if self.options.launch_missing {
                    self.launch_missing(ctx);
                }
                self.reschedule(ctx, 1)
            }
            JobState::Retrying(n) => {
                self.attempts = n;
                self.run_pass(ctx);
                if self.unresolved.is_empty() || n >= MAX_RESTORE_ATTEMPTS {
                    return Step::Finished(self.finish(ctx));
                }
                self.reschedule(ctx, n + 1)
            }
            JobState::Done => Step::Finished(self.report()),
        }
    }

    fn reschedule(&mut self, ctx: &EngineContext<'_>, attempt: u32) -> Step {
        self.state = JobState::Retrying(attempt);
        let pending = self
            .unresolved
            .iter()
            .map(|&i| self.layout.windows[i].process_exe_name.as_str());
        let delay = ctx.settings.retry.delay_for(attempt, pending);
        tracing::debug!(
            layout = %self.layout.name,
            attempt,
            unresolved = self.unresolved.len(),
            delay_ms = delay.as_millis() as u64,
            "Scheduling retry"
        );
        Step::Reschedule(delay)
    }

    /// Match and place every unresolved entry once, in stored order.
    fn run_pass(&mut self, ctx: &EngineContext<'_>) {
        let topology = MonitorTopology::from_system(ctx.system);
        let pool = WindowSnapshot::new(ctx).capture_live(&topology, &self.claimed);
        let placer = Placer::new(ctx, &topology);

        let mut still_unresolved = Vec::new();
        for index in std::mem::take(&mut self.unresolved) {
            let entry = &self.layout.windows[index];
            let claimed = &self.claimed;
            let Some(window) = find_match(entry, pool.iter().filter(|w| !claimed.contains(&w.id)))
                .map(|m| m.window.clone())
            else {
                still_unresolved.push(index);
                continue;
            };
            self.claimed.insert(window.id);

            let target = placer.target_rect(entry);
            if placer.is_already_placed(&window, entry, &target) {
                tracing::debug!(window = window.id, exe = %entry.process_exe_name, "Already in place");
                self.placed += 1;
                self.placed_windows.push(window);
                continue;
            }

            match placer.place(&window, entry) {
                Ok(outcome) => {
                    tracing::debug!(
                        window = window.id,
                        exe = %entry.process_exe_name,
                        snap_corrected = outcome.snap_corrected,
                        desktop_moved = ?outcome.desktop_moved,
                        "Placed window"
                    );
                    self.placed += 1;
                    self.placed_windows.push(window);
                }
                Err(e) => {
                    tracing::warn!(window = window.id, exe = %entry.process_exe_name, "Placement failed: {}", e);
                    self.placement_failures += 1;
                }
            }
        }
        self.unresolved = still_unresolved;
    }

    /// Launch each distinct missing application once per job.
    fn launch_missing(&mut self, ctx: &EngineContext<'_>) {
        let Some(launcher) = ctx.launcher else {
            return;
        };

        for &index in &self.unresolved {
            let entry = &self.layout.windows[index];
            let Some(path) = entry.process_path.as_deref().filter(|p| !p.is_empty()) else {
                continue;
            };
            let key = (path.to_lowercase(), entry.launch_hint.clone());
            if !self.launched.insert(key) {
                continue;
            }
            match launcher.launch(path, entry.launch_hint.as_deref()) {
                Ok(()) => tracing::info!(path, "Launched missing application"),
                Err(e) => tracing::warn!("{}", e),
            }
        }
    }

    fn finish(&mut self, ctx: &EngineContext<'_>) -> RestoreReport {
        let settings = ctx.settings;
        let topology = MonitorTopology::from_system(ctx.system);

        if settings.zones.snap_after_restore {
            let ids: Vec<WindowId> = self.placed_windows.iter().map(|w| w.id).collect();
            ZoneEngine::new(&topology, &settings.zones.monitors).snap_windows(ctx, &ids);
        }
        RuleEngine::new(&settings.rules).apply(ctx, &topology, &self.placed_windows);

        ctx.system.set_foreground_lock(false);
        self.state = JobState::Done;
        self.ticket.take();

        let report = self.report();
        if self.options.silent {
            tracing::debug!(
                layout = %report.layout,
                placed = report.placed,
                total = report.total,
                attempts = report.attempts,
                "Restore finished"
            );
        } else {
            tracing::info!(
                layout = %report.layout,
                placed = report.placed,
                total = report.total,
                attempts = report.attempts,
                unresolved = report.unresolved.len(),
                failures = report.placement_failures,
                "Restore finished"
            );
        }
        report
    }

    fn report(&self) -> RestoreReport {
        RestoreReport {
            layout: self.layout.name.clone(),
            placed: self.placed,
            total: self.layout.windows.len(),
            attempts: self.attempts,
            unresolved: self
                .unresolved
                .iter()
                .map(|&i| UnresolvedEntry::from(&self.layout.windows[i]))
                .collect(),
            placement_failures: self.placement_failures,
            launched: self.launched.len(),
        }
    }
}
