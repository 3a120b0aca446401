//! In-crate fakes of the OS collaborators.

use crate::desktop::{DesktopBridge, DesktopChain, DesktopError, DesktopId};
use crate::model::{Layout, WindowEntry};
use crate::placement::SnapRatioCache;
use crate::platform::{Launcher, PlatformError, RawWindow, WindowSystem};
use crate::settings::EngineSettings;
use crate::snapshot::LiveWindow;
use crate::topology::{MonitorFingerprint, MonitorInfo};
use crate::{EngineContext, Rect, WindowId, WindowState};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

/// A mutating call recorded by [`FakeSystem`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call {
    Move(WindowId, Rect),
    SetState(WindowId, WindowState),
    Pause(Duration),
}

struct Pending {
    window: RawWindow,
    visible_from: usize,
}

#[derive(Default)]
pub struct FakeSystem {
    monitors: Vec<MonitorInfo>,
    windows: RefCell<Vec<RawWindow>>,
    pending: RefCell<Vec<Pending>>,
    enumerations: Cell<usize>,
    inflation: HashMap<WindowId, f64>,
    failing: HashSet<WindowId>,
    restores_to_maximized: HashSet<WindowId>,
    hints: HashMap<WindowId, String>,
    calls: RefCell<Vec<Call>>,
    locks: RefCell<Vec<bool>>,
}

impl FakeSystem {
    pub fn new(monitors: Vec<MonitorInfo>) -> Self {
        Self {
            monitors,
            ..Default::default()
        }
    }

    pub fn add(&mut self, window: RawWindow) {
        self.windows.get_mut().push(window);
    }

    /// Add a window that only shows up once `after` enumerations have run.
    pub fn add_pending(&mut self, window: RawWindow, after: usize) {
        self.pending.get_mut().push(Pending {
            window,
            visible_from: after + 1,
        });
    }

    pub fn add_live(&mut self, live: &LiveWindow, state: WindowState) {
        let e = &live.entry;
        let mut window = raw(live.id, &e.process_exe_name, &e.window_class, &e.raw_title, e.rect);
        window.state = state;
        window.process_path = e.process_path.clone();
        self.add(window);
    }

    /// Every move of `window` comes out `factor` times taller.
    pub fn set_inflation(&mut self, window: WindowId, factor: f64) {
        self.inflation.insert(window, factor);
    }

    /// Restoring `window` from minimized lands it maximized, as Windows does
    /// for windows minimized while maximized.
    pub fn restore_to_maximized(&mut self, window: WindowId) {
        self.restores_to_maximized.insert(window);
    }

    pub fn set_launch_hint(&mut self, window: WindowId, hint: &str) {
        self.hints.insert(window, hint.to_string());
    }

    pub fn fail_moves_for(&mut self, window: WindowId) {
        self.failing.insert(window);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn lock_history(&self) -> Vec<bool> {
        self.locks.borrow().clone()
    }

    pub fn rect_of(&self, window: WindowId) -> Option<Rect> {
        self.window_rect(window)
    }

    fn with_window<R>(&self, id: WindowId, f: impl FnOnce(&mut RawWindow) -> R) -> Option<R> {
        self.windows.borrow_mut().iter_mut().find(|w| w.id == id).map(f)
    }
}

impl WindowSystem for FakeSystem {
    fn enumerate_windows(&self) -> Vec<RawWindow> {
        let count = self.enumerations.get() + 1;
        self.enumerations.set(count);

        let mut pending = self.pending.borrow_mut();
        let (ready, waiting): (Vec<Pending>, Vec<Pending>) =
            pending.drain(..).partition(|p| p.visible_from <= count);
        *pending = waiting;
        self.windows
            .borrow_mut()
            .extend(ready.into_iter().map(|p| p.window));

        self.windows.borrow().clone()
    }

    fn monitors(&self) -> Vec<MonitorInfo> {
        self.monitors.clone()
    }

    fn window_rect(&self, window: WindowId) -> Option<Rect> {
        self.windows
            .borrow()
            .iter()
            .find(|w| w.id == window)
            .and_then(|w| w.rect)
    }

    fn window_state(&self, window: WindowId) -> Option<WindowState> {
        self.windows
            .borrow()
            .iter()
            .find(|w| w.id == window)
            .map(|w| w.state)
    }

    fn set_window_state(&self, window: WindowId, state: WindowState) -> Result<(), PlatformError> {
        self.calls.borrow_mut().push(Call::SetState(window, state));
        let maximize_instead = self.restores_to_maximized.contains(&window);
        self.with_window(window, |w| {
            w.state = match (w.state, state) {
                (WindowState::Minimized, WindowState::Normal) if maximize_instead => WindowState::Maximized,
                _ => state,
            };
        })
        .ok_or(PlatformError::WindowGone(window))
    }

    fn move_window(&self, window: WindowId, rect: Rect) -> Result<(), PlatformError> {
        if self.failing.contains(&window) {
            return Err(PlatformError::CallFailed {
                operation: "SetWindowPos",
                window,
                code: 5,
            });
        }
        self.calls.borrow_mut().push(Call::Move(window, rect));
        let factor = self.inflation.get(&window).copied().unwrap_or(1.0);
        let actual = rect.with_height((rect.height as f64 * factor).round() as i32);
        self.with_window(window, |w| w.rect = Some(actual))
            .ok_or(PlatformError::WindowGone(window))
    }

    fn set_foreground_lock(&self, locked: bool) {
        self.locks.borrow_mut().push(locked);
    }

    fn launch_hint(&self, window: &RawWindow) -> Option<String> {
        self.hints.get(&window.id).cloned()
    }

    fn pause(&self, duration: Duration) {
        self.calls.borrow_mut().push(Call::Pause(duration));
    }
}

#[derive(Default)]
struct DesktopState {
    windows: HashMap<WindowId, DesktopId>,
    current: Option<DesktopId>,
    moves: Vec<(WindowId, DesktopId)>,
    fail_moves: bool,
}

/// Shared-state fake bridge; clones observe the same state.
#[derive(Clone)]
pub struct FakeDesktops {
    name: &'static str,
    state: Rc<RefCell<DesktopState>>,
}

impl FakeDesktops {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Rc::new(RefCell::new(DesktopState::default())),
        }
    }

    pub fn set_window(&self, window: WindowId, desktop: DesktopId) {
        self.state.borrow_mut().windows.insert(window, desktop);
    }

    pub fn set_current(&self, desktop: DesktopId) {
        self.state.borrow_mut().current = Some(desktop);
    }

    pub fn fail_moves(&self) {
        self.state.borrow_mut().fail_moves = true;
    }

    pub fn moves(&self) -> Vec<(WindowId, DesktopId)> {
        self.state.borrow().moves.clone()
    }
}

impl DesktopBridge for FakeDesktops {
    fn name(&self) -> &'static str {
        self.name
    }

    fn window_desktop(&self, window: WindowId) -> Result<DesktopId, DesktopError> {
        self.state
            .borrow()
            .windows
            .get(&window)
            .copied()
            .ok_or(DesktopError::Unavailable(self.name, "unknown window".to_string()))
    }

    fn is_on_current_desktop(&self, window: WindowId) -> Result<bool, DesktopError> {
        let current = self
            .state
            .borrow()
            .current
            .ok_or(DesktopError::Unavailable(self.name, "no current desktop".to_string()))?;
        Ok(self.window_desktop(window)? == current)
    }

    fn move_to_desktop(&self, window: WindowId, desktop: DesktopId) -> Result<(), DesktopError> {
        let mut state = self.state.borrow_mut();
        if state.fail_moves {
            return Err(DesktopError::CallFailed {
                operation: "MoveViewToDesktop",
                code: 0x8000_4005_u32 as i32,
            });
        }
        state.moves.push((window, desktop));
        state.windows.insert(window, desktop);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    launches: Rc<RefCell<Vec<(String, Option<String>)>>>,
}

impl FakeLauncher {
    pub fn launches(&self) -> Vec<(String, Option<String>)> {
        self.launches.borrow().clone()
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, path: &str, launch_hint: Option<&str>) -> Result<(), PlatformError> {
        self.launches
            .borrow_mut()
            .push((path.to_string(), launch_hint.map(str::to_string)));
        Ok(())
    }
}

/// Owns one of everything an [`EngineContext`] borrows.
pub struct Harness {
    pub system: FakeSystem,
    pub desktops: DesktopChain,
    pub launcher: FakeLauncher,
    pub settings: EngineSettings,
    pub snap_ratios: SnapRatioCache,
    internal: Option<FakeDesktops>,
    public: Option<FakeDesktops>,
}

impl Harness {
    pub fn with_monitors(monitors: Vec<MonitorInfo>) -> Self {
        Self {
            system: FakeSystem::new(monitors),
            desktops: DesktopChain::disabled(),
            launcher: FakeLauncher::default(),
            settings: EngineSettings::default(),
            snap_ratios: SnapRatioCache::default(),
            internal: None,
            public: None,
        }
    }

    /// One 1920x1080 monitor with a 40px taskbar.
    pub fn single_monitor() -> Self {
        let mut monitor = MonitorInfo::new(Rect::new(0, 0, 1920, 1080));
        monitor.work_area = Rect::new(0, 0, 1920, 1040);
        monitor.is_primary = true;
        Self::with_monitors(vec![monitor])
    }

    pub fn set_internal_bridge(&mut self, bridge: FakeDesktops) {
        self.internal = Some(bridge);
        self.rebuild_chain();
    }

    pub fn set_public_bridge(&mut self, bridge: FakeDesktops) {
        self.public = Some(bridge);
        self.rebuild_chain();
    }

    fn rebuild_chain(&mut self) {
        let boxed = |b: &Option<FakeDesktops>| {
            b.clone().map(|b| Box::new(b) as Box<dyn DesktopBridge>)
        };
        self.desktops = DesktopChain::new(boxed(&self.internal), boxed(&self.public));
    }

    pub fn with_ctx<R>(&self, f: impl FnOnce(&EngineContext<'_>) -> R) -> R {
        let ctx = EngineContext {
            system: &self.system,
            desktops: &self.desktops,
            launcher: Some(&self.launcher),
            settings: &self.settings,
            snap_ratios: &self.snap_ratios,
        };
        f(&ctx)
    }
}

pub fn raw(id: WindowId, exe: &str, class: &str, title: &str, rect: Rect) -> RawWindow {
    RawWindow {
        id,
        title: Some(title.to_string()),
        class_name: class.to_string(),
        process_name: Some(exe.to_string()),
        process_path: Some(format!("C:\\Apps\\{}", exe)),
        rect: Some(rect),
        state: WindowState::Normal,
        visible: true,
        cloaked: 0,
        tool_window: false,
    }
}

pub fn entry_at(exe: &str, class: &str, title: &str, rect: Rect) -> WindowEntry {
    WindowEntry {
        process_exe_name: exe.to_string(),
        process_path: None,
        raw_title: title.to_string(),
        normalized_title: title.to_string(),
        window_class: class.to_string(),
        rect,
        state: WindowState::Normal,
        monitor_index: 1,
        dpi_scale: 1.0,
        virtual_desktop_id: None,
        virtual_desktop_index: None,
        launch_hint: None,
    }
}

pub fn entry(exe: &str, class: &str, title: &str) -> WindowEntry {
    entry_at(exe, class, title, Rect::new(100, 100, 800, 600))
}

pub fn live_at(id: WindowId, exe: &str, class: &str, title: &str, rect: Rect) -> LiveWindow {
    LiveWindow {
        id,
        entry: entry_at(exe, class, title, rect),
    }
}

pub fn live(id: WindowId, exe: &str, class: &str, title: &str) -> LiveWindow {
    LiveWindow {
        id,
        entry: entry(exe, class, title),
    }
}

pub fn layout(name: &str, windows: Vec<WindowEntry>) -> Layout {
    Layout {
        name: name.to_string(),
        timestamp: 0,
        monitor_fingerprint: MonitorFingerprint::default(),
        windows,
        history: VecDeque::new(),
    }
}
