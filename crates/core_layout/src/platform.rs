//! Capability surface the engine requires from the operating system.
//!
//! The Win32 implementation lives in `winlayout-platform-win32`; tests use
//! in-crate fakes.

use crate::topology::MonitorInfo;
use crate::{Rect, WindowId, WindowState};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by an OS collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("{operation} failed for window {window:#x} (status {code:#010x})")]
    CallFailed {
        operation: &'static str,
        window: WindowId,
        code: i32,
    },

    #[error("Window {0:#x} no longer exists")]
    WindowGone(WindowId),

    #[error("Failed to launch {path}: {message}")]
    LaunchFailed { path: String, message: String },
}

/// DWM cloak bit set by the shell; windows on another virtual desktop carry it.
pub const CLOAKED_SHELL: u32 = 0x2;

/// One top-level window as reported by the OS, before any filtering.
///
/// Fields that can fail to resolve are optional; the snapshot decides which
/// failures reject the window and which are tolerated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWindow {
    pub id: WindowId,
    pub title: Option<String>,
    pub class_name: String,
    /// Executable file name, e.g. `notepad.exe`.
    pub process_name: Option<String>,
    /// Full path to the executable.
    pub process_path: Option<String>,
    /// Restored (normal) rectangle; for minimized windows this is the
    /// position the window returns to.
    pub rect: Option<Rect>,
    pub state: WindowState,
    pub visible: bool,
    /// Raw DWM cloak flags (0 when not cloaked).
    pub cloaked: u32,
    pub tool_window: bool,
}

/// Window and monitor operations the engine performs.
pub trait WindowSystem {
    /// Enumerate all top-level windows, including ones on other virtual desktops.
    fn enumerate_windows(&self) -> Vec<RawWindow>;

    /// Enumerate monitors with geometry, work area and DPI scale.
    fn monitors(&self) -> Vec<MonitorInfo>;

    /// Current outer rectangle of a window.
    fn window_rect(&self, window: WindowId) -> Option<Rect>;

    /// Current min/max state of a window.
    fn window_state(&self, window: WindowId) -> Option<WindowState>;

    /// Minimize, maximize or restore a window.
    fn set_window_state(&self, window: WindowId, state: WindowState) -> Result<(), PlatformError>;

    /// Move and resize a window.
    fn move_window(&self, window: WindowId, rect: Rect) -> Result<(), PlatformError>;

    /// Lock or release foreground-window changes by other processes.
    fn set_foreground_lock(&self, locked: bool);

    /// Working directory or workspace path to relaunch the window's
    /// application with, recorded at capture time.
    fn launch_hint(&self, _window: &RawWindow) -> Option<String> {
        None
    }

    /// Short, bounded stabilization pause.
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Launches applications whose windows are missing during a restore.
pub trait Launcher {
    /// Start the executable at `path`. `launch_hint` is a working directory or
    /// workspace path recorded at capture time.
    fn launch(&self, path: &str, launch_hint: Option<&str>) -> Result<(), PlatformError>;
}
