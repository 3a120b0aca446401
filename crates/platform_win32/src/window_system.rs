//! `WindowSystem` over Win32 window and monitor APIs.

use crate::monitors::{enumerate_monitors, monitor_info, rect_from};
use crate::Win32Error;
use std::ffi::c_void;
use std::mem::size_of;
use std::path::Path;
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, RECT};
use windows::Win32::Graphics::Dwm::{DwmGetWindowAttribute, DWMWA_CLOAKED};
use windows::Win32::Graphics::Gdi::{MonitorFromWindow, MONITOR_DEFAULTTONEAREST};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::HiDpi::{
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClassNameW, GetWindowLongW, GetWindowPlacement, GetWindowRect,
    GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId, IsIconic, IsWindowVisible,
    IsZoomed, LockSetForegroundWindow, SetWindowPos, ShowWindow, GWL_EXSTYLE, LSFW_LOCK,
    LSFW_UNLOCK, SWP_NOACTIVATE, SWP_NOOWNERZORDER, SWP_NOZORDER, SW_MAXIMIZE, SW_RESTORE,
    SW_SHOWMINNOACTIVE, WINDOWPLACEMENT, WS_EX_TOOLWINDOW,
};
use winlayout_core::{MonitorInfo, PlatformError, RawWindow, Rect, WindowId, WindowState, WindowSystem};

fn hwnd(id: WindowId) -> HWND {
    HWND(id as usize as *mut c_void)
}

fn window_id(hwnd: HWND) -> WindowId {
    hwnd.0 as usize as WindowId
}

/// Opt the process into per-monitor DPI awareness so every rectangle the
/// engine sees is in physical pixels.
pub fn enable_per_monitor_dpi_awareness() -> Result<(), Win32Error> {
    unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) }
        .map_err(|e| Win32Error::DpiAwarenessFailed(e.to_string()))
}

unsafe extern "system" fn collect_window(hwnd: HWND, data: LPARAM) -> BOOL {
    let handles = &mut *(data.0 as *mut Vec<HWND>);
    handles.push(hwnd);
    BOOL::from(true)
}

fn window_text(hwnd: HWND) -> Option<String> {
    let len = unsafe { GetWindowTextLengthW(hwnd) };
    if len <= 0 {
        return Some(String::new());
    }
    let mut buf = vec![0u16; len as usize + 1];
    let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
    if copied < 0 {
        return None;
    }
    Some(String::from_utf16_lossy(&buf[..copied as usize]))
}

fn class_name(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn process_path(hwnd: HWND) -> Option<String> {
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
    if pid == 0 {
        return None;
    }

    let process = match unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) } {
        Ok(handle) => handle,
        Err(e) => {
            tracing::trace!(pid, "OpenProcess failed: {}", e);
            return None;
        }
    };

    let mut buf = vec![0u16; 1024];
    let mut size = buf.len() as u32;
    let result = unsafe {
        QueryFullProcessImageNameW(process, PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut size)
    };
    let _ = unsafe { CloseHandle(process) };

    match result {
        Ok(()) => Some(String::from_utf16_lossy(&buf[..size as usize])),
        Err(e) => {
            tracing::trace!(pid, "QueryFullProcessImageNameW failed: {}", e);
            None
        }
    }
}

fn cloak_flags(hwnd: HWND) -> u32 {
    let mut cloaked = 0u32;
    let result = unsafe {
        DwmGetWindowAttribute(
            hwnd,
            DWMWA_CLOAKED,
            &mut cloaked as *mut u32 as *mut c_void,
            size_of::<u32>() as u32,
        )
    };
    if result.is_err() {
        return 0;
    }
    cloaked
}

fn is_tool_window(hwnd: HWND) -> bool {
    let ex_style = unsafe { GetWindowLongW(hwnd, GWL_EXSTYLE) } as u32;
    ex_style & WS_EX_TOOLWINDOW.0 != 0
}

fn state_of(hwnd: HWND) -> WindowState {
    unsafe {
        if IsIconic(hwnd).as_bool() {
            WindowState::Minimized
        } else if IsZoomed(hwnd).as_bool() {
            WindowState::Maximized
        } else {
            WindowState::Normal
        }
    }
}

/// Restored rectangle of a minimized or maximized window, in screen
/// coordinates.
///
/// `rcNormalPosition` is in workspace coordinates, which are offset from
/// screen coordinates by any taskbar on the top or left edge.
fn normal_position(hwnd: HWND) -> Option<Rect> {
    let mut placement = WINDOWPLACEMENT {
        length: size_of::<WINDOWPLACEMENT>() as u32,
        ..Default::default()
    };
    unsafe { GetWindowPlacement(hwnd, &mut placement) }.ok()?;

    let rect = rect_from(&placement.rcNormalPosition);
    let monitor = unsafe { MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST) };
    Some(match monitor_info(monitor) {
        Some(m) => Rect::new(
            rect.x + m.work_area.x - m.bounds.x,
            rect.y + m.work_area.y - m.bounds.y,
            rect.width,
            rect.height,
        ),
        None => rect,
    })
}

fn outer_rect(hwnd: HWND) -> Option<Rect> {
    let mut rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut rect) }.ok()?;
    Some(rect_from(&rect))
}

/// Win32 implementation of the engine's window operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32WindowSystem;

impl Win32WindowSystem {
    pub fn new() -> Self {
        Self
    }

    /// Query everything the snapshot needs about one window.
    ///
    /// Only a vanished window is an error; any other field that cannot be
    /// read is left empty for the snapshot to judge.
    pub fn window_info(&self, id: WindowId) -> Result<RawWindow, Win32Error> {
        let handle = hwnd(id);
        outer_rect(handle).ok_or(Win32Error::WindowNotFound(id))?;

        let process_path = process_path(handle);
        let process_name = process_path.as_deref().and_then(|p| {
            Path::new(p)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        });

        Ok(RawWindow {
            id,
            title: window_text(handle),
            class_name: class_name(handle),
            process_name,
            process_path,
            rect: self.window_rect(id),
            state: state_of(handle),
            visible: unsafe { IsWindowVisible(handle) }.as_bool(),
            cloaked: cloak_flags(handle),
            tool_window: is_tool_window(handle),
        })
    }
}

impl WindowSystem for Win32WindowSystem {
    fn enumerate_windows(&self) -> Vec<RawWindow> {
        let mut handles: Vec<HWND> = Vec::new();
        if let Err(e) = unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut handles as *mut Vec<HWND> as isize),
            )
        } {
            tracing::warn!("EnumWindows failed: {}", e);
        }

        handles
            .into_iter()
            .filter_map(|h| match self.window_info(window_id(h)) {
                Ok(info) => Some(info),
                Err(e) => {
                    tracing::trace!("Skipping window: {}", e);
                    None
                }
            })
            .collect()
    }

    fn monitors(&self) -> Vec<MonitorInfo> {
        enumerate_monitors()
    }

    fn window_rect(&self, window: WindowId) -> Option<Rect> {
        let handle = hwnd(window);
        match state_of(handle) {
            WindowState::Normal => outer_rect(handle),
            _ => normal_position(handle),
        }
    }

    fn window_state(&self, window: WindowId) -> Option<WindowState> {
        let handle = hwnd(window);
        outer_rect(handle)?;
        Some(state_of(handle))
    }

    fn set_window_state(&self, window: WindowId, state: WindowState) -> Result<(), PlatformError> {
        let handle = hwnd(window);
        if outer_rect(handle).is_none() {
            return Err(PlatformError::WindowGone(window));
        }
        let command = match state {
            WindowState::Normal => SW_RESTORE,
            WindowState::Minimized => SW_SHOWMINNOACTIVE,
            WindowState::Maximized => SW_MAXIMIZE,
        };
        // The return value is the previous visibility, not a status.
        let _ = unsafe { ShowWindow(handle, command) };
        // Restoring a window minimized from maximized lands it maximized.
        if state == WindowState::Normal && unsafe { IsZoomed(handle) }.as_bool() {
            let _ = unsafe { ShowWindow(handle, SW_RESTORE) };
        }
        Ok(())
    }

    fn move_window(&self, window: WindowId, rect: Rect) -> Result<(), PlatformError> {
        unsafe {
            SetWindowPos(
                hwnd(window),
                None,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                SWP_NOZORDER | SWP_NOOWNERZORDER | SWP_NOACTIVATE,
            )
        }
        .map_err(|e| PlatformError::CallFailed {
            operation: "SetWindowPos",
            window,
            code: e.code().0,
        })
    }

    fn set_foreground_lock(&self, locked: bool) {
        let code = if locked { LSFW_LOCK } else { LSFW_UNLOCK };
        if let Err(e) = unsafe { LockSetForegroundWindow(code) } {
            tracing::debug!(locked, "LockSetForegroundWindow failed: {}", e);
        }
    }

    /// The executable's directory, so a relaunch starts where the
    /// application's relative resources resolve.
    fn launch_hint(&self, window: &RawWindow) -> Option<String> {
        let path = window.process_path.as_deref()?;
        let dir = Path::new(path).parent()?;
        if dir.as_os_str().is_empty() {
            return None;
        }
        Some(dir.to_string_lossy().into_owned())
    }
}
