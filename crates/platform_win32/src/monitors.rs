//! Monitor enumeration with work areas and per-monitor DPI.

use std::mem::size_of;
use windows::Win32::Foundation::{BOOL, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO, MONITORINFOEXW,
};
use windows::Win32::UI::HiDpi::{GetDpiForMonitor, MDT_EFFECTIVE_DPI};
use winlayout_core::topology::dpi_to_scale;
use winlayout_core::{MonitorInfo, Rect};

/// `MONITORINFO::dwFlags` bit of the primary monitor.
const MONITORINFOF_PRIMARY: u32 = 0x1;

pub(crate) fn rect_from(r: &RECT) -> Rect {
    Rect::new(r.left, r.top, r.right - r.left, r.bottom - r.top)
}

unsafe extern "system" fn collect_monitor(
    monitor: HMONITOR,
    _hdc: HDC,
    _clip: *mut RECT,
    data: LPARAM,
) -> BOOL {
    let handles = &mut *(data.0 as *mut Vec<HMONITOR>);
    handles.push(monitor);
    BOOL::from(true)
}

pub(crate) fn monitor_info(monitor: HMONITOR) -> Option<MonitorInfo> {
    let mut info = MONITORINFOEXW::default();
    info.monitorInfo.cbSize = size_of::<MONITORINFOEXW>() as u32;

    let ok = unsafe { GetMonitorInfoW(monitor, &mut info.monitorInfo as *mut MONITORINFO) };
    if !ok.as_bool() {
        tracing::debug!("GetMonitorInfoW failed for {:?}", monitor);
        return None;
    }

    let mut dpi_x = 0u32;
    let mut dpi_y = 0u32;
    let dpi_scale = match unsafe { GetDpiForMonitor(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y) } {
        Ok(()) => dpi_to_scale(dpi_x),
        Err(e) => {
            tracing::debug!("GetDpiForMonitor failed: {}", e);
            1.0
        }
    };

    let name_len = info
        .szDevice
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(info.szDevice.len());

    Some(MonitorInfo {
        bounds: rect_from(&info.monitorInfo.rcMonitor),
        work_area: rect_from(&info.monitorInfo.rcWork),
        dpi_scale,
        is_primary: info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
        device_name: String::from_utf16_lossy(&info.szDevice[..name_len]),
    })
}

/// All attached monitors, in OS enumeration order.
pub fn enumerate_monitors() -> Vec<MonitorInfo> {
    let mut handles: Vec<HMONITOR> = Vec::new();
    let ok = unsafe {
        EnumDisplayMonitors(
            None,
            None,
            Some(collect_monitor),
            LPARAM(&mut handles as *mut Vec<HMONITOR> as isize),
        )
    };
    if !ok.as_bool() {
        tracing::warn!("EnumDisplayMonitors failed");
    }

    handles.into_iter().filter_map(monitor_info).collect()
}
