//! Virtual desktop bridges.
//!
//! Both bridges enter a COM apartment per call and hold no interface
//! pointers between calls, so they can live on any thread.

use crate::com::{vtable_slot, ComScope};
use crate::internal_layout::{
    InternalLayout, CLSID_IMMERSIVE_SHELL, GET_VIEW_FOR_HWND_SLOT, IID_APPLICATION_VIEW_COLLECTION,
    KNOWN_LAYOUTS, SID_VIRTUAL_DESKTOP_MANAGER_INTERNAL,
};
use std::ffi::c_void;
use std::ptr::null_mut;
use windows::core::{IUnknown, Interface, GUID, HRESULT};
use windows::Win32::Foundation::HWND;
use windows::Win32::System::Com::{
    CoCreateInstance, IServiceProvider, CLSCTX_ALL, CLSCTX_LOCAL_SERVER,
};
use windows::Win32::UI::Shell::{IVirtualDesktopManager, VirtualDesktopManager};
use winlayout_core::{DesktopBridge, DesktopError, DesktopId, WindowId};

const PUBLIC: &str = "public";
const INTERNAL: &str = "internal";

fn hwnd(id: WindowId) -> HWND {
    HWND(id as usize as *mut c_void)
}

fn unavailable(bridge: &'static str, e: windows::core::Error) -> DesktopError {
    DesktopError::Unavailable(bridge, e.to_string())
}

fn call_failed(operation: &'static str, e: windows::core::Error) -> DesktopError {
    DesktopError::CallFailed {
        operation,
        code: e.code().0,
    }
}

fn check(operation: &'static str, hr: HRESULT, out: *mut c_void) -> Result<IUnknown, DesktopError> {
    if hr.is_err() || out.is_null() {
        return Err(DesktopError::CallFailed {
            operation,
            code: hr.0,
        });
    }
    Ok(unsafe { IUnknown::from_raw(out) })
}

/// Desktop bridge over the documented `IVirtualDesktopManager`.
///
/// Reads work for any window; moves only succeed for windows owned by this
/// process.
pub struct PublicDesktopBridge;

impl PublicDesktopBridge {
    /// Check that the manager can be created.
    pub fn probe() -> Result<Self, DesktopError> {
        Self::with_manager(|_| Ok(()))?;
        Ok(Self)
    }

    fn with_manager<R>(
        f: impl FnOnce(&IVirtualDesktopManager) -> Result<R, DesktopError>,
    ) -> Result<R, DesktopError> {
        let _com = ComScope::enter().map_err(|e| unavailable(PUBLIC, e))?;
        let manager: IVirtualDesktopManager =
            unsafe { CoCreateInstance(&VirtualDesktopManager, None, CLSCTX_ALL) }
                .map_err(|e| unavailable(PUBLIC, e))?;
        f(&manager)
    }
}

impl DesktopBridge for PublicDesktopBridge {
    fn name(&self) -> &'static str {
        PUBLIC
    }

    fn window_desktop(&self, window: WindowId) -> Result<DesktopId, DesktopError> {
        Self::with_manager(|m| {
            let guid = unsafe { m.GetWindowDesktopId(hwnd(window)) }
                .map_err(|e| call_failed("GetWindowDesktopId", e))?;
            if guid == GUID::zeroed() {
                return Err(DesktopError::Unavailable(PUBLIC, "window has no desktop".to_string()));
            }
            Ok(DesktopId::from_u128(guid.to_u128()))
        })
    }

    fn is_on_current_desktop(&self, window: WindowId) -> Result<bool, DesktopError> {
        Self::with_manager(|m| {
            unsafe { m.IsWindowOnCurrentVirtualDesktop(hwnd(window)) }
                .map(|b| b.as_bool())
                .map_err(|e| call_failed("IsWindowOnCurrentVirtualDesktop", e))
        })
    }

    fn move_to_desktop(&self, window: WindowId, desktop: DesktopId) -> Result<(), DesktopError> {
        let guid = GUID::from_u128(desktop.as_u128());
        Self::with_manager(|m| {
            unsafe { m.MoveWindowToDesktop(hwnd(window), &guid) }
                .map_err(|e| call_failed("MoveWindowToDesktop", e))
        })
    }
}

type GetViewForHwndFn = unsafe extern "system" fn(*mut c_void, HWND, *mut *mut c_void) -> HRESULT;
type FindDesktopFn = unsafe extern "system" fn(*mut c_void, *const GUID, *mut *mut c_void) -> HRESULT;
type MoveViewToDesktopFn = unsafe extern "system" fn(*mut c_void, *mut c_void, *mut c_void) -> HRESULT;

fn immersive_shell() -> Result<IServiceProvider, DesktopError> {
    unsafe {
        CoCreateInstance(
            &GUID::from_u128(CLSID_IMMERSIVE_SHELL),
            None,
            CLSCTX_LOCAL_SERVER,
        )
    }
    .map_err(|e| unavailable(INTERNAL, e))
}

/// `IServiceProvider::QueryService` with ids only known at runtime.
fn query_service(provider: &IServiceProvider, service: u128, iid: u128) -> Result<IUnknown, DesktopError> {
    let service = GUID::from_u128(service);
    let iid = GUID::from_u128(iid);
    let mut out: *mut c_void = null_mut();
    let hr = unsafe {
        (Interface::vtable(provider).QueryService)(Interface::as_raw(provider), &service, &iid, &mut out)
    };
    check("QueryService", hr, out)
}

/// Desktop bridge over the undocumented `IVirtualDesktopManagerInternal`.
///
/// Moves windows of any process. Reads are left to the public bridge.
pub struct InternalDesktopBridge {
    layout: &'static InternalLayout,
}

impl InternalDesktopBridge {
    /// Find the interface layout this OS build answers for.
    pub fn probe() -> Result<Self, DesktopError> {
        let _com = ComScope::enter().map_err(|e| unavailable(INTERNAL, e))?;
        let shell = immersive_shell()?;

        for layout in KNOWN_LAYOUTS {
            match query_service(&shell, SID_VIRTUAL_DESKTOP_MANAGER_INTERNAL, layout.iid) {
                Ok(_) => return Ok(Self { layout }),
                Err(e) => tracing::trace!(layout = layout.name, "Internal layout rejected: {}", e),
            }
        }
        Err(DesktopError::Unavailable(
            INTERNAL,
            "no known interface layout on this build".to_string(),
        ))
    }

    pub fn layout_name(&self) -> &'static str {
        self.layout.name
    }
}

impl DesktopBridge for InternalDesktopBridge {
    fn name(&self) -> &'static str {
        INTERNAL
    }

    fn window_desktop(&self, _window: WindowId) -> Result<DesktopId, DesktopError> {
        Err(DesktopError::Unavailable(INTERNAL, "reads use the public interface".to_string()))
    }

    fn is_on_current_desktop(&self, _window: WindowId) -> Result<bool, DesktopError> {
        Err(DesktopError::Unavailable(INTERNAL, "reads use the public interface".to_string()))
    }

    fn move_to_desktop(&self, window: WindowId, desktop: DesktopId) -> Result<(), DesktopError> {
        let _com = ComScope::enter().map_err(|e| unavailable(INTERNAL, e))?;
        let shell = immersive_shell()?;
        let views = query_service(&shell, IID_APPLICATION_VIEW_COLLECTION, IID_APPLICATION_VIEW_COLLECTION)?;
        let manager = query_service(&shell, SID_VIRTUAL_DESKTOP_MANAGER_INTERNAL, self.layout.iid)?;

        let mut raw_view: *mut c_void = null_mut();
        let hr = unsafe {
            let get_view: GetViewForHwndFn = vtable_slot(views.as_raw(), GET_VIEW_FOR_HWND_SLOT);
            get_view(views.as_raw(), hwnd(window), &mut raw_view)
        };
        let view = check("GetViewForHwnd", hr, raw_view)?;

        let guid = GUID::from_u128(desktop.as_u128());
        let mut raw_desktop: *mut c_void = null_mut();
        let hr = unsafe {
            let find_desktop: FindDesktopFn = vtable_slot(manager.as_raw(), self.layout.find_desktop_slot);
            find_desktop(manager.as_raw(), &guid, &mut raw_desktop)
        };
        let target = check("FindDesktop", hr, raw_desktop)?;

        let hr = unsafe {
            let move_view: MoveViewToDesktopFn = vtable_slot(manager.as_raw(), self.layout.move_view_slot);
            move_view(manager.as_raw(), view.as_raw(), target.as_raw())
        };
        if hr.is_err() {
            return Err(DesktopError::CallFailed {
                operation: "MoveViewToDesktop",
                code: hr.0,
            });
        }
        Ok(())
    }
}
