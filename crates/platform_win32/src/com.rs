//! COM apartment scope and raw vtable access.

use std::ffi::c_void;
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED};

/// Initializes COM on the current thread for the lifetime of the guard.
///
/// A thread already initialized in another apartment mode is tolerated; the
/// guard then leaves uninitialization to whoever initialized it.
pub(crate) struct ComScope {
    initialized: bool,
}

impl ComScope {
    pub(crate) fn enter() -> Result<Self, windows::core::Error> {
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr.is_ok() {
            Ok(Self { initialized: true })
        } else if hr == RPC_E_CHANGED_MODE {
            Ok(Self { initialized: false })
        } else {
            Err(windows::core::Error::from(hr))
        }
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        if self.initialized {
            unsafe { CoUninitialize() };
        }
    }
}

/// Read method `index` from the vtable of the COM object at `this`.
///
/// # Safety
///
/// `this` must be a live COM interface pointer whose vtable has at least
/// `index + 1` entries, and `F` must be the exact `extern "system"` signature
/// of that entry.
pub(crate) unsafe fn vtable_slot<F: Copy>(this: *mut c_void, index: usize) -> F {
    let vtable = *(this as *const *const *const c_void);
    let entry = *vtable.add(index);
    std::mem::transmute_copy(&entry)
}
