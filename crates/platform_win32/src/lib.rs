//! winlayout Platform Win32
//!
//! Windows implementations of the engine's OS capability traits.
//!
//! This crate handles:
//! - Window enumeration, state and positioning ([`Win32WindowSystem`])
//! - Monitor enumeration with work areas and per-monitor DPI
//! - Virtual desktop membership through the public `IVirtualDesktopManager`
//!   ([`PublicDesktopBridge`]) and the undocumented internal manager
//!   ([`InternalDesktopBridge`])
//! - Launching missing applications ([`ProcessLauncher`])
//!
//! Everything that calls into Win32 is compiled only on Windows; the vtable
//! layout table and the launcher build everywhere.

use thiserror::Error;
use winlayout_core::{DesktopChain, DesktopError, WindowId};

pub mod internal_layout;
mod launcher;

#[cfg(windows)]
mod com;
#[cfg(windows)]
mod desktop;
#[cfg(windows)]
mod monitors;
#[cfg(windows)]
mod window_system;

pub use launcher::ProcessLauncher;

#[cfg(windows)]
pub use desktop::{InternalDesktopBridge, PublicDesktopBridge};
#[cfg(windows)]
pub use monitors::enumerate_monitors;
#[cfg(windows)]
pub use window_system::{enable_per_monitor_dpi_awareness, Win32WindowSystem};

/// Errors that can occur during Win32 setup.
#[derive(Debug, Error)]
pub enum Win32Error {
    #[error("Failed to initialize COM: {0}")]
    ComInitFailed(String),

    #[error("Failed to set DPI awareness: {0}")]
    DpiAwarenessFailed(String),

    #[error("Virtual desktop interface unavailable: {0}")]
    DesktopUnavailable(#[from] DesktopError),

    #[error("Window not found: {0:#x}")]
    WindowNotFound(WindowId),
}

/// Build the virtual desktop fallback chain.
///
/// A bridge that cannot be created is logged and left out; with neither
/// bridge the chain answers "unknown" and placement is position-only.
#[cfg(windows)]
pub fn desktop_chain(use_internal_interface: bool) -> DesktopChain {
    use winlayout_core::DesktopBridge;

    let internal: Option<Box<dyn DesktopBridge>> = if use_internal_interface {
        match InternalDesktopBridge::probe() {
            Ok(bridge) => {
                tracing::info!(layout = bridge.layout_name(), "Internal virtual desktop interface available");
                Some(Box::new(bridge))
            }
            Err(e) => {
                tracing::warn!("Internal virtual desktop interface unavailable: {}", e);
                None
            }
        }
    } else {
        tracing::debug!("Internal virtual desktop interface disabled by configuration");
        None
    };

    let public: Option<Box<dyn DesktopBridge>> = match PublicDesktopBridge::probe() {
        Ok(bridge) => Some(Box::new(bridge)),
        Err(e) => {
            tracing::warn!("Public virtual desktop interface unavailable: {}", e);
            None
        }
    };

    DesktopChain::new(internal, public)
}

/// Without Win32 there are no virtual desktops.
#[cfg(not(windows))]
pub fn desktop_chain(_use_internal_interface: bool) -> DesktopChain {
    DesktopChain::disabled()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Win32Error::WindowNotFound(0x1a2b);
        assert_eq!(err.to_string(), "Window not found: 0x1a2b");

        let err = Win32Error::from(DesktopError::Unavailable("internal", "no layout".to_string()));
        assert_eq!(
            err.to_string(),
            "Virtual desktop interface unavailable: internal bridge unavailable: no layout"
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn test_desktop_chain_disabled_off_windows() {
        assert!(!desktop_chain(true).is_enabled());
    }
}
