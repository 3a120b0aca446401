//! Virtual desktop identity and the bridge fallback chain.
//!
//! Two bridges exist on Windows: the documented public interface (which can
//! read a window's desktop but only move windows owned by the calling
//! process) and the undocumented internal interface (which can move any
//! window but whose layout changes between OS builds). The chain tries them
//! in a fixed order per operation and degrades to "unknown" when both fail.

use crate::model::WindowEntry;
use crate::WindowId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors reported by a virtual desktop bridge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DesktopError {
    #[error("{0} bridge unavailable: {1}")]
    Unavailable(&'static str, String),

    #[error("{operation} failed (status {code:#010x})")]
    CallFailed { operation: &'static str, code: i32 },

    #[error("Invalid desktop id '{0}'")]
    InvalidId(String),
}

/// Identifier of a virtual desktop (a GUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DesktopId(u128);

impl DesktopId {
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for DesktopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:04X}-{:012X}}}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xFFFF_FFFF_FFFF
        )
    }
}

impl FromStr for DesktopId {
    type Err = DesktopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s
            .trim()
            .trim_start_matches('{')
            .trim_end_matches('}')
            .chars()
            .filter(|c| *c != '-')
            .collect();

        if hex.len() != 32 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DesktopError::InvalidId(s.to_string()));
        }

        u128::from_str_radix(&hex, 16)
            .map(Self)
            .map_err(|_| DesktopError::InvalidId(s.to_string()))
    }
}

impl TryFrom<String> for DesktopId {
    type Error = DesktopError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DesktopId> for String {
    fn from(value: DesktopId) -> Self {
        value.to_string()
    }
}

/// One way of reading and changing virtual desktop membership.
pub trait DesktopBridge {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Desktop that currently hosts the window.
    fn window_desktop(&self, window: WindowId) -> Result<DesktopId, DesktopError>;

    /// Whether the window is on the desktop the user is looking at.
    fn is_on_current_desktop(&self, window: WindowId) -> Result<bool, DesktopError>;

    /// Move the window to another desktop.
    fn move_to_desktop(&self, window: WindowId, desktop: DesktopId) -> Result<(), DesktopError>;
}

/// Ordered fallback over the available desktop bridges.
///
/// Moves try the internal bridge first (it can move foreign windows) and
/// reads try the public bridge first (it is stable across OS builds).
#[derive(Default)]
pub struct DesktopChain {
    internal: Option<Box<dyn DesktopBridge>>,
    public: Option<Box<dyn DesktopBridge>>,
}

impl DesktopChain {
    pub fn new(
        internal: Option<Box<dyn DesktopBridge>>,
        public: Option<Box<dyn DesktopBridge>>,
    ) -> Self {
        Self { internal, public }
    }

    /// A chain with no bridges: every query answers "unknown".
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.internal.is_some() || self.public.is_some()
    }

    fn bridges(&self, internal_first: bool) -> Vec<&dyn DesktopBridge> {
        let (first, second) = if internal_first {
            (&self.internal, &self.public)
        } else {
            (&self.public, &self.internal)
        };
        let mut out: Vec<&dyn DesktopBridge> = Vec::with_capacity(2);
        if let Some(bridge) = first {
            out.push(&**bridge);
        }
        if let Some(bridge) = second {
            out.push(&**bridge);
        }
        out
    }

    /// Move `window` to `desktop`. Returns false when every bridge failed.
    pub fn move_to_desktop(&self, window: WindowId, desktop: DesktopId) -> bool {
        for bridge in self.bridges(true) {
            match bridge.move_to_desktop(window, desktop) {
                Ok(()) => {
                    tracing::debug!(window, %desktop, bridge = bridge.name(), "Moved window to desktop");
                    return true;
                }
                Err(e) => {
                    tracing::debug!(window, %desktop, bridge = bridge.name(), "Desktop move failed: {}", e);
                }
            }
        }
        false
    }

    /// Desktop hosting `window`, or None when no bridge could tell.
    pub fn window_desktop(&self, window: WindowId) -> Option<DesktopId> {
        for bridge in self.bridges(false) {
            match bridge.window_desktop(window) {
                Ok(id) => return Some(id),
                Err(e) => {
                    tracing::trace!(window, bridge = bridge.name(), "Desktop lookup failed: {}", e);
                }
            }
        }
        None
    }

    /// Whether `window` is on the current desktop, or None when unknown.
    pub fn is_on_current_desktop(&self, window: WindowId) -> Option<bool> {
        for bridge in self.bridges(false) {
            if let Ok(current) = bridge.is_on_current_desktop(window) {
                return Some(current);
            }
        }
        None
    }
}

/// 1-based position of each distinct desktop id, in first-seen order.
pub fn build_desktop_index_map(entries: &[WindowEntry]) -> HashMap<DesktopId, usize> {
    let mut map = HashMap::new();
    for id in entries.iter().filter_map(|e| e.virtual_desktop_id) {
        let next = map.len() + 1;
        map.entry(id).or_insert(next);
    }
    map
}
