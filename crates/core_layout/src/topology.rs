//! Monitor topology: geometry lookups, DPI scale, fingerprinting and clamping.
//!
//! Monitors are kept sorted by geometry `(width, height, x, y)`, the same
//! order the fingerprint uses, rather than by OS enumeration order, so
//! monitor indices stay stable when displays are reconnected. Indices are
//! 1-based.

use crate::platform::WindowSystem;
use crate::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// DPI that corresponds to a scale factor of 1.0.
pub const BASELINE_DPI: u32 = 96;

/// Minimum number of pixels of a clamped rectangle that stay on its monitor.
pub const MIN_VISIBLE_PX: i32 = 100;

/// Convert a raw DPI value to a scale factor relative to [`BASELINE_DPI`].
pub fn dpi_to_scale(dpi: u32) -> f64 {
    if dpi == 0 {
        return 1.0;
    }
    dpi as f64 / BASELINE_DPI as f64
}

/// Information about a physical monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorInfo {
    /// Full monitor bounds.
    pub bounds: Rect,
    /// Work area (bounds minus taskbar and other reserved chrome).
    pub work_area: Rect,
    /// DPI scale factor (1.0 = 96 dpi).
    pub dpi_scale: f64,
    /// Whether this is the primary monitor.
    pub is_primary: bool,
    /// OS device name (e.g. `\\.\DISPLAY1`); informational only.
    pub device_name: String,
}

impl MonitorInfo {
    /// Monitor whose work area equals its bounds, at 100% scale.
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            work_area: bounds,
            dpi_scale: 1.0,
            is_primary: false,
            device_name: String::new(),
        }
    }
}

/// Order-independent summary of the monitor geometry.
///
/// Built from the sorted multiset of `(width, height, x, y)` tuples; it never
/// encodes OS-assigned monitor indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorFingerprint(String);

impl MonitorFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MonitorFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MonitorFingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Total order shared by the fingerprint and monitor indices.
fn geometry_key(m: &MonitorInfo) -> (i32, i32, i32, i32) {
    (m.bounds.width, m.bounds.height, m.bounds.x, m.bounds.y)
}

/// Compute the fingerprint of a set of monitors.
pub fn compute_fingerprint(monitors: &[MonitorInfo]) -> MonitorFingerprint {
    let mut tuples: Vec<(i32, i32, i32, i32)> = monitors.iter().map(geometry_key).collect();
    tuples.sort_unstable();

    let parts: Vec<String> = tuples
        .iter()
        .map(|(w, h, x, y)| format!("{}x{}@{},{}", w, h, x, y))
        .collect();

    MonitorFingerprint(format!("{}:{}", tuples.len(), parts.join("|")))
}

/// Snapshot of the current monitor set.
#[derive(Debug, Clone, Default)]
pub struct MonitorTopology {
    monitors: Vec<MonitorInfo>,
}

impl MonitorTopology {
    /// Build a topology from monitors in any order.
    pub fn new(mut monitors: Vec<MonitorInfo>) -> Self {
        monitors.sort_by_key(geometry_key);
        Self { monitors }
    }

    /// Query the OS for the current monitor set.
    pub fn from_system(system: &dyn WindowSystem) -> Self {
        Self::new(system.monitors())
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Monitors in index order.
    pub fn monitors(&self) -> &[MonitorInfo] {
        &self.monitors
    }

    /// Monitor by 1-based index.
    pub fn monitor(&self, index: usize) -> Option<&MonitorInfo> {
        index.checked_sub(1).and_then(|i| self.monitors.get(i))
    }

    /// Bounds of the monitor at `index`.
    pub fn bounds(&self, index: usize) -> Option<Rect> {
        self.monitor(index).map(|m| m.bounds)
    }

    /// Work area of the monitor at `index`.
    pub fn work_area(&self, index: usize) -> Option<Rect> {
        self.monitor(index).map(|m| m.work_area)
    }

    /// DPI scale of the monitor at `index`, 1.0 when unknown.
    pub fn dpi_scale(&self, index: usize) -> f64 {
        self.monitor(index)
            .map(|m| m.dpi_scale)
            .filter(|s| *s > 0.0)
            .unwrap_or(1.0)
    }

    /// Index of the monitor containing `point`, or the one whose center is
    /// nearest by squared distance when the point lies on no monitor.
    pub fn nearest_monitor(&self, point: Point) -> Option<usize> {
        if let Some(i) = self.monitors.iter().position(|m| m.bounds.contains(point)) {
            return Some(i + 1);
        }

        self.monitors
            .iter()
            .enumerate()
            .min_by_key(|(_, m)| {
                let c = m.bounds.center();
                let dx = c.x as i128 - point.x as i128;
                let dy = c.y as i128 - point.y as i128;
                dx * dx + dy * dy
            })
            .map(|(i, _)| i + 1)
    }

    /// Index of the monitor whose work area contains (or is nearest to) the
    /// center of `rect`.
    pub fn monitor_for_rect(&self, rect: &Rect) -> Option<usize> {
        let center = rect.center();
        if let Some(i) = self.monitors.iter().position(|m| m.work_area.contains(center)) {
            return Some(i + 1);
        }
        self.nearest_monitor(center)
    }

    /// Fingerprint of this topology.
    pub fn fingerprint(&self) -> MonitorFingerprint {
        compute_fingerprint(&self.monitors)
    }

    /// Clamp a rectangle onto the monitor nearest its center.
    ///
    /// Width and height are capped to the work area and the position is
    /// adjusted so at least [`MIN_VISIBLE_PX`] of the rectangle stays on the
    /// monitor in each axis. Returns the input unchanged when no monitors are
    /// known.
    pub fn clamp_rect(&self, rect: Rect) -> Rect {
        let Some(area) = self.monitor_for_rect(&rect).and_then(|i| self.work_area(i)) else {
            return rect;
        };

        let width = rect.width.clamp(0, area.width.max(0));
        let height = rect.height.clamp(0, area.height.max(0));
        let keep_x = MIN_VISIBLE_PX.min(width);
        let keep_y = MIN_VISIBLE_PX.min(height);

        let x = rect.x.clamp(area.x - width + keep_x, area.right() - keep_x);
        let y = rect.y.clamp(area.y - height + keep_y, area.bottom() - keep_y);

        Rect::new(x, y, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual() -> Vec<MonitorInfo> {
        let mut left = MonitorInfo::new(Rect::new(0, 0, 1920, 1080));
        left.work_area = Rect::new(0, 0, 1920, 1040);
        left.is_primary = true;
        let mut right = MonitorInfo::new(Rect::new(1920, 0, 2560, 1440));
        right.dpi_scale = 1.5;
        vec![left, right]
    }

    #[test]
    fn test_fingerprint_ignores_enumeration_order() {
        let a = dual();
        let mut b = dual();
        b.reverse();
        assert_eq!(compute_fingerprint(&a), compute_fingerprint(&b));
        assert_eq!(
            compute_fingerprint(&a).as_str(),
            "2:1920x1080@0,0|2560x1440@1920,0"
        );
    }

    #[test]
    fn test_fingerprint_changes_with_geometry() {
        let a = dual();
        let mut b = dual();
        b[1].bounds.x = 1921;
        assert_ne!(compute_fingerprint(&a), compute_fingerprint(&b));
    }

    #[test]
    fn test_indices_ignore_enumeration_order() {
        let mut monitors = dual();
        monitors.reverse();
        let topology = MonitorTopology::new(monitors);
        assert_eq!(topology.bounds(1), Some(Rect::new(0, 0, 1920, 1080)));
        assert_eq!(topology.bounds(2), Some(Rect::new(1920, 0, 2560, 1440)));
        assert_eq!(topology.monitor(0), None);
        assert_eq!(topology.monitor(3), None);
    }

    #[test]
    fn test_indices_use_fingerprint_order() {
        // Larger monitor on the left: geometry order puts the smaller one first.
        let big = MonitorInfo::new(Rect::new(0, 0, 2560, 1440));
        let small = MonitorInfo::new(Rect::new(2560, 0, 1920, 1080));
        let topology = MonitorTopology::new(vec![big.clone(), small.clone()]);

        assert_eq!(topology.bounds(1), Some(small.bounds));
        assert_eq!(topology.bounds(2), Some(big.bounds));
        assert_eq!(
            topology.fingerprint().as_str(),
            "2:1920x1080@2560,0|2560x1440@0,0"
        );
        let first = topology.fingerprint().as_str().split(['|', ':']).nth(1).map(str::to_string);
        let b = topology.bounds(1).unwrap();
        assert_eq!(first, Some(format!("{}x{}@{},{}", b.width, b.height, b.x, b.y)));
        assert_eq!(topology.monitor_for_rect(&Rect::new(100, 100, 800, 600)), Some(2));
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let topology = MonitorTopology::new(dual());
        assert_eq!(topology.nearest_monitor(Point::new(i32::MAX, i32::MIN)), Some(2));
        let clamped = topology.clamp_rect(Rect::new(i32::MAX - 10, 100, 800, 600));
        assert_eq!(clamped.x, 1920 + 2560 - MIN_VISIBLE_PX);
        assert_eq!(clamped.width, 800);
    }

    #[test]
    fn test_nearest_monitor_falls_back_to_center_distance() {
        let topology = MonitorTopology::new(dual());
        assert_eq!(topology.nearest_monitor(Point::new(100, 100)), Some(1));
        assert_eq!(topology.nearest_monitor(Point::new(2000, 100)), Some(2));
        // Far to the right of everything: nearest center is the right monitor.
        assert_eq!(topology.nearest_monitor(Point::new(9000, 500)), Some(2));
        // Below the left monitor only.
        assert_eq!(topology.nearest_monitor(Point::new(500, 1200)), Some(1));
    }

    #[test]
    fn test_dpi_scale_lookup() {
        let topology = MonitorTopology::new(dual());
        assert_eq!(topology.dpi_scale(1), 1.0);
        assert_eq!(topology.dpi_scale(2), 1.5);
        assert_eq!(topology.dpi_scale(7), 1.0);
        assert_eq!(dpi_to_scale(144), 1.5);
        assert_eq!(dpi_to_scale(0), 1.0);
    }

    #[test]
    fn test_clamp_rect_keeps_on_screen_rect() {
        let topology = MonitorTopology::new(dual());
        let rect = Rect::new(100, 100, 800, 600);
        assert_eq!(topology.clamp_rect(rect), rect);
    }

    #[test]
    fn test_clamp_rect_pulls_off_screen_rect_back() {
        let topology = MonitorTopology::new(vec![MonitorInfo::new(Rect::new(0, 0, 1920, 1080))]);
        let clamped = topology.clamp_rect(Rect::new(5000, 3000, 800, 600));
        assert_eq!(clamped.width, 800);
        assert_eq!(clamped.height, 600);
        assert_eq!(clamped.x, 1920 - MIN_VISIBLE_PX);
        assert_eq!(clamped.y, 1080 - MIN_VISIBLE_PX);

        let clamped = topology.clamp_rect(Rect::new(-5000, -3000, 800, 600));
        assert_eq!(clamped.x, -800 + MIN_VISIBLE_PX);
        assert_eq!(clamped.y, -600 + MIN_VISIBLE_PX);
    }

    #[test]
    fn test_clamp_rect_caps_size_to_work_area() {
        let topology = MonitorTopology::new(dual());
        let clamped = topology.clamp_rect(Rect::new(0, 0, 3000, 2000));
        // Center (1500, 1000) is on the left monitor's work area.
        assert_eq!(clamped.width, 1920);
        assert_eq!(clamped.height, 1040);
    }

    #[test]
    fn test_clamp_rect_without_monitors_is_identity() {
        let topology = MonitorTopology::default();
        let rect = Rect::new(-9000, 0, 10, 10);
        assert_eq!(topology.clamp_rect(rect), rect);
    }
}
