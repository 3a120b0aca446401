//! Moving one matched window into its saved position.
//!
//! Order matters here: a window must be restored before the OS honors a
//! move, must be on the right monitor before it is maximized, and must be
//! positioned before its desktop move (showing it can pull it back onto the
//! current desktop).

use crate::model::WindowEntry;
use crate::platform::PlatformError;
use crate::snapshot::LiveWindow;
use crate::topology::MonitorTopology;
use crate::{EngineContext, Rect, WindowId, WindowState};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// Learned height-inflation ratios, keyed by lowercase executable name.
///
/// Bounded; the oldest executable is forgotten first.
#[derive(Debug)]
pub struct SnapRatioCache {
    capacity: usize,
    ratios: RefCell<HashMap<String, f64>>,
    order: RefCell<VecDeque<String>>,
}

impl SnapRatioCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ratios: RefCell::new(HashMap::new()),
            order: RefCell::new(VecDeque::new()),
        }
    }

    pub fn ratio_for(&self, exe: &str) -> Option<f64> {
        self.ratios.borrow().get(&exe.to_lowercase()).copied()
    }

    pub fn remember(&self, exe: &str, ratio: f64) {
        let key = exe.to_lowercase();
        let mut ratios = self.ratios.borrow_mut();
        let mut order = self.order.borrow_mut();

        if ratios.insert(key.clone(), ratio).is_none() {
            order.push_back(key);
            while order.len() > self.capacity {
                if let Some(oldest) = order.pop_front() {
                    ratios.remove(&oldest);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ratios.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.ratios.borrow_mut().clear();
        self.order.borrow_mut().clear();
    }
}

impl Default for SnapRatioCache {
    fn default() -> Self {
        Self::new(crate::settings::DEFAULT_SNAP_CACHE_CAPACITY)
    }
}

/// What [`Placer::place`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaceOutcome {
    /// A move or resize was issued.
    pub moved: bool,
    /// The move was re-issued to undo snap inflation.
    pub snap_corrected: bool,
    /// None when no desktop move was needed.
    pub desktop_moved: Option<bool>,
}

/// Places windows against the current monitor topology.
pub struct Placer<'a> {
    ctx: &'a EngineContext<'a>,
    topology: &'a MonitorTopology,
}

impl<'a> Placer<'a> {
    pub fn new(ctx: &'a EngineContext<'a>, topology: &'a MonitorTopology) -> Self {
        Self { ctx, topology }
    }

    /// Saved rectangle rescaled to the current DPI and clamped on screen.
    ///
    /// Width and height are multiplied by `current_dpi / saved_dpi`, where the
    /// current DPI is that of the monitor now under the saved rectangle.
    pub fn target_rect(&self, entry: &WindowEntry) -> Rect {
        let saved_dpi = if entry.dpi_scale > 0.0 { entry.dpi_scale } else { 1.0 };
        let current_dpi = self
            .topology
            .monitor_for_rect(&entry.rect)
            .map(|i| self.topology.dpi_scale(i))
            .unwrap_or(1.0);

        let factor = current_dpi / saved_dpi;
        let scaled = Rect::new(
            entry.rect.x,
            entry.rect.y,
            (entry.rect.width as f64 * factor).round() as i32,
            (entry.rect.height as f64 * factor).round() as i32,
        );
        self.topology.clamp_rect(scaled)
    }

    /// Whether `window` already sits where `entry` wants it.
    ///
    /// Position and size within the configured tolerance, same state, and
    /// same desktop when the entry names one.
    pub fn is_already_placed(&self, window: &LiveWindow, entry: &WindowEntry, target: &Rect) -> bool {
        let live = &window.entry;
        if live.state != entry.state {
            return false;
        }
        if !live.rect.approx_eq(target, self.ctx.settings.placement_tolerance) {
            return false;
        }
        match entry.virtual_desktop_id {
            Some(desktop) => live.virtual_desktop_id == Some(desktop),
            None => true,
        }
    }

    /// Apply `entry`'s state, position and desktop to `window`.
    pub fn place(&self, window: &LiveWindow, entry: &WindowEntry) -> Result<PlaceOutcome, PlatformError> {
        let system = self.ctx.system;
        let id = window.id;
        let mut outcome = PlaceOutcome::default();

        if entry.state == WindowState::Minimized {
            if window.entry.state != WindowState::Minimized {
                system.set_window_state(id, WindowState::Minimized)?;
            }
            outcome.desktop_moved = self.move_to_saved_desktop(id, entry);
            return Ok(outcome);
        }

        let current = system.window_state(id).unwrap_or(window.entry.state);
        if current != WindowState::Normal {
            system.set_window_state(id, WindowState::Normal)?;
            // A window minimized from maximized restores to maximized first.
            if system.window_state(id) == Some(WindowState::Maximized) {
                system.set_window_state(id, WindowState::Normal)?;
            }
        }

        let target = self.target_rect(entry);
        if entry.state == WindowState::Maximized {
            system.move_window(id, self.placeholder_rect(&target))?;
            system.set_window_state(id, WindowState::Maximized)?;
        } else {
            outcome.snap_corrected = self.move_with_snap_compensation(id, &entry.process_exe_name, target)?;
        }
        outcome.moved = true;

        outcome.desktop_moved = self.move_to_saved_desktop(id, entry);
        Ok(outcome)
    }

    /// Small rectangle centered on the work area that will host `target`.
    fn placeholder_rect(&self, target: &Rect) -> Rect {
        let (w, h) = self.ctx.settings.maximize_placeholder;
        match self
            .topology
            .monitor_for_rect(target)
            .and_then(|i| self.topology.work_area(i))
        {
            Some(area) => {
                let w = w.min(area.width);
                let h = h.min(area.height);
                let c = area.center();
                Rect::new(c.x - w / 2, c.y - h / 2, w, h)
            }
            None => Rect::new(target.x, target.y, w, h),
        }
    }

    /// Move to `target`, then undo any snap inflation the OS applied.
    ///
    /// Best-effort: the ratio learned here pre-shrinks later requests for the
    /// same executable.
    fn move_with_snap_compensation(
        &self,
        id: WindowId,
        exe: &str,
        target: Rect,
    ) -> Result<bool, PlatformError> {
        let system = self.ctx.system;
        let cache = self.ctx.snap_ratios;

        let requested = match cache.ratio_for(exe) {
            Some(ratio) if ratio > 0.0 => {
                target.with_height(((target.height as f64 / ratio).round() as i32).max(1))
            }
            _ => target,
        };
        system.move_window(id, requested)?;

        let Some(actual) = system.window_rect(id) else {
            return Ok(false);
        };
        let limit = self.ctx.settings.snap_threshold * target.height as f64;
        if (actual.height as f64) <= limit || requested.height <= 0 {
            return Ok(false);
        }

        let ratio = actual.height as f64 / requested.height as f64;
        cache.remember(exe, ratio);
        let corrected = target.with_height(((target.height as f64 / ratio).round() as i32).max(1));
        tracing::info!(
            window = id,
            exe,
            ratio,
            requested = requested.height,
            actual = actual.height,
            "Snap inflation detected; re-issuing move"
        );
        system.move_window(id, corrected)?;
        Ok(true)
    }

    fn move_to_saved_desktop(&self, id: WindowId, entry: &WindowEntry) -> Option<bool> {
        let desktop = entry.virtual_desktop_id?;
        let desktops = self.ctx.desktops;
        if desktops.window_desktop(id) == Some(desktop) {
            return None;
        }

        let moved = desktops.move_to_desktop(id, desktop);
        if moved {
            self.ctx.system.pause(self.ctx.settings.desktop_settle);
        } else {
            tracing::warn!(window = id, %desktop, "Could not move window to its desktop; position-only placement");
        }
        Some(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::DesktopId;
    use crate::platform::WindowSystem;
    use crate::test_support::{entry_at, live_at, Call, FakeDesktops, Harness};
    use crate::topology::MonitorInfo;

    #[test]
    fn test_snap_ratio_cache_is_bounded() {
        let cache = SnapRatioCache::new(2);
        cache.remember("a.exe", 1.5);
        cache.remember("B.EXE", 2.0);
        cache.remember("c.exe", 3.0);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.ratio_for("a.exe"), None);
        assert_eq!(cache.ratio_for("b.exe"), Some(2.0));
        cache.remember("b.exe", 2.5);
        assert_eq!(cache.ratio_for("b.exe"), Some(2.5));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_target_rect_scales_by_dpi_ratio() {
        let mut monitor = MonitorInfo::new(Rect::new(0, 0, 3840, 2160));
        monitor.dpi_scale = 1.5;
        let h = Harness::with_monitors(vec![monitor]);

        let mut saved = entry_at("app.exe", "App", "doc", Rect::new(100, 100, 800, 600));
        saved.dpi_scale = 1.0;
        let target = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).target_rect(&saved)
        });
        assert_eq!(target, Rect::new(100, 100, 1200, 900));

        saved.dpi_scale = 2.0;
        let target = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).target_rect(&saved)
        });
        assert_eq!(target, Rect::new(100, 100, 600, 450));
    }

    #[test]
    fn test_target_rect_with_extreme_saved_coordinates() {
        let h = Harness::single_monitor();
        let saved = entry_at("app.exe", "App", "doc", Rect::new(i32::MAX - 10, 100, 800, 600));
        let target = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).target_rect(&saved)
        });
        assert_eq!(target, Rect::new(1920 - 100, 100, 800, 600));
    }

    #[test]
    fn test_already_placed_tolerance_state_and_desktop() {
        let h = Harness::single_monitor();
        let mut saved = entry_at("notepad.exe", "Notepad", "n", Rect::new(100, 100, 800, 600));
        let live = live_at(1, "notepad.exe", "Notepad", "n", Rect::new(105, 95, 808, 600));

        h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            let placer = Placer::new(ctx, &topology);
            let target = placer.target_rect(&saved);
            assert!(placer.is_already_placed(&live, &saved, &target));

            let far = live_at(1, "notepad.exe", "Notepad", "n", Rect::new(120, 100, 800, 600));
            assert!(!placer.is_already_placed(&far, &saved, &target));

            let mut maximized = live.clone();
            maximized.entry.state = WindowState::Maximized;
            assert!(!placer.is_already_placed(&maximized, &saved, &target));
        });

        saved.virtual_desktop_id = Some(DesktopId::from_u128(9));
        h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            let placer = Placer::new(ctx, &topology);
            let target = placer.target_rect(&saved);
            assert!(!placer.is_already_placed(&live, &saved, &target));
        });
    }

    #[test]
    fn test_place_normal_window_restores_then_moves() {
        let mut h = Harness::single_monitor();
        let live = live_at(1, "app.exe", "App", "doc", Rect::new(0, 0, 400, 300));
        h.system.add_live(&live, WindowState::Maximized);
        let saved = entry_at("app.exe", "App", "doc", Rect::new(200, 150, 800, 600));

        let outcome = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).place(&live, &saved).unwrap()
        });

        assert!(outcome.moved);
        assert!(!outcome.snap_corrected);
        assert_eq!(outcome.desktop_moved, None);
        assert_eq!(
            h.system.calls(),
            vec![
                Call::SetState(1, WindowState::Normal),
                Call::Move(1, Rect::new(200, 150, 800, 600)),
            ]
        );
    }

    #[test]
    fn test_place_restores_twice_when_minimized_from_maximized() {
        let mut h = Harness::single_monitor();
        let live = live_at(1, "app.exe", "App", "doc", Rect::new(0, 0, 400, 300));
        h.system.add_live(&live, WindowState::Minimized);
        h.system.restore_to_maximized(1);
        let saved = entry_at("app.exe", "App", "doc", Rect::new(200, 150, 800, 600));

        h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).place(&live, &saved).unwrap();
        });

        assert_eq!(
            h.system.calls(),
            vec![
                Call::SetState(1, WindowState::Normal),
                Call::SetState(1, WindowState::Normal),
                Call::Move(1, Rect::new(200, 150, 800, 600)),
            ]
        );
        assert_eq!(h.system.window_state(1), Some(WindowState::Normal));
    }

    #[test]
    fn test_place_maximized_moves_to_monitor_before_maximizing() {
        let mut left = MonitorInfo::new(Rect::new(0, 0, 1920, 1080));
        left.work_area = Rect::new(0, 0, 1920, 1040);
        let right = MonitorInfo::new(Rect::new(1920, 0, 1920, 1080));
        let mut h = Harness::with_monitors(vec![left, right]);

        let live = live_at(1, "app.exe", "App", "doc", Rect::new(100, 100, 800, 600));
        h.system.add_live(&live, WindowState::Normal);
        let mut saved = entry_at("app.exe", "App", "doc", Rect::new(2000, 100, 800, 600));
        saved.state = WindowState::Maximized;

        h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).place(&live, &saved).unwrap();
        });

        let calls = h.system.calls();
        assert_eq!(calls.len(), 2);
        match calls[0] {
            Call::Move(1, rect) => {
                assert_eq!(rect.width, 400);
                assert_eq!(rect.height, 300);
                // Centered on the right monitor.
                assert_eq!(rect.x, 1920 + 960 - 200);
            }
            ref other => panic!("unexpected first call {:?}", other),
        }
        assert_eq!(calls[1], Call::SetState(1, WindowState::Maximized));
    }

    #[test]
    fn test_place_minimized_skips_positioning() {
        let mut h = Harness::single_monitor();
        let live = live_at(1, "app.exe", "App", "doc", Rect::new(0, 0, 400, 300));
        h.system.add_live(&live, WindowState::Normal);
        let mut saved = entry_at("app.exe", "App", "doc", Rect::new(200, 150, 800, 600));
        saved.state = WindowState::Minimized;

        let outcome = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).place(&live, &saved).unwrap()
        });
        assert!(!outcome.moved);
        assert_eq!(h.system.calls(), vec![Call::SetState(1, WindowState::Minimized)]);
    }

    #[test]
    fn test_snap_inflation_is_corrected_and_learned() {
        let mut h = Harness::single_monitor();
        let first = live_at(1, "term.exe", "Term", "one", Rect::new(0, 0, 400, 300));
        let second = live_at(2, "term.exe", "Term", "two", Rect::new(0, 0, 400, 300));
        h.system.add_live(&first, WindowState::Normal);
        h.system.add_live(&second, WindowState::Normal);
        h.system.set_inflation(1, 2.0);
        h.system.set_inflation(2, 2.0);

        let saved = entry_at("term.exe", "Term", "one", Rect::new(100, 100, 800, 400));

        let outcome = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).place(&first, &saved).unwrap()
        });
        assert!(outcome.snap_corrected);
        assert_eq!(h.snap_ratios.ratio_for("term.exe"), Some(2.0));
        assert_eq!(h.system.rect_of(1), Some(Rect::new(100, 100, 800, 400)));

        h.system.clear_calls();
        let outcome = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).place(&second, &saved).unwrap()
        });
        // Pre-compensated: one move, no correction.
        assert!(!outcome.snap_corrected);
        assert_eq!(h.system.calls(), vec![Call::Move(2, Rect::new(100, 100, 800, 200))]);
        assert_eq!(h.system.rect_of(2), Some(Rect::new(100, 100, 800, 400)));
    }

    #[test]
    fn test_snap_threshold_boundary() {
        let saved = entry_at("term.exe", "Term", "one", Rect::new(100, 100, 800, 400));
        let place_with = |factor: f64| {
            let mut h = Harness::single_monitor();
            assert_eq!(h.settings.snap_threshold, 1.3);
            let live = live_at(1, "term.exe", "Term", "one", Rect::new(0, 0, 400, 300));
            h.system.add_live(&live, WindowState::Normal);
            h.system.set_inflation(1, factor);
            let outcome = h.with_ctx(|ctx| {
                let topology = MonitorTopology::from_system(ctx.system);
                Placer::new(ctx, &topology).place(&live, &saved).unwrap()
            });
            (outcome, h)
        };

        // Exactly at the threshold (400 -> 520) is left alone.
        let (outcome, h) = place_with(1.3);
        assert!(!outcome.snap_corrected);
        assert_eq!(h.system.calls().len(), 1);
        assert_eq!(h.snap_ratios.ratio_for("term.exe"), None);

        let (outcome, h) = place_with(1.29);
        assert!(!outcome.snap_corrected);
        assert_eq!(h.system.rect_of(1), Some(Rect::new(100, 100, 800, 516)));

        // Just past it (400 -> 524) is corrected.
        let (outcome, h) = place_with(1.31);
        assert!(outcome.snap_corrected);
        assert_eq!(h.snap_ratios.ratio_for("term.exe"), Some(1.31));
        assert_eq!(
            h.system.calls()[1],
            Call::Move(1, Rect::new(100, 100, 800, 305))
        );
        assert_eq!(h.system.rect_of(1), Some(Rect::new(100, 100, 800, 400)));
    }

    #[test]
    fn test_desktop_move_happens_after_positioning() {
        let mut h = Harness::single_monitor();
        let internal = FakeDesktops::new("internal");
        internal.set_window(1, DesktopId::from_u128(1));
        h.set_internal_bridge(internal.clone());

        let live = live_at(1, "app.exe", "App", "doc", Rect::new(0, 0, 400, 300));
        h.system.add_live(&live, WindowState::Normal);
        let mut saved = entry_at("app.exe", "App", "doc", Rect::new(200, 150, 800, 600));
        saved.virtual_desktop_id = Some(DesktopId::from_u128(2));

        let outcome = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).place(&live, &saved).unwrap()
        });

        assert_eq!(outcome.desktop_moved, Some(true));
        assert_eq!(internal.moves(), vec![(1, DesktopId::from_u128(2))]);
        assert_eq!(
            h.system.calls(),
            vec![
                Call::Move(1, Rect::new(200, 150, 800, 600)),
                Call::Pause(h.settings.desktop_settle),
            ]
        );
    }

    #[test]
    fn test_failed_desktop_move_does_not_fail_placement() {
        let mut h = Harness::single_monitor();
        let internal = FakeDesktops::new("internal");
        internal.fail_moves();
        h.set_internal_bridge(internal);

        let live = live_at(1, "app.exe", "App", "doc", Rect::new(0, 0, 400, 300));
        h.system.add_live(&live, WindowState::Normal);
        let mut saved = entry_at("app.exe", "App", "doc", Rect::new(200, 150, 800, 600));
        saved.virtual_desktop_id = Some(DesktopId::from_u128(2));

        let outcome = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).place(&live, &saved).unwrap()
        });
        assert!(outcome.moved);
        assert_eq!(outcome.desktop_moved, Some(false));
    }

    #[test]
    fn test_move_failure_propagates() {
        let mut h = Harness::single_monitor();
        let live = live_at(1, "app.exe", "App", "doc", Rect::new(0, 0, 400, 300));
        h.system.add_live(&live, WindowState::Normal);
        h.system.fail_moves_for(1);
        let saved = entry_at("app.exe", "App", "doc", Rect::new(200, 150, 800, 600));

        let result = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            Placer::new(ctx, &topology).place(&live, &saved)
        });
        assert!(matches!(result, Err(PlatformError::CallFailed { .. })));
    }
}
