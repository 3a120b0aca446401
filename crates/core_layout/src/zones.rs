//! Monitor-relative snap zones applied after a restore.

use crate::topology::MonitorTopology;
use crate::{EngineContext, Point, Rect, WindowId, WindowState};
use serde::{Deserialize, Serialize};

/// How a monitor's work area is divided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneLayout {
    /// Equal-area cells, row-major.
    Grid { cols: u32, rows: u32 },
    /// Full-height columns with the given width percentages.
    Columns { widths: Vec<f64> },
}

/// Zone layout for one monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorZones {
    /// 1-based monitor index.
    pub monitor: usize,
    pub layout: ZoneLayout,
}

/// One computed zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    pub monitor: usize,
    pub index: usize,
    pub rect: Rect,
}

/// Split `total` into `parts` cuts at the given cumulative fractions; the last
/// part absorbs rounding.
fn cuts(start: i32, total: i32, fractions: &[f64]) -> Vec<(i32, i32)> {
    let mut out = Vec::with_capacity(fractions.len());
    let mut acc = 0.0;
    let mut prev = start;
    for (i, fraction) in fractions.iter().enumerate() {
        acc += fraction;
        let end = if i + 1 == fractions.len() {
            start + total
        } else {
            start + (total as f64 * acc).round() as i32
        };
        out.push((prev, end - prev));
        prev = end;
    }
    out
}

impl ZoneLayout {
    /// Zones of this layout over `work_area`.
    pub fn compute(&self, monitor: usize, work_area: Rect) -> Vec<Zone> {
        let (columns, rows) = match self {
            ZoneLayout::Grid { cols, rows } => {
                let cols = (*cols).max(1) as usize;
                let rows = (*rows).max(1) as usize;
                (vec![1.0 / cols as f64; cols], vec![1.0 / rows as f64; rows])
            }
            ZoneLayout::Columns { widths } => {
                let positive: Vec<f64> = widths.iter().copied().filter(|w| *w > 0.0).collect();
                let sum: f64 = positive.iter().sum();
                if positive.is_empty() || sum <= 0.0 {
                    (vec![1.0], vec![1.0])
                } else {
                    (positive.iter().map(|w| w / sum).collect(), vec![1.0])
                }
            }
        };

        let xs = cuts(work_area.x, work_area.width, &columns);
        let ys = cuts(work_area.y, work_area.height, &rows);

        let mut zones = Vec::with_capacity(xs.len() * ys.len());
        for (y, height) in &ys {
            for (x, width) in &xs {
                zones.push(Zone {
                    monitor,
                    index: zones.len(),
                    rect: Rect::new(*x, *y, *width, *height),
                });
            }
        }
        zones
    }
}

/// First zone containing `point`.
pub fn find_zone_for_point(zones: &[Zone], point: Point) -> Option<&Zone> {
    zones.iter().find(|z| z.rect.contains(point))
}

/// Snaps windows into the configured zones of the monitor they sit on.
pub struct ZoneEngine<'a> {
    topology: &'a MonitorTopology,
    monitors: &'a [MonitorZones],
}

impl<'a> ZoneEngine<'a> {
    pub fn new(topology: &'a MonitorTopology, monitors: &'a [MonitorZones]) -> Self {
        Self { topology, monitors }
    }

    /// All zones for every configured monitor that currently exists.
    pub fn zones(&self) -> Vec<Zone> {
        self.monitors
            .iter()
            .filter_map(|mz| {
                let area = self.topology.work_area(mz.monitor)?;
                Some(mz.layout.compute(mz.monitor, area))
            })
            .flatten()
            .collect()
    }

    /// Zone that would host a window at `rect`, judged by its center.
    pub fn zone_for_rect(&self, rect: &Rect) -> Option<Zone> {
        find_zone_for_point(&self.zones(), rect.center()).copied()
    }

    /// Move each normal-state window into the zone under its center.
    /// Returns how many windows were moved.
    pub fn snap_windows(&self, ctx: &EngineContext<'_>, windows: &[WindowId]) -> usize {
        let zones = self.zones();
        if zones.is_empty() {
            return 0;
        }

        let mut snapped = 0;
        for &id in windows {
            if ctx.system.window_state(id) != Some(WindowState::Normal) {
                continue;
            }
            let Some(rect) = ctx.system.window_rect(id) else {
                continue;
            };
            let Some(zone) = find_zone_for_point(&zones, rect.center()) else {
                continue;
            };
            if zone.rect == rect {
                continue;
            }
            match ctx.system.move_window(id, zone.rect) {
                Ok(()) => {
                    tracing::debug!(window = id, monitor = zone.monitor, zone = zone.index, "Snapped window to zone");
                    snapped += 1;
                }
                Err(e) => tracing::warn!(window = id, "Zone snap failed: {}", e),
            }
        }
        snapped
    }
}
