//! Live window enumeration, filtering and entry construction.

use crate::desktop::build_desktop_index_map;
use crate::model::WindowEntry;
use crate::platform::{RawWindow, CLOAKED_SHELL};
use crate::title::clean_title;
use crate::topology::MonitorTopology;
use crate::{EngineContext, WindowId};
use std::collections::HashSet;

/// Why a raw window was left out of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ExcludedClass,
    ExcludedProcess,
    ToolWindow,
    Invisible,
    /// Cloaked for a reason other than living on another virtual desktop.
    Cloaked,
    NoProcess,
    EmptyTitle,
    NoGeometry,
    TooSmall,
}

/// A live window together with the entry it would be captured as.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveWindow {
    pub id: WindowId,
    pub entry: WindowEntry,
}

/// Captures windows through an [`EngineContext`].
pub struct WindowSnapshot<'a> {
    ctx: &'a EngineContext<'a>,
}

impl<'a> WindowSnapshot<'a> {
    pub fn new(ctx: &'a EngineContext<'a>) -> Self {
        Self { ctx }
    }

    /// Capture every eligible window as a layout entry.
    ///
    /// May return an empty list; callers must not overwrite an existing
    /// layout with it.
    pub fn capture_all(&self) -> Vec<WindowEntry> {
        let topology = MonitorTopology::from_system(self.ctx.system);
        let mut entries: Vec<WindowEntry> = self
            .capture_live(&topology, &HashSet::new())
            .into_iter()
            .map(|live| live.entry)
            .collect();

        let index_map = build_desktop_index_map(&entries);
        for entry in &mut entries {
            entry.virtual_desktop_index = entry
                .virtual_desktop_id
                .and_then(|id| index_map.get(&id).copied());
        }

        tracing::debug!(
            count = entries.len(),
            desktops = index_map.len(),
            "Captured windows"
        );
        entries
    }

    /// Eligible live windows, skipping the ids in `exclude`.
    pub fn capture_live(
        &self,
        topology: &MonitorTopology,
        exclude: &HashSet<WindowId>,
    ) -> Vec<LiveWindow> {
        self.ctx
            .system
            .enumerate_windows()
            .into_iter()
            .filter(|raw| !exclude.contains(&raw.id))
            .filter_map(|raw| {
                let entry = self.capture_window_entry(&raw, topology)?;
                Some(LiveWindow { id: raw.id, entry })
            })
            .collect()
    }

    /// Reason `raw` cannot be captured, if any.
    pub fn rejection(&self, raw: &RawWindow) -> Option<Rejection> {
        let settings = self.ctx.settings;

        if settings.is_excluded_class(&raw.class_name) {
            return Some(Rejection::ExcludedClass);
        }
        let Some(process) = raw.process_name.as_deref().filter(|p| !p.is_empty()) else {
            return Some(Rejection::NoProcess);
        };
        if settings.is_excluded_process(process) {
            return Some(Rejection::ExcludedProcess);
        }
        if raw.tool_window {
            return Some(Rejection::ToolWindow);
        }
        if !raw.visible {
            return Some(Rejection::Invisible);
        }
        if raw.cloaked != 0 && !self.is_cloaked_by_other_desktop(raw) {
            return Some(Rejection::Cloaked);
        }
        if raw.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Some(Rejection::EmptyTitle);
        }
        let Some(rect) = raw.rect else {
            return Some(Rejection::NoGeometry);
        };
        if rect.width < settings.min_window_size || rect.height < settings.min_window_size {
            return Some(Rejection::TooSmall);
        }
        None
    }

    fn is_cloaked_by_other_desktop(&self, raw: &RawWindow) -> bool {
        if raw.cloaked & CLOAKED_SHELL == 0 {
            return false;
        }
        // Shell-cloaked windows on the current desktop are hidden surfaces.
        self.ctx.desktops.is_on_current_desktop(raw.id) != Some(true)
    }

    /// Build the entry for one window, or None when it is rejected.
    ///
    /// Title, process and geometry are required; process path, DPI and
    /// virtual desktop are filled on a best-effort basis.
    pub fn capture_window_entry(
        &self,
        raw: &RawWindow,
        topology: &MonitorTopology,
    ) -> Option<WindowEntry> {
        if let Some(reason) = self.rejection(raw) {
            tracing::trace!(window = raw.id, class = %raw.class_name, ?reason, "Window rejected");
            return None;
        }

        let raw_title = raw.title.clone()?;
        let process_exe_name = raw.process_name.clone()?;
        let rect = raw.rect?;

        let monitor_index = topology.monitor_for_rect(&rect).unwrap_or(0);
        let dpi_scale = topology.dpi_scale(monitor_index);
        let normalized_title = clean_title(&raw_title, &self.ctx.settings.title_suffixes);

        Some(WindowEntry {
            process_exe_name,
            process_path: raw.process_path.clone(),
            raw_title,
            normalized_title,
            window_class: raw.class_name.clone(),
            rect,
            state: raw.state,
            monitor_index,
            dpi_scale,
            virtual_desktop_id: self.ctx.desktops.window_desktop(raw.id),
            virtual_desktop_index: None,
            launch_hint: self.ctx.system.launch_hint(raw),
        })
    }
}
