//! Captured windows, named layouts and the in-memory layout book.

use crate::desktop::DesktopId;
use crate::topology::MonitorFingerprint;
use crate::{LayoutError, Rect, WindowState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

fn default_dpi_scale() -> f64 {
    1.0
}

/// One captured window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowEntry {
    pub process_exe_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_path: Option<String>,
    #[serde(default)]
    pub raw_title: String,
    #[serde(default)]
    pub normalized_title: String,
    #[serde(default)]
    pub window_class: String,
    #[serde(flatten)]
    pub rect: Rect,
    #[serde(default)]
    pub state: WindowState,
    /// 1-based index into the geometry-sorted monitor list, 0 when unknown.
    #[serde(default)]
    pub monitor_index: usize,
    #[serde(default = "default_dpi_scale")]
    pub dpi_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_desktop_id: Option<DesktopId>,
    /// Session-local ordinal of the desktop, for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_desktop_index: Option<usize>,
    /// Working directory or workspace path used when relaunching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_hint: Option<String>,
}

/// A prior version of a layout's window list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutVersion {
    pub timestamp: u64,
    pub windows: Vec<WindowEntry>,
}

/// A named set of captured windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub name: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default)]
    pub monitor_fingerprint: MonitorFingerprint,
    pub windows: Vec<WindowEntry>,
    /// Newest first.
    #[serde(default, skip_serializing_if = "VecDeque::is_empty")]
    pub history: VecDeque<LayoutVersion>,
}

/// Result of a successful [`LayoutBook::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Replaced { history_len: usize },
}

/// All layouts known to the host, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutBook {
    layouts: BTreeMap<String, Layout>,
}

fn normalize_name(name: &str) -> Result<String, LayoutError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LayoutError::InvalidName);
    }
    Ok(name.to_string())
}

fn push_history(history: &mut VecDeque<LayoutVersion>, version: LayoutVersion, depth: usize) {
    history.push_front(version);
    history.truncate(depth);
}

impl LayoutBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Store `windows` under `name`.
    ///
    /// An empty capture is rejected so an existing layout is never replaced by
    /// nothing. When a layout is replaced, its previous window list is pushed
    /// into its history, keeping at most `history_depth` versions.
    pub fn save(
        &mut self,
        name: &str,
        windows: Vec<WindowEntry>,
        fingerprint: MonitorFingerprint,
        timestamp: u64,
        history_depth: usize,
    ) -> Result<SaveOutcome, LayoutError> {
        let name = normalize_name(name)?;
        if windows.is_empty() {
            return Err(LayoutError::EmptyCapture(name));
        }

        match self.layouts.get_mut(&name) {
            Some(layout) => {
                let previous = LayoutVersion {
                    timestamp: layout.timestamp,
                    windows: std::mem::replace(&mut layout.windows, windows),
                };
                push_history(&mut layout.history, previous, history_depth);
                layout.timestamp = timestamp;
                layout.monitor_fingerprint = fingerprint;
                Ok(SaveOutcome::Replaced {
                    history_len: layout.history.len(),
                })
            }
            None => {
                self.layouts.insert(
                    name.clone(),
                    Layout {
                        name,
                        timestamp,
                        monitor_fingerprint: fingerprint,
                        windows,
                        history: VecDeque::new(),
                    },
                );
                Ok(SaveOutcome::Created)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Layout> {
        self.layouts.get(name.trim())
    }

    /// Layout names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.layouts.keys().cloned().collect()
    }

    pub fn remove(&mut self, name: &str) -> Result<Layout, LayoutError> {
        self.layouts
            .remove(name.trim())
            .ok_or_else(|| LayoutError::LayoutNotFound(name.trim().to_string()))
    }

    /// Make history version `index` (0 = newest) current again.
    ///
    /// The replaced current window list goes into history in its place.
    pub fn restore_version(
        &mut self,
        name: &str,
        index: usize,
        timestamp: u64,
        history_depth: usize,
    ) -> Result<&Layout, LayoutError> {
        let name = name.trim();
        let layout = self
            .layouts
            .get_mut(name)
            .ok_or_else(|| LayoutError::LayoutNotFound(name.to_string()))?;

        let version = layout
            .history
            .remove(index)
            .ok_or_else(|| LayoutError::VersionNotFound {
                name: name.to_string(),
                index,
            })?;

        let previous = LayoutVersion {
            timestamp: layout.timestamp,
            windows: std::mem::replace(&mut layout.windows, version.windows),
        };
        push_history(&mut layout.history, previous, history_depth);
        layout.timestamp = timestamp;
        Ok(layout)
    }

    /// First layout (in name order) saved on a matching monitor setup.
    pub fn find_by_fingerprint(&self, fingerprint: &MonitorFingerprint) -> Option<&Layout> {
        if fingerprint.is_empty() {
            return None;
        }
        self.layouts
            .values()
            .find(|layout| &layout.monitor_fingerprint == fingerprint)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layout> {
        self.layouts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::entry;

    fn fp(s: &str) -> MonitorFingerprint {
        MonitorFingerprint::from(s.to_string())
    }

    #[test]
    fn test_save_rejects_empty_capture_and_keeps_existing() {
        let mut book = LayoutBook::new();
        book.save("Work", vec![entry("notepad.exe", "Notepad", "a")], fp("1:x"), 10, 5)
            .unwrap();

        let err = book.save("Work", Vec::new(), fp("1:x"), 20, 5).unwrap_err();
        assert_eq!(err, LayoutError::EmptyCapture("Work".to_string()));
        assert_eq!(book.get("Work").unwrap().windows.len(), 1);
        assert_eq!(book.get("Work").unwrap().timestamp, 10);
    }

    #[test]
    fn test_save_trims_and_validates_name() {
        let mut book = LayoutBook::new();
        assert_eq!(
            book.save("   ", vec![entry("a.exe", "A", "a")], fp(""), 1, 5),
            Err(LayoutError::InvalidName)
        );
        book.save("  Work ", vec![entry("a.exe", "A", "a")], fp(""), 1, 5)
            .unwrap();
        assert_eq!(book.names(), vec!["Work".to_string()]);
        assert!(book.get(" Work").is_some());
    }

    #[test]
    fn test_history_ring_evicts_oldest() {
        let mut book = LayoutBook::new();
        for ts in 1..=5u64 {
            let title = format!("v{}", ts);
            let outcome = book
                .save("Work", vec![entry("a.exe", "A", &title)], fp(""), ts, 2)
                .unwrap();
            if ts == 1 {
                assert_eq!(outcome, SaveOutcome::Created);
            }
        }

        let layout = book.get("Work").unwrap();
        assert_eq!(layout.windows[0].normalized_title, "v5");
        let history: Vec<u64> = layout.history.iter().map(|v| v.timestamp).collect();
        assert_eq!(history, vec![4, 3]);
    }

    #[test]
    fn test_restore_version_swaps_current_into_history() {
        let mut book = LayoutBook::new();
        book.save("Work", vec![entry("a.exe", "A", "old")], fp(""), 1, 5)
            .unwrap();
        book.save("Work", vec![entry("a.exe", "A", "new")], fp(""), 2, 5)
            .unwrap();

        let layout = book.restore_version("Work", 0, 3, 5).unwrap();
        assert_eq!(layout.windows[0].normalized_title, "old");
        assert_eq!(layout.history.len(), 1);
        assert_eq!(layout.history[0].windows[0].normalized_title, "new");

        assert_eq!(
            book.restore_version("Work", 4, 4, 5).unwrap_err(),
            LayoutError::VersionNotFound {
                name: "Work".to_string(),
                index: 4
            }
        );
        assert!(matches!(
            book.restore_version("Home", 0, 4, 5),
            Err(LayoutError::LayoutNotFound(_))
        ));
    }

    #[test]
    fn test_names_sorted_and_remove() {
        let mut book = LayoutBook::new();
        for name in ["Zeta", "Alpha", "Mid"] {
            book.save(name, vec![entry("a.exe", "A", "a")], fp(""), 1, 5)
                .unwrap();
        }
        assert_eq!(book.names(), vec!["Alpha", "Mid", "Zeta"]);
        book.remove("Mid").unwrap();
        assert_eq!(book.len(), 2);
        assert!(matches!(book.remove("Mid"), Err(LayoutError::LayoutNotFound(_))));
    }

    #[test]
    fn test_find_by_fingerprint() {
        let mut book = LayoutBook::new();
        book.save("Laptop", vec![entry("a.exe", "A", "a")], fp("1:1920x1080@0,0"), 1, 5)
            .unwrap();
        book.save(
            "Desk",
            vec![entry("a.exe", "A", "a")],
            fp("2:1920x1080@0,0|2560x1440@1920,0"),
            1,
            5,
        )
        .unwrap();

        let found = book
            .find_by_fingerprint(&fp("2:1920x1080@0,0|2560x1440@1920,0"))
            .unwrap();
        assert_eq!(found.name, "Desk");
        assert!(book.find_by_fingerprint(&fp("3:other")).is_none());
        assert!(book.find_by_fingerprint(&fp("")).is_none());
    }

    #[test]
    fn test_window_entry_persisted_shape() {
        let mut e = entry("notepad.exe", "Notepad", "notes");
        e.rect = Rect::new(100, 100, 800, 600);
        e.virtual_desktop_id = Some(DesktopId::from_u128(1));
        let json = serde_json::to_value(&e).unwrap();

        assert_eq!(json["processExeName"], "notepad.exe");
        assert_eq!(json["windowClass"], "Notepad");
        assert_eq!(json["x"], 100);
        assert_eq!(json["width"], 800);
        assert_eq!(json["state"], "normal");
        assert_eq!(
            json["virtualDesktopId"],
            "{00000000-0000-0000-0000-000000000001}"
        );
        assert!(json.get("launchHint").is_none());

        let back: WindowEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_window_entry_defaults_missing_optional_fields() {
        let json = r#"{"processExeName":"code.exe","x":1,"y":2,"width":3,"height":4}"#;
        let e: WindowEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.dpi_scale, 1.0);
        assert_eq!(e.state, WindowState::Normal);
        assert_eq!(e.monitor_index, 0);
        assert!(e.virtual_desktop_id.is_none());
    }
}
