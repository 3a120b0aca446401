//! Layout persistence.
//!
//! Layouts are kept in one JSON file mapping each layout name to its
//! persisted record (`timestamp`, `monitorFingerprint`, `windows`, and the
//! optional `history`).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use winlayout_core::LayoutBook;

/// Reads and writes the layouts file.
///
/// Clones share one write lock, so background saves and the shutdown save
/// never interleave on the temporary file.
#[derive(Debug, Clone)]
pub struct LayoutStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LayoutStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all layouts; a missing file is an empty book.
    pub fn load(&self) -> Result<LayoutBook> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No layouts file at {:?}, starting empty", self.path);
                return Ok(LayoutBook::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read layouts file: {}", self.path.display()))
            }
        };

        let book: LayoutBook = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse layouts file: {}", self.path.display()))?;
        tracing::info!("Loaded {} layout(s) from {:?}", book.len(), self.path);
        Ok(book)
    }

    /// Load all layouts, setting an unreadable file aside as `*.corrupt` so
    /// the next save does not overwrite it.
    pub fn load_or_recover(&self) -> LayoutBook {
        match self.load() {
            Ok(book) => book,
            Err(e) => {
                tracing::error!("{:#}", e);
                let backup = self.path.with_extension("json.corrupt");
                match fs::rename(&self.path, &backup) {
                    Ok(()) => tracing::warn!("Moved unreadable layouts file to {:?}", backup),
                    Err(e) => tracing::warn!("Failed to move unreadable layouts file aside: {}", e),
                }
                LayoutBook::new()
            }
        }
    }

    /// Write all layouts, replacing the file atomically.
    pub fn save(&self, book: &LayoutBook) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(book).context("Failed to serialize layouts")?;
        // A writer that panicked left no state behind the lock.
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        tracing::debug!("Saved {} layout(s) to {:?}", book.len(), self.path);
        Ok(())
    }
}
