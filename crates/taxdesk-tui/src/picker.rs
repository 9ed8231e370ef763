//! Invoice file picker popup state.

use anyhow::{anyhow, Result};
use ratatui::widgets::ListState;
use std::path::{Path, PathBuf};
use taxdesk_core::InvoiceFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Directory listing filtered to files that look like invoices.
pub struct FilePicker {
    pub dir: PathBuf,
    pub entries: Vec<PickerEntry>,
    pub state: ListState,
}

/// What confirming the current selection means.
pub enum PickerChoice {
    File(PathBuf),
    Entered,
    Nothing,
}

impl FilePicker {
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = list_dir(dir)?;
        let mut picker = Self {
            dir: PathBuf::new(),
            entries: Vec::new(),
            state: ListState::default(),
        };
        picker.show(dir.to_path_buf(), entries);
        Ok(picker)
    }

    /// Switch to a freshly listed directory.
    fn show(&mut self, dir: PathBuf, entries: Vec<PickerEntry>) {
        self.dir = dir;
        self.entries = entries;

        // Start on the first file when there is one
        let first_file = self.entries.iter().position(|e| !e.is_dir);
        self.state = ListState::default();
        if !self.entries.is_empty() {
            self.state.select(Some(first_file.unwrap_or(0)));
        }
    }

    pub fn nav_down(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + 1).min(self.entries.len() - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn nav_up(&mut self) {
        let i = self.state.selected().unwrap_or(0).saturating_sub(1);
        if !self.entries.is_empty() {
            self.state.select(Some(i));
        }
    }

    pub fn selected(&self) -> Option<&PickerEntry> {
        self.state.selected().and_then(|i| self.entries.get(i))
    }

    /// Pick the selected file, or descend into the selected directory.
    pub fn confirm(&mut self) -> Result<PickerChoice> {
        let Some(entry) = self.selected().cloned() else {
            return Ok(PickerChoice::Nothing);
        };
        if entry.is_dir {
            // Only move once the listing succeeded
            let entries = list_dir(&entry.path)?;
            self.show(entry.path, entries);
            Ok(PickerChoice::Entered)
        } else {
            Ok(PickerChoice::File(entry.path))
        }
    }
}

/// `..` first, then sub-directories, then accepted invoice files.
fn list_dir(dir: &Path) -> Result<Vec<PickerEntry>> {
    let read = std::fs::read_dir(dir).map_err(|e| anyhow!("Cannot list {:?}: {}", dir, e))?;

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in read.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            dirs.push(PickerEntry { name, path, is_dir: true });
        } else if InvoiceFile::is_accepted_path(&path) {
            files.push(PickerEntry { name, path, is_dir: false });
        }
    }
    dirs.sort_by(|a, b| a.name.cmp(&b.name));
    files.sort_by(|a, b| a.name.cmp(&b.name));

    let mut entries = Vec::with_capacity(dirs.len() + files.len() + 1);
    if let Some(parent) = dir.parent() {
        entries.push(PickerEntry {
            name: "..".to_string(),
            path: parent.to_path_buf(),
            is_dir: true,
        });
    }
    entries.extend(dirs);
    entries.extend(files);
    Ok(entries)
}
