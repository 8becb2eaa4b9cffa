// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Operation journal for undo support

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::organize::move_file;
use crate::Result;

/// What was done to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Source moved to destination
    Move,
    /// Source copied to destination
    Copy,
    /// Source re-encoded as a JPEG at destination
    Convert,
}

/// A single file operation in the journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub age: Option<i64>,
    /// BLAKE3 hash of the destination right after the operation
    pub file_hash: String,
    pub undone: bool,
}

/// Outcome of an undo run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UndoReport {
    pub undone: usize,
    pub skipped: usize,
}

/// Journal of file operations
pub struct History {
    path: PathBuf,
}

impl History {
    /// Create a new journal handle
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Record an operation that just completed
    pub fn record(&self, action: Action, source: &Path, destination: &Path, age: Option<i64>) -> Result<HistoryEntry> {
        let entry = create_entry(
            uuid::Uuid::new_v4().to_string(),
            action,
            source.to_path_buf(),
            destination.to_path_buf(),
            age,
            calculate_file_hash(destination)?,
        );
        self.append(&entry)?;
        Ok(entry)
    }

    /// Append an entry to the journal
    pub fn append(&self, entry: &HistoryEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Read all journal entries
    pub fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("Failed to parse history entry: {}", e);
                }
            }
        }

        Ok(entries)
    }

    /// Get the most recent N entries (newest first)
    pub fn get_recent(&self, count: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.read_all()?;
        entries.reverse();
        entries.truncate(count);
        Ok(entries)
    }

    /// Mark an entry as undone. Lines that do not parse are kept as they are.
    pub fn mark_undone(&self, id: &str) -> Result<()> {
        let lines: Vec<String> = BufReader::new(File::open(&self.path)?)
            .lines()
            .collect::<std::io::Result<_>>()?;

        let file = File::create(&self.path)?;
        let mut writer = std::io::BufWriter::new(file);

        for line in lines {
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(mut entry) if entry.id == id => {
                    entry.undone = true;
                    writeln!(writer, "{}", serde_json::to_string(&entry)?)?;
                }
                _ => writeln!(writer, "{}", line)?,
            }
        }
        writer.flush()?;

        Ok(())
    }

    /// Get entries that haven't been undone
    pub fn get_undoable(&self) -> Result<Vec<HistoryEntry>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().filter(|e| !e.undone).collect())
    }

    /// Reverse the newest `count` operations (0 means all)
    pub fn undo(&self, count: usize, dry_run: bool) -> Result<UndoReport> {
        let mut entries = self.get_undoable()?;
        entries.reverse();
        if count > 0 {
            entries.truncate(count);
        }

        let mut report = UndoReport::default();
        for entry in entries {
            if let Some(reason) = blocked_reason(&entry) {
                warn!("Skip: {} ({})", entry.destination.display(), reason);
                report.skipped += 1;
                continue;
            }

            if dry_run {
                info!("Would undo {:?}: {} -> {}", entry.action, entry.destination.display(), entry.source.display());
                report.undone += 1;
                continue;
            }

            match entry.action {
                Action::Move => move_file(&entry.destination, &entry.source)?,
                Action::Copy | Action::Convert => fs::remove_file(&entry.destination)?,
            }
            self.mark_undone(&entry.id)?;
            info!("Undone {:?}: {} -> {}", entry.action, entry.destination.display(), entry.source.display());
            report.undone += 1;
        }

        Ok(report)
    }

    /// Clear all history
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Get journal file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Why an entry cannot be reversed safely, if it cannot
fn blocked_reason(entry: &HistoryEntry) -> Option<&'static str> {
    if !entry.destination.exists() {
        return Some("file not found, may have been moved/deleted");
    }
    if entry.destination == entry.source {
        return Some("output is the original file");
    }
    match calculate_file_hash(&entry.destination) {
        Ok(hash) if hash == entry.file_hash => {}
        Ok(_) => return Some("file changed since it was written"),
        Err(_) => return Some("file could not be read"),
    }
    if entry.action == Action::Move && entry.source.exists() {
        return Some("original path already exists");
    }
    None
}

/// Calculate file hash for change detection
pub fn calculate_file_hash(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    let hash = blake3::hash(&data);
    Ok(hash.to_hex().to_string())
}

/// Create a new journal entry
pub fn create_entry(
    id: String,
    action: Action,
    source: PathBuf,
    destination: PathBuf,
    age: Option<i64>,
    file_hash: String,
) -> HistoryEntry {
    HistoryEntry {
        id,
        timestamp: Utc::now(),
        action,
        source,
        destination,
        age,
        file_hash,
        undone: false,
    }
}
