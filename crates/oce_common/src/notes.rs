//! Session notes store.
//!
//! Ephemeral per-project preference strings ("budget under 5000").
//! The file backend is an append-only JSONL log: one record per line with
//! `project_id`, `key`, `value` and `timestamp`. Reads replay the log and the
//! last write to a key wins. The file may be truncated or deleted by anyone at
//! any time; a missing file simply means no notes, and unreadable lines are
//! skipped. Writers inside one process serialise on a mutex; writers in
//! different processes are best-effort.

use crate::error::{OceError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// One stored note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNote {
    pub project_id: String,
    pub key: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionNote {
    pub fn new(project_id: &str, key: &str, value: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Backing store for session notes
pub trait NoteStore: Send + Sync {
    /// Current notes for a project, one per key, in first-written order
    fn get(&self, project_id: &str) -> Result<Vec<SessionNote>>;

    /// Store a note, overwriting any earlier value for the same key
    fn put(&self, project_id: &str, key: &str, value: &str) -> Result<SessionNote>;

    /// Drop every note of a project; returns the number of records removed
    fn purge(&self, project_id: &str) -> Result<usize>;

    /// Drop everything
    fn purge_all(&self) -> Result<()>;
}

/// Collapse a record stream into the live view of one project
fn live_notes<I>(records: I, project_id: &str) -> Vec<SessionNote>
where
    I: IntoIterator<Item = SessionNote>,
{
    let mut notes: Vec<SessionNote> = Vec::new();
    for record in records.into_iter().filter(|r| r.project_id == project_id) {
        match notes.iter_mut().find(|n| n.key == record.key) {
            Some(existing) => *existing = record,
            None => notes.push(record),
        }
    }
    notes
}

fn validate_write(project_id: &str, key: &str) -> Result<()> {
    if project_id.trim().is_empty() {
        return Err(OceError::Notes("project_id must not be blank".to_string()));
    }
    if key.trim().is_empty() {
        return Err(OceError::Notes("note key must not be blank".to_string()));
    }
    Ok(())
}

/// File-backed append-only log with compaction
pub struct JsonlNoteStore {
    path: PathBuf,
    max_entries: usize,
    write_lock: Mutex<()>,
}

impl JsonlNoteStore {
    pub fn new(path: impl AsRef<Path>, max_entries: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_entries: max_entries.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Default location in state directory
    pub fn default_path() -> PathBuf {
        PathBuf::from("/var/lib/oce/session_notes.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| OceError::Notes("notes write lock poisoned".to_string()))
    }

    /// Read every parsable record in file order
    fn read_all(&self) -> Result<Vec<SessionNote>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionNote>(&line) {
                Ok(record) => records.push(record),
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!("Skipped {} unreadable session note lines in {}", skipped, self.path.display());
        }
        Ok(records)
    }

    /// Replace the log with the given records (temp file, then rename)
    fn rewrite(&self, records: &[SessionNote]) -> Result<()> {
        let temp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut file = File::create(&temp_path)?;
            for record in records {
                let line = serde_json::to_string(record)?;
                writeln!(file, "{}", line)?;
            }
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Compact the log once it grows past `max_entries`
    fn maybe_compact(&self) -> Result<()> {
        let records = self.read_all()?;
        if records.len() <= self.max_entries {
            return Ok(());
        }

        // Keep only the newest record per (project, key)
        let mut compacted: Vec<SessionNote> = Vec::new();
        for record in records.iter().rev() {
            let superseded = compacted
                .iter()
                .any(|c| c.project_id == record.project_id && c.key == record.key);
            if !superseded {
                compacted.push(record.clone());
            }
        }
        compacted.reverse();

        if compacted.len() > self.max_entries {
            let keep = self.max_entries * 3 / 4;
            compacted.drain(..compacted.len() - keep.max(1));
        }

        debug!(
            "Compacted session notes: {} -> {} records",
            records.len(),
            compacted.len()
        );
        self.rewrite(&compacted)
    }
}

impl NoteStore for JsonlNoteStore {
    fn get(&self, project_id: &str) -> Result<Vec<SessionNote>> {
        Ok(live_notes(self.read_all()?, project_id))
    }

    fn put(&self, project_id: &str, key: &str, value: &str) -> Result<SessionNote> {
        validate_write(project_id, key)?;
        let _guard = self.lock()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let record = SessionNote::new(project_id.trim(), key.trim(), value);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(&record)?;
        writeln!(file, "{}", line)?;
        drop(file);

        // The record is on disk; a failed compaction only leaves the log longer
        if let Err(e) = self.maybe_compact() {
            warn!("Session notes compaction failed for {}: {}", self.path.display(), e);
        }
        Ok(record)
    }

    fn purge(&self, project_id: &str) -> Result<usize> {
        let _guard = self.lock()?;
        let records = self.read_all()?;
        let before = records.len();
        let kept: Vec<SessionNote> = records
            .into_iter()
            .filter(|r| r.project_id != project_id)
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.rewrite(&kept)?;
        }
        Ok(removed)
    }

    fn purge_all(&self) -> Result<()> {
        let _guard = self.lock()?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store with the same semantics; nothing survives a restart
#[derive(Default)]
pub struct MemoryNoteStore {
    records: Mutex<Vec<SessionNote>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, Vec<SessionNote>>> {
        self.records
            .lock()
            .map_err(|_| OceError::Notes("notes lock poisoned".to_string()))
    }
}

impl NoteStore for MemoryNoteStore {
    fn get(&self, project_id: &str) -> Result<Vec<SessionNote>> {
        let records = self.records()?;
        Ok(live_notes(records.iter().cloned(), project_id))
    }

    fn put(&self, project_id: &str, key: &str, value: &str) -> Result<SessionNote> {
        validate_write(project_id, key)?;
        let record = SessionNote::new(project_id.trim(), key.trim(), value);
        self.records()?.push(record.clone());
        Ok(record)
    }

    fn purge(&self, project_id: &str) -> Result<usize> {
        let mut records = self.records()?;
        let before = records.len();
        records.retain(|r| r.project_id != project_id);
        Ok(before - records.len())
    }

    fn purge_all(&self) -> Result<()> {
        self.records()?.clear();
        Ok(())
    }
}
