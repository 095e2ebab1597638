//! JSONL audit store - append-only writer, one file per credit record

use crate::error::AuditError;
use crate::trail::{AuditEntry, AuditTrail};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only JSONL store of audit entries
pub struct AuditStore {
    base_path: PathBuf,
}

impl AuditStore {
    /// Create a new store at the given path
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Path of the file holding one record's history
    pub fn file_path(&self, record: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", record))
    }

    /// Append entries to a record's file
    pub fn append(&mut self, record: &str, entries: &[AuditEntry]) -> Result<(), AuditError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path(record))?;
        let mut writer = BufWriter::new(file);

        for entry in entries {
            let json = serde_json::to_string(entry)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write a whole trail, replacing any previous export of the record
    pub fn export(&mut self, record: &str, trail: &AuditTrail) -> Result<(), AuditError> {
        let path = self.file_path(record);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        self.append(record, trail.entries())?;
        tracing::debug!(record, entries = trail.len(), "Audit trail exported");
        Ok(())
    }

    /// List all JSONL files in the store
    pub fn list_files(&self) -> Result<Vec<PathBuf>, AuditError> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "jsonl") {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}
