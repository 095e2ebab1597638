//! JSONL audit reader - loads exported trails back for verification

use crate::error::AuditError;
use crate::trail::{AuditEntry, AuditTrail};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Sequential reader over exported audit files
pub struct AuditReader {
    files: Vec<PathBuf>,
}

impl AuditReader {
    /// Reader over a single exported record
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self {
            files: vec![path.as_ref().to_path_buf()],
        }
    }

    /// Create a new reader from a directory
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let mut files = Vec::new();

        if path.exists() {
            for entry in std::fs::read_dir(path)? {
                let entry = entry?;
                let file_path = entry.path();
                if file_path.extension().map_or(false, |ext| ext == "jsonl") {
                    files.push(file_path);
                }
            }
        }

        files.sort();

        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Read all entries of one file in order
    pub fn read_file(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    /// Load every file as a verified trail, keyed by file stem
    pub fn read_trails(&self) -> Result<Vec<(String, AuditTrail)>, AuditError> {
        let mut trails = Vec::new();

        for file_path in &self.files {
            let record = file_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let trail = AuditTrail::from_entries(Self::read_file(file_path)?)?;
            trails.push((record, trail));
        }

        Ok(trails)
    }

    /// Count total entries across all files
    pub fn count(&self) -> Result<usize, AuditError> {
        let mut count = 0;

        for file_path in &self.files {
            let file = File::open(file_path)?;
            let reader = BufReader::new(file);

            for line in reader.lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    count += 1;
                }
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AuditEvent, Money};
    use crate::store::AuditStore;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn trail(entries: usize) -> AuditTrail {
        let mut trail = AuditTrail::new();
        for month in 1..=entries as u32 {
            trail.append(
                Utc::now(),
                AuditEvent::MonthlyPaymentSettled {
                    paid: Money::new(dec!(88.84878), "KRM".parse().unwrap()),
                    month,
                    deposit_left: Money::new(dec!(3000), "KRM".parse().unwrap()),
                    deposit_returned: None,
                },
            );
        }
        trail
    }

    #[test]
    fn test_read_back_verified() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = AuditStore::new(dir.path())?;
        let original = trail(3);
        store.export("rec-a", &original)?;
        store.export("rec-b", &trail(2))?;

        let reader = AuditReader::from_directory(dir.path())?;
        assert_eq!(reader.count()?, 5);

        let trails = reader.read_trails()?;
        assert_eq!(trails.len(), 2);
        assert_eq!(trails[0].0, "rec-a");
        assert_eq!(trails[0].1, original);
        Ok(())
    }

    #[test]
    fn test_missing_directory_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let reader = AuditReader::from_directory(dir.path().join("nope"))?;
        assert!(reader.files().is_empty());
        assert_eq!(reader.count()?, 0);
        Ok(())
    }

    #[test]
    fn test_truncated_file_fails_verification() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = AuditStore::new(dir.path())?;
        store.export("rec", &trail(3))?;

        // Drop the first line: sequence starts at 2
        let path = store.file_path("rec");
        let content = std::fs::read_to_string(&path)?;
        let mut file = std::fs::File::create(&path)?;
        for line in content.lines().skip(1) {
            writeln!(file, "{}", line)?;
        }

        let result = AuditReader::from_file(&path).read_trails();
        assert!(matches!(
            result,
            Err(AuditError::InvalidSequence { expected: 1, actual: 2 })
        ));
        Ok(())
    }
}
