//! Append-only hash-chained audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AuditError;
use crate::event::AuditEvent;

/// `prev_hash` of the first entry
pub const GENESIS_HASH: &str = "GENESIS";

/// One stored history line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// 1-based position in the trail
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub prev_hash: String,
    pub hash: String,
}

impl AuditEntry {
    /// Human-readable line: `<iso time> : <description>`
    pub fn render_text(&self) -> String {
        format!(
            "{} : {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            self.event
        )
    }
}

/// Calculate SHA256 hash of entry content (excluding the hash field itself)
pub fn calculate_entry_hash(entry: &AuditEntry) -> String {
    let mut hasher = Sha256::new();

    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(entry.timestamp.to_rfc3339().as_bytes());
    hasher.update(format!("{:?}", entry.event).as_bytes());

    hex::encode(hasher.finalize())
}

/// Verify hash chain integrity
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), AuditError> {
    let mut prev_hash = GENESIS_HASH.to_string();

    for (i, entry) in entries.iter().enumerate() {
        let expected_sequence = i as u64 + 1;
        if entry.sequence != expected_sequence {
            return Err(AuditError::InvalidSequence {
                expected: expected_sequence,
                actual: entry.sequence,
            });
        }

        if entry.prev_hash != prev_hash {
            return Err(AuditError::BrokenLink {
                sequence: entry.sequence,
                expected: prev_hash,
                actual: entry.prev_hash.clone(),
            });
        }

        let calculated = calculate_entry_hash(entry);
        if entry.hash != calculated {
            return Err(AuditError::InvalidHash {
                sequence: entry.sequence,
                expected: calculated,
                actual: entry.hash.clone(),
            });
        }

        prev_hash = entry.hash.clone();
    }

    Ok(())
}

/// History of one credit record
///
/// Entries are only ever appended; there is no API to remove or reorder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a trail from stored entries, checking the chain
    pub fn from_entries(entries: Vec<AuditEntry>) -> Result<Self, AuditError> {
        verify_chain(&entries)?;
        Ok(Self { entries })
    }

    /// Append an event stamped with the ledger time
    pub fn append(&mut self, timestamp: DateTime<Utc>, event: AuditEvent) -> &AuditEntry {
        let mut entry = AuditEntry {
            sequence: self.entries.len() as u64 + 1,
            timestamp,
            event,
            prev_hash: self.last_hash().to_string(),
            hash: String::new(),
        };
        entry.hash = calculate_entry_hash(&entry);
        tracing::trace!(sequence = entry.sequence, kind = entry.event.kind(), "Audit entry appended");

        let index = self.entries.len();
        self.entries.push(entry);
        &self.entries[index]
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    /// Hash the next entry links to
    pub fn last_hash(&self) -> &str {
        self.entries
            .last()
            .map(|entry| entry.hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    pub fn verify(&self) -> Result<(), AuditError> {
        verify_chain(&self.entries)
    }

    /// The human-readable history, one line per entry
    pub fn render_text(&self) -> Vec<String> {
        self.entries.iter().map(AuditEntry::render_text).collect()
    }

    /// The structured history as a JSON array
    pub fn render_json(&self) -> Result<String, AuditError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Money;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn forced() -> AuditEvent {
        AuditEvent::ForceSettled {
            paid: Money::new(dec!(1010), "KRM".parse().unwrap()),
            deposit_returned: Money::new(dec!(3000), "KRM".parse().unwrap()),
        }
    }

    fn missed() -> AuditEvent {
        AuditEvent::PaymentMissed {
            due: Money::new(dec!(88.84), "KRM".parse().unwrap()),
            month: 1,
            grace_until: at(9),
        }
    }

    #[test]
    fn test_append_links_entries() {
        let mut trail = AuditTrail::new();
        trail.append(at(1), missed());
        trail.append(at(2), forced());

        let entries = trail.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sequence, 1);
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert!(trail.verify().is_ok());
    }

    #[test]
    fn test_hash_deterministic() {
        let mut a = AuditTrail::new();
        let mut b = AuditTrail::new();
        a.append(at(1), forced());
        b.append(at(1), forced());
        assert_eq!(a.last_hash(), b.last_hash());
    }

    #[test]
    fn test_tampered_entry_fails_verification() {
        let mut trail = AuditTrail::new();
        trail.append(at(1), missed());
        trail.append(at(2), forced());

        let mut entries = trail.entries().to_vec();
        entries[0].timestamp = at(3);

        let result = AuditTrail::from_entries(entries);
        assert!(matches!(result, Err(AuditError::InvalidHash { sequence: 1, .. })));
    }

    #[test]
    fn test_broken_link_detected() {
        let mut trail = AuditTrail::new();
        trail.append(at(1), missed());
        trail.append(at(2), forced());

        let mut entries = trail.entries().to_vec();
        entries[1].prev_hash = "wrong_hash".to_string();
        assert!(matches!(
            verify_chain(&entries),
            Err(AuditError::BrokenLink { sequence: 2, .. })
        ));
    }

    #[test]
    fn test_render_text_format() {
        let mut trail = AuditTrail::new();
        trail.append(at(2), forced());

        let lines = trail.render_text();
        assert_eq!(
            lines[0],
            "2024-01-02T12:00:00 : Credit complete forced, 1010 KRM paid, 3000 KRM returned."
        );
    }

    #[test]
    fn test_render_json() {
        let mut trail = AuditTrail::new();
        trail.append(at(1), forced());

        let json: serde_json::Value = serde_json::from_str(&trail.render_json().unwrap()).unwrap();
        assert_eq!(json[0]["sequence"], 1);
        assert_eq!(json[0]["event"]["type"], "force_settled");
    }
}
