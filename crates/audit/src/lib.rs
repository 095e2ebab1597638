//! KCredit Audit - Credit record history
//!
//! Every credit transition appends a typed `AuditEvent` to the record's
//! `AuditTrail`. Entries are hash-chained like a journal, so a trail read
//! back from JSONL can be checked for tampering. Text and JSON views are
//! rendered on demand and never stored.

pub mod error;
pub mod event;
pub mod reader;
pub mod store;
pub mod trail;

pub use error::AuditError;
pub use event::{AuditEvent, Money};
pub use reader::AuditReader;
pub use store::AuditStore;
pub use trail::{calculate_entry_hash, verify_chain, AuditEntry, AuditTrail, GENESIS_HASH};
