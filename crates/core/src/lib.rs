//! KCredit Core - Domain types
//!
//! This crate contains the fundamental types shared by every KCredit crate:
//! - `AccountId`: Ledger account reference
//! - `AssetSymbol` / `AssetInfo`: Asset codes and their declared decimal precision
//! - `AssetAmount`: Integer fixed-point amount of one asset, as the ledger stores it

pub mod account;
pub mod amount;
pub mod asset;

pub use account::AccountId;
pub use amount::AssetAmount;
pub use asset::{AssetError, AssetInfo, AssetSymbol};

/// Ledger clock value. Always the head block time, never wall-clock time.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
