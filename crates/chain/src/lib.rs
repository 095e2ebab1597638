//! KCredit Chain - the facade the surrounding chain calls into
//!
//! Wires the ledger, the credit engine and the exchange-rate state together.
//! Charges operation fees and drives the periodic maintenance tick.

pub mod chain;
pub mod error;

pub use chain::{CreditChain, TickReport};
pub use error::ChainError;
