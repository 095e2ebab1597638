//! KCredit Exchange Rate Oracle
//!
//! Active witnesses submit per-asset rates (price of one unit in the
//! reference asset). A periodic tick publishes the median once enough
//! distinct witnesses have submitted. The credit engine only ever reads
//! the last accepted rate.

mod error;
mod mock;
mod state;
mod types;

pub use error::OracleError;
pub use mock::StaticRates;
pub use state::{median, ExchangeRateState, ProcessReport};
pub use types::{AcceptedRate, ExchangeRateSetOperation, RateInterval, RateSource};
