//! Structured error types for the rollover engine.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RollError {
    #[error("no contracts for asset root '{asset_root}' could be resolved from the input")]
    NoContracts { asset_root: String },

    #[error("contracts {first} and {second} share expiry {expiry}; expiry order must be strict")]
    DuplicateExpiry {
        first: String,
        second: String,
        expiry: NaiveDate,
    },

    #[error("continuous series for '{asset_root}' is empty after segmenting (empty input or wrong asset root?)")]
    EmptySeries { asset_root: String },

    #[error("{rollovers} rollovers cannot bound {contracts} contracts; expected one fewer rollover than contracts")]
    RolloverCountMismatch { contracts: usize, rollovers: usize },

    #[error("invalid rollover config: {0}")]
    InvalidConfig(String),
}
