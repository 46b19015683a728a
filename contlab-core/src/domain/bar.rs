//! Bar — the fundamental market data unit.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single futures contract.
///
/// Prices are raw, unadjusted contract prices. Every bar carries two
/// timestamps: the exchange-local wall clock (used to derive the trading
/// date) and the UTC instant (used for global ordering).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub ts_exchange: NaiveDateTime,
    pub ts_utc: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Calendar date of the bar in exchange-local time.
    pub fn trading_date(&self) -> NaiveDate {
        self.ts_exchange.date()
    }
}
