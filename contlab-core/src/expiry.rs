//! Contract expiry resolution.
//!
//! A symbol such as `ESZ0` is `<asset root><month code><year digit>`. The
//! expiry is the third Friday of the contract month. The single year digit is
//! ambiguous across decades, so the decade is chosen by [`DecadePolicy`].

use crate::config::{DecadePolicy, RolloverConfig};
use crate::domain::{Bar, Contract, MonthCode};
use crate::error::RollError;
use crate::events::{RollEvent, RollObserver, SkipReason};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

/// Third Friday of the given month, or `None` for an invalid year/month.
pub fn third_friday(year: i32, month: u32) -> Option<NaiveDate> {
    let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
    // Friday is 4 counting Monday as 0.
    let weekday = first_day.weekday().num_days_from_monday() as i64;
    let days_until_friday = (4 - weekday).rem_euclid(7);
    Some(first_day + Duration::days(days_until_friday + 14))
}

/// Month code and year digit extracted from a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedSymbol {
    pub month_code: MonthCode,
    pub year_digit: u32,
}

/// Parse `<root><month code><digit>` exactly.
pub fn parse_symbol(asset_root: &str, symbol: &str) -> Result<ParsedSymbol, SkipReason> {
    let rest = symbol
        .strip_prefix(asset_root)
        .ok_or(SkipReason::WrongRoot)?;

    let mut chars = rest.chars();
    let (Some(code), Some(digit), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(SkipReason::Unparseable);
    };

    let month_code = MonthCode::from_char(code).ok_or(SkipReason::Unparseable)?;
    let year_digit = digit.to_digit(10).ok_or(SkipReason::Unparseable)?;

    Ok(ParsedSymbol {
        month_code,
        year_digit,
    })
}

/// Resolves symbols to contracts under a fixed configuration.
pub struct ExpiryResolver<'a> {
    config: &'a RolloverConfig,
}

impl<'a> ExpiryResolver<'a> {
    pub fn new(config: &'a RolloverConfig) -> Self {
        Self { config }
    }

    /// Resolve a symbol to a contract.
    ///
    /// `first_seen` is the earliest trading date observed for the symbol; it
    /// anchors the decade under [`DecadePolicy::FromData`].
    pub fn resolve(&self, symbol: &str, first_seen: NaiveDate) -> Result<Contract, SkipReason> {
        let parsed = parse_symbol(&self.config.asset_root, symbol)?;
        let month = parsed.month_code.month();
        let year = self
            .resolve_year(parsed.year_digit, month, first_seen)
            .ok_or(SkipReason::InvalidDate)?;
        let expiry = third_friday(year, month).ok_or(SkipReason::InvalidDate)?;

        Ok(Contract {
            symbol: symbol.to_string(),
            month_code: parsed.month_code,
            contract_year: year,
            contract_month: month,
            expiry,
        })
    }

    fn resolve_year(&self, digit: u32, month: u32, first_seen: NaiveDate) -> Option<i32> {
        let digit = digit as i32;
        match self.config.decade {
            DecadePolicy::Fixed { decade_start } => decade_start.checked_add(digit),
            DecadePolicy::FromData => {
                let seen_year = first_seen.year();
                let mut year = seen_year + (digit - seen_year.rem_euclid(10)).rem_euclid(10);
                if third_friday(year, month)? < first_seen {
                    year = year.checked_add(10)?;
                }
                Some(year)
            }
        }
    }
}

/// Resolve every distinct symbol in `bars` and return contracts ordered by
/// expiry ascending.
///
/// Unresolvable symbols are skipped (and reported). Zero contracts, or two
/// contracts sharing an expiry, are errors.
pub fn resolve_contracts(
    bars: &[Bar],
    config: &RolloverConfig,
    observer: &dyn RollObserver,
) -> Result<Vec<Contract>, RollError> {
    let mut first_seen: BTreeMap<&str, NaiveDate> = BTreeMap::new();
    for bar in bars {
        let date = bar.trading_date();
        first_seen
            .entry(bar.symbol.as_str())
            .and_modify(|d| *d = (*d).min(date))
            .or_insert(date);
    }

    let resolver = ExpiryResolver::new(config);
    let mut contracts = Vec::with_capacity(first_seen.len());
    for (symbol, first) in first_seen {
        match resolver.resolve(symbol, first) {
            Ok(contract) => contracts.push(contract),
            Err(reason) => observer.on_event(&RollEvent::SymbolSkipped {
                symbol: symbol.to_string(),
                reason,
            }),
        }
    }

    if contracts.is_empty() {
        return Err(RollError::NoContracts {
            asset_root: config.asset_root.clone(),
        });
    }

    let contracts = order_by_expiry(contracts)?;

    for contract in &contracts {
        observer.on_event(&RollEvent::ContractResolved {
            symbol: contract.symbol.clone(),
            year: contract.contract_year,
            month: contract.contract_month,
            expiry: contract.expiry,
        });
    }

    Ok(contracts)
}

/// Sort contracts by expiry ascending, rejecting shared expiries.
pub fn order_by_expiry(mut contracts: Vec<Contract>) -> Result<Vec<Contract>, RollError> {
    contracts.sort_by(|a, b| a.expiry.cmp(&b.expiry).then_with(|| a.symbol.cmp(&b.symbol)));

    if let Some(pair) = contracts.windows(2).find(|p| p[0].expiry == p[1].expiry) {
        return Err(RollError::DuplicateExpiry {
            first: pair[0].symbol.clone(),
            second: pair[1].symbol.clone(),
            expiry: pair[0].expiry,
        });
    }

    Ok(contracts)
}
