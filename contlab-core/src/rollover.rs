//! Volume-crossover rollover detection.
//!
//! For each adjacent pair of contracts (current, next) the detector looks at
//! the `rollover_window_days` calendar days before the current contract's
//! expiry. On every date both contracts traded it compares total daily
//! volume; once `next` has out-traded `current` for
//! `consecutive_days_threshold` dates in a row, the pair rolls on the date the
//! streak completed. A tie breaks the streak. Without a confirmed crossover
//! the pair rolls `fallback_offset_days` before expiry.

use crate::config::RolloverConfig;
use crate::domain::{Bar, Contract};
use crate::events::{RollEvent, RollObserver};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Total traded volume per trading date, per symbol.
#[derive(Debug, Default, Clone)]
pub struct DailyVolumes {
    by_symbol: HashMap<String, BTreeMap<NaiveDate, u64>>,
}

impl DailyVolumes {
    /// Aggregate bar volume by symbol and exchange-local trading date.
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut by_symbol: HashMap<String, BTreeMap<NaiveDate, u64>> = HashMap::new();
        for bar in bars {
            let daily = by_symbol.entry(bar.symbol.clone()).or_default();
            let total = daily.entry(bar.trading_date()).or_insert(0);
            *total = total.saturating_add(bar.volume);
        }
        Self { by_symbol }
    }

    /// Daily totals for `symbol` on dates in `[start, end)`.
    pub fn window(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> BTreeMap<NaiveDate, u64> {
        if start >= end {
            return BTreeMap::new();
        }
        self.by_symbol
            .get(symbol)
            .map(|daily| daily.range(start..end).map(|(d, v)| (*d, *v)).collect())
            .unwrap_or_default()
    }
}

/// A confirmed run of days where the next contract out-traded the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossover {
    /// First day of the qualifying streak.
    pub streak_start: NaiveDate,
    /// Day the streak reached the threshold; this is the rollover date.
    pub confirmed_on: NaiveDate,
}

/// Scan dates common to both series in ascending order.
///
/// `on_day` sees every compared date with both volumes and the streak length
/// after that date, until the crossover is confirmed.
pub fn find_crossover(
    current: &BTreeMap<NaiveDate, u64>,
    next: &BTreeMap<NaiveDate, u64>,
    threshold: u32,
    mut on_day: impl FnMut(NaiveDate, u64, u64, u32),
) -> Option<Crossover> {
    let mut streak: u32 = 0;
    let mut streak_start: Option<NaiveDate> = None;

    for (date, &current_volume) in current {
        let Some(&next_volume) = next.get(date) else {
            continue;
        };

        if next_volume > current_volume {
            streak += 1;
            let start = *streak_start.get_or_insert(*date);
            on_day(*date, current_volume, next_volume, streak);
            if streak >= threshold {
                return Some(Crossover {
                    streak_start: start,
                    confirmed_on: *date,
                });
            }
        } else {
            streak = 0;
            streak_start = None;
            on_day(*date, current_volume, next_volume, streak);
        }
    }

    None
}

/// How a rollover date was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RolloverMethod {
    Crossover { streak_start: NaiveDate },
    Fallback,
    /// Pushed forward to the previous pair's date to keep segments ordered.
    Clamped { proposed: NaiveDate },
}

/// Transition from one contract to its successor.
///
/// `rollover_date` is the first date taken from `to_symbol`; `from_symbol`
/// covers dates strictly before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverEvent {
    pub from_symbol: String,
    pub to_symbol: String,
    pub rollover_date: NaiveDate,
    #[serde(flatten)]
    pub method: RolloverMethod,
}

/// Decides rollover dates under a fixed configuration.
pub struct RolloverDetector<'a> {
    config: &'a RolloverConfig,
}

impl<'a> RolloverDetector<'a> {
    pub fn new(config: &'a RolloverConfig) -> Self {
        Self { config }
    }

    /// Decide the rollover for one adjacent pair.
    pub fn detect_pair(
        &self,
        volumes: &DailyVolumes,
        current: &Contract,
        next: &Contract,
        observer: &dyn RollObserver,
    ) -> RolloverEvent {
        let window_end = current.expiry;
        let window_start =
            window_end - Duration::days(i64::from(self.config.rollover_window_days));

        observer.on_event(&RollEvent::WindowOpened {
            from: current.symbol.clone(),
            to: next.symbol.clone(),
            window_start,
            window_end,
        });

        let current_daily = volumes.window(&current.symbol, window_start, window_end);
        let next_daily = volumes.window(&next.symbol, window_start, window_end);

        let crossover = find_crossover(
            &current_daily,
            &next_daily,
            self.config.consecutive_days_threshold,
            |date, from_volume, to_volume, streak| {
                observer.on_event(&RollEvent::VolumeCompared {
                    date,
                    from: current.symbol.clone(),
                    to: next.symbol.clone(),
                    from_volume,
                    to_volume,
                    streak,
                });
            },
        );

        match crossover {
            Some(found) => {
                observer.on_event(&RollEvent::CrossoverTriggered {
                    from: current.symbol.clone(),
                    to: next.symbol.clone(),
                    date: found.confirmed_on,
                    streak_start: found.streak_start,
                });
                RolloverEvent {
                    from_symbol: current.symbol.clone(),
                    to_symbol: next.symbol.clone(),
                    rollover_date: found.confirmed_on,
                    method: RolloverMethod::Crossover {
                        streak_start: found.streak_start,
                    },
                }
            }
            None => {
                let date = current.expiry
                    - Duration::days(i64::from(self.config.fallback_offset_days));
                let common_days = current_daily
                    .keys()
                    .filter(|d| next_daily.contains_key(d))
                    .count();
                observer.on_event(&RollEvent::FallbackApplied {
                    from: current.symbol.clone(),
                    to: next.symbol.clone(),
                    date,
                    common_days,
                });
                RolloverEvent {
                    from_symbol: current.symbol.clone(),
                    to_symbol: next.symbol.clone(),
                    rollover_date: date,
                    method: RolloverMethod::Fallback,
                }
            }
        }
    }

    /// One rollover per contract except the last, in expiry order.
    ///
    /// Dates are made non-decreasing: a pair whose date would precede the
    /// previous pair's is clamped up to it.
    pub fn detect_all(
        &self,
        contracts: &[Contract],
        volumes: &DailyVolumes,
        observer: &dyn RollObserver,
    ) -> Vec<RolloverEvent> {
        let mut events: Vec<RolloverEvent> = Vec::with_capacity(contracts.len().saturating_sub(1));

        for pair in contracts.windows(2) {
            let mut event = self.detect_pair(volumes, &pair[0], &pair[1], observer);

            if let Some(prev) = events.last() {
                if event.rollover_date < prev.rollover_date {
                    observer.on_event(&RollEvent::RolloverClamped {
                        from: event.from_symbol.clone(),
                        proposed: event.rollover_date,
                        clamped_to: prev.rollover_date,
                    });
                    event.method = RolloverMethod::Clamped {
                        proposed: event.rollover_date,
                    };
                    event.rollover_date = prev.rollover_date;
                }
            }

            events.push(event);
        }

        events
    }
}
