//! Series stitching: partition the date axis into one segment per contract
//! and keep each contract's bars only inside its own segment.

use crate::domain::{Bar, Contract};
use crate::error::RollError;
use crate::events::{RollEvent, RollObserver};
use crate::rollover::RolloverEvent;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Date range `[start, end)` whose bars are taken from `symbol`.
/// `end == None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSegment {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl ActiveSegment {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && self.end.map_or(true, |end| date < end)
    }
}

/// Bars selected for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub segment: ActiveSegment,
    pub bar_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Build segments from contracts in expiry order and their rollovers.
///
/// `rollovers[i]` must describe the transition out of `contracts[i]`, so there
/// is one fewer rollover than contracts. The first segment opens at
/// `first_date` (earliest date in the whole input).
pub fn build_segments(
    contracts: &[Contract],
    rollovers: &[RolloverEvent],
    first_date: NaiveDate,
) -> Result<Vec<ActiveSegment>, RollError> {
    if rollovers.len() + 1 != contracts.len().max(1) {
        return Err(RollError::RolloverCountMismatch {
            contracts: contracts.len(),
            rollovers: rollovers.len(),
        });
    }

    let starts = std::iter::once(first_date).chain(rollovers.iter().map(|r| r.rollover_date));
    Ok(contracts
        .iter()
        .zip(starts)
        .enumerate()
        .map(|(i, (contract, start))| ActiveSegment {
            symbol: contract.symbol.clone(),
            start,
            end: rollovers.get(i).map(|r| r.rollover_date),
        })
        .collect())
}

/// Select every bar that falls inside its symbol's segment, then order the
/// result by UTC timestamp.
///
/// Input order is preserved among bars with equal timestamps, so the output
/// is a deterministic function of the input.
pub fn stitch(
    bars: &[Bar],
    segments: &[ActiveSegment],
    observer: &dyn RollObserver,
) -> (Vec<Bar>, Vec<SegmentStats>) {
    let index: HashMap<&str, usize> = segments
        .iter()
        .enumerate()
        .map(|(i, s)| (s.symbol.as_str(), i))
        .collect();

    let mut stats: Vec<SegmentStats> = segments
        .iter()
        .map(|segment| SegmentStats {
            segment: segment.clone(),
            bar_count: 0,
            first_date: None,
            last_date: None,
        })
        .collect();

    let mut selected = Vec::new();
    for bar in bars {
        let Some(&i) = index.get(bar.symbol.as_str()) else {
            continue;
        };
        let date = bar.trading_date();
        if !segments[i].contains(date) {
            continue;
        }

        let entry = &mut stats[i];
        entry.bar_count += 1;
        entry.first_date = Some(entry.first_date.map_or(date, |d| d.min(date)));
        entry.last_date = Some(entry.last_date.map_or(date, |d| d.max(date)));
        selected.push(bar.clone());
    }

    for entry in &stats {
        match (entry.first_date, entry.last_date) {
            (Some(first_date), Some(last_date)) => observer.on_event(&RollEvent::SegmentSelected {
                symbol: entry.segment.symbol.clone(),
                start: entry.segment.start,
                end: entry.segment.end,
                bar_count: entry.bar_count,
                first_date,
                last_date,
            }),
            _ => observer.on_event(&RollEvent::EmptySegment {
                symbol: entry.segment.symbol.clone(),
                start: entry.segment.start,
                end: entry.segment.end,
            }),
        }
    }

    selected.sort_by_key(|b| b.ts_utc);
    (selected, stats)
}
