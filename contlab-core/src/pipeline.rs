//! End-to-end core pipeline: resolve contracts, detect rollovers, stitch.

use crate::config::RolloverConfig;
use crate::domain::{Bar, Contract};
use crate::error::RollError;
use crate::events::RollObserver;
use crate::expiry::resolve_contracts;
use crate::rollover::{DailyVolumes, RolloverDetector, RolloverEvent};
use crate::stitch::{build_segments, stitch, ActiveSegment, SegmentStats};
use chrono::NaiveDate;

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct ContinuousSeries {
    /// Selected bars, ordered by UTC timestamp.
    pub bars: Vec<Bar>,
    /// Contracts in expiry order.
    pub contracts: Vec<Contract>,
    /// One per contract except the last.
    pub rollovers: Vec<RolloverEvent>,
    /// One per contract, in the same order.
    pub segments: Vec<SegmentStats>,
}

impl ContinuousSeries {
    pub fn active_segments(&self) -> impl Iterator<Item = &ActiveSegment> {
        self.segments.iter().map(|s| &s.segment)
    }

    /// First and last trading date in the output.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        date_range(&self.bars)
    }
}

/// Earliest and latest exchange-local trading date in `bars`.
pub fn date_range(bars: &[Bar]) -> Option<(NaiveDate, NaiveDate)> {
    bars.iter().map(Bar::trading_date).fold(None, |acc, d| match acc {
        None => Some((d, d)),
        Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
    })
}

/// Build the continuous series for one asset.
///
/// `bars` is the cleaned bar table; it need not be sorted. The function is
/// pure: identical input and config always produce identical output.
pub fn build_continuous_series(
    bars: &[Bar],
    config: &RolloverConfig,
    observer: &dyn RollObserver,
) -> Result<ContinuousSeries, RollError> {
    config.validate()?;

    let contracts = resolve_contracts(bars, config, observer)?;
    let Some((first_date, _)) = date_range(bars) else {
        return Err(RollError::EmptySeries {
            asset_root: config.asset_root.clone(),
        });
    };

    let volumes = DailyVolumes::from_bars(bars);
    let rollovers = RolloverDetector::new(config).detect_all(&contracts, &volumes, observer);
    let segments = build_segments(&contracts, &rollovers, first_date)?;
    let (selected, stats) = stitch(bars, &segments, observer);

    if selected.is_empty() {
        return Err(RollError::EmptySeries {
            asset_root: config.asset_root.clone(),
        });
    }

    Ok(ContinuousSeries {
        bars: selected,
        contracts,
        rollovers,
        segments: stats,
    })
}
