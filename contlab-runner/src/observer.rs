//! Forwards engine events to `tracing`.

use contlab_core::{RollEvent, RollObserver};

/// Schedule-level events at `info`, per-day volume comparisons at `debug`,
/// anomalies at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RollObserver for TracingObserver {
    fn on_event(&self, event: &RollEvent) {
        match event {
            RollEvent::ContractResolved {
                symbol,
                year,
                month,
                expiry,
            } => {
                tracing::info!(%symbol, year, month, %expiry, "contract expiry");
            }
            RollEvent::SymbolSkipped { symbol, reason } => {
                tracing::debug!(%symbol, ?reason, "symbol skipped");
            }
            RollEvent::WindowOpened {
                from,
                to,
                window_start,
                window_end,
            } => {
                tracing::info!(%from, %to, %window_start, %window_end, "analyzing rollover");
            }
            RollEvent::VolumeCompared {
                date,
                from,
                to,
                from_volume,
                to_volume,
                streak,
            } => {
                tracing::debug!(%date, %from, from_volume, %to, to_volume, streak, "daily volume");
            }
            RollEvent::CrossoverTriggered {
                from,
                to,
                date,
                streak_start,
            } => {
                tracing::info!(%from, %to, %date, %streak_start, "rollover triggered by volume");
            }
            RollEvent::FallbackApplied {
                from,
                to,
                date,
                common_days,
            } => {
                tracing::info!(%from, %to, %date, common_days, "no volume crossover, using fallback date");
            }
            RollEvent::RolloverClamped {
                from,
                proposed,
                clamped_to,
            } => {
                tracing::warn!(%from, %proposed, %clamped_to, "rollover date clamped to keep segments ordered");
            }
            RollEvent::SegmentSelected {
                symbol,
                bar_count,
                first_date,
                last_date,
                ..
            } => {
                tracing::info!(%symbol, %first_date, %last_date, bars = bar_count, "segment");
            }
            RollEvent::EmptySegment { symbol, start, end } => {
                let end = end.map_or_else(|| "open".to_string(), |d| d.to_string());
                tracing::warn!(%symbol, %start, %end, "segment selected no bars");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn handles_every_event_without_subscriber() {
        let d = NaiveDate::from_ymd_opt(2020, 12, 10).unwrap();
        let obs = TracingObserver;
        obs.on_event(&RollEvent::WindowOpened {
            from: "ESZ0".into(),
            to: "ESH1".into(),
            window_start: d,
            window_end: d,
        });
        obs.on_event(&RollEvent::EmptySegment {
            symbol: "ESH1".into(),
            start: d,
            end: None,
        });
        obs.on_event(&RollEvent::RolloverClamped {
            from: "ESH1".into(),
            proposed: d,
            clamped_to: d,
        });
    }
}
