//! ContLab Core — contract expiry, rollover detection, continuous series stitching.
//!
//! This crate is the decision-making heart of ContLab:
//! - Domain types (bars, month codes, contracts)
//! - Expiry resolver (third-Friday expiry, decade disambiguation)
//! - Rollover detector (volume crossover with consecutive-day confirmation,
//!   fixed-offset fallback)
//! - Series stitcher (non-overlapping segments, globally time-ordered output)
//! - Diagnostic event stream instead of printing
//!
//! Everything here is pure and single-threaded; file handling lives in
//! `contlab-runner`.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod expiry;
pub mod pipeline;
pub mod rollover;
pub mod stitch;

pub use config::{DecadePolicy, RolloverConfig};
pub use domain::{Bar, Contract, MonthCode};
pub use error::RollError;
pub use events::{NullObserver, RecordingObserver, RollEvent, RollObserver, SkipReason};
pub use expiry::{resolve_contracts, third_friday, ExpiryResolver};
pub use pipeline::{build_continuous_series, ContinuousSeries};
pub use rollover::{DailyVolumes, RolloverDetector, RolloverEvent, RolloverMethod};
pub use stitch::{build_segments, stitch, ActiveSegment, SegmentStats};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types can cross thread boundaries, so several
    /// assets can be stitched concurrently with independent configs.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<Contract>();
        require_sync::<Contract>();
        require_send::<RolloverConfig>();
        require_sync::<RolloverConfig>();
        require_send::<RolloverEvent>();
        require_sync::<RolloverEvent>();
        require_send::<ActiveSegment>();
        require_sync::<ActiveSegment>();
        require_send::<ContinuousSeries>();
        require_sync::<ContinuousSeries>();
        require_send::<DailyVolumes>();
        require_sync::<DailyVolumes>();
        require_send::<RecordingObserver>();
        require_sync::<RecordingObserver>();
        require_send::<RollError>();
        require_sync::<RollError>();
    }

    #[test]
    fn pipeline_reports_through_observer() {
        use chrono::{NaiveDate, TimeZone, Utc};

        let ts_exchange = NaiveDate::from_ymd_opt(2020, 12, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let bars = vec![Bar {
            symbol: "ESZ0".into(),
            ts_exchange,
            ts_utc: Utc.with_ymd_and_hms(2020, 12, 1, 14, 30, 0).unwrap(),
            open: 3650.0,
            high: 3655.0,
            low: 3645.0,
            close: 3652.0,
            volume: 1_000,
        }];

        let cfg = RolloverConfig::for_asset("ES");
        let obs = RecordingObserver::new();
        let series = build_continuous_series(&bars, &cfg, &obs).unwrap();
        assert_eq!(series.bars, bars);
        assert!(obs
            .events()
            .iter()
            .any(|e| matches!(e, RollEvent::ContractResolved { .. })));

        let silent = build_continuous_series(&bars, &cfg, &NullObserver).unwrap();
        assert_eq!(silent.bars, series.bars);
    }
}
