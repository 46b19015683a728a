//! Diagnostic event stream emitted by the rollover engine.
//!
//! The engine never prints. Every decision it makes (which symbols resolved,
//! the per-day volume comparison, crossover or fallback, segment boundaries)
//! is reported as a [`RollEvent`] to a caller-supplied [`RollObserver`].
//! Callers decide whether to log, record, or discard them.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Mutex;

/// Why a symbol was left out of the contract list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Symbol does not start with the configured asset root.
    WrongRoot,
    /// Root matched but the remainder is not `<month code><year digit>`.
    Unparseable,
    /// Month/year produced no valid calendar date.
    InvalidDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RollEvent {
    ContractResolved {
        symbol: String,
        year: i32,
        month: u32,
        expiry: NaiveDate,
    },
    SymbolSkipped {
        symbol: String,
        reason: SkipReason,
    },
    WindowOpened {
        from: String,
        to: String,
        window_start: NaiveDate,
        window_end: NaiveDate,
    },
    VolumeCompared {
        date: NaiveDate,
        from: String,
        to: String,
        from_volume: u64,
        to_volume: u64,
        streak: u32,
    },
    CrossoverTriggered {
        from: String,
        to: String,
        date: NaiveDate,
        streak_start: NaiveDate,
    },
    FallbackApplied {
        from: String,
        to: String,
        date: NaiveDate,
        common_days: usize,
    },
    RolloverClamped {
        from: String,
        proposed: NaiveDate,
        clamped_to: NaiveDate,
    },
    SegmentSelected {
        symbol: String,
        start: NaiveDate,
        end: Option<NaiveDate>,
        bar_count: usize,
        first_date: NaiveDate,
        last_date: NaiveDate,
    },
    EmptySegment {
        symbol: String,
        start: NaiveDate,
        end: Option<NaiveDate>,
    },
}

/// Receiver for engine diagnostics.
pub trait RollObserver: Send + Sync {
    fn on_event(&self, event: &RollEvent);
}

/// Observer that discards everything.
pub struct NullObserver;

impl RollObserver for NullObserver {
    fn on_event(&self, _event: &RollEvent) {}
}

/// Observer that keeps every event in memory, in emission order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RollEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events received so far.
    pub fn events(&self) -> Vec<RollEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RollObserver for RecordingObserver {
    fn on_event(&self, event: &RollEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
