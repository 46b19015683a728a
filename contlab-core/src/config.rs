//! Rollover configuration passed explicitly into every component.

use crate::error::RollError;
use serde::{Deserialize, Serialize};

/// How the decade of a single-digit contract year is reconstructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecadePolicy {
    #[default]
    /// Smallest year ending in the digit whose expiry is on or after the
    /// symbol's first observed bar.
    FromData,
    /// `decade_start + digit`, regardless of the data.
    Fixed { decade_start: i32 },
}

/// Parameters for expiry resolution, rollover detection and stitching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverConfig {
    /// Symbol prefix of the asset being stitched (e.g. "ES", "NQ", "MES").
    pub asset_root: String,

    /// Length of the analysis window that ends the day before expiry.
    #[serde(default = "default_window_days")]
    pub rollover_window_days: u32,

    /// Consecutive days of higher next-contract volume needed to roll.
    #[serde(default = "default_consecutive_days")]
    pub consecutive_days_threshold: u32,

    /// Days before expiry used when no crossover is confirmed.
    #[serde(default = "default_fallback_days")]
    pub fallback_offset_days: u32,

    #[serde(default)]
    pub decade: DecadePolicy,
}

/// Upper bound for the window and fallback offsets (about ten years).
pub const MAX_OFFSET_DAYS: u32 = 3660;

/// Accepted range for [`DecadePolicy::Fixed`] `decade_start`.
pub const DECADE_START_RANGE: std::ops::RangeInclusive<i32> = 1900..=2990;

fn default_window_days() -> u32 {
    14
}

fn default_consecutive_days() -> u32 {
    2
}

fn default_fallback_days() -> u32 {
    3
}

impl RolloverConfig {
    /// Default parameters for the given asset root.
    pub fn for_asset(asset_root: impl Into<String>) -> Self {
        Self {
            asset_root: asset_root.into(),
            rollover_window_days: default_window_days(),
            consecutive_days_threshold: default_consecutive_days(),
            fallback_offset_days: default_fallback_days(),
            decade: DecadePolicy::FromData,
        }
    }

    pub fn validate(&self) -> Result<(), RollError> {
        if self.asset_root.trim().is_empty() {
            return Err(RollError::InvalidConfig("asset_root must not be empty".into()));
        }
        if self.asset_root.contains('-') {
            return Err(RollError::InvalidConfig(format!(
                "asset_root '{}' must not contain '-'",
                self.asset_root
            )));
        }
        if self.rollover_window_days == 0 {
            return Err(RollError::InvalidConfig(
                "rollover_window_days must be at least 1".into(),
            ));
        }
        if self.rollover_window_days > MAX_OFFSET_DAYS {
            return Err(RollError::InvalidConfig(format!(
                "rollover_window_days must be at most {MAX_OFFSET_DAYS}, got {}",
                self.rollover_window_days
            )));
        }
        if self.consecutive_days_threshold == 0 {
            return Err(RollError::InvalidConfig(
                "consecutive_days_threshold must be at least 1".into(),
            ));
        }
        if self.fallback_offset_days > MAX_OFFSET_DAYS {
            return Err(RollError::InvalidConfig(format!(
                "fallback_offset_days must be at most {MAX_OFFSET_DAYS}, got {}",
                self.fallback_offset_days
            )));
        }
        if let DecadePolicy::Fixed { decade_start } = self.decade {
            if !DECADE_START_RANGE.contains(&decade_start) {
                return Err(RollError::InvalidConfig(format!(
                    "decade_start must be within {}..={}, got {decade_start}",
                    DECADE_START_RANGE.start(),
                    DECADE_START_RANGE.end()
                )));
            }
        }
        Ok(())
    }
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self::for_asset("ES")
    }
}
