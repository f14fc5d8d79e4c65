//! Time-of-use tariff schedule: maps a timestamp to a rate and a tier.

use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Time-of-use price bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TariffTier {
    OffPeak,
    Mid,
    Peak,
}

impl fmt::Display for TariffTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OffPeak => "off_peak",
            Self::Mid => "mid",
            Self::Peak => "peak",
        };
        f.write_str(s)
    }
}

/// One row of the tariff table: hours in `[start_hour, end_hour)` are billed at `rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TariffBand {
    /// First hour of the band (inclusive, 0-23).
    pub start_hour: u32,
    /// End hour of the band (exclusive, 1-24).
    pub end_hour: u32,
    /// Price per kWh.
    pub rate: f64,
    /// Tier reported for timestamps in this band.
    pub tier: TariffTier,
}

impl TariffBand {
    /// Returns `true` if `hour` falls inside the band.
    pub fn contains(&self, hour: u32) -> bool {
        (self.start_hour..self.end_hour).contains(&hour)
    }
}

/// Configurable hour-range tariff table.
///
/// Bands are matched in order and the first match wins; hours covered by no
/// band fall back to `default_rate` / `default_tier`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pv_battery_sim::tariff::{TariffSchedule, TariffTier};
///
/// let schedule = TariffSchedule::reference();
/// let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
///     .and_then(|d| d.and_hms_opt(17, 30, 0))
///     .unwrap();
/// assert_eq!(schedule.rate_for(ts), (0.25, TariffTier::Peak));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffSchedule {
    /// Ordered band table.
    pub bands: Vec<TariffBand>,
    /// Rate for hours not covered by any band.
    pub default_rate: f64,
    /// Tier for hours not covered by any band.
    pub default_tier: TariffTier,
}

impl Default for TariffSchedule {
    fn default() -> Self {
        Self::reference()
    }
}

impl TariffSchedule {
    /// Reference three-tier schedule: peak 17-19 at 0.25, mid 08-17 and 19-23
    /// at 0.15, off-peak otherwise at 0.08.
    pub fn reference() -> Self {
        Self {
            bands: vec![
                TariffBand {
                    start_hour: 17,
                    end_hour: 19,
                    rate: 0.25,
                    tier: TariffTier::Peak,
                },
                TariffBand {
                    start_hour: 8,
                    end_hour: 17,
                    rate: 0.15,
                    tier: TariffTier::Mid,
                },
                TariffBand {
                    start_hour: 19,
                    end_hour: 23,
                    rate: 0.15,
                    tier: TariffTier::Mid,
                },
            ],
            default_rate: 0.08,
            default_tier: TariffTier::OffPeak,
        }
    }

    /// A single-rate schedule with no bands.
    pub fn flat(rate: f64, tier: TariffTier) -> Self {
        Self {
            bands: Vec::new(),
            default_rate: rate,
            default_tier: tier,
        }
    }

    /// Rate and tier in effect at `timestamp`.
    pub fn rate_for(&self, timestamp: NaiveDateTime) -> (f64, TariffTier) {
        let hour = timestamp.hour();
        self.bands
            .iter()
            .find(|band| band.contains(hour))
            .map_or((self.default_rate, self.default_tier), |band| {
                (band.rate, band.tier)
            })
    }

    /// Tier in effect at `timestamp`.
    pub fn tier_for(&self, timestamp: NaiveDateTime) -> TariffTier {
        self.rate_for(timestamp).1
    }

    /// Validates band ranges and rates; returns every problem found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if !self.default_rate.is_finite() || self.default_rate < 0.0 {
            errors.push(ConfigError::new(
                "tariff.default_rate",
                "must be a finite value >= 0",
            ));
        }

        for (i, band) in self.bands.iter().enumerate() {
            if band.start_hour >= band.end_hour || band.end_hour > 24 {
                errors.push(ConfigError::new(
                    format!("tariff.bands[{i}]"),
                    format!(
                        "hour range [{}, {}) must satisfy start < end <= 24",
                        band.start_hour, band.end_hour
                    ),
                ));
            }
            if !band.rate.is_finite() || band.rate < 0.0 {
                errors.push(ConfigError::new(
                    format!("tariff.bands[{i}].rate"),
                    "must be a finite value >= 0",
                ));
            }
        }

        errors
    }
}
