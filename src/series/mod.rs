//! Energy series: ordered fixed-duration intervals of load, solar, and tariff.

use chrono::{NaiveDateTime, TimeDelta, Timelike};

use crate::error::{Result, SimError};
use crate::tariff::{TariffSchedule, TariffTier};

/// CSV ingestion of metered or exported series.
pub mod loader;
/// Synthetic series generation from device models.
pub mod synthetic;

/// Tolerance used when comparing interval durations and tariff rates.
const DURATION_TOLERANCE: f64 = 1e-9;

/// One fixed-duration step of site data. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Interval start.
    pub timestamp: NaiveDateTime,
    /// Interval length in hours.
    pub duration_hours: f64,
    /// Mean site load over the interval (kW, >= 0).
    pub load_kw: f64,
    /// Mean solar generation over the interval (kW, >= 0).
    pub solar_kw: f64,
    /// Import price per kWh (>= 0).
    pub tariff_rate: f64,
    /// Tier derived from the tariff schedule.
    pub tier: TariffTier,
}

impl Interval {
    /// Load energy over the interval (kWh).
    pub fn load_kwh(&self) -> f64 {
        self.load_kw * self.duration_hours
    }

    /// Solar energy over the interval (kWh).
    pub fn solar_kwh(&self) -> f64 {
        self.solar_kw * self.duration_hours
    }

    /// Hour of day (0-23) at the interval start.
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }
}

/// A validated, chronologically ordered sequence of intervals with uniform spacing.
///
/// Construction rejects any interval whose duration differs from the series
/// `dt_hours`, non-increasing or unevenly spaced timestamps, and negative or
/// non-finite power and rate values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergySeries {
    dt_hours: f64,
    intervals: Vec<Interval>,
}

impl EnergySeries {
    /// Validates and wraps `intervals`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] describing the first offending interval.
    pub fn new(dt_hours: f64, intervals: Vec<Interval>) -> Result<Self> {
        if !dt_hours.is_finite() || dt_hours <= 0.0 {
            return Err(SimError::configuration("dt_hours", "must be a finite value > 0"));
        }
        let step = step_delta(dt_hours);

        for (i, iv) in intervals.iter().enumerate() {
            if (iv.duration_hours - dt_hours).abs() > DURATION_TOLERANCE {
                return Err(SimError::configuration(
                    format!("intervals[{i}].duration_hours"),
                    format!("is {} but the series uses dt_hours = {dt_hours}", iv.duration_hours),
                ));
            }
            for (name, value) in [
                ("load_kw", iv.load_kw),
                ("solar_kw", iv.solar_kw),
                ("tariff_rate", iv.tariff_rate),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(SimError::configuration(
                        format!("intervals[{i}].{name}"),
                        format!("must be a finite value >= 0, got {value}"),
                    ));
                }
            }
            if i > 0 && iv.timestamp - intervals[i - 1].timestamp != step {
                return Err(SimError::configuration(
                    format!("intervals[{i}].timestamp"),
                    format!(
                        "{} does not follow {} by {dt_hours} h",
                        iv.timestamp,
                        intervals[i - 1].timestamp
                    ),
                ));
            }
        }

        Ok(Self {
            dt_hours,
            intervals,
        })
    }

    /// Builds a series from per-step power vectors, deriving rate and tier from `schedule`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] if the vectors differ in length or
    /// any value is invalid.
    pub fn from_power(
        schedule: &TariffSchedule,
        start: NaiveDateTime,
        dt_hours: f64,
        load_kw: &[f64],
        solar_kw: &[f64],
    ) -> Result<Self> {
        if load_kw.len() != solar_kw.len() {
            return Err(SimError::configuration(
                "solar_kw",
                format!(
                    "length {} does not match load_kw length {}",
                    solar_kw.len(),
                    load_kw.len()
                ),
            ));
        }
        let step = step_delta(dt_hours.max(0.0));
        let intervals = load_kw
            .iter()
            .zip(solar_kw)
            .enumerate()
            .map(|(i, (&load, &solar))| {
                let timestamp = start + step * i as i32;
                let (tariff_rate, tier) = schedule.rate_for(timestamp);
                Interval {
                    timestamp,
                    duration_hours: dt_hours,
                    load_kw: load,
                    solar_kw: solar,
                    tariff_rate,
                    tier,
                }
            })
            .collect();
        Self::new(dt_hours, intervals)
    }

    /// Sums several sites' load and solar interval-by-interval.
    ///
    /// All sites must share timestamps, `dt_hours`, and tariff rates.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] if `sites` is empty or misaligned.
    pub fn aggregate(sites: &[EnergySeries]) -> Result<Self> {
        let Some((first, rest)) = sites.split_first() else {
            return Err(SimError::configuration("sites", "at least one site is required"));
        };

        let mut intervals = first.intervals.clone();
        for (s, site) in rest.iter().enumerate() {
            let field = format!("sites[{}]", s + 1);
            if (site.dt_hours - first.dt_hours).abs() > DURATION_TOLERANCE {
                return Err(SimError::configuration(field, "dt_hours differs from sites[0]"));
            }
            if site.len() != first.len() {
                return Err(SimError::configuration(
                    field,
                    format!("has {} intervals, sites[0] has {}", site.len(), first.len()),
                ));
            }
            for (acc, iv) in intervals.iter_mut().zip(&site.intervals) {
                if acc.timestamp != iv.timestamp {
                    return Err(SimError::configuration(
                        field,
                        format!("timestamp {} does not align with {}", iv.timestamp, acc.timestamp),
                    ));
                }
                if (acc.tariff_rate - iv.tariff_rate).abs() > DURATION_TOLERANCE {
                    return Err(SimError::configuration(
                        field,
                        format!("tariff rate differs at {}", iv.timestamp),
                    ));
                }
                acc.load_kw += iv.load_kw;
                acc.solar_kw += iv.solar_kw;
            }
        }

        Self::new(first.dt_hours, intervals)
    }

    /// Copy of the series with solar generation removed (the no-asset baseline input).
    pub fn without_solar(&self) -> Self {
        Self {
            dt_hours: self.dt_hours,
            intervals: self
                .intervals
                .iter()
                .map(|iv| Interval {
                    solar_kw: 0.0,
                    ..*iv
                })
                .collect(),
        }
    }

    /// Interval length in hours.
    pub fn dt_hours(&self) -> f64 {
        self.dt_hours
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.intervals.iter()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Total load energy (kWh).
    pub fn total_load_kwh(&self) -> f64 {
        self.intervals.iter().map(Interval::load_kwh).sum()
    }

    /// Total solar energy (kWh).
    pub fn total_solar_kwh(&self) -> f64 {
        self.intervals.iter().map(Interval::solar_kwh).sum()
    }
}

impl<'a> IntoIterator for &'a EnergySeries {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

/// Interval spacing as a chrono delta, rounded to whole seconds.
pub(crate) fn step_delta(dt_hours: f64) -> TimeDelta {
    TimeDelta::seconds((dt_hours * 3600.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    fn series(load: &[f64], solar: &[f64]) -> EnergySeries {
        EnergySeries::from_power(&TariffSchedule::reference(), start(), 0.5, load, solar).unwrap()
    }

    #[test]
    fn from_power_derives_tariff_per_interval() {
        let load = vec![1.0; 48];
        let s = series(&load, &load);
        assert_eq!(s.len(), 48);
        // 17:00 is the 34th half hour
        assert_eq!(s.intervals()[34].tier, TariffTier::Peak);
        assert_eq!(s.intervals()[34].tariff_rate, 0.25);
        assert_eq!(s.intervals()[0].tier, TariffTier::OffPeak);
        assert_eq!(s.intervals()[47].hour(), 23);
    }

    #[test]
    fn interval_energy_uses_duration() {
        let s = series(&[10.0], &[4.0]);
        let iv = s.intervals()[0];
        assert_eq!(iv.load_kwh(), 5.0);
        assert_eq!(iv.solar_kwh(), 2.0);
    }

    #[test]
    fn mismatched_duration_rejected() {
        let s = series(&[1.0, 1.0], &[0.0, 0.0]);
        let mut intervals = s.intervals().to_vec();
        intervals[1].duration_hours = 1.0;
        let err = EnergySeries::new(0.5, intervals).unwrap_err();
        assert!(err.to_string().contains("intervals[1].duration_hours"));
    }

    #[test]
    fn negative_load_rejected() {
        let err = EnergySeries::from_power(
            &TariffSchedule::reference(),
            start(),
            0.5,
            &[1.0, -1.0],
            &[0.0, 0.0],
        )
        .unwrap_err();
        assert!(err.to_string().contains("intervals[1].load_kw"));
    }

    #[test]
    fn uneven_spacing_rejected() {
        let s = series(&[1.0, 1.0], &[0.0, 0.0]);
        let mut intervals = s.intervals().to_vec();
        intervals[1].timestamp += TimeDelta::minutes(1);
        assert!(EnergySeries::new(0.5, intervals).is_err());
    }

    #[test]
    fn length_mismatch_rejected() {
        let err = EnergySeries::from_power(
            &TariffSchedule::reference(),
            start(),
            0.5,
            &[1.0, 1.0],
            &[0.0],
        );
        assert!(err.is_err());
    }

    #[test]
    fn zero_dt_rejected() {
        assert!(EnergySeries::new(0.0, Vec::new()).is_err());
    }

    #[test]
    fn aggregate_sums_load_and_solar() {
        let a = series(&[1.0, 2.0], &[0.5, 0.0]);
        let b = series(&[3.0, 4.0], &[1.5, 1.0]);
        let agg = EnergySeries::aggregate(&[a, b]).unwrap();
        assert_eq!(agg.intervals()[0].load_kw, 4.0);
        assert_eq!(agg.intervals()[1].load_kw, 6.0);
        assert_eq!(agg.intervals()[0].solar_kw, 2.0);
        assert_eq!(agg.intervals()[1].solar_kw, 1.0);
    }

    #[test]
    fn aggregate_rejects_misaligned_sites() {
        let a = series(&[1.0, 2.0], &[0.0, 0.0]);
        let b = series(&[1.0], &[0.0]);
        assert!(EnergySeries::aggregate(&[a, b]).is_err());
        assert!(EnergySeries::aggregate(&[]).is_err());
    }

    #[test]
    fn without_solar_keeps_load_and_tariff() {
        let s = series(&[2.0, 2.0], &[5.0, 5.0]);
        let dark = s.without_solar();
        assert_eq!(dark.total_solar_kwh(), 0.0);
        assert_eq!(dark.total_load_kwh(), s.total_load_kwh());
        assert_eq!(dark.intervals()[1].tariff_rate, s.intervals()[1].tariff_rate);
    }
}
