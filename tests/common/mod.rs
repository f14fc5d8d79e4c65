//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use pv_battery_sim::devices::{BatterySpec, ProfileLoad, SolarPv};
use pv_battery_sim::series::{EnergySeries, synthetic};
use pv_battery_sim::tariff::TariffSchedule;

/// Midnight of 2025-01-01 plus `hour`.
pub fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap()
}

/// One hour-long interval at `hour` with the given energies (kWh) and the reference tariff.
pub fn single_interval(hour: u32, load_kwh: f64, solar_kwh: f64) -> EnergySeries {
    EnergySeries::from_power(
        &TariffSchedule::reference(),
        at(hour),
        1.0,
        &[load_kwh],
        &[solar_kwh],
    )
    .unwrap()
}

/// 1000 kWh battery whose power limits never bind in a one-hour interval.
pub fn unconstrained_battery(round_trip_efficiency: f64) -> BatterySpec {
    BatterySpec::new(1000.0, 1000.0, 1000.0, round_trip_efficiency)
}

/// Default battery for multi-day runs (400 kWh, 150 kW, 90% round trip).
pub fn default_battery() -> BatterySpec {
    BatterySpec::new(400.0, 150.0, 150.0, 0.9)
}

/// One week of half-hourly profile load and 300 kWp solar from seed 42.
pub fn week_series() -> EnergySeries {
    let mut load = ProfileLoad::new(1_000_000.0, 0.7, 0.1, 0.05, 42);
    let mut pv = SolarPv::new(300.0);
    synthetic::generate(
        &TariffSchedule::reference(),
        at(0),
        48,
        7,
        &mut load,
        &mut pv,
    )
    .unwrap()
}
