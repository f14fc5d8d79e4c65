use chrono::NaiveDateTime;

use super::{EnergySeries, step_delta};
use crate::devices::{Device, DeviceContext};
use crate::error::{Result, SimError};
use crate::tariff::TariffSchedule;

/// Samples `load` and `solar` once per interval and builds a tariffed series.
///
/// Devices are sampled strictly in timestep order, so seeded devices produce
/// the same series for the same seed.
///
/// # Arguments
///
/// * `schedule` - Tariff table used for rate and tier
/// * `start` - Timestamp of the first interval
/// * `steps_per_day` - Intervals per day (48 for half-hourly)
/// * `days` - Number of days to generate
/// * `load` - Site load device
/// * `solar` - Solar generation device
///
/// # Errors
///
/// Returns [`SimError::Configuration`] if `steps_per_day` or `days` is zero or
/// a device produces an invalid value.
pub fn generate(
    schedule: &TariffSchedule,
    start: NaiveDateTime,
    steps_per_day: usize,
    days: usize,
    load: &mut dyn Device,
    solar: &mut dyn Device,
) -> Result<EnergySeries> {
    if steps_per_day == 0 {
        return Err(SimError::configuration("simulation.steps_per_day", "must be > 0"));
    }
    if days == 0 {
        return Err(SimError::configuration("simulation.days", "must be > 0"));
    }

    let dt_hours = 24.0 / steps_per_day as f64;
    let step = step_delta(dt_hours);
    let total = steps_per_day * days;
    let mut load_kw = Vec::with_capacity(total);
    let mut solar_kw = Vec::with_capacity(total);

    for t in 0..total {
        let context = DeviceContext::new(t, start + step * t as i32, steps_per_day);
        load_kw.push(load.power_kw(&context));
        solar_kw.push(solar.power_kw(&context));
    }

    EnergySeries::from_power(schedule, start, dt_hours, &load_kw, &solar_kw)
}
