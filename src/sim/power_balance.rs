//! Site energy balance for one dispatched interval.

use super::types::IntervalResult;

/// Energy sources minus sinks for one interval (kWh).
///
/// Sources are solar generation, battery energy delivered to the load, and
/// grid import. Sinks are load, export, and energy taken in by the battery
/// (solar charge plus grid charge, measured before losses). Conversion
/// losses are therefore accounted for inside the battery, not at the site
/// boundary, and a correctly dispatched interval returns zero.
///
/// # Arguments
///
/// * `r` - A dispatched interval
///
/// # Returns
///
/// `solar + delivered + import - load - export - charge`
pub fn energy_balance_residual(r: &IntervalResult) -> f64 {
    let sources = r.solar_kwh + r.discharge_delivered_kwh + r.import_kwh;
    let sinks = r.load_kwh + r.export_kwh + r.solar_charge_kwh + r.grid_charge_kwh;
    sources - sinks
}

/// Tolerance for [`energy_balance_residual`], scaled to the interval's energy magnitude.
pub fn balance_tolerance(r: &IntervalResult) -> f64 {
    1e-9 * (1.0 + r.load_kwh + r.solar_kwh + r.import_kwh)
}
