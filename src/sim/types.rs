//! Core simulation types: carried state and per-interval results.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::tariff::TariffTier;

/// State carried from one interval to the next.
///
/// The engine is a fold over the series: every `step` takes the previous
/// state by value and returns the next one.
///
/// # Examples
///
/// ```
/// use pv_battery_sim::sim::types::SimulationState;
///
/// let state = SimulationState::new(50.0);
/// assert_eq!(state.soc_kwh, 50.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationState {
    /// Battery state of charge (kWh).
    pub soc_kwh: f64,
}

impl SimulationState {
    pub fn new(soc_kwh: f64) -> Self {
        Self { soc_kwh }
    }
}

/// Complete record of one dispatched interval. All energies are in kWh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalResult {
    /// Interval start.
    pub timestamp: NaiveDateTime,
    /// Tariff tier of the interval.
    pub tier: TariffTier,
    /// Import price per kWh.
    pub tariff_rate: f64,
    /// Site consumption.
    pub load_kwh: f64,
    /// Solar generation.
    pub solar_kwh: f64,
    /// State of charge after the interval.
    pub soc_kwh: f64,
    /// Total energy taken in by the battery (solar plus grid), before losses.
    pub charge_kwh: f64,
    /// Solar energy routed into the battery, before losses.
    pub solar_charge_kwh: f64,
    /// Grid energy bought to charge the battery, before losses.
    pub grid_charge_kwh: f64,
    /// Energy drawn from the state of charge.
    pub discharge_kwh: f64,
    /// Discharge energy that reached the load after losses.
    pub discharge_delivered_kwh: f64,
    /// Energy bought from the grid (load and grid charging).
    pub import_kwh: f64,
    /// Surplus solar sent to the grid, uncompensated.
    pub export_kwh: f64,
    /// `import_kwh * tariff_rate`.
    pub cost: f64,
}

impl fmt::Display for IntervalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:>8}] | load={:>9.2}  solar={:>9.2} | chg={:>8.2}  dis={:>8.2} \
             (SoC={:>9.2} kWh) | import={:>9.2}  export={:>9.2} | cost={:.2}",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.tier,
            self.load_kwh,
            self.solar_kwh,
            self.charge_kwh,
            self.discharge_kwh,
            self.soc_kwh,
            self.import_kwh,
            self.export_kwh,
            self.cost,
        )
    }
}
