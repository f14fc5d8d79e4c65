//! Dispatch engine: resolves load, solar, battery, and grid flows interval by interval.

use tracing::trace;

use crate::devices::BatterySpec;
use crate::error::{Result, SimError};
use crate::series::{EnergySeries, Interval};

use super::policy::{DispatchPolicy, EfficiencyModel, SolarPriority};
use super::power_balance::{balance_tolerance, energy_balance_residual};
use super::types::{IntervalResult, SimulationState};

/// Relative tolerance on the state-of-charge bounds, scaled by capacity.
const SOC_TOLERANCE: f64 = 1e-9;

/// How one interval's solar energy is divided between battery, load, and export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarSplit {
    /// Solar energy routed into the battery, before charging losses.
    pub charge_kwh: f64,
    /// Solar left over after charging and serving the load.
    pub export_kwh: f64,
    /// Load not covered by solar.
    pub unmet_kwh: f64,
}

impl SolarSplit {
    /// Routes `solar_kwh` between the battery (up to `charge_cap_kwh`) and the load.
    ///
    /// # Arguments
    ///
    /// * `priority` - Whether the battery or the load has first claim on solar
    /// * `solar_kwh` - Solar energy for the interval
    /// * `load_kwh` - Load energy for the interval
    /// * `charge_cap_kwh` - Energy the battery can accept this interval
    pub fn route(
        priority: SolarPriority,
        solar_kwh: f64,
        load_kwh: f64,
        charge_cap_kwh: f64,
    ) -> Self {
        let available = match priority {
            SolarPriority::BatteryFirst => solar_kwh,
            SolarPriority::LoadFirst => solar_kwh - solar_kwh.min(load_kwh),
        };
        let charge_kwh = available.min(charge_cap_kwh).max(0.0);
        let leftover = solar_kwh - charge_kwh;

        if leftover >= load_kwh {
            Self {
                charge_kwh,
                export_kwh: leftover - load_kwh,
                unmet_kwh: 0.0,
            }
        } else {
            Self {
                charge_kwh,
                export_kwh: 0.0,
                unmet_kwh: load_kwh - leftover,
            }
        }
    }
}

/// Battery dispatch engine for one scenario run.
///
/// Generic over `P: DispatchPolicy` for static dispatch. The engine holds only
/// read-only parameters; the state of charge is threaded through [`Engine::step`]
/// so a run is a left fold over the series and the input is never mutated.
#[derive(Debug, Clone)]
pub struct Engine<P: DispatchPolicy> {
    spec: BatterySpec,
    policy: P,
    efficiency: EfficiencyModel,
    dt_hours: f64,
}

impl<P: DispatchPolicy> Engine<P> {
    /// Creates an engine after validating the battery spec and timestep.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] for the first invalid spec field,
    /// an efficiency factor outside (0, 1], or a non-positive `dt_hours`.
    pub fn new(spec: BatterySpec, policy: P, dt_hours: f64) -> Result<Self> {
        if let Some(err) = spec.validate().into_iter().next() {
            return Err(err.into());
        }
        if !dt_hours.is_finite() || dt_hours <= 0.0 {
            return Err(SimError::configuration("dt_hours", "must be a finite value > 0"));
        }
        let efficiency = policy.efficiency(&spec);
        if let Some(err) = efficiency.validate().into_iter().next() {
            return Err(err.into());
        }
        Ok(Self {
            spec,
            policy,
            efficiency,
            dt_hours,
        })
    }

    /// Validates `soc_kwh` against the spec's window and wraps it as a state.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] if `soc_kwh` lies outside `[min_soc, max_soc]`.
    pub fn initial_state(&self, soc_kwh: f64) -> Result<SimulationState> {
        if !self.spec.contains_soc(soc_kwh) {
            return Err(SimError::configuration(
                "initial_soc_kwh",
                format!(
                    "{soc_kwh} is outside [{}, {}]",
                    self.spec.min_soc_kwh, self.spec.max_soc_kwh
                ),
            ));
        }
        Ok(SimulationState::new(soc_kwh))
    }

    /// Dispatches one interval and returns the next state with the interval's record.
    ///
    /// The engine never charges and discharges in the same interval: if the
    /// policy authorises discharge while solar is charging, solar is re-routed
    /// to the load first for that interval.
    ///
    /// # Panics
    ///
    /// Panics if the resulting state of charge leaves `[min_soc, max_soc]` by
    /// more than floating-point tolerance, which indicates a dispatch defect.
    pub fn step(
        &self,
        state: SimulationState,
        interval: &Interval,
    ) -> (SimulationState, IntervalResult) {
        let spec = &self.spec;
        let eff = self.efficiency;
        let dt = interval.duration_hours;
        let load_kwh = interval.load_kwh();
        let solar_kwh = interval.solar_kwh();
        let stores = self.policy.stores_energy();
        let mut soc = state.soc_kwh;

        // 1. Solar routing
        let charge_cap = if stores {
            spec.max_charge_kwh(dt).min(spec.max_soc_kwh - soc).max(0.0)
        } else {
            0.0
        };
        let mut split = SolarSplit::route(self.policy.solar_priority(), solar_kwh, load_kwh, charge_cap);

        let discharge_authorised = stores
            && split.unmet_kwh > 0.0
            && self
                .policy
                .may_discharge(interval, soc + split.charge_kwh * eff.charge, spec);
        if discharge_authorised && split.charge_kwh > 0.0 {
            split = SolarSplit::route(SolarPriority::LoadFirst, solar_kwh, load_kwh, charge_cap);
        }

        let solar_charge_kwh = split.charge_kwh;
        soc += solar_charge_kwh * eff.charge;

        // 2. Load service: leftover solar, then battery, then grid
        let mut discharge_kwh = 0.0;
        let mut delivered_kwh = 0.0;
        let mut import_kwh = 0.0;
        if split.unmet_kwh > 0.0 {
            let unmet = split.unmet_kwh;
            if discharge_authorised && soc > spec.min_soc_kwh {
                let capacity = (soc - spec.min_soc_kwh).min(spec.max_discharge_kwh(dt));
                let deliverable = capacity * eff.discharge;
                if deliverable >= unmet {
                    discharge_kwh = unmet / eff.discharge;
                    delivered_kwh = unmet;
                } else {
                    discharge_kwh = capacity;
                    delivered_kwh = deliverable;
                    import_kwh = unmet - deliverable;
                }
                soc -= discharge_kwh;
            } else {
                import_kwh = unmet;
            }
        }

        // 3. Grid charging, limited by the remaining room and the charge power
        let mut grid_charge_kwh = 0.0;
        if stores
            && discharge_kwh == 0.0
            && soc < spec.max_soc_kwh
            && self.policy.may_grid_charge(interval, soc, spec)
        {
            grid_charge_kwh = (spec.max_soc_kwh - soc).min(spec.max_charge_kwh(dt));
            soc += grid_charge_kwh * eff.grid_charge;
            import_kwh += grid_charge_kwh;
        }

        // 4. Bounds
        let tolerance = SOC_TOLERANCE * spec.capacity_kwh.max(1.0);
        assert!(
            soc >= spec.min_soc_kwh - tolerance && soc <= spec.max_soc_kwh + tolerance,
            "state of charge {soc} left [{}, {}] at {}",
            spec.min_soc_kwh,
            spec.max_soc_kwh,
            interval.timestamp
        );
        let soc = soc.clamp(spec.min_soc_kwh, spec.max_soc_kwh);

        let result = IntervalResult {
            timestamp: interval.timestamp,
            tier: interval.tier,
            tariff_rate: interval.tariff_rate,
            load_kwh,
            solar_kwh,
            soc_kwh: soc,
            charge_kwh: solar_charge_kwh + grid_charge_kwh,
            solar_charge_kwh,
            grid_charge_kwh,
            discharge_kwh,
            discharge_delivered_kwh: delivered_kwh,
            import_kwh,
            export_kwh: split.export_kwh,
            cost: import_kwh * interval.tariff_rate,
        };

        debug_assert!(
            [
                result.charge_kwh,
                result.discharge_kwh,
                result.import_kwh,
                result.export_kwh
            ]
            .iter()
            .all(|v| *v >= 0.0),
            "negative energy flow at {}",
            interval.timestamp
        );
        debug_assert!(
            result.charge_kwh == 0.0 || result.discharge_kwh == 0.0,
            "charged and discharged at {}",
            interval.timestamp
        );
        debug_assert!(
            energy_balance_residual(&result).abs() <= balance_tolerance(&result),
            "energy balance residual {} at {}",
            energy_balance_residual(&result),
            interval.timestamp
        );

        trace!(
            timestamp = %interval.timestamp,
            soc_kwh = soc,
            charge_kwh = result.charge_kwh,
            discharge_kwh,
            import_kwh,
            export_kwh = result.export_kwh,
            "interval dispatched"
        );

        (SimulationState::new(soc), result)
    }

    /// Runs every interval of `series` in order, starting from `initial_soc_kwh`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] if the series timestep differs from
    /// the engine's or the initial state of charge is out of bounds.
    pub fn run(&self, series: &EnergySeries, initial_soc_kwh: f64) -> Result<Vec<IntervalResult>> {
        if (series.dt_hours() - self.dt_hours).abs() > 1e-9 {
            return Err(SimError::configuration(
                "dt_hours",
                format!(
                    "series uses {} h intervals but the run expects {} h",
                    series.dt_hours(),
                    self.dt_hours
                ),
            ));
        }

        let mut state = self.initial_state(initial_soc_kwh)?;
        let mut results = Vec::with_capacity(series.len());
        for interval in series {
            let (next, result) = self.step(state, interval);
            state = next;
            results.push(result);
        }
        Ok(results)
    }

    /// Returns the battery spec (for KPI capacity queries).
    pub fn spec(&self) -> &BatterySpec {
        &self.spec
    }

    /// Returns the dispatch policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Efficiency factors resolved from the policy at construction.
    pub fn efficiency(&self) -> EfficiencyModel {
        self.efficiency
    }

    /// Interval length (hours) every run of this engine expects.
    pub fn dt_hours(&self) -> f64 {
        self.dt_hours
    }
}

/// Simulates `series` under `policy` and returns one result per interval, in order.
///
/// # Arguments
///
/// * `series` - Validated energy series
/// * `spec` - Battery parameters shared by the whole run
/// * `policy` - Dispatch policy
/// * `dt_hours` - Expected interval length; must match the series
/// * `initial_soc_kwh` - Starting state of charge
///
/// # Errors
///
/// Returns [`SimError::Configuration`] for an invalid spec, a timestep
/// mismatch, or an initial state of charge outside the usable window.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pv_battery_sim::devices::BatterySpec;
/// use pv_battery_sim::series::EnergySeries;
/// use pv_battery_sim::sim::engine::simulate;
/// use pv_battery_sim::sim::policy::FixedWindow;
/// use pv_battery_sim::tariff::TariffSchedule;
///
/// let start = NaiveDate::from_ymd_opt(2025, 1, 1)
///     .and_then(|d| d.and_hms_opt(10, 0, 0))
///     .unwrap();
/// let series =
///     EnergySeries::from_power(&TariffSchedule::reference(), start, 1.0, &[100.0], &[0.0])
///         .unwrap();
/// let spec = BatterySpec::new(1000.0, 1000.0, 1000.0, 0.9);
/// let results = simulate(&series, &spec, FixedWindow::default(), 1.0, 0.0).unwrap();
/// assert_eq!(results[0].import_kwh, 100.0);
/// ```
pub fn simulate<P: DispatchPolicy>(
    series: &EnergySeries,
    spec: &BatterySpec,
    policy: P,
    dt_hours: f64,
    initial_soc_kwh: f64,
) -> Result<Vec<IntervalResult>> {
    Engine::new(spec.clone(), policy, dt_hours)?.run(series, initial_soc_kwh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::policy::{DispatchOptions, EfficiencyConvention, FixedWindow, NoBattery, PriceDriven};
    use crate::tariff::TariffSchedule;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    fn interval(hour: u32, load_kwh: f64, solar_kwh: f64) -> Interval {
        let (tariff_rate, tier) = TariffSchedule::reference().rate_for(at(hour));
        Interval {
            timestamp: at(hour),
            duration_hours: 1.0,
            load_kw: load_kwh,
            solar_kw: solar_kwh,
            tariff_rate,
            tier,
        }
    }

    fn big_spec() -> BatterySpec {
        BatterySpec::new(1000.0, 1000.0, 1000.0, 0.9)
    }

    fn load_first() -> DispatchOptions {
        DispatchOptions {
            solar_priority: SolarPriority::LoadFirst,
            ..DispatchOptions::default()
        }
    }

    #[test]
    fn route_battery_first_charges_before_load() {
        let s = SolarSplit::route(SolarPriority::BatteryFirst, 150.0, 100.0, 1000.0);
        assert_eq!(s.charge_kwh, 150.0);
        assert_eq!(s.export_kwh, 0.0);
        assert_eq!(s.unmet_kwh, 100.0);
    }

    #[test]
    fn route_load_first_charges_surplus_only() {
        let s = SolarSplit::route(SolarPriority::LoadFirst, 150.0, 100.0, 1000.0);
        assert_eq!(s.charge_kwh, 50.0);
        assert_eq!(s.export_kwh, 0.0);
        assert_eq!(s.unmet_kwh, 0.0);
    }

    #[test]
    fn route_respects_cap() {
        let s = SolarSplit::route(SolarPriority::BatteryFirst, 200.0, 0.0, 0.0);
        assert_eq!(s.charge_kwh, 0.0);
        assert_eq!(s.export_kwh, 200.0);
    }

    #[test]
    fn new_rejects_invalid_spec() {
        let err = Engine::new(BatterySpec::new(0.0, 1.0, 1.0, 0.9), NoBattery, 0.5).unwrap_err();
        assert!(err.to_string().contains("battery.capacity_kwh"));
    }

    #[test]
    fn new_rejects_bad_dt() {
        assert!(Engine::new(big_spec(), NoBattery, 0.0).is_err());
        assert!(Engine::new(big_spec(), NoBattery, f64::NAN).is_err());
    }

    #[test]
    fn initial_state_outside_window_rejected() {
        let engine = Engine::new(big_spec(), NoBattery, 1.0).unwrap();
        assert!(engine.initial_state(-1.0).is_err());
        assert!(engine.initial_state(1000.5).is_err());
        assert!(engine.initial_state(1000.0).is_ok());
    }

    #[test]
    fn surplus_solar_charges_under_load_first() {
        let engine = Engine::new(big_spec(), FixedWindow::with_options(load_first()), 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(0.0), &interval(12, 100.0, 150.0));
        let cf = 0.9_f64.sqrt();
        assert_eq!(r.charge_kwh, 50.0);
        assert_eq!(r.import_kwh, 0.0);
        assert_eq!(r.export_kwh, 0.0);
        assert_eq!(r.cost, 0.0);
        assert!((state.soc_kwh - 50.0 * cf).abs() < 1e-9);
    }

    #[test]
    fn battery_first_imports_load_when_not_discharging() {
        let engine = Engine::new(big_spec(), FixedWindow::default(), 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(0.0), &interval(12, 100.0, 150.0));
        assert_eq!(r.solar_charge_kwh, 150.0);
        assert_eq!(r.import_kwh, 100.0);
        assert!((state.soc_kwh - 150.0 * 0.9_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn discharge_authorised_reroutes_solar_to_load() {
        // hour 17 is peak: solar serves the load instead of charging
        let engine = Engine::new(big_spec(), FixedWindow::default(), 1.0).unwrap();
        let (_, r) = engine.step(SimulationState::new(100.0), &interval(17, 100.0, 30.0));
        assert_eq!(r.charge_kwh, 0.0);
        assert!((r.discharge_delivered_kwh - 70.0).abs() < 1e-9);
        assert_eq!(r.import_kwh, 0.0);
    }

    #[test]
    fn partial_discharge_discharge_only() {
        let options = DispatchOptions {
            convention: EfficiencyConvention::DischargeOnly,
            ..DispatchOptions::default()
        };
        let engine = Engine::new(big_spec(), FixedWindow::with_options(options), 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(40.0), &interval(18, 100.0, 0.0));
        assert!((r.discharge_kwh - 40.0).abs() < 1e-9);
        assert!((r.import_kwh - 64.0).abs() < 1e-9);
        assert!(state.soc_kwh.abs() < 1e-9);
    }

    #[test]
    fn full_discharge_draws_unmet_over_efficiency() {
        let spec = BatterySpec::new(1000.0, 1000.0, 1000.0, 0.81);
        let engine = Engine::new(spec, FixedWindow::default(), 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(500.0), &interval(18, 90.0, 0.0));
        assert!((r.discharge_kwh - 100.0).abs() < 1e-9);
        assert_eq!(r.import_kwh, 0.0);
        assert!((state.soc_kwh - 400.0).abs() < 1e-9);
    }

    #[test]
    fn discharge_stops_at_min_soc() {
        let spec = big_spec().with_soc_window(100.0, 1000.0);
        let engine = Engine::new(spec, FixedWindow::default(), 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(100.0), &interval(18, 50.0, 0.0));
        assert_eq!(r.discharge_kwh, 0.0);
        assert_eq!(r.import_kwh, 50.0);
        assert_eq!(state.soc_kwh, 100.0);
    }

    #[test]
    fn discharge_power_limit_applies() {
        let spec = BatterySpec::new(1000.0, 1000.0, 20.0, 1.0);
        let engine = Engine::new(spec, FixedWindow::default(), 1.0).unwrap();
        let (_, r) = engine.step(SimulationState::new(500.0), &interval(18, 50.0, 0.0));
        assert_eq!(r.discharge_kwh, 20.0);
        assert_eq!(r.import_kwh, 30.0);
    }

    #[test]
    fn full_battery_exports_all_solar() {
        let engine = Engine::new(big_spec(), FixedWindow::default(), 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(1000.0), &interval(12, 0.0, 200.0));
        assert_eq!(r.charge_kwh, 0.0);
        assert_eq!(r.export_kwh, 200.0);
        assert_eq!(state.soc_kwh, 1000.0);
    }

    #[test]
    fn grid_charge_adds_to_import_and_cost() {
        let spec = BatterySpec::new(100.0, 40.0, 40.0, 0.9).with_grid_charge(true);
        let engine = Engine::new(spec, PriceDriven::default(), 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(0.0), &interval(2, 10.0, 0.0));
        assert_eq!(r.grid_charge_kwh, 40.0);
        assert_eq!(r.import_kwh, 50.0);
        assert!((r.cost - 50.0 * 0.08).abs() < 1e-12);
        assert_eq!(state.soc_kwh, 40.0);
    }

    #[test]
    fn solar_charge_does_not_reduce_grid_charge_limit() {
        let spec = BatterySpec::new(100.0, 40.0, 40.0, 0.9).with_grid_charge(true);
        let options = DispatchOptions {
            convention: EfficiencyConvention::DischargeOnly,
            ..DispatchOptions::default()
        };
        let engine = Engine::new(spec, PriceDriven::with_options(options), 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(0.0), &interval(7, 0.0, 10.0));
        assert_eq!(r.tariff_rate, 0.08);
        assert_eq!(r.solar_charge_kwh, 10.0);
        assert_eq!(r.grid_charge_kwh, 40.0);
        assert_eq!(r.charge_kwh, 50.0);
        assert_eq!(r.import_kwh, 40.0);
        assert_eq!(state.soc_kwh, 50.0);
    }

    #[test]
    fn grid_charge_stops_at_max_soc_after_solar() {
        let spec = BatterySpec::new(100.0, 40.0, 40.0, 0.9).with_grid_charge(true);
        let options = DispatchOptions {
            convention: EfficiencyConvention::DischargeOnly,
            ..DispatchOptions::default()
        };
        let engine = Engine::new(spec, PriceDriven::with_options(options), 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(80.0), &interval(7, 0.0, 10.0));
        assert_eq!(r.solar_charge_kwh, 10.0);
        assert_eq!(r.grid_charge_kwh, 10.0);
        assert_eq!(state.soc_kwh, 100.0);
    }

    #[test]
    fn new_rejects_efficiency_factor_above_one() {
        let options = DispatchOptions {
            convention: EfficiencyConvention::Custom {
                charge: 1.2,
                discharge: 0.9,
            },
            ..DispatchOptions::default()
        };
        let err = Engine::new(big_spec(), FixedWindow::with_options(options), 1.0).unwrap_err();
        assert!(err.to_string().contains("efficiency.charge"));
    }

    #[test]
    fn custom_factors_apply_to_each_leg() {
        let options = DispatchOptions {
            convention: EfficiencyConvention::Custom {
                charge: 0.95,
                discharge: 0.9,
            },
            solar_priority: SolarPriority::LoadFirst,
            ..DispatchOptions::default()
        };
        let engine = Engine::new(big_spec(), FixedWindow::with_options(options), 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(0.0), &interval(12, 0.0, 100.0));
        assert!((state.soc_kwh - 95.0).abs() < 1e-9);
        let (_, r2) = engine.step(state, &interval(18, 45.0, 0.0));
        assert!((r2.discharge_kwh - 50.0).abs() < 1e-9);
        assert_eq!(r.export_kwh, 0.0);
    }

    #[test]
    fn grid_charge_loss_knob() {
        let spec = BatterySpec::new(100.0, 40.0, 40.0, 0.81).with_grid_charge(true);
        let options = DispatchOptions {
            grid_charge_loss: true,
            ..DispatchOptions::default()
        };
        let engine = Engine::new(spec, PriceDriven::with_options(options), 1.0).unwrap();
        let (state, _) = engine.step(SimulationState::new(0.0), &interval(2, 0.0, 0.0));
        assert!((state.soc_kwh - 36.0).abs() < 1e-9);
    }

    #[test]
    fn no_battery_never_stores_solar() {
        let engine = Engine::new(big_spec(), NoBattery, 1.0).unwrap();
        let (state, r) = engine.step(SimulationState::new(0.0), &interval(12, 50.0, 200.0));
        assert_eq!(r.charge_kwh, 0.0);
        assert_eq!(r.export_kwh, 150.0);
        assert_eq!(state.soc_kwh, 0.0);
    }

    #[test]
    fn run_rejects_dt_mismatch() {
        let series = EnergySeries::from_power(&TariffSchedule::reference(), at(0), 0.5, &[1.0], &[0.0]).unwrap();
        let err = simulate(&series, &big_spec(), NoBattery, 1.0, 0.0).unwrap_err();
        assert!(err.to_string().contains("dt_hours"));
    }

    #[test]
    fn run_produces_one_result_per_interval() {
        let load = vec![100.0; 24];
        let solar: Vec<f64> = (0..24).map(|h| if (8..16).contains(&h) { 150.0 } else { 0.0 }).collect();
        let series = EnergySeries::from_power(&TariffSchedule::reference(), at(0), 1.0, &load, &solar).unwrap();
        let results = simulate(&series, &big_spec(), FixedWindow::default(), 1.0, 0.0).unwrap();
        assert_eq!(results.len(), 24);
        for (r, iv) in results.iter().zip(series.iter()) {
            assert_eq!(r.timestamp, iv.timestamp);
            assert!(r.charge_kwh == 0.0 || r.discharge_kwh == 0.0);
        }
    }
}
