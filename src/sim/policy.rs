//! Rule-based dispatch policies deciding when the battery may discharge or grid-charge.
//!
//! Policies express intent ("may"); the engine applies the physical constraints
//! ("can"), so a policy that authorises discharge at the SoC floor simply leads
//! to a full grid import for that interval.

use serde::{Deserialize, Serialize};

use crate::devices::BatterySpec;
use crate::error::ConfigError;
use crate::series::Interval;
use crate::tariff::TariffTier;

/// Efficiency factors applied on each battery energy path.
///
/// The product `charge * discharge` is the round-trip efficiency seen by
/// solar-charged energy. `grid_charge` applies to energy bought from the grid
/// to charge the battery and is lossless (1.0) unless configured otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficiencyModel {
    /// Fraction of solar charging energy that reaches the state of charge.
    pub charge: f64,
    /// Fraction of energy drawn from the state of charge delivered to the load.
    pub discharge: f64,
    /// Fraction of grid charging energy that reaches the state of charge.
    pub grid_charge: f64,
}

impl EfficiencyModel {
    /// Splits the round-trip loss evenly: `√η` on charge and on discharge.
    pub fn split(round_trip: f64) -> Self {
        let leg = round_trip.sqrt();
        Self {
            charge: leg,
            discharge: leg,
            grid_charge: 1.0,
        }
    }

    /// Applies the whole round-trip loss on discharge.
    pub fn discharge_only(round_trip: f64) -> Self {
        Self {
            charge: 1.0,
            discharge: round_trip,
            grid_charge: 1.0,
        }
    }

    /// No losses on any path.
    pub fn lossless() -> Self {
        Self {
            charge: 1.0,
            discharge: 1.0,
            grid_charge: 1.0,
        }
    }

    /// Applies the solar charging factor to grid charging as well.
    pub fn with_grid_charge_loss(self) -> Self {
        Self {
            grid_charge: self.charge,
            ..self
        }
    }

    /// Checks that every factor lies in (0, 1].
    ///
    /// Returns an empty vector if the model is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        [
            ("efficiency.charge", self.charge),
            ("efficiency.discharge", self.discharge),
            ("efficiency.grid_charge", self.grid_charge),
        ]
        .into_iter()
        .filter(|(_, factor)| !(factor.is_finite() && *factor > 0.0 && *factor <= 1.0))
        .map(|(field, _)| ConfigError::new(field, "must be in (0, 1]"))
        .collect()
    }
}

/// How the round-trip efficiency is divided between charge and discharge.
///
/// In TOML the first two are plain strings (`"split"`, `"discharge_only"`);
/// explicit factors are a table: `{ custom = { charge = 0.95, discharge = 0.9 } }`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyConvention {
    /// `√η` on each leg.
    #[default]
    Split,
    /// Lossless charge, `η` on discharge.
    DischargeOnly,
    /// Explicit factors; the battery's round-trip efficiency is ignored.
    Custom { charge: f64, discharge: f64 },
}

/// Which claim on solar energy is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolarPriority {
    /// Solar charges the battery first; the remainder serves the load.
    #[default]
    BatteryFirst,
    /// Solar serves the load first; only the surplus charges the battery.
    LoadFirst,
}

/// Engine-facing options shared by every battery policy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DispatchOptions {
    pub convention: EfficiencyConvention,
    /// Apply the charging loss to grid-charged energy too.
    pub grid_charge_loss: bool,
    pub solar_priority: SolarPriority,
}

impl DispatchOptions {
    /// Efficiency factors for a battery with round-trip efficiency `round_trip`.
    pub fn efficiency(&self, round_trip: f64) -> EfficiencyModel {
        let model = match self.convention {
            EfficiencyConvention::Split => EfficiencyModel::split(round_trip),
            EfficiencyConvention::DischargeOnly => EfficiencyModel::discharge_only(round_trip),
            EfficiencyConvention::Custom { charge, discharge } => EfficiencyModel {
                charge,
                discharge,
                grid_charge: 1.0,
            },
        };
        if self.grid_charge_loss {
            model.with_grid_charge_loss()
        } else {
            model
        }
    }
}

/// Decision interface consulted by the engine once per interval.
///
/// Implementations are stateless apart from their parameters; all state
/// (the state of charge) is passed in.
pub trait DispatchPolicy {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// Whether the battery may discharge to serve unmet load this interval.
    fn may_discharge(&self, interval: &Interval, soc_kwh: f64, spec: &BatterySpec) -> bool;

    /// Whether the battery may buy grid energy this interval.
    fn may_grid_charge(&self, interval: &Interval, soc_kwh: f64, spec: &BatterySpec) -> bool;

    /// Efficiency factors used for this policy's run.
    fn efficiency(&self, spec: &BatterySpec) -> EfficiencyModel {
        EfficiencyModel::split(spec.round_trip_efficiency)
    }

    fn solar_priority(&self) -> SolarPriority {
        SolarPriority::BatteryFirst
    }

    /// `false` if the battery is absent and must never store energy.
    fn stores_energy(&self) -> bool {
        true
    }
}

/// Solar-only / no-asset policy: the battery is treated as absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NoBattery;

impl DispatchPolicy for NoBattery {
    fn name(&self) -> &'static str {
        "no_battery"
    }

    fn may_discharge(&self, _interval: &Interval, _soc_kwh: f64, _spec: &BatterySpec) -> bool {
        false
    }

    fn may_grid_charge(&self, _interval: &Interval, _soc_kwh: f64, _spec: &BatterySpec) -> bool {
        false
    }

    fn efficiency(&self, _spec: &BatterySpec) -> EfficiencyModel {
        EfficiencyModel::lossless()
    }

    fn stores_energy(&self) -> bool {
        false
    }
}

/// Discharges throughout the peak tier, then keeps discharging in the evening
/// window while any charge remains. Never charges from the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedWindow {
    /// First hour of the evening window (inclusive).
    pub evening_start_hour: u32,
    /// End of the evening window (exclusive).
    pub evening_end_hour: u32,
    pub options: DispatchOptions,
}

impl Default for FixedWindow {
    fn default() -> Self {
        Self {
            evening_start_hour: 19,
            evening_end_hour: 23,
            options: DispatchOptions::default(),
        }
    }
}

impl FixedWindow {
    pub fn with_options(options: DispatchOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }
}

impl DispatchPolicy for FixedWindow {
    fn name(&self) -> &'static str {
        "fixed_window"
    }

    fn may_discharge(&self, interval: &Interval, soc_kwh: f64, _spec: &BatterySpec) -> bool {
        let in_evening = (self.evening_start_hour..self.evening_end_hour).contains(&interval.hour());
        interval.tier == TariffTier::Peak || (in_evening && soc_kwh > 0.0)
    }

    fn may_grid_charge(&self, _interval: &Interval, _soc_kwh: f64, _spec: &BatterySpec) -> bool {
        false
    }

    fn efficiency(&self, spec: &BatterySpec) -> EfficiencyModel {
        self.options.efficiency(spec.round_trip_efficiency)
    }

    fn solar_priority(&self) -> SolarPriority {
        self.options.solar_priority
    }
}

/// Discharges when the rate is at or above `discharge_threshold`; charges from
/// the grid at or below `grid_charge_threshold` when the spec allows it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceDriven {
    pub discharge_threshold: f64,
    pub grid_charge_threshold: f64,
    pub options: DispatchOptions,
}

impl Default for PriceDriven {
    fn default() -> Self {
        Self {
            discharge_threshold: 0.15,
            grid_charge_threshold: 0.08,
            options: DispatchOptions::default(),
        }
    }
}

impl PriceDriven {
    pub fn with_options(options: DispatchOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }
}

impl DispatchPolicy for PriceDriven {
    fn name(&self) -> &'static str {
        "price_driven"
    }

    fn may_discharge(&self, interval: &Interval, soc_kwh: f64, _spec: &BatterySpec) -> bool {
        interval.tariff_rate >= self.discharge_threshold && soc_kwh > 0.0
    }

    fn may_grid_charge(&self, interval: &Interval, soc_kwh: f64, spec: &BatterySpec) -> bool {
        spec.allow_grid_charge
            && interval.tariff_rate <= self.grid_charge_threshold
            && soc_kwh < spec.max_soc_kwh
    }

    fn efficiency(&self, spec: &BatterySpec) -> EfficiencyModel {
        self.options.efficiency(spec.round_trip_efficiency)
    }

    fn solar_priority(&self) -> SolarPriority {
        self.options.solar_priority
    }
}

/// Tagged union of the built-in policies, for configuration and scenario lists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyKind {
    NoBattery(NoBattery),
    FixedWindow(FixedWindow),
    PriceDriven(PriceDriven),
}

impl PolicyKind {
    fn as_policy(&self) -> &dyn DispatchPolicy {
        match self {
            Self::NoBattery(p) => p,
            Self::FixedWindow(p) => p,
            Self::PriceDriven(p) => p,
        }
    }
}

impl From<NoBattery> for PolicyKind {
    fn from(p: NoBattery) -> Self {
        Self::NoBattery(p)
    }
}

impl From<FixedWindow> for PolicyKind {
    fn from(p: FixedWindow) -> Self {
        Self::FixedWindow(p)
    }
}

impl From<PriceDriven> for PolicyKind {
    fn from(p: PriceDriven) -> Self {
        Self::PriceDriven(p)
    }
}

impl DispatchPolicy for PolicyKind {
    fn name(&self) -> &'static str {
        self.as_policy().name()
    }

    fn may_discharge(&self, interval: &Interval, soc_kwh: f64, spec: &BatterySpec) -> bool {
        self.as_policy().may_discharge(interval, soc_kwh, spec)
    }

    fn may_grid_charge(&self, interval: &Interval, soc_kwh: f64, spec: &BatterySpec) -> bool {
        self.as_policy().may_grid_charge(interval, soc_kwh, spec)
    }

    fn efficiency(&self, spec: &BatterySpec) -> EfficiencyModel {
        self.as_policy().efficiency(spec)
    }

    fn solar_priority(&self) -> SolarPriority {
        self.as_policy().solar_priority()
    }

    fn stores_energy(&self) -> bool {
        self.as_policy().stores_energy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn interval(hour: u32, rate: f64, tier: TariffTier) -> Interval {
        Interval {
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 1)
                .and_then(|d| d.and_hms_opt(hour, 0, 0))
                .unwrap(),
            duration_hours: 0.5,
            load_kw: 1.0,
            solar_kw: 0.0,
            tariff_rate: rate,
            tier,
        }
    }

    fn spec() -> BatterySpec {
        BatterySpec::new(100.0, 50.0, 50.0, 0.81).with_grid_charge(true)
    }

    #[test]
    fn split_factors_multiply_to_round_trip() {
        let m = EfficiencyModel::split(0.81);
        assert!((m.charge - 0.9).abs() < 1e-12);
        assert!((m.charge * m.discharge - 0.81).abs() < 1e-12);
        assert_eq!(m.grid_charge, 1.0);
    }

    #[test]
    fn discharge_only_puts_loss_on_discharge() {
        let m = EfficiencyModel::discharge_only(0.9);
        assert_eq!(m.charge, 1.0);
        assert_eq!(m.discharge, 0.9);
    }

    #[test]
    fn grid_charge_loss_follows_charge_factor() {
        let options = DispatchOptions {
            grid_charge_loss: true,
            ..DispatchOptions::default()
        };
        let m = options.efficiency(0.81);
        assert!((m.grid_charge - 0.9).abs() < 1e-12);
    }

    #[test]
    fn custom_convention_uses_explicit_factors() {
        let options = DispatchOptions {
            convention: EfficiencyConvention::Custom {
                charge: 0.95,
                discharge: 0.9,
            },
            ..DispatchOptions::default()
        };
        let m = options.efficiency(0.5);
        assert_eq!(m.charge, 0.95);
        assert_eq!(m.discharge, 0.9);
        assert_eq!(m.grid_charge, 1.0);
        assert!(m.validate().is_empty());

        let p = PriceDriven::with_options(options);
        assert_eq!(p.efficiency(&spec()).charge, 0.95);
    }

    #[test]
    fn efficiency_factors_must_be_in_unit_interval() {
        let m = EfficiencyModel {
            charge: 1.2,
            discharge: 0.0,
            grid_charge: 1.0,
        };
        let fields: Vec<_> = m.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["efficiency.charge", "efficiency.discharge"]);
        assert!(EfficiencyModel::lossless().validate().is_empty());
    }

    #[test]
    fn no_battery_never_acts() {
        let p = NoBattery;
        let iv = interval(18, 0.25, TariffTier::Peak);
        assert!(!p.may_discharge(&iv, 50.0, &spec()));
        assert!(!p.may_grid_charge(&iv, 0.0, &spec()));
        assert!(!p.stores_energy());
    }

    #[test]
    fn fixed_window_discharges_in_peak_even_when_empty() {
        let p = FixedWindow::default();
        assert!(p.may_discharge(&interval(17, 0.25, TariffTier::Peak), 0.0, &spec()));
    }

    #[test]
    fn fixed_window_evening_requires_charge() {
        let p = FixedWindow::default();
        let evening = interval(21, 0.15, TariffTier::Mid);
        assert!(p.may_discharge(&evening, 1.0, &spec()));
        assert!(!p.may_discharge(&evening, 0.0, &spec()));
    }

    #[test]
    fn fixed_window_idle_outside_window() {
        let p = FixedWindow::default();
        assert!(!p.may_discharge(&interval(10, 0.15, TariffTier::Mid), 50.0, &spec()));
        assert!(!p.may_discharge(&interval(23, 0.08, TariffTier::OffPeak), 50.0, &spec()));
        assert!(!p.may_grid_charge(&interval(2, 0.08, TariffTier::OffPeak), 0.0, &spec()));
    }

    #[test]
    fn price_driven_thresholds() {
        let p = PriceDriven::default();
        assert!(p.may_discharge(&interval(10, 0.15, TariffTier::Mid), 1.0, &spec()));
        assert!(!p.may_discharge(&interval(10, 0.15, TariffTier::Mid), 0.0, &spec()));
        assert!(!p.may_discharge(&interval(2, 0.08, TariffTier::OffPeak), 1.0, &spec()));

        assert!(p.may_grid_charge(&interval(2, 0.08, TariffTier::OffPeak), 10.0, &spec()));
        assert!(!p.may_grid_charge(&interval(2, 0.08, TariffTier::OffPeak), 100.0, &spec()));
        assert!(!p.may_grid_charge(&interval(10, 0.15, TariffTier::Mid), 10.0, &spec()));
    }

    #[test]
    fn price_driven_respects_allow_grid_charge() {
        let p = PriceDriven::default();
        let no_grid = spec().with_grid_charge(false);
        assert!(!p.may_grid_charge(&interval(2, 0.08, TariffTier::OffPeak), 10.0, &no_grid));
    }

    #[test]
    fn policy_kind_delegates() {
        let kind = PolicyKind::from(PriceDriven::default());
        assert_eq!(kind.name(), "price_driven");
        assert!(kind.stores_energy());
        assert_eq!(PolicyKind::from(NoBattery).name(), "no_battery");
        assert!(!PolicyKind::from(NoBattery).stores_energy());
    }
}
