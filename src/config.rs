//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use tracing::debug;

use crate::devices::{BatterySpec, Device, ProfileLoad, SolarPv, UniformLoad};
use crate::error::{ConfigError, Result, SimError};
use crate::scenario::Scenario;
use crate::series::{EnergySeries, synthetic};
use crate::sim::policy::{
    DispatchOptions, EfficiencyConvention, FixedWindow, PriceDriven, SolarPriority,
};
use crate::tariff::TariffSchedule;

/// Top-level scenario configuration parsed from TOML.
///
/// Every table has defaults, and the defaults together form the `phase_i`
/// preset. Load from TOML with [`ScenarioConfig::from_toml_file`] or pick a
/// built-in with [`ScenarioConfig::from_preset`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Horizon, resolution, and seed.
    pub simulation: SimulationConfig,
    /// Sites whose series are summed into one aggregated series.
    pub sites: Vec<SiteConfig>,
    /// Shared battery installed behind the aggregated meter.
    pub battery: BatteryConfig,
    /// Time-of-use tariff table.
    pub tariff: TariffSchedule,
    /// Dispatch policy parameters.
    pub policy: PolicyConfig,
}

/// Simulation horizon and global parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// First day of the series, as `"YYYY-MM-DD"`.
    pub start_date: NaiveDate,
    /// Number of days to simulate (must be > 0).
    pub days: usize,
    /// Number of intervals per day (must be > 0 and divide 1440 minutes).
    pub steps_per_day: usize,
    /// Master random seed; each site adds its `seed_offset`.
    pub seed: u64,
    /// State of charge at the start of each scenario run (kWh).
    pub initial_soc_kwh: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or(NaiveDate::MIN),
            days: 3,
            steps_per_day: 48,
            seed: 42,
            initial_soc_kwh: 0.0,
        }
    }
}

impl SimulationConfig {
    /// Interval length in hours.
    pub fn dt_hours(&self) -> f64 {
        24.0 / self.steps_per_day.max(1) as f64
    }

    /// Midnight of `start_date`.
    pub fn start(&self) -> NaiveDateTime {
        self.start_date.and_time(NaiveTime::MIN)
    }
}

/// Synthetic load model of one site.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum LoadModel {
    /// `base_kw + variation_kw * U[0, 1)` each interval.
    Uniform { base_kw: f64, variation_kw: f64 },
    /// Daily shape scaled to an annual energy target.
    Profile {
        annual_energy_kwh: f64,
        #[serde(default = "default_weekend_factor")]
        weekend_factor: f64,
        #[serde(default = "default_seasonal_amplitude")]
        seasonal_amplitude: f64,
        #[serde(default = "default_noise_std")]
        noise_std: f64,
    },
}

fn default_weekend_factor() -> f64 {
    0.7
}

fn default_seasonal_amplitude() -> f64 {
    0.1
}

fn default_noise_std() -> f64 {
    0.05
}

impl Default for LoadModel {
    fn default() -> Self {
        Self::Uniform {
            base_kw: 500.0,
            variation_kw: 300.0,
        }
    }
}

impl LoadModel {
    fn device(&self, seed: u64) -> Box<dyn Device> {
        match *self {
            Self::Uniform {
                base_kw,
                variation_kw,
            } => Box::new(UniformLoad::new(base_kw, variation_kw, seed)),
            Self::Profile {
                annual_energy_kwh,
                weekend_factor,
                seasonal_amplitude,
                noise_std,
            } => Box::new(ProfileLoad::new(
                annual_energy_kwh,
                weekend_factor,
                seasonal_amplitude,
                noise_std,
                seed,
            )),
        }
    }
}

/// One metered site: a load model and a PV array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub label: String,
    pub load: LoadModel,
    /// PV output at solar noon (kW).
    pub solar_kw_peak: f64,
    /// Added to `simulation.seed` for this site's load generator.
    pub seed_offset: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            label: "Site A".to_string(),
            load: LoadModel::default(),
            solar_kw_peak: 8000.0,
            seed_offset: 0,
        }
    }
}

/// Battery storage parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Total energy capacity (kWh).
    pub capacity_kwh: f64,
    /// Maximum charging power (kW).
    pub max_charge_kw: f64,
    /// Maximum discharging power (kW).
    pub max_discharge_kw: f64,
    /// Round-trip efficiency, in (0.0, 1.0].
    pub round_trip_efficiency: f64,
    /// SoC floor (kWh).
    pub min_soc_kwh: f64,
    /// SoC ceiling (kWh); defaults to `capacity_kwh`.
    pub max_soc_kwh: Option<f64>,
    /// Whether the price-driven policy may buy grid energy to charge.
    pub allow_grid_charge: bool,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 16_000.0,
            max_charge_kw: 8_000.0,
            max_discharge_kw: 8_000.0,
            round_trip_efficiency: 0.9,
            min_soc_kwh: 0.0,
            max_soc_kwh: None,
            allow_grid_charge: true,
        }
    }
}

impl BatteryConfig {
    /// Builds the immutable spec shared by every scenario run.
    pub fn to_spec(&self) -> BatterySpec {
        BatterySpec::new(
            self.capacity_kwh,
            self.max_charge_kw,
            self.max_discharge_kw,
            self.round_trip_efficiency,
        )
        .with_soc_window(self.min_soc_kwh, self.max_soc_kwh.unwrap_or(self.capacity_kwh))
        .with_grid_charge(self.allow_grid_charge)
    }
}

/// Dispatch policy parameters shared by the fixed-window and price-driven policies.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// How round-trip losses are split between charge and discharge.
    pub efficiency: EfficiencyConvention,
    /// Apply the charging loss to grid-charged energy.
    pub grid_charge_loss: bool,
    pub solar_priority: SolarPriority,
    /// Price-driven: discharge at or above this rate.
    pub discharge_threshold: f64,
    /// Price-driven: grid-charge at or below this rate.
    pub grid_charge_threshold: f64,
    /// Fixed-window: evening window start hour (inclusive).
    pub evening_start_hour: u32,
    /// Fixed-window: evening window end hour (exclusive).
    pub evening_end_hour: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let fixed = FixedWindow::default();
        let price = PriceDriven::default();
        Self {
            efficiency: EfficiencyConvention::DischargeOnly,
            grid_charge_loss: false,
            solar_priority: SolarPriority::BatteryFirst,
            discharge_threshold: price.discharge_threshold,
            grid_charge_threshold: price.grid_charge_threshold,
            evening_start_hour: fixed.evening_start_hour,
            evening_end_hour: fixed.evening_end_hour,
        }
    }
}

impl PolicyConfig {
    pub fn options(&self) -> DispatchOptions {
        DispatchOptions {
            convention: self.efficiency,
            grid_charge_loss: self.grid_charge_loss,
            solar_priority: self.solar_priority,
        }
    }

    pub fn fixed_window(&self) -> FixedWindow {
        FixedWindow {
            evening_start_hour: self.evening_start_hour,
            evening_end_hour: self.evening_end_hour,
            options: self.options(),
        }
    }

    pub fn price_driven(&self) -> PriceDriven {
        PriceDriven {
            discharge_threshold: self.discharge_threshold,
            grid_charge_threshold: self.grid_charge_threshold,
            options: self.options(),
        }
    }

    /// The standard scenario set parameterised by this table.
    pub fn scenarios(&self) -> Vec<Scenario> {
        Scenario::standard_set(self.fixed_window(), self.price_driven())
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::phase_i()
    }
}

impl ScenarioConfig {
    /// Returns the Phase I preset: one site, 16 MWh / 8 MW battery, three days.
    pub fn phase_i() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            sites: vec![SiteConfig::default()],
            battery: BatteryConfig::default(),
            tariff: TariffSchedule::reference(),
            policy: PolicyConfig::default(),
        }
    }

    /// Returns the Phase II preset: sites A and B behind one 25 MWh / 12.5 MW battery.
    pub fn phase_ii() -> Self {
        Self {
            sites: vec![
                SiteConfig::default(),
                SiteConfig {
                    label: "Site B".to_string(),
                    load: LoadModel::Uniform {
                        base_kw: 200.0,
                        variation_kw: 150.0,
                    },
                    solar_kw_peak: 4500.0,
                    seed_offset: 1,
                },
            ],
            battery: BatteryConfig {
                capacity_kwh: 25_000.0,
                max_charge_kw: 12_500.0,
                max_discharge_kw: 12_500.0,
                ..BatteryConfig::default()
            },
            ..Self::phase_i()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["phase_i", "phase_ii"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> std::result::Result<Self, ConfigError> {
        match name {
            "phase_i" => Ok(Self::phase_i()),
            "phase_ii" => Ok(Self::phase_ii()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Io`] if the file cannot be read or
    /// [`SimError::Toml`] if the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "read scenario file");
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Toml`] if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Interval length in hours.
    pub fn dt_hours(&self) -> f64 {
        self.simulation.dt_hours()
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        if s.steps_per_day == 0 {
            errors.push(ConfigError::new("simulation.steps_per_day", "must be > 0"));
        } else if 1440 % s.steps_per_day != 0 {
            errors.push(ConfigError::new(
                "simulation.steps_per_day",
                "must divide a day into whole minutes",
            ));
        }
        if s.days == 0 {
            errors.push(ConfigError::new("simulation.days", "must be > 0"));
        }

        if self.sites.is_empty() {
            errors.push(ConfigError::new("sites", "at least one site is required"));
        }
        for (i, site) in self.sites.iter().enumerate() {
            if !site.solar_kw_peak.is_finite() || site.solar_kw_peak < 0.0 {
                errors.push(ConfigError::new(
                    format!("sites[{i}].solar_kw_peak"),
                    "must be >= 0",
                ));
            }
            match site.load {
                LoadModel::Uniform {
                    base_kw,
                    variation_kw,
                } => {
                    if !base_kw.is_finite() || base_kw < 0.0 {
                        errors.push(ConfigError::new(
                            format!("sites[{i}].load.base_kw"),
                            "must be >= 0",
                        ));
                    }
                    if !variation_kw.is_finite() || variation_kw < 0.0 {
                        errors.push(ConfigError::new(
                            format!("sites[{i}].load.variation_kw"),
                            "must be >= 0",
                        ));
                    }
                }
                LoadModel::Profile {
                    annual_energy_kwh,
                    weekend_factor,
                    noise_std,
                    ..
                } => {
                    if !annual_energy_kwh.is_finite() || annual_energy_kwh < 0.0 {
                        errors.push(ConfigError::new(
                            format!("sites[{i}].load.annual_energy_kwh"),
                            "must be >= 0",
                        ));
                    }
                    if !weekend_factor.is_finite() || weekend_factor < 0.0 {
                        errors.push(ConfigError::new(
                            format!("sites[{i}].load.weekend_factor"),
                            "must be >= 0",
                        ));
                    }
                    if !noise_std.is_finite() || noise_std < 0.0 {
                        errors.push(ConfigError::new(
                            format!("sites[{i}].load.noise_std"),
                            "must be >= 0",
                        ));
                    }
                }
            }
        }

        let spec = self.battery.to_spec();
        let battery_errors = spec.validate();
        let spec_valid = battery_errors.is_empty();
        errors.extend(battery_errors);
        if spec_valid && !spec.contains_soc(s.initial_soc_kwh) {
            errors.push(ConfigError::new(
                "simulation.initial_soc_kwh",
                "must be in [battery.min_soc_kwh, battery.max_soc_kwh]",
            ));
        }

        errors.extend(self.tariff.validate());

        let p = &self.policy;
        if !p.discharge_threshold.is_finite() || p.discharge_threshold < 0.0 {
            errors.push(ConfigError::new("policy.discharge_threshold", "must be >= 0"));
        }
        if !p.grid_charge_threshold.is_finite() || p.grid_charge_threshold < 0.0 {
            errors.push(ConfigError::new("policy.grid_charge_threshold", "must be >= 0"));
        }
        if let EfficiencyConvention::Custom { charge, discharge } = p.efficiency {
            for (field, factor) in [
                ("policy.efficiency.charge", charge),
                ("policy.efficiency.discharge", discharge),
            ] {
                if !(factor.is_finite() && factor > 0.0 && factor <= 1.0) {
                    errors.push(ConfigError::new(field, "must be in (0, 1]"));
                }
            }
        }
        if p.evening_start_hour >= p.evening_end_hour || p.evening_end_hour > 24 {
            errors.push(ConfigError::new(
                "policy.evening_start_hour",
                "must be < policy.evening_end_hour <= 24",
            ));
        }

        errors
    }

    /// Validates the configuration, returning the first error if any.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] for the first invalid field.
    pub fn ensure_valid(&self) -> Result<()> {
        match self.validate().into_iter().next() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Generates every site's synthetic series and sums them into one.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] if the horizon is empty or the
    /// sites cannot be aggregated.
    pub fn build_series(&self) -> Result<EnergySeries> {
        let s = &self.simulation;
        let sites = self
            .sites
            .iter()
            .map(|site| {
                let seed = s.seed.wrapping_add(site.seed_offset);
                let mut load = site.load.device(seed);
                let mut solar = SolarPv::new(site.solar_kw_peak);
                debug!(site = %site.label, seed, load = load.device_type(), "generating site series");
                synthetic::generate(
                    &self.tariff,
                    s.start(),
                    s.steps_per_day,
                    s.days,
                    load.as_mut(),
                    &mut solar,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        if sites.is_empty() {
            return Err(SimError::configuration("sites", "at least one site is required"));
        }
        EnergySeries::aggregate(&sites)
    }
}
