use crate::error::ConfigError;

/// Static parameters of a battery energy storage system.
///
/// `BatterySpec` is an immutable parameter bundle shared read-only by a whole
/// simulation run. The state of charge is not stored here: it is carried by
/// the dispatch engine as [`crate::sim::types::SimulationState`].
///
/// # Examples
///
/// ```
/// use pv_battery_sim::devices::BatterySpec;
///
/// let spec = BatterySpec::new(16_000.0, 8_000.0, 8_000.0, 0.9).with_grid_charge(true);
/// assert!(spec.validate().is_empty());
/// assert_eq!(spec.max_soc_kwh, 16_000.0);
/// assert_eq!(spec.max_charge_kwh(0.5), 4_000.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BatterySpec {
    /// Nameplate capacity in kilowatt-hours (> 0).
    pub capacity_kwh: f64,

    /// Maximum charging power in kilowatts (>= 0).
    pub max_charge_kw: f64,

    /// Maximum discharging power in kilowatts (>= 0).
    pub max_discharge_kw: f64,

    /// Round-trip efficiency, in (0, 1].
    pub round_trip_efficiency: f64,

    /// Lowest permitted state of charge in kWh.
    pub min_soc_kwh: f64,

    /// Highest usable state of charge in kWh.
    pub max_soc_kwh: f64,

    /// Whether dispatch policies may buy grid energy to charge the battery.
    pub allow_grid_charge: bool,
}

impl BatterySpec {
    /// Creates a spec using the full capacity as the usable window and no grid charging.
    ///
    /// # Arguments
    ///
    /// * `capacity_kwh` - Battery capacity in kWh
    /// * `max_charge_kw` - Maximum charging power in kW
    /// * `max_discharge_kw` - Maximum discharging power in kW
    /// * `round_trip_efficiency` - Fraction of energy recovered over a full cycle
    pub fn new(
        capacity_kwh: f64,
        max_charge_kw: f64,
        max_discharge_kw: f64,
        round_trip_efficiency: f64,
    ) -> Self {
        Self {
            capacity_kwh,
            max_charge_kw,
            max_discharge_kw,
            round_trip_efficiency,
            min_soc_kwh: 0.0,
            max_soc_kwh: capacity_kwh,
            allow_grid_charge: false,
        }
    }

    /// Restricts the usable state-of-charge window to `[min_soc_kwh, max_soc_kwh]`.
    pub fn with_soc_window(mut self, min_soc_kwh: f64, max_soc_kwh: f64) -> Self {
        self.min_soc_kwh = min_soc_kwh;
        self.max_soc_kwh = max_soc_kwh;
        self
    }

    /// Sets whether grid-to-battery charging is permitted.
    pub fn with_grid_charge(mut self, allow: bool) -> Self {
        self.allow_grid_charge = allow;
        self
    }

    /// Charging energy limit for one interval of `dt_hours`.
    pub fn max_charge_kwh(&self, dt_hours: f64) -> f64 {
        self.max_charge_kw * dt_hours
    }

    /// Discharging energy limit (drawn from the state of charge) for one interval.
    pub fn max_discharge_kwh(&self, dt_hours: f64) -> f64 {
        self.max_discharge_kw * dt_hours
    }

    /// Width of the usable state-of-charge window in kWh.
    pub fn usable_kwh(&self) -> f64 {
        (self.max_soc_kwh - self.min_soc_kwh).max(0.0)
    }

    /// Returns `true` if `soc_kwh` lies inside the usable window.
    pub fn contains_soc(&self, soc_kwh: f64) -> bool {
        (self.min_soc_kwh..=self.max_soc_kwh).contains(&soc_kwh)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the spec is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if !self.capacity_kwh.is_finite() || self.capacity_kwh <= 0.0 {
            errors.push(ConfigError::new("battery.capacity_kwh", "must be > 0"));
        }
        if !self.max_charge_kw.is_finite() || self.max_charge_kw < 0.0 {
            errors.push(ConfigError::new("battery.max_charge_kw", "must be >= 0"));
        }
        if !self.max_discharge_kw.is_finite() || self.max_discharge_kw < 0.0 {
            errors.push(ConfigError::new("battery.max_discharge_kw", "must be >= 0"));
        }
        if !(self.round_trip_efficiency > 0.0 && self.round_trip_efficiency <= 1.0) {
            errors.push(ConfigError::new(
                "battery.round_trip_efficiency",
                "must be in (0.0, 1.0]",
            ));
        }
        if !self.min_soc_kwh.is_finite() || self.min_soc_kwh < 0.0 {
            errors.push(ConfigError::new("battery.min_soc_kwh", "must be >= 0"));
        }
        if !self.max_soc_kwh.is_finite()
            || self.max_soc_kwh < self.min_soc_kwh
            || self.max_soc_kwh > self.capacity_kwh
        {
            errors.push(ConfigError::new(
                "battery.max_soc_kwh",
                "must be in [battery.min_soc_kwh, battery.capacity_kwh]",
            ));
        }

        errors
    }
}
