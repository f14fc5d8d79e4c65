use chrono::{Datelike, Weekday};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::types::{Device, DeviceContext, gaussian_noise};

/// Relative hourly load shape (00:00 to 23:00) used by [`ProfileLoad`].
pub const HOURLY_SHAPE: [f64; 24] = [
    0.6, 0.6, 0.7, 0.8, 0.9, 1.0, // 00-05
    1.0, 1.1, 1.2, 1.2, 1.1, 1.0, // 06-11
    1.0, 1.2, 1.2, 1.1, 1.1, 1.0, // 12-17
    0.9, 0.8, 0.7, 0.7, 0.6, 0.6, // 18-23
];

/// A site load drawn uniformly from `[base_kw, base_kw + variation_kw)` each interval.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pv_battery_sim::devices::{Device, DeviceContext, UniformLoad};
///
/// let mut load = UniformLoad::new(500.0, 300.0, 42);
/// let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
///     .and_then(|d| d.and_hms_opt(12, 0, 0))
///     .unwrap();
/// let kw = load.power_kw(&DeviceContext::new(0, ts, 48));
/// assert!((500.0..800.0).contains(&kw));
/// ```
#[derive(Debug, Clone)]
pub struct UniformLoad {
    /// Minimum consumption in kilowatts.
    pub base_kw: f64,

    /// Width of the uniform band in kilowatts.
    pub variation_kw: f64,

    rng: StdRng,
}

impl UniformLoad {
    /// Creates a new uniform load generator.
    ///
    /// Negative parameters are clamped to zero.
    pub fn new(base_kw: f64, variation_kw: f64, seed: u64) -> Self {
        Self {
            base_kw: base_kw.max(0.0),
            variation_kw: variation_kw.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Device for UniformLoad {
    fn power_kw(&mut self, _context: &DeviceContext) -> f64 {
        self.base_kw + self.variation_kw * self.rng.random::<f64>()
    }

    fn device_type(&self) -> &'static str {
        "UniformLoad"
    }
}

/// A load following [`HOURLY_SHAPE`] with seasonality, weekend scaling, and noise.
///
/// Each day the hourly shape is interpolated to the step count, multiplied by a
/// seasonal sine factor `1 + amplitude * sin(2π (day / 365 - 0.2))` and by
/// per-step Gaussian noise around 1.0, then scaled so the day's energy equals
/// `annual_energy_kwh / 365`. Weekend days are further multiplied by
/// `weekend_factor`.
#[derive(Debug, Clone)]
pub struct ProfileLoad {
    /// Target yearly consumption in kWh before weekend scaling.
    pub annual_energy_kwh: f64,

    /// Multiplier applied to Saturday and Sunday.
    pub weekend_factor: f64,

    /// Amplitude of the seasonal sine factor.
    pub seasonal_amplitude: f64,

    /// Relative standard deviation of the per-step noise.
    pub noise_std: f64,

    /// Power values for the day currently being emitted, keyed by day index.
    current_day: Option<(usize, Vec<f64>)>,

    rng: StdRng,
}

impl ProfileLoad {
    /// Days used to spread the annual energy target.
    pub const DAYS_PER_YEAR: f64 = 365.0;

    /// Creates a new profile load generator.
    pub fn new(
        annual_energy_kwh: f64,
        weekend_factor: f64,
        seasonal_amplitude: f64,
        noise_std: f64,
        seed: u64,
    ) -> Self {
        Self {
            annual_energy_kwh: annual_energy_kwh.max(0.0),
            weekend_factor: weekend_factor.max(0.0),
            seasonal_amplitude,
            noise_std: noise_std.max(0.0),
            current_day: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Hourly shape linearly interpolated onto `steps` evenly spaced points over `[0, 24]`.
    pub fn interpolated_shape(steps: usize) -> Vec<f64> {
        if steps == 1 {
            return vec![HOURLY_SHAPE[0]];
        }
        let last = HOURLY_SHAPE.len() - 1;
        (0..steps)
            .map(|i| {
                let x = 24.0 * i as f64 / (steps - 1) as f64;
                let lo = (x.floor() as usize).min(last);
                let hi = (lo + 1).min(last);
                let frac = (x - lo as f64).clamp(0.0, 1.0);
                HOURLY_SHAPE[lo] + (HOURLY_SHAPE[hi] - HOURLY_SHAPE[lo]) * frac
            })
            .collect()
    }

    fn build_day(&mut self, context: &DeviceContext) -> Vec<f64> {
        let steps = context.steps_per_day.max(1);
        let day = context.day_index() as f64;
        let seasonal = 1.0
            + self.seasonal_amplitude
                * (2.0 * std::f64::consts::PI * (day / Self::DAYS_PER_YEAR - 0.2)).sin();
        let weekend = matches!(context.timestamp.weekday(), Weekday::Sat | Weekday::Sun);
        let w_factor = if weekend { self.weekend_factor } else { 1.0 };

        let shape: Vec<f64> = Self::interpolated_shape(steps)
            .into_iter()
            .map(|v| (v * seasonal * (1.0 + gaussian_noise(&mut self.rng, self.noise_std))).max(0.0))
            .collect();
        let shape_sum: f64 = shape.iter().sum();
        if shape_sum <= 0.0 {
            return vec![0.0; steps];
        }

        let daily_kwh = self.annual_energy_kwh / Self::DAYS_PER_YEAR;
        let dt = context.dt_hours();
        shape
            .into_iter()
            .map(|v| daily_kwh * v / shape_sum * w_factor / dt)
            .collect()
    }
}

impl Device for ProfileLoad {
    /// Returns the interval's power; the whole day is generated on its first step.
    fn power_kw(&mut self, context: &DeviceContext) -> f64 {
        let day = context.day_index();
        if self.current_day.as_ref().is_none_or(|(d, _)| *d != day) {
            let values = self.build_day(context);
            self.current_day = Some((day, values));
        }
        let slot = context.timestep % context.steps_per_day.max(1);
        self.current_day
            .as_ref()
            .and_then(|(_, values)| values.get(slot).copied())
            .unwrap_or(0.0)
    }

    fn device_type(&self) -> &'static str {
        "ProfileLoad"
    }
}
