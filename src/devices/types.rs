//! Common types and traits for synthetic device profiles.

use chrono::NaiveDateTime;
use rand::{Rng, rngs::StdRng};

/// Contextual information passed to devices when sampling a profile.
///
/// # Fields
/// * `timestep` - Index of the interval within the generated series
/// * `timestamp` - Interval start
/// * `steps_per_day` - Number of intervals per simulated day
#[derive(Debug, Clone, Copy)]
pub struct DeviceContext {
    pub timestep: usize,
    pub timestamp: NaiveDateTime,
    pub steps_per_day: usize,
}

impl DeviceContext {
    /// Creates a new `DeviceContext`.
    pub fn new(timestep: usize, timestamp: NaiveDateTime, steps_per_day: usize) -> Self {
        Self {
            timestep,
            timestamp,
            steps_per_day,
        }
    }

    /// Zero-based day index of the timestep.
    pub fn day_index(&self) -> usize {
        self.timestep / self.steps_per_day.max(1)
    }

    /// Interval length in hours.
    pub fn dt_hours(&self) -> f64 {
        24.0 / self.steps_per_day.max(1) as f64
    }
}

/// A load or generation profile sampled once per interval, in order.
///
/// Implementations may carry seeded random state, so every call advances
/// the profile; sampling the same device twice for one timestep is a bug.
pub trait Device {
    /// Returns the mean power over the interval (kW, >= 0).
    fn power_kw(&mut self, context: &DeviceContext) -> f64;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// Utility function to generate Gaussian noise using the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and the given standard deviation
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;

    #[test]
    fn zero_std_dev_is_silent() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(gaussian_noise(&mut rng, 0.0), 0.0);
    }

    #[test]
    fn noise_is_roughly_centered() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 10_000;
        let mean = (0..n).map(|_| gaussian_noise(&mut rng, 1.0)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean = {mean}");
    }

    #[test]
    fn context_day_index_and_dt() {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 2)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let ctx = DeviceContext::new(49, ts, 48);
        assert_eq!(ctx.day_index(), 1);
        assert_eq!(ctx.dt_hours(), 0.5);
    }
}
