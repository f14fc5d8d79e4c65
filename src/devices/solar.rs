use chrono::Timelike;

use super::types::{Device, DeviceContext};

/// A solar PV array with a Gaussian bell generation profile around solar noon.
///
/// Output is `kw_peak * exp(-0.5 * ((hour - noon_hour) / width_hours)^2)` for
/// whole hours in `[sunrise_hour, sunset_hour)` and zero otherwise, so both
/// half-hours of an hour share the same value. The profile is deterministic.
#[derive(Debug, Clone)]
pub struct SolarPv {
    /// Output in kilowatts at solar noon.
    pub kw_peak: f64,

    /// First generating hour (inclusive).
    pub sunrise_hour: u32,

    /// First non-generating hour after the day (exclusive).
    pub sunset_hour: u32,

    /// Hour of maximum output.
    pub noon_hour: f64,

    /// Standard deviation of the bell, in hours.
    pub width_hours: f64,
}

impl SolarPv {
    /// Creates an array with the default 06:00-18:00 window, noon peak, and 2 h width.
    pub fn new(kw_peak: f64) -> Self {
        Self {
            kw_peak: kw_peak.max(0.0),
            sunrise_hour: 6,
            sunset_hour: 18,
            noon_hour: 12.0,
            width_hours: 2.0,
        }
    }

    /// Fraction of peak output at a whole `hour` of the day.
    pub fn daylight_frac(&self, hour: u32) -> f64 {
        if !(self.sunrise_hour..self.sunset_hour).contains(&hour) || self.width_hours <= 0.0 {
            return 0.0;
        }
        let z = (f64::from(hour) - self.noon_hour) / self.width_hours;
        (-0.5 * z * z).exp()
    }
}

impl Device for SolarPv {
    fn power_kw(&mut self, context: &DeviceContext) -> f64 {
        self.kw_peak * self.daylight_frac(context.timestamp.hour())
    }

    fn device_type(&self) -> &'static str {
        "SolarPV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx(hour: u32, minute: u32) -> DeviceContext {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap();
        DeviceContext::new(0, ts, 48)
    }

    #[test]
    fn negative_peak_clamped_to_zero() {
        assert_eq!(SolarPv::new(-1.0).kw_peak, 0.0);
    }

    #[test]
    fn no_generation_at_night() {
        let mut pv = SolarPv::new(8000.0);
        assert_eq!(pv.power_kw(&ctx(0, 0)), 0.0);
        assert_eq!(pv.power_kw(&ctx(5, 30)), 0.0);
        assert_eq!(pv.power_kw(&ctx(18, 0)), 0.0);
        assert_eq!(pv.power_kw(&ctx(23, 30)), 0.0);
    }

    #[test]
    fn peak_at_noon() {
        let mut pv = SolarPv::new(8000.0);
        assert_eq!(pv.power_kw(&ctx(12, 0)), 8000.0);
        assert_eq!(pv.power_kw(&ctx(12, 30)), 8000.0);
    }

    #[test]
    fn profile_is_symmetric() {
        let pv = SolarPv::new(1.0);
        assert!((pv.daylight_frac(10) - pv.daylight_frac(14)).abs() < 1e-12);
        assert!((pv.daylight_frac(10) - (-0.5_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn output_never_negative() {
        let mut pv = SolarPv::new(4500.0);
        for h in 0..24 {
            assert!(pv.power_kw(&ctx(h, 0)) >= 0.0);
        }
    }
}
