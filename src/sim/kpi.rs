//! Post-hoc scenario totals computed from dispatch results.

use std::fmt;

use serde::Serialize;

use super::types::IntervalResult;

/// Aggregate indicators for one scenario run.
///
/// Computed post-hoc from `Vec<IntervalResult>` so reported totals always
/// agree with the per-interval record.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ScenarioSummary {
    /// Number of intervals simulated.
    pub intervals: usize,
    pub total_load_kwh: f64,
    pub total_solar_kwh: f64,
    /// Grid energy bought, including grid charging.
    pub total_import_kwh: f64,
    pub total_export_kwh: f64,
    pub total_cost: f64,
    /// Energy taken in by the battery (solar and grid), before losses.
    pub total_charge_kwh: f64,
    /// Grid energy bought to charge the battery.
    pub total_grid_charge_kwh: f64,
    /// Energy drawn from the state of charge.
    pub total_discharge_kwh: f64,
    /// Highest import power over the run (kW).
    pub peak_import_kw: f64,
    /// Discharge throughput divided by the usable window.
    pub equivalent_full_cycles: f64,
    /// State of charge after the last interval.
    pub final_soc_kwh: f64,
}

impl ScenarioSummary {
    /// Computes all totals from the complete result vector.
    ///
    /// # Arguments
    ///
    /// * `results` - Complete dispatch results for one run
    /// * `dt_hours` - Interval duration in hours
    /// * `usable_kwh` - Usable battery window for the cycle count
    pub fn from_results(results: &[IntervalResult], dt_hours: f64, usable_kwh: f64) -> Self {
        let mut summary = Self {
            intervals: results.len(),
            ..Self::default()
        };

        for r in results {
            summary.total_load_kwh += r.load_kwh;
            summary.total_solar_kwh += r.solar_kwh;
            summary.total_import_kwh += r.import_kwh;
            summary.total_export_kwh += r.export_kwh;
            summary.total_cost += r.cost;
            summary.total_charge_kwh += r.charge_kwh;
            summary.total_grid_charge_kwh += r.grid_charge_kwh;
            summary.total_discharge_kwh += r.discharge_kwh;
            if dt_hours > 0.0 {
                summary.peak_import_kw = summary.peak_import_kw.max(r.import_kwh / dt_hours);
            }
        }

        if usable_kwh > 0.0 {
            summary.equivalent_full_cycles = summary.total_discharge_kwh / usable_kwh;
        }
        summary.final_soc_kwh = results.last().map_or(0.0, |r| r.soc_kwh);
        summary
    }

    /// Fraction of load served without grid import for the load itself.
    pub fn self_sufficiency(&self) -> f64 {
        if self.total_load_kwh <= 0.0 {
            return 0.0;
        }
        let load_import = self.total_import_kwh - self.total_grid_charge_kwh;
        (1.0 - load_import / self.total_load_kwh).clamp(0.0, 1.0)
    }
}

impl fmt::Display for ScenarioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Intervals:             {}", self.intervals)?;
        writeln!(f, "Load:                  {:.2} kWh", self.total_load_kwh)?;
        writeln!(f, "Solar:                 {:.2} kWh", self.total_solar_kwh)?;
        writeln!(f, "Grid import:           {:.2} kWh", self.total_import_kwh)?;
        writeln!(f, "Grid export:           {:.2} kWh", self.total_export_kwh)?;
        writeln!(
            f,
            "Battery charge:        {:.2} kWh ({:.2} from grid)",
            self.total_charge_kwh, self.total_grid_charge_kwh
        )?;
        writeln!(
            f,
            "Battery discharge:     {:.2} kWh ({:.2} equiv. cycles)",
            self.total_discharge_kwh, self.equivalent_full_cycles
        )?;
        writeln!(f, "Peak import:           {:.2} kW", self.peak_import_kw)?;
        writeln!(f, "Self-sufficiency:      {:.1}%", self.self_sufficiency() * 100.0)?;
        write!(f, "Total cost:            {:.2}", self.total_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::TariffTier;
    use chrono::NaiveDate;

    fn make_result(import_kwh: f64, discharge_kwh: f64, soc_kwh: f64) -> IntervalResult {
        IntervalResult {
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap(),
            tier: TariffTier::OffPeak,
            tariff_rate: 0.1,
            load_kwh: 10.0,
            solar_kwh: 0.0,
            soc_kwh,
            charge_kwh: 0.0,
            solar_charge_kwh: 0.0,
            grid_charge_kwh: 0.0,
            discharge_kwh,
            discharge_delivered_kwh: discharge_kwh,
            import_kwh,
            export_kwh: 0.0,
            cost: import_kwh * 0.1,
        }
    }

    #[test]
    fn totals_sum_results() {
        let results = vec![
            make_result(10.0, 0.0, 5.0),
            make_result(4.0, 6.0, 0.0),
            make_result(10.0, 0.0, 0.0),
        ];
        let s = ScenarioSummary::from_results(&results, 0.5, 10.0);
        assert_eq!(s.intervals, 3);
        assert!((s.total_import_kwh - 24.0).abs() < 1e-12);
        assert!((s.total_cost - 2.4).abs() < 1e-12);
        assert!((s.total_discharge_kwh - 6.0).abs() < 1e-12);
        assert!((s.equivalent_full_cycles - 0.6).abs() < 1e-12);
        assert_eq!(s.final_soc_kwh, 0.0);
    }

    #[test]
    fn peak_import_is_power() {
        let results = vec![make_result(3.0, 0.0, 0.0), make_result(5.0, 0.0, 0.0)];
        let s = ScenarioSummary::from_results(&results, 0.5, 10.0);
        assert_eq!(s.peak_import_kw, 10.0);
    }

    #[test]
    fn self_sufficiency_bounds() {
        let results = vec![make_result(10.0, 0.0, 0.0), make_result(0.0, 10.0, 0.0)];
        let s = ScenarioSummary::from_results(&results, 1.0, 10.0);
        assert!((s.self_sufficiency() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_results() {
        let s = ScenarioSummary::from_results(&[], 1.0, 10.0);
        assert_eq!(s.intervals, 0);
        assert_eq!(s.total_cost, 0.0);
        assert_eq!(s.self_sufficiency(), 0.0);
    }

    #[test]
    fn display_does_not_panic() {
        let s = ScenarioSummary::from_results(&[make_result(1.0, 0.0, 0.0)], 1.0, 0.0);
        assert!(format!("{s}").contains("Total cost"));
    }
}
