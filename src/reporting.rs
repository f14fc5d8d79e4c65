//! Text and JSON renderings of a cost-benefit comparison.

use std::fmt;

use crate::scenario::CostBenefit;

impl fmt::Display for CostBenefit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Cost-Benefit Report ---")?;
        writeln!(
            f,
            "Baseline ({}): import {:.2} kWh, cost {:.2}",
            self.baseline, self.baseline_import_kwh, self.baseline_cost
        )?;
        writeln!(
            f,
            "{:<14} {:>14} {:>14} {:>12} {:>12} {:>8}",
            "scenario", "import_kwh", "export_kwh", "cost", "savings", "saved%"
        )?;
        for s in &self.scenarios {
            writeln!(
                f,
                "{:<14} {:>14.2} {:>14.2} {:>12.2} {:>12.2} {:>7.1}%",
                s.name,
                s.summary.total_import_kwh,
                s.summary.total_export_kwh,
                s.summary.total_cost,
                s.savings,
                s.savings_pct
            )?;
        }
        match &self.policy_delta {
            Some(delta) => write!(
                f,
                "{} is cheaper than {} by {:.2}",
                delta.cheaper, delta.other, delta.difference
            ),
            None => write!(f, "No battery policy comparison available"),
        }
    }
}

/// Prints the cost-benefit report and each scenario's totals to stdout.
pub fn print_report(cost_benefit: &CostBenefit) {
    for s in &cost_benefit.scenarios {
        println!("\n=== {} ({}) ===", s.name, s.policy);
        println!("{}", s.summary);
    }
    println!("\n{cost_benefit}");
}

/// Serializes the comparison as pretty-printed JSON.
///
/// # Errors
///
/// Returns a `serde_json::Error` if serialization fails.
pub fn to_json(cost_benefit: &CostBenefit) -> serde_json::Result<String> {
    serde_json::to_string_pretty(cost_benefit)
}
