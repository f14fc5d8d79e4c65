//! Named scenarios run over a shared series, and their cost-benefit comparison.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::devices::BatterySpec;
use crate::error::{Result, SimError};
use crate::series::EnergySeries;
use crate::sim::engine::Engine;
use crate::sim::kpi::ScenarioSummary;
use crate::sim::policy::{DispatchPolicy, FixedWindow, NoBattery, PolicyKind, PriceDriven};
use crate::sim::types::IntervalResult;

pub const BASELINE: &str = "baseline";
pub const SOLAR_ONLY: &str = "solar_only";
pub const FIXED_WINDOW: &str = "fixed_window";
pub const PRICE_DRIVEN: &str = "price_driven";

/// A policy plus the asset mix it runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub policy: PolicyKind,
    /// `false` runs over the zero-solar view of the series.
    pub include_solar: bool,
}

impl Scenario {
    pub fn new(name: impl Into<String>, policy: impl Into<PolicyKind>, include_solar: bool) -> Self {
        Self {
            name: name.into(),
            policy: policy.into(),
            include_solar,
        }
    }

    /// Grid only: no solar, no battery.
    pub fn baseline() -> Self {
        Self::new(BASELINE, NoBattery, false)
    }

    /// Solar with export of any surplus; the battery is absent.
    pub fn solar_only() -> Self {
        Self::new(SOLAR_ONLY, NoBattery, true)
    }

    pub fn fixed_window(policy: FixedWindow) -> Self {
        Self::new(FIXED_WINDOW, policy, true)
    }

    pub fn price_driven(policy: PriceDriven) -> Self {
        Self::new(PRICE_DRIVEN, policy, true)
    }

    /// The four standard scenarios, baseline first.
    pub fn standard_set(fixed: FixedWindow, price: PriceDriven) -> Vec<Self> {
        vec![
            Self::baseline(),
            Self::solar_only(),
            Self::fixed_window(fixed),
            Self::price_driven(price),
        ]
    }
}

/// Per-interval results and totals of one scenario run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub name: String,
    /// Name of the policy that produced the results.
    pub policy: &'static str,
    pub results: Vec<IntervalResult>,
    pub summary: ScenarioSummary,
}

/// Runs one scenario over `series`.
///
/// # Errors
///
/// Returns [`SimError::Configuration`] if the spec is invalid or
/// `initial_soc_kwh` is outside the usable window.
pub fn run_scenario(
    scenario: &Scenario,
    series: &EnergySeries,
    spec: &BatterySpec,
    initial_soc_kwh: f64,
) -> Result<ScenarioOutcome> {
    debug!(scenario = %scenario.name, policy = scenario.policy.name(), "scenario started");

    let engine = Engine::new(spec.clone(), scenario.policy, series.dt_hours())?;
    let results = if scenario.include_solar {
        engine.run(series, initial_soc_kwh)?
    } else {
        engine.run(&series.without_solar(), initial_soc_kwh)?
    };
    let summary = ScenarioSummary::from_results(&results, series.dt_hours(), spec.usable_kwh());

    debug!(
        scenario = %scenario.name,
        import_kwh = summary.total_import_kwh,
        export_kwh = summary.total_export_kwh,
        cost = summary.total_cost,
        "scenario finished"
    );

    Ok(ScenarioOutcome {
        name: scenario.name.clone(),
        policy: scenario.policy.name(),
        results,
        summary,
    })
}

/// Runs every scenario over the same series in parallel.
///
/// Each run owns its own state; outcomes are returned in input order.
///
/// # Errors
///
/// Returns an error if any scenario fails.
pub fn run_scenarios(
    scenarios: &[Scenario],
    series: &EnergySeries,
    spec: &BatterySpec,
    initial_soc_kwh: f64,
) -> Result<Vec<ScenarioOutcome>> {
    scenarios
        .par_iter()
        .map(|scenario| run_scenario(scenario, series, spec, initial_soc_kwh))
        .collect()
}

/// One scenario measured against the baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioComparison {
    pub name: String,
    pub policy: String,
    pub summary: ScenarioSummary,
    /// Baseline cost minus this scenario's cost.
    pub savings: f64,
    /// Savings as a percentage of baseline cost.
    pub savings_pct: f64,
    /// Baseline import minus this scenario's import (kWh).
    pub import_reduction_kwh: f64,
}

/// Which battery policy came out cheaper, and by how much.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDelta {
    pub cheaper: String,
    pub other: String,
    pub difference: f64,
}

/// Savings of every scenario against a baseline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBenefit {
    pub baseline: String,
    pub baseline_cost: f64,
    pub baseline_import_kwh: f64,
    pub scenarios: Vec<ScenarioComparison>,
    /// Fixed-window against price-driven, when both were run.
    pub policy_delta: Option<PolicyDelta>,
}

impl CostBenefit {
    /// Compares every outcome against the one named `baseline`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] if no outcome is named `baseline`.
    pub fn from_outcomes(outcomes: &[ScenarioOutcome], baseline: &str) -> Result<Self> {
        let Some(base) = outcomes.iter().find(|o| o.name == baseline) else {
            return Err(SimError::configuration(
                "scenarios",
                format!("no scenario named `{baseline}` to compare against"),
            ));
        };
        let base_cost = base.summary.total_cost;
        let base_import = base.summary.total_import_kwh;

        let scenarios = outcomes
            .iter()
            .map(|o| {
                let savings = base_cost - o.summary.total_cost;
                ScenarioComparison {
                    name: o.name.clone(),
                    policy: o.policy.to_string(),
                    summary: o.summary.clone(),
                    savings,
                    savings_pct: if base_cost > 0.0 {
                        100.0 * savings / base_cost
                    } else {
                        0.0
                    },
                    import_reduction_kwh: base_import - o.summary.total_import_kwh,
                }
            })
            .collect();

        let cost_of = |name: &str| {
            outcomes
                .iter()
                .find(|o| o.name == name)
                .map(|o| o.summary.total_cost)
        };
        let policy_delta = match (cost_of(FIXED_WINDOW), cost_of(PRICE_DRIVEN)) {
            (Some(fixed), Some(price)) => {
                let (cheaper, other) = if fixed <= price {
                    (FIXED_WINDOW, PRICE_DRIVEN)
                } else {
                    (PRICE_DRIVEN, FIXED_WINDOW)
                };
                Some(PolicyDelta {
                    cheaper: cheaper.to_string(),
                    other: other.to_string(),
                    difference: (fixed - price).abs(),
                })
            }
            _ => None,
        };

        Ok(Self {
            baseline: baseline.to_string(),
            baseline_cost: base_cost,
            baseline_import_kwh: base_import,
            scenarios,
            policy_delta,
        })
    }

    /// Looks up a comparison by scenario name.
    pub fn scenario(&self, name: &str) -> Option<&ScenarioComparison> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}
